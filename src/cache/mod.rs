//! Frame cache
//!
//! Baked frames are stored per channel (data, noise, mesh, particles, guide)
//! next to one config file per frame describing the domain layout. The
//! orchestrator decides per frame what to read and what to bake.

pub mod channel;
pub mod compression;
pub mod format;
pub mod orchestrator;
pub mod store;

pub use channel::{Channel, ChannelState, ChannelStates};
pub use compression::Compressor;
pub use orchestrator::{DomainCore, FrameReport};
pub use store::{CacheStore, DirectoryCache, DomainConfig, GridFrame};

#[cfg(test)]
mod tests;
