//! Adaptive fluid domain manager
//!
//! Bridges a scene of flow and effector objects to a grid-based fluid solver:
//! samples sources into per-source emission buffers, keeps an adaptive domain
//! sized to its content, drives the sub-step loop and manages the per-channel
//! frame cache.

pub mod cache;
pub mod constants;
pub mod context;
pub mod domain;
pub mod emission;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod sampler;
pub mod simulation;
pub mod solver;
pub mod source;

pub use cache::{CacheStore, Channel, DirectoryCache, DomainCore, FrameReport};
pub use context::{BakeSummary, ContextConfig, DomainContext};
pub use domain::{CacheFormat, CacheMode, DomainSettings, DomainState, DomainType, ProbeResult};
pub use error::{DomainError, DomainResult};
pub use geometry::{ParticleSystem, TriangleMesh};
pub use simulation::{ForceField, Light, LightKind, PointAttractor, Scene, UniformWind};
pub use solver::{FluidGrids, FluidSolver, ReferenceSolver};
pub use source::{
    AnimatedTransform, EffectorSettings, EffectorType, FlowBehavior, FlowSettings, FlowType, Keyframe,
    SourceGeometry, SourceObject, SourceRole,
};
