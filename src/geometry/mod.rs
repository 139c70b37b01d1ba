//! Source geometry and spatial queries
//!
//! Meshes and particle sets handed in by the scene, plus the R-tree backed
//! indices the samplers query for ray hits and nearest surface points.

pub mod index;
pub mod mesh;
pub mod particles;

pub use index::{NearestHit, RayHit, TriangleIndex};
pub use mesh::{barycentric_weights, TriangleMesh};
pub use particles::{Particle, ParticleKind, ParticlePhysics, ParticleSystem, ParticleTree};

#[cfg(test)]
mod tests;
