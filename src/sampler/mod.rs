//! Geometry field samplers
//!
//! Each sampler turns one source object into a `FieldBuffer` in domain cell
//! space. Sampling runs over z slabs on the current rayon pool; the spatial
//! indices are built once per pass and shared read-only.

pub mod distance;
pub mod mesh;
pub mod particles;

pub use distance::update_distance;
pub use mesh::{emit_from_mesh, obstacles_from_mesh};
pub use particles::emit_from_particles;

use glam::{IVec3, Mat4, Vec3};

use crate::domain::{DomainSettings, DomainState};
use crate::emission::{DomainLimits, FieldBuffer};
use crate::grid::CellSpace;
use crate::source::{SourceGeometry, SourceObject, SourceRole, VertexMotion};

/// Domain snapshot shared by every sampler of one pass
#[derive(Debug, Clone, Copy)]
pub struct SampleContext {
    pub space: CellSpace,
    pub shift: IVec3,
    pub base_res: IVec3,
    pub global_size: Vec3,
    pub limits: DomainLimits,
    /// Time step used for vertex motion and bound extrapolation
    pub dt: f32,
    /// Scene frame the source geometry was evaluated at
    pub frame: f32,
}

impl SampleContext {
    pub fn new(state: &DomainState, settings: &DomainSettings, dt: f32, frame: i32) -> Self {
        Self {
            space: state.cell_space(),
            shift: state.shift,
            base_res: state.base_res,
            global_size: state.global_size,
            limits: state.limits(settings),
            dt,
            frame: frame as f32,
        }
    }

    /// Vertices of a mesh placed by `object_to_world`, in cell space
    pub fn cell_positions(&self, positions: &[Vec3], object_to_world: Mat4) -> Vec<Vec3> {
        positions
            .iter()
            .map(|&p| self.space.world_to_cell(object_to_world.transform_point3(p)))
            .collect()
    }
}

/// Per-vertex motion in cells per time unit since the previous sample.
///
/// Positions are recorded shifted so a moving domain does not count as motion.
/// `None` on the first sample and whenever the vertex count changed.
pub fn vertex_velocities(
    cell_positions: &[Vec3],
    motion: &mut VertexMotion,
    shift: IVec3,
    dt: f32,
) -> Option<Vec<Vec3>> {
    let current: Vec<Vec3> = cell_positions.iter().map(|&p| p + shift.as_vec3()).collect();
    let velocities = match motion.previous.as_ref() {
        Some(prev) if prev.len() == current.len() && dt > 0.0 => Some(
            current
                .iter()
                .zip(prev.iter())
                .map(|(&c, &p)| (c - p) / dt)
                .collect(),
        ),
        _ => None,
    };
    motion.previous = Some(current);
    velocities
}

/// Sample `source` at scene time `time` into a new buffer
pub fn sample_source(source: &mut SourceObject, ctx: &SampleContext, time: f32) -> FieldBuffer {
    let object_to_world = source.transform.matrix_at(time);
    let SourceObject {
        name,
        geometry,
        role,
        motion,
        ..
    } = source;

    match (role, geometry) {
        (SourceRole::Flow(flow), SourceGeometry::Mesh(mesh)) => {
            emit_from_mesh(mesh, object_to_world, flow, motion, ctx)
        }
        (SourceRole::Flow(flow), SourceGeometry::Particles(system)) => {
            emit_from_particles(system, flow, ctx, time - ctx.frame)
        }
        (SourceRole::Effector(effector), SourceGeometry::Mesh(mesh)) => {
            obstacles_from_mesh(mesh, object_to_world, effector, motion, ctx)
        }
        (SourceRole::Effector(_), SourceGeometry::Particles(_)) => {
            log::debug!(
                "[sampler::sample_source] Effector '{}' has particle geometry, nothing to sample",
                name
            );
            FieldBuffer::new()
        }
    }
}

#[cfg(test)]
mod tests;
