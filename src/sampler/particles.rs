use glam::{IVec3, Vec3};
use rayon::prelude::*;

use super::SampleContext;
use crate::constants::sampling::{PARTICLE_SMOOTH_RADIUS, PARTICLE_SOLID_FACTOR};
use crate::emission::{clamp_bounds_in_domain, FieldBuffer};
use crate::geometry::{ParticlePhysics, ParticleSystem, ParticleTree};
use crate::grid::in_bounds;
use crate::source::FlowSettings;

/// Emission buffer of a particle flow.
///
/// Without radius mode every live particle marks its own cell. With radius
/// mode cells within the particle's solid radius get full influence, falling
/// off linearly over another half cell.
pub fn emit_from_particles(
    system: &ParticleSystem,
    flow: &FlowSettings,
    ctx: &SampleContext,
    frame_offset: f32,
) -> FieldBuffer {
    let mut buffer = FieldBuffer::new();
    if !system.kind.emits() {
        return buffer;
    }

    let solid = flow.particle_size * PARTICLE_SOLID_FACTOR;
    let smooth = PARTICLE_SMOOTH_RADIUS;
    let margin = if flow.use_particle_size {
        (solid + smooth).ceil() as i32
    } else {
        1
    };

    let (positions, velocities): (Vec<Vec3>, Vec<Vec3>) = system
        .live_particles(frame_offset)
        .map(|p| {
            (
                ctx.space.world_to_cell(p.position),
                ctx.space.rotate_to_object(p.velocity),
            )
        })
        .unzip();
    if positions.is_empty() {
        return buffer;
    }
    for &p in &positions {
        buffer.bound_insert(p);
    }

    clamp_bounds_in_domain(&mut buffer.min, &mut buffer.max, None, None, margin, ctx.dt, ctx.limits);
    buffer.allocate(flow.init_velocity, true);
    if !flow.use_flow || !buffer.is_allocated() {
        return buffer;
    }

    let with_motion = flow.init_velocity && system.physics != ParticlePhysics::None;

    if !flow.use_particle_size {
        for (p, v) in positions.iter().zip(velocities.iter()) {
            let cell = p.floor().as_ivec3();
            if !in_bounds(cell, buffer.min, buffer.max) {
                continue;
            }
            let i = buffer.local_index(cell);
            if let Some(influence) = buffer.influence.as_mut() {
                influence[i] = 1.0;
            }
            if with_motion {
                if let Some(velocity) = buffer.velocity.as_mut() {
                    velocity[i] += *v * flow.vel_multi;
                }
            }
        }
        return buffer;
    }

    let tree = ParticleTree::build(&positions);
    let range = solid + smooth;

    buffer.slabs_mut().into_par_iter().for_each(|mut slab| {
        let z = slab.z;
        for (x, y) in slab.cells() {
            let i = slab.index(x, y);
            let start = IVec3::new(x, y, z).as_vec3() + Vec3::splat(0.5);
            let (nearest, dist) = match tree.nearest(start) {
                Some(n) => n,
                None => continue,
            };
            if dist >= range {
                continue;
            }
            if let Some(influence) = slab.influence.as_deref_mut() {
                influence[i] = if dist < solid {
                    1.0
                } else {
                    1.0 - (dist - solid) / smooth
                };
            }
            if with_motion {
                if let Some(velocity) = slab.velocity.as_deref_mut() {
                    velocity[i] += velocities[nearest] * flow.vel_multi;
                }
            }
        }
    });

    buffer
}
