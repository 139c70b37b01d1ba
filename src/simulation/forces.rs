use glam::Vec3;
use rayon::prelude::*;

use super::scene::ForceField;
use crate::constants::forces::{EFFECTOR_FORCE_LIMIT, EFFECTOR_FORCE_SCALE};
use crate::constants::grid::{EPSILON, FLAG_OBSTACLE};
use crate::domain::DomainState;
use crate::grid::{grid_index, rotate_keep_length};
use crate::solver::FluidGrids;

/// Evaluate force fields at every smoke cell and store them as solver forces.
///
/// Empty cells and obstacle cells keep a zero force.
pub fn apply_force_fields(grids: &mut FluidGrids, state: &DomainState, fields: &[Box<dyn ForceField>]) {
    if fields.is_empty() {
        return;
    }
    let res = grids.res;
    let slab = (res.x * res.y) as usize;
    let FluidGrids {
        force,
        velocity,
        flags,
        smoke,
        fire,
        obstacle,
        ..
    } = grids;
    let density = smoke.as_ref().map(|s| s.density.as_slice());
    let fuel = fire.as_ref().map(|f| f.fuel.as_slice());
    let phi_obs = obstacle.as_ref().map(|o| o.phi_obs_in.as_slice());
    let velocity = &*velocity;
    let flags = flags.as_slice();

    force
        .x
        .par_chunks_mut(slab)
        .zip(force.y.par_chunks_mut(slab))
        .zip(force.z.par_chunks_mut(slab))
        .enumerate()
        .for_each(|(z, ((fx, fy), fz))| {
            let z = z as i32;
            for y in 0..res.y {
                for x in 0..res.x {
                    let i = grid_index(x, y, z, res);
                    let empty = match (fuel, density) {
                        (Some(f), Some(d)) => d[i].max(f[i]) < EPSILON,
                        (Some(f), None) => f[i] < EPSILON,
                        (None, Some(d)) => d[i] < EPSILON,
                        (None, None) => false,
                    };
                    if empty
                        || phi_obs.is_some_and(|p| p[i] < 0.0)
                        || flags[i] & FLAG_OBSTACLE != 0
                    {
                        continue;
                    }

                    let vel = rotate_keep_length(state.object_to_world, velocity.get(i) * state.dx);
                    let center = state.voxel_center_world(x, y, z);
                    let world: Vec3 = fields.iter().map(|f| f.force_at(center, vel)).sum();

                    let local = rotate_keep_length(state.world_to_object, world);
                    let f = (local * EFFECTOR_FORCE_SCALE)
                        .clamp(Vec3::splat(-EFFECTOR_FORCE_LIMIT), Vec3::splat(EFFECTOR_FORCE_LIMIT));
                    let j = (x + res.x * y) as usize;
                    fx[j] = f.x;
                    fy[j] = f.y;
                    fz[j] = f.z;
                }
            }
        });
}
