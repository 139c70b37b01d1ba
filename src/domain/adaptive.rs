//! Adaptive domain: track content and resize the active region every frame

use glam::{IVec3, Mat3, Mat4, Vec3};

use super::allocator::{reallocate_and_copy, GridSnapshot};
use super::{DomainSettings, DomainState};
use crate::constants::grid::ADAPT_BOUND_SENTINEL;
use crate::emission::{clamp_bounds_in_domain, FieldBuffer};
use crate::grid::{cell_count, grid_index};
use crate::solver::{FluidGrids, FluidSolver};

/// Follow the domain object's motion and shrink or grow the active region
/// around simulated content and pending emission.
///
/// Returns true when the grids were replaced.
pub fn adaptive_domain_adjust(
    state: &mut DomainState,
    settings: &DomainSettings,
    grids: &mut Option<FluidGrids>,
    object_to_world: Mat4,
    emission: &[FieldBuffer],
    dt: f32,
    solver: &mut dyn FluidSolver,
) -> bool {
    // translation since the last frame, in cells
    let ob_loc = object_to_world.transform_point3(Vec3::ZERO);
    let delta = ob_loc - state.prev_loc;
    state.prev_loc = ob_loc;
    let frame_shift = Mat3::from_mat4(state.world_to_object) * delta / state.cell_size;

    state.shift_f += frame_shift;
    let total_shift = state.shift_f.floor().as_ivec3();
    let old_shift = state.shift;
    let new_shift = total_shift - state.shift;
    state.shift = total_shift;

    // sub-cell motion moves the origin instead of the content
    state.p0 = state.dp0 - state.cell_size * (state.shift_f - total_shift.as_vec3() - Vec3::splat(0.5));
    state.p1 = state.p0 + state.cell_size * state.base_res.as_vec3();

    let threshold = settings.adaptive.threshold;
    let mut min = IVec3::splat(ADAPT_BOUND_SENTINEL);
    let mut max = IVec3::splat(-ADAPT_BOUND_SENTINEL);
    let mut min_vel = Vec3::splat(f32::MAX);
    let mut max_vel = Vec3::splat(f32::MIN);

    if let Some(g) = grids.as_ref() {
        if g.res == state.res {
            scan_content(state, settings, g, new_shift, &mut min, &mut max, &mut min_vel, &mut max_vel);
        }
    }

    for buffer in emission.iter().filter(|b| b.is_allocated()) {
        for z in buffer.min.z..buffer.max.z {
            for y in buffer.min.y..buffer.max.y {
                for x in buffer.min.x..buffer.max.x {
                    let p = IVec3::new(x, y, z);
                    if buffer.influence_at(buffer.local_index(p)) >= threshold {
                        min = min.min(p);
                        max = max.max(p);
                    }
                }
            }
        }
    }

    clamp_bounds_in_domain(
        &mut min,
        &mut max,
        Some(min_vel),
        Some(max_vel),
        settings.adaptive.margin + 1,
        dt,
        state.limits(settings),
    );

    let mut res = max - min;
    let mut res_changed = min != state.res_min || max != state.res_max;
    let shift_changed = new_shift != IVec3::ZERO;
    if res.min_element() <= 0 {
        min = IVec3::ZERO;
        max = IVec3::ONE;
        res = IVec3::ONE;
        res_changed = true;
    }

    let mut resized = false;
    if res_changed || shift_changed {
        let old = GridSnapshot {
            res: state.res,
            min: state.res_min,
            max: state.res_max,
            shift: old_shift,
        };
        reallocate_and_copy(grids, state, settings, old, res, min, total_shift);

        state.res_min = min;
        state.res_max = max;
        state.res = res;
        state.total_cells = cell_count(res);
        if let Some(g) = grids.as_ref() {
            solver.adapt_timestep(g, state);
        }
        resized = true;

        log::debug!(
            "[adaptive::adjust] Active region {:?}..{:?} ({} cells), shift {:?}",
            min,
            max,
            state.total_cells,
            total_shift
        );
    }

    let (scale, _, _) = object_to_world.to_scale_rotation_translation();
    let lo = state.p0 + state.cell_size * state.res_min.as_vec3();
    let hi = state.p0 + state.cell_size * state.res_max.as_vec3();
    state.global_size = ((hi - lo) * scale).abs();

    resized
}

#[allow(clippy::too_many_arguments)]
fn scan_content(
    state: &DomainState,
    settings: &DomainSettings,
    grids: &FluidGrids,
    new_shift: IVec3,
    min: &mut IVec3,
    max: &mut IVec3,
    min_vel: &mut Vec3,
    max_vel: &mut Vec3,
) {
    let threshold = settings.adaptive.threshold;
    let block = settings.noise.scale.max(1);
    let density = grids.density();
    let fuel = grids.fuel();
    let heat = grids.heat.as_ref().map(|h| h.heat.as_slice());
    let noise = grids.noise.as_ref();

    for x in state.res_min.x..state.res_max.x {
        for y in state.res_min.y..state.res_max.y {
            for z in state.res_min.z..state.res_max.z {
                let pn = IVec3::new(x, y, z) - new_shift;
                if pn.cmpge(*min).all() && pn.cmple(*max).all() {
                    continue;
                }

                let l = IVec3::new(x, y, z) - state.res_min;
                let index = grid_index(l.x, l.y, l.z, state.res);
                let mut max_den = density.map_or(0.0, |d| d[index]);
                if let Some(f) = fuel {
                    max_den = max_den.max(f[index]);
                }
                if let Some(h) = heat {
                    max_den = max_den.max(h[index]);
                }

                if max_den < threshold {
                    if let Some(noise) = noise {
                        let base = l * block;
                        for k in 0..block {
                            for j in 0..block {
                                for i in 0..block {
                                    let b = base + IVec3::new(i, j, k);
                                    let bi = grid_index(b.x, b.y, b.z, noise.res);
                                    let mut den = noise.density[bi];
                                    if let Some(f) = noise.fuel() {
                                        den = den.max(f[bi]);
                                    }
                                    max_den = max_den.max(den);
                                }
                            }
                        }
                    }
                }

                if max_den >= threshold {
                    *min = min.min(pn);
                    *max = max.max(pn);
                }

                let v = grids.velocity.get(index);
                *min_vel = min_vel.min(v);
                *max_vel = max_vel.max(v);
            }
        }
    }
}
