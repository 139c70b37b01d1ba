//! Grid (re)allocation and migration between active regions

use glam::IVec3;

use super::{DomainSettings, DomainState};
use crate::grid::{cell_count, grid_index, in_bounds};
use crate::solver::FluidGrids;

/// Layout of the grid that is about to be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSnapshot {
    pub res: IVec3,
    pub min: IVec3,
    pub max: IVec3,
    pub shift: IVec3,
}

impl GridSnapshot {
    pub fn of(state: &DomainState) -> Self {
        Self {
            res: state.res,
            min: state.res_min,
            max: state.res_max,
            shift: state.shift,
        }
    }
}

/// Replace the grid handle with fresh grids at `res`.
///
/// With `free_old` the previous grids are dropped before allocating. A
/// degenerate `res` or a failed allocation leaves the handle empty.
pub fn reallocate(
    grids: &mut Option<FluidGrids>,
    state: &mut DomainState,
    settings: &DomainSettings,
    res: IVec3,
    free_old: bool,
) -> bool {
    if free_old {
        *grids = None;
    }
    if cell_count(res) == 0 {
        *grids = None;
        return false;
    }

    state.res_noise = res * settings.noise.scale;
    *grids = FluidGrids::try_new(res, &state.layout(settings));
    if grids.is_none() {
        log::error!("[allocator::reallocate] Allocation failed for resolution {:?}", res);
    }
    grids.is_some()
}

/// Allocate grids for a new active region and migrate every field from the old one.
///
/// Old cell `p` lands at `p - new_min - (new_shift - old.shift)`. Cells within
/// `boundary_width` of either grid's edge are neither read nor written.
pub fn reallocate_and_copy(
    grids: &mut Option<FluidGrids>,
    state: &mut DomainState,
    settings: &DomainSettings,
    old: GridSnapshot,
    new_res: IVec3,
    new_min: IVec3,
    new_shift: IVec3,
) -> bool {
    let old_grids = grids.take();
    if !reallocate(grids, state, settings, new_res, false) {
        return false;
    }

    let (src, dst) = match (old_grids.as_ref(), grids.as_mut()) {
        (Some(src), Some(dst)) => (src, dst),
        _ => return true,
    };
    if cell_count(old.res) <= 1 || cell_count(new_res) <= 1 || src.res != old.res {
        return true;
    }

    let delta = new_shift - old.shift;
    let bw = settings.boundary_width;
    let block = settings.noise.scale.max(1);

    for z in old.min.z..old.max.z {
        for y in old.min.y..old.max.y {
            for x in old.min.x..old.max.x {
                let p = IVec3::new(x, y, z);
                let o = p - old.min;
                let n = p - new_min - delta;

                if !in_bounds(n, IVec3::ZERO, new_res) {
                    continue;
                }
                if !in_bounds(o, IVec3::splat(bw), old.res - IVec3::splat(bw)) {
                    continue;
                }
                if !in_bounds(n, IVec3::splat(bw), new_res - IVec3::splat(bw)) {
                    continue;
                }

                let io = grid_index(o.x, o.y, o.z, old.res);
                let inew = grid_index(n.x, n.y, n.z, new_res);
                copy_cell(src, dst, io, inew);

                if let (Some(so), Some(sn)) = (src.noise.as_ref(), dst.noise.as_mut()) {
                    for k in 0..3 {
                        sn.tex[k][inew] = so.tex[k][io];
                        sn.tex2[k][inew] = so.tex2[k][io];
                    }
                    for dz in 0..block {
                        for dy in 0..block {
                            for dx in 0..block {
                                let d = IVec3::new(dx, dy, dz);
                                let bo = o * block + d;
                                let bn = n * block + d;
                                let big_old = grid_index(bo.x, bo.y, bo.z, so.res);
                                let big_new = grid_index(bn.x, bn.y, bn.z, sn.res);
                                sn.density[big_new] = so.density[big_old];
                                if let (Some(fo), Some(fne)) = (so.fire.as_ref(), sn.fire.as_mut()) {
                                    for k in 0..3 {
                                        fne[k][big_new] = fo[k][big_old];
                                    }
                                }
                                if let (Some(co), Some(cn)) = (so.color.as_ref(), sn.color.as_mut()) {
                                    for k in 0..3 {
                                        cn[k][big_new] = co[k][big_old];
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    log::debug!(
        "[allocator::reallocate_and_copy] Migrated {:?}@{:?} -> {:?}@{:?} (shift delta {:?})",
        old.res,
        old.min,
        new_res,
        new_min,
        delta
    );
    true
}

fn copy_cell(src: &FluidGrids, dst: &mut FluidGrids, io: usize, inew: usize) {
    if let (Some(s), Some(d)) = (src.smoke.as_ref(), dst.smoke.as_mut()) {
        d.density[inew] = s.density[io];
    }
    if let (Some(s), Some(d)) = (src.liquid.as_ref(), dst.liquid.as_mut()) {
        d.phi[inew] = s.phi[io];
    }
    if let (Some(s), Some(d)) = (src.heat.as_ref(), dst.heat.as_mut()) {
        d.heat[inew] = s.heat[io];
    }
    if let (Some(s), Some(d)) = (src.fire.as_ref(), dst.fire.as_mut()) {
        d.flame[inew] = s.flame[io];
        d.fuel[inew] = s.fuel[io];
        d.react[inew] = s.react[io];
    }
    if let (Some(s), Some(d)) = (src.color.as_ref(), dst.color.as_mut()) {
        d.r[inew] = s.r[io];
        d.g[inew] = s.g[io];
        d.b[inew] = s.b[io];
    }
    dst.velocity.set(inew, src.velocity.get(io));
}
