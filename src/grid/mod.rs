//! Grid index and coordinate mapping
//!
//! Every grid in the crate is a flat array in row-major order with x fastest.
//! `grid_index` is the only place that order is spelled out.

pub mod interp;
pub mod transform;

pub use interp::{sample_trilinear, sample_trilinear_vec3, trilinear_taps};
pub use transform::{rotate_keep_length, CellSpace};

use glam::IVec3;

/// Linear offset of cell (x, y, z) in a grid of resolution `res`.
///
/// No bounds checking: callers must clip coordinates to `[0, res)` first.
#[inline]
pub fn grid_index(x: i32, y: i32, z: i32, res: IVec3) -> usize {
    (x + res.x * (y + res.y * z)) as usize
}

/// Number of cells in a grid, zero if any axis is non-positive
#[inline]
pub fn cell_count(res: IVec3) -> usize {
    if res.min_element() <= 0 {
        0
    } else {
        res.x as usize * res.y as usize * res.z as usize
    }
}

/// Whether `p` lies in the half-open box `[min, max)`
#[inline]
pub fn in_bounds(p: IVec3, min: IVec3, max: IVec3) -> bool {
    p.cmpge(min).all() && p.cmplt(max).all()
}

#[cfg(test)]
mod tests;
