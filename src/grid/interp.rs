use glam::{IVec3, Vec3};

use super::grid_index;

/// The eight (index, weight) taps for trilinear sampling at a normalised position.
///
/// `pos01` is in [0, 1] across the grid; neighbours are clamped to the grid edge.
pub fn trilinear_taps(res: IVec3, pos01: Vec3) -> [(usize, f32); 8] {
    let f = pos01 * res.as_vec3() - Vec3::splat(0.5);
    let base = f.floor();
    let frac = f - base;
    let b = base.as_ivec3();
    let hi = res - IVec3::ONE;

    let xs = [b.x.clamp(0, hi.x), (b.x + 1).clamp(0, hi.x)];
    let ys = [b.y.clamp(0, hi.y), (b.y + 1).clamp(0, hi.y)];
    let zs = [b.z.clamp(0, hi.z), (b.z + 1).clamp(0, hi.z)];
    let wx = [1.0 - frac.x, frac.x];
    let wy = [1.0 - frac.y, frac.y];
    let wz = [1.0 - frac.z, frac.z];

    let mut taps = [(0usize, 0.0f32); 8];
    let mut n = 0;
    for k in 0..2 {
        for j in 0..2 {
            for i in 0..2 {
                taps[n] = (grid_index(xs[i], ys[j], zs[k], res), wx[i] * wy[j] * wz[k]);
                n += 1;
            }
        }
    }
    taps
}

/// Trilinear sample of a scalar field
pub fn sample_trilinear(field: &[f32], res: IVec3, pos01: Vec3) -> f32 {
    trilinear_taps(res, pos01)
        .iter()
        .map(|&(i, w)| field[i] * w)
        .sum()
}

/// Trilinear sample of three component fields
pub fn sample_trilinear_vec3(x: &[f32], y: &[f32], z: &[f32], res: IVec3, pos01: Vec3) -> Vec3 {
    trilinear_taps(res, pos01)
        .iter()
        .fold(Vec3::ZERO, |acc, &(i, w)| acc + Vec3::new(x[i], y[i], z[i]) * w)
}
