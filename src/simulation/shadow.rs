//! Light transmittance through smoke, marched on the cell grid

use glam::{IVec3, Vec3};

use crate::constants::forces::SHADOW_OPACITY;
use crate::constants::grid::EPSILON;
use crate::domain::DomainState;
use crate::geometry::index::ray_box;
use crate::grid::grid_index;

/// Attenuate `t_ray` by the voxel at `p` and record it where no value exists yet
#[inline]
fn transmit(shadow: &mut [f32], density: &[f32], res: IVec3, p: IVec3, t_ray: &mut f32, correct: f32) -> f32 {
    let i = grid_index(p.x, p.y, p.z, res);
    *t_ray *= (density[i] * correct).exp();
    if shadow[i] < 0.0 {
        shadow[i] = *t_ray;
    }
    *t_ray
}

/// 3D Bresenham walk from `from` to `to`, stopping once the ray is fully absorbed
fn march(from: IVec3, to: IVec3, t_ray: &mut f32, shadow: &mut [f32], density: &[f32], res: IVec3, correct: f32) {
    let mut p = from;
    let d = to - from;
    let step = |v: i32| if v < 0 { -1 } else { 1 };
    let inc = IVec3::new(step(d.x), step(d.y), step(d.z));
    let len = d.abs();
    let len2 = len * 2;

    // dominant axis first, then the two followers
    let (major, a, b) = if len.x >= len.y && len.x >= len.z {
        (0, 1, 2)
    } else if len.y >= len.x && len.y >= len.z {
        (1, 0, 2)
    } else {
        (2, 1, 0)
    };
    let mut err_a = len2[a] - len[major];
    let mut err_b = len2[b] - len[major];

    for _ in 0..len[major] {
        if transmit(shadow, density, res, p, t_ray, correct) <= EPSILON {
            break;
        }
        if err_a > 0 {
            p[a] += inc[a];
            err_a -= len2[major];
        }
        if err_b > 0 {
            p[b] += inc[b];
            err_b -= len2[major];
        }
        err_a += len2[a];
        err_b += len2[b];
        p[major] += inc[major];
    }
    transmit(shadow, density, res, p, t_ray, correct);
}

/// Fill `shadow` with the transmittance from `light` (world space) to every voxel
pub fn compute_shadow(shadow: &mut [f32], density: &[f32], state: &DomainState, light: Vec3) {
    let res = state.res;
    let correct = SHADOW_OPACITY * state.dx;

    let light = (state.world_to_object.transform_point3(light) - state.p0) / state.cell_size
        - Vec3::splat(0.5)
        - state.res_min.as_vec3();
    let hi = res.as_vec3();
    let max_cell = res - IVec3::ONE;

    let mut i = 0;
    for z in 0..res.z {
        for y in 0..res.y {
            for x in 0..res.x {
                let mut t_ray = 1.0;
                shadow[i] = -1.0;

                let voxel = IVec3::new(x, y, z);
                let center = voxel.as_vec3();
                let dir = (center - light).normalize_or_zero();
                let start = match ray_box(light, dir.recip(), Vec3::ZERO, hi) {
                    // outside: enter where the ray hits the grid
                    Some(t) if t > EPSILON => (light + dir * t).floor().as_ivec3(),
                    _ => light.floor().as_ivec3(),
                };
                let start = start.clamp(IVec3::ZERO, max_cell);

                march(start, voxel, &mut t_ray, shadow, density, res, correct);
                shadow[i] = t_ray;
                i += 1;
            }
        }
    }
}
