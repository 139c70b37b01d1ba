use glam::{IVec3, Vec3};

/// Outer limits a source or adaptive region may grow to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainLimits {
    pub base_res: IVec3,
    /// Extra cells allowed on each side, zero for fixed domains
    pub adapt_pad: i32,
}

/// Pad bounds by `margin`, extrapolate by velocity over `dt`, then clamp
/// to `[-adapt_pad, base_res + adapt_pad]` on every axis.
pub fn clamp_bounds_in_domain(
    min: &mut IVec3,
    max: &mut IVec3,
    min_vel: Option<Vec3>,
    max_vel: Option<Vec3>,
    margin: i32,
    dt: f32,
    limits: DomainLimits,
) {
    let pad = limits.adapt_pad;
    for i in 0..3 {
        min[i] -= margin;
        max[i] += margin;

        if let Some(v) = min_vel {
            if v[i] < 0.0 {
                min[i] += (v[i] * dt).floor() as i32;
            }
        }
        if let Some(v) = max_vel {
            if v[i] > 0.0 {
                max[i] += (v[i] * dt).ceil() as i32;
            }
        }

        let hi = limits.base_res[i] + pad;
        min[i] = min[i].clamp(-pad, hi);
        max[i] = max[i].clamp(-pad, hi);
    }
}
