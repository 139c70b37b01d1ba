use glam::Vec3;

use crate::constants::grid::{PHI_MAX, RAY_COUNT, RAY_DIRECTIONS};
use crate::constants::sampling::SURFACE_SEARCH_RADIUS;
use crate::geometry::TriangleIndex;

/// Fold the signed distance from `start` to the surface into `distance`.
///
/// Ray mode casts the fixed ray set: a cell is inside only if every ray hits
/// and at least one hit face points away from the ray. Planar mode stores the
/// negated nearest-surface distance within one cell diagonal. The stored value
/// never increases and stays within `PHI_MAX`.
pub fn update_distance(
    distance: &mut f32,
    index: &TriangleIndex,
    start: Vec3,
    thickness: f32,
    use_plane_init: bool,
) {
    let mut min_dist = PHI_MAX;

    if use_plane_init {
        let mut radius_sq = SURFACE_SEARCH_RADIUS * SURFACE_SEARCH_RADIUS;
        if thickness != 0.0 {
            radius_sq += thickness;
        }
        if let Some(nearest) = index.find_nearest(start, radius_sq) {
            min_dist = -(start - nearest.point).length().abs();
        }
    } else {
        let mut miss_count = 0;
        let mut facing_count = 0;

        for d in RAY_DIRECTIONS.iter() {
            let dir = Vec3::from_array(*d).normalize();
            match index.ray_cast(start, dir) {
                None => miss_count += 1,
                Some(hit) => {
                    if dir.dot(hit.normal) <= 0.0 {
                        facing_count += 1;
                    }
                    min_dist = min_dist.min(hit.distance);
                }
            }
        }

        if !(miss_count > 0 || facing_count == RAY_COUNT) {
            min_dist = -min_dist.abs();
        }
        if thickness != 0.0 {
            min_dist -= thickness;
        }
    }

    *distance = distance.min(min_dist).clamp(-PHI_MAX, PHI_MAX);
}
