//! Point queries against the completed simulation state

use glam::Vec3;

use super::{DomainSettings, DomainState};
use crate::constants::time::{DT_DEFAULT, FPS_REFERENCE};
use crate::grid::{rotate_keep_length, sample_trilinear, sample_trilinear_vec3};
use crate::solver::FluidGrids;

/// Result of sampling the domain at a world position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeResult {
    /// Position lies outside the maximal domain bounds
    Outside,
    /// Inside the domain box but outside the active region of an adaptive gas domain
    Inactive,
    Sampled {
        /// World-space velocity in scene units per second
        velocity: Vec3,
        /// `max(density, fuel)` at the position
        density: f32,
    },
}

impl ProbeResult {
    /// Scalar form: -1 outside, 0 inactive, density otherwise
    pub fn value(&self) -> f32 {
        match self {
            ProbeResult::Outside => -1.0,
            ProbeResult::Inactive => 0.0,
            ProbeResult::Sampled { density, .. } => *density,
        }
    }

    pub fn velocity(&self) -> Vec3 {
        match self {
            ProbeResult::Sampled { velocity, .. } => *velocity,
            _ => Vec3::ZERO,
        }
    }
}

/// Sample velocity and density at `position` (world space)
pub fn velocity_at(
    state: &DomainState,
    settings: &DomainSettings,
    grids: Option<&FluidGrids>,
    position: Vec3,
) -> ProbeResult {
    let grids = match grids {
        Some(g) if g.res == state.res => g,
        _ => return ProbeResult::Outside,
    };

    let cell = state.cell_space().world_to_cell(position);
    let lo = state.res_min.as_vec3();
    let hi = state.res_max.as_vec3();
    if cell.cmplt(lo).any() || cell.cmpgt(hi).any() {
        return ProbeResult::Outside;
    }

    let pos01 = (cell - lo) / state.res.as_vec3();
    if settings.is_gas()
        && settings.use_adaptive()
        && (pos01.cmplt(Vec3::ZERO).any() || pos01.cmpgt(Vec3::ONE).any())
    {
        return ProbeResult::Inactive;
    }

    let v = &grids.velocity;
    let sim = sample_trilinear_vec3(&v.x, &v.y, &v.z, grids.res, pos01);
    let size_mult = state.global_size.max_element() / settings.max_resolution as f32;
    let time_mult = FPS_REFERENCE * DT_DEFAULT;
    let velocity = rotate_keep_length(state.object_to_world, sim * size_mult * time_mult);

    let density = grids.density().map_or(0.0, |d| sample_trilinear(d, grids.res, pos01));
    let fuel = grids.fuel().map_or(0.0, |f| sample_trilinear(f, grids.res, pos01));

    ProbeResult::Sampled {
        velocity,
        density: density.max(fuel),
    }
}
