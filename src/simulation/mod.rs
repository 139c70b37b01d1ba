//! Frame advance
//!
//! Turns the scene's flows and effectors into boundary and emission grids,
//! runs the solver sub-steps and derives the smoke shadow. The cache
//! orchestrator decides when a frame is advanced; this module only knows how.

pub mod flows;
pub mod forces;
pub mod obstacles;
pub mod sampling;
pub mod scene;
pub mod shadow;
pub mod step;

pub use sampling::{FrameKind, StepTiming};
pub use scene::{ForceField, Light, LightKind, PointAttractor, Scene, UniformWind};
pub use step::{StepContext, StepOutcome, StepStats};

use crate::domain::{DomainSettings, DomainState};

/// Refresh the active-field flags from every source.
///
/// Returns true when a source asked for the data cache to be invalidated.
pub fn refresh_active_fields(state: &mut DomainState, settings: &DomainSettings, scene: &mut Scene) -> bool {
    let flows = flows::update_flow_flags(state, settings, &mut scene.sources);
    let effectors = obstacles::update_obstacle_flags(state, &mut scene.sources);
    flows || effectors
}
