//! Numerical solver seam
//!
//! The domain manager prepares boundary and emission grids; a `FluidSolver`
//! turns them into the next state. `ReferenceSolver` is a small explicit
//! implementation used by the binary and the tests.

pub mod grids;
pub mod reference;

pub use grids::{
    fields, ActiveFields, ColorGrids, FireGrids, FluidGrids, GridLayout, GuideGrids, HeatGrids,
    LiquidGrids, NoiseGrids, ObstacleGrids, OutflowGrids, SmokeGrids, VectorGrid,
};
pub use reference::ReferenceSolver;

use crate::domain::{DomainSettings, DomainState};
use crate::error::DomainResult;

/// Operations the frame pipeline needs from a solver
pub trait FluidSolver: Send {
    /// Recompute the adaptive time step for the next sub-step. Also called
    /// after every resize since cached timing no longer applies.
    fn adapt_timestep(&mut self, grids: &FluidGrids, state: &DomainState);

    /// Time step chosen by the last `adapt_timestep`
    fn timestep(&self) -> f32;

    /// Pull live parameters from the settings
    fn update_variables(&mut self, settings: &DomainSettings, state: &DomainState);

    /// Advance one sub-step of `state.dt`
    fn step(&mut self, grids: &mut FluidGrids, state: &DomainState, frame: i32) -> DomainResult<()>;

    /// Fill the refined noise grids from the base grids
    fn bake_noise(&mut self, grids: &mut FluidGrids, state: &DomainState, frame: i32) -> DomainResult<()>;

    /// Surface representation of a liquid, as an opaque payload
    fn bake_mesh(&mut self, grids: &FluidGrids, state: &DomainState, frame: i32) -> DomainResult<Vec<u8>>;

    /// Secondary particles of a liquid, as an opaque payload
    fn bake_particles(&mut self, grids: &FluidGrids, state: &DomainState, frame: i32) -> DomainResult<Vec<u8>>;

    /// Prepare guiding velocities after the guide effectors were applied
    fn bake_guiding(&mut self, grids: &mut FluidGrids, state: &DomainState, frame: i32) -> DomainResult<()>;

    fn load_mesh(&mut self, frame: i32, payload: &[u8]) -> DomainResult<()>;

    fn load_particles(&mut self, frame: i32, payload: &[u8]) -> DomainResult<()>;

    /// Serialized description of the solver setup
    fn export_script(&self, settings: &DomainSettings, state: &DomainState) -> DomainResult<String>;
}
