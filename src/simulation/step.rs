//! Sub-step loop for one output frame

use std::sync::atomic::{AtomicBool, Ordering};

use super::flows::{apply_flow, compute_flow_emission, reset_flow_grids, update_flow_flags};
use super::forces::apply_force_fields;
use super::obstacles::{apply_effector, compute_obstacle_emission, reset_obstacle_grids, update_obstacle_flags};
use super::sampling::{FrameKind, StepTiming};
use super::scene::Scene;
use super::shadow::compute_shadow;
use crate::constants::grid::EPSILON;
use crate::domain::{adaptive_domain_adjust, frame_length, CacheMode, DomainSettings, DomainState};
use crate::error::{DomainError, DomainResult};
use crate::solver::{FluidGrids, FluidSolver};
use crate::source::SourceRole;

/// Counters for one frame advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepStats {
    pub substeps: usize,
    pub flows_sampled: usize,
    pub effectors_sampled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// Stop was requested between sub-steps
    Interrupted,
}

/// Everything one frame advance touches, borrowed for the duration of the frame
pub struct StepContext<'a> {
    pub settings: &'a DomainSettings,
    pub state: &'a mut DomainState,
    pub grids: &'a mut Option<FluidGrids>,
    pub solver: &'a mut dyn FluidSolver,
    pub scene: &'a mut Scene,
    pub stop: &'a AtomicBool,
    /// Pause frame of the data channel
    pub pause_frame: i32,
    pub stats: StepStats,
    /// A source flagged itself as changed during the advance
    pub outdated: bool,
}

impl<'a> StepContext<'a> {
    pub fn new(
        settings: &'a DomainSettings,
        state: &'a mut DomainState,
        grids: &'a mut Option<FluidGrids>,
        solver: &'a mut dyn FluidSolver,
        scene: &'a mut Scene,
        stop: &'a AtomicBool,
        pause_frame: i32,
    ) -> Self {
        Self {
            settings,
            state,
            grids,
            solver,
            scene,
            stop,
            pause_frame,
            stats: StepStats::default(),
            outdated: false,
        }
    }

    fn kind(&self, frame: i32) -> FrameKind {
        FrameKind::new(frame, self.settings.cache.frame_start, self.pause_frame)
    }

    fn stop_requested(&self) -> bool {
        self.settings.cache.mode != CacheMode::Replay && self.stop.load(Ordering::Relaxed)
    }

    fn grids_mut(&mut self) -> DomainResult<&mut FluidGrids> {
        let cells = self.state.total_cells;
        self.grids
            .as_mut()
            .ok_or(DomainError::AllocationFailed { cells })
    }

    /// Sample every flow, resize an adaptive domain around the result and
    /// write the emission into the flow inputs.
    pub fn update_flows(&mut self, timing: StepTiming, adapt: bool) -> DomainResult<()> {
        let kind = self.kind(timing.frame);
        self.outdated |= update_flow_flags(self.state, self.settings, &mut self.scene.sources);

        let (active, color) = (self.state.active_fields, self.state.active_color);
        if !self.grids_mut()?.ensure_flow_fields(&active, color) {
            return Err(DomainError::AllocationFailed {
                cells: self.state.total_cells,
            });
        }

        let (buffers, sampled) =
            compute_flow_emission(&mut self.scene.sources, self.state, self.settings, timing, kind);
        self.stats.flows_sampled += sampled;

        if adapt && self.settings.is_gas() && self.settings.use_adaptive() {
            let object_to_world = self.state.object_to_world;
            adaptive_domain_adjust(
                self.state,
                self.settings,
                self.grids,
                object_to_world,
                &buffers,
                timing.dt,
                self.solver,
            );
        }

        let state = &*self.state;
        let settings = self.settings;
        let grids = match self.grids.as_mut() {
            Some(g) => g,
            None => {
                return Err(DomainError::AllocationFailed {
                    cells: state.total_cells,
                })
            }
        };
        reset_flow_grids(grids, kind.is_first);

        for (source, buffer) in self.scene.sources.iter().zip(buffers.iter()) {
            if let SourceRole::Flow(flow) = &source.role {
                apply_flow(grids, state, source, flow, buffer, settings, kind);
            }
        }
        Ok(())
    }

    /// Sample collision and guide effectors into the obstacle inputs
    pub fn update_obstacles(&mut self, timing: StepTiming) -> DomainResult<()> {
        let kind = self.kind(timing.frame);
        self.outdated |= update_obstacle_flags(self.state, &mut self.scene.sources);

        let active = self.state.active_fields;
        if !self.grids_mut()?.ensure_obstacle_fields(&active) {
            return Err(DomainError::AllocationFailed {
                cells: self.state.total_cells,
            });
        }

        let (buffers, sampled) =
            compute_obstacle_emission(&mut self.scene.sources, self.state, self.settings, timing, kind);
        self.stats.effectors_sampled += sampled;

        let state = &*self.state;
        let settings = self.settings;
        let grids = match self.grids.as_mut() {
            Some(g) => g,
            None => {
                return Err(DomainError::AllocationFailed {
                    cells: state.total_cells,
                })
            }
        };
        reset_obstacle_grids(grids, kind.is_first, settings.use_adaptive());

        for (source, buffer) in self.scene.sources.iter().zip(buffers.iter()) {
            if let SourceRole::Effector(effector) = &source.role {
                if !effector.use_effector {
                    continue;
                }
                apply_effector(grids, state, source, effector.effector_type, buffer, settings, kind);
            }
        }
        Ok(())
    }

    /// Advance the domain by one output frame
    pub fn step_frame(&mut self, frame: i32) -> DomainResult<StepOutcome> {
        let object_to_world = self.scene.domain_transform.matrix_at(frame as f32);
        self.state.set_transform(object_to_world);
        let init = self.settings.is_gas() && self.settings.use_adaptive();
        self.state.set_from_mesh(self.settings, &self.scene.domain_mesh, init);

        let time_total_old = self.state.time_total;
        let mut outcome = StepOutcome::Completed;
        let mut first_substep = true;

        while self.state.time_per_frame + EPSILON < self.state.frame_length {
            {
                let grids = self.grids.as_ref().ok_or(DomainError::AllocationFailed {
                    cells: self.state.total_cells,
                })?;
                self.solver.adapt_timestep(grids, self.state);
            }
            let mut dt = self.solver.timestep();
            if dt <= 0.0 {
                dt = self.state.frame_length - self.state.time_per_frame;
            }
            self.state.dt = dt;

            let timing = StepTiming {
                frame,
                dt,
                time_per_frame: self.state.time_per_frame,
                frame_length: self.state.frame_length,
            };

            self.update_flows(timing, first_substep)?;
            first_substep = false;
            if self.stop_requested() {
                outcome = StepOutcome::Interrupted;
                break;
            }

            self.solver.update_variables(self.settings, self.state);
            self.update_obstacles(timing)?;
            if self.stop_requested() {
                outcome = StepOutcome::Interrupted;
                break;
            }

            if self.state.total_cells > 1 {
                let state = &*self.state;
                let grids = match self.grids.as_mut() {
                    Some(g) => g,
                    None => return Err(DomainError::AllocationFailed { cells: state.total_cells }),
                };
                apply_force_fields(grids, state, &self.scene.force_fields);
                self.solver.step(grids, state, frame)?;
            }

            self.state.time_per_frame += dt;
            self.state.time_total += dt;
            self.stats.substeps += 1;
        }

        // never run ahead of the frame boundary
        let limit = time_total_old + self.state.frame_length;
        if self.state.time_total > limit {
            self.state.time_total = limit;
        }

        if outcome == StepOutcome::Completed && self.settings.is_gas() {
            self.update_shadow();
        }

        log::debug!(
            "[simulation::step_frame] Frame {} {:?} after {} sub-steps ({} flow, {} effector samples)",
            frame,
            outcome,
            self.stats.substeps,
            self.stats.flows_sampled,
            self.stats.effectors_sampled
        );
        Ok(outcome)
    }

    fn update_shadow(&mut self) {
        let light = match self.scene.dominant_light() {
            Some(l) => l,
            None => return,
        };
        let state = &*self.state;
        if let Some(smoke) = self.grids.as_mut().and_then(|g| g.smoke.as_mut()) {
            compute_shadow(&mut smoke.shadow, &smoke.density, state, light);
        }
    }

    /// Sample guide effectors over one frame and let the solver prepare the
    /// guiding velocities
    pub fn bake_guiding(&mut self, frame: i32) -> DomainResult<()> {
        let dt = frame_length(self.scene.fps, self.settings.time_scale);
        let timing = StepTiming {
            frame,
            dt,
            time_per_frame: dt,
            frame_length: dt,
        };
        self.update_obstacles(timing)?;

        let state = &*self.state;
        let grids = match self.grids.as_mut() {
            Some(g) => g,
            None => return Err(DomainError::AllocationFailed { cells: state.total_cells }),
        };
        self.solver.bake_guiding(grids, state, frame)
    }
}
