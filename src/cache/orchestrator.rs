//! Per-frame read/bake decisions
//!
//! `DomainCore::process_frame` is the single entry point the host calls for
//! every frame it wants to see. Depending on the cache mode and on what is
//! already stored it reads channels, advances the simulation and writes the
//! result back.

use std::sync::atomic::AtomicBool;

use super::channel::{Channel, ChannelStates};
use super::store::{CacheStore, DomainConfig};
use crate::domain::{
    reallocate, reallocate_and_copy, CacheMode, CompanionParticles, DomainSettings, DomainState,
    GridSnapshot, SecondaryParticle,
};
use crate::error::DomainResult;
use crate::simulation::{refresh_active_fields, Scene, StepContext, StepOutcome, StepStats};
use crate::solver::{FluidGrids, FluidSolver};

/// What happened to one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: i32,
    /// Outside the cache range, or the domain could not be initialised
    pub skipped: bool,
    /// Channels that were loaded from the cache
    pub read: Vec<Channel>,
    /// Channels that were baked and written
    pub baked: Vec<Channel>,
    /// Stop was requested during the data bake
    pub interrupted: bool,
    pub stats: StepStats,
}

impl FrameReport {
    fn new(frame: i32) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }

    pub fn has_read(&self, channel: Channel) -> bool {
        self.read.contains(&channel)
    }

    pub fn has_baked(&self, channel: Channel) -> bool {
        self.baked.contains(&channel)
    }
}

/// Per-channel flag set used while deciding a frame
#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    data: bool,
    noise: bool,
    mesh: bool,
    particles: bool,
    guide: bool,
}

impl Flags {
    fn query(store: &dyn CacheStore, frame: i32) -> Self {
        Self {
            data: store.has(Channel::Data, frame),
            noise: store.has(Channel::Noise, frame),
            mesh: store.has(Channel::Mesh, frame),
            particles: store.has(Channel::Particles, frame),
            guide: store.has(Channel::Guide, frame),
        }
    }

    fn from_fn(f: impl Fn(Channel) -> bool) -> Self {
        Self {
            data: f(Channel::Data),
            noise: f(Channel::Noise),
            mesh: f(Channel::Mesh),
            particles: f(Channel::Particles),
            guide: f(Channel::Guide),
        }
    }

    fn any(&self) -> bool {
        self.data || self.noise || self.mesh || self.particles || self.guide
    }
}

/// Frame each channel is read from
#[derive(Debug, Clone, Copy)]
struct ReadFrames {
    data: i32,
    noise: i32,
    mesh: i32,
    particles: i32,
    guide: i32,
}

impl ReadFrames {
    fn all(frame: i32) -> Self {
        Self {
            data: frame,
            noise: frame,
            mesh: frame,
            particles: frame,
            guide: frame,
        }
    }

    fn offset(&mut self, offset: i32) {
        self.data -= offset;
        self.noise -= offset;
        self.mesh -= offset;
        self.particles -= offset;
    }
}

/// Domain state, bake status, solver and cache of one fluid domain
pub struct DomainCore {
    pub settings: DomainSettings,
    pub state: DomainState,
    pub channels: ChannelStates,
    pub companions: CompanionParticles,
    solver: Box<dyn FluidSolver>,
    store: Box<dyn CacheStore>,
}

impl DomainCore {
    pub fn new(settings: DomainSettings, solver: Box<dyn FluidSolver>, store: Box<dyn CacheStore>) -> Self {
        Self {
            settings,
            state: DomainState::default(),
            channels: ChannelStates::default(),
            companions: CompanionParticles::default(),
            solver,
            store,
        }
    }

    pub fn solver(&self) -> &dyn FluidSolver {
        self.solver.as_ref()
    }

    pub fn store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }

    /// Replace the settings and point the store at the new cache location.
    ///
    /// Changing anything besides the cache section outdates every channel.
    pub fn update_settings(&mut self, settings: DomainSettings) {
        let mut old = self.settings.clone();
        old.cache = settings.cache.clone();
        if old != settings {
            for channel in Channel::ALL {
                self.channels.get_mut(channel).mark_outdated();
            }
        }
        self.store.update_settings(&settings.cache);
        self.settings = settings;
    }

    /// Attach or detach the companion particle system of a secondary particle type
    pub fn set_particle_type(&mut self, kind: SecondaryParticle, enabled: bool) -> bool {
        if enabled {
            self.companions.add(&mut self.settings, kind)
        } else {
            self.companions.remove(&mut self.settings, kind)
        }
    }

    pub fn begin_bake(&mut self, channels: &[Channel]) {
        self.channels.begin_bake(channels);
        log::info!("[cache::begin_bake] Baking {:?}", channels);
    }

    pub fn pause_bake(&mut self, channel: Channel, frame: i32) {
        self.channels.pause_bake(channel, frame);
        log::info!("[cache::pause_bake] Paused {} at frame {}", channel, frame);
    }

    pub fn finish_bake(&mut self, channel: Channel) {
        self.channels.finish_bake(channel);
    }

    /// Delete one channel from disk and clear its bake status
    pub fn free_cache(&mut self, channel: Channel) -> DomainResult<()> {
        self.channels.get_mut(channel).clear();
        self.store.free(channel)
    }

    pub fn free_all(&mut self) -> DomainResult<()> {
        for channel in Channel::ALL {
            self.free_cache(channel)?;
        }
        Ok(())
    }

    /// Drop the grids and everything derived from them
    pub fn reset(&mut self, grids: &mut Option<FluidGrids>, scene: &mut Scene) {
        *grids = None;
        self.state.reset();
        scene.clear_motion();
    }

    fn is_escaped(&self, frame: i32) -> bool {
        let cache = &self.settings.cache;
        let (start, end, offset) = (cache.frame_start, cache.frame_end, cache.frame_offset);
        match cache.mode {
            CacheMode::Final | CacheMode::Modular if offset > 0 => frame < start || frame > end + offset,
            CacheMode::Final | CacheMode::Modular => frame < start + offset || frame > end,
            CacheMode::Replay => frame < start || frame > end,
        }
    }

    /// Apply the config of `frame` to the domain. Unreadable configs count as missing.
    fn read_config(&mut self, frame: i32) -> bool {
        match self.store.read_config(frame) {
            Ok(Some(config)) => {
                config.apply(&mut self.state);
                true
            }
            Ok(None) => false,
            Err(e) => {
                log::warn!("[cache::read_config] Ignoring config of frame {}: {}", frame, e);
                false
            }
        }
    }

    fn read_grids(&self, channel: Channel, frame: i32, grids: &mut Option<FluidGrids>, full: bool) -> bool {
        let grids = match grids.as_mut() {
            Some(g) => g,
            None => return false,
        };
        match self.store.read_grids(channel, frame, grids, full) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("[cache::read_grids] Ignoring {} frame {}: {}", channel, frame, e);
                false
            }
        }
    }

    fn read_blob(&mut self, channel: Channel, frame: i32) -> bool {
        let payload = match self.store.read_blob(channel, frame) {
            Ok(Some(p)) => p,
            Ok(None) => return false,
            Err(e) => {
                log::warn!("[cache::read_blob] Ignoring {} frame {}: {}", channel, frame, e);
                return false;
            }
        };
        let loaded = match channel {
            Channel::Mesh => self.solver.load_mesh(frame, &payload),
            _ => self.solver.load_particles(frame, &payload),
        };
        match loaded {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[cache::read_blob] Solver rejected {} frame {}: {}", channel, frame, e);
                false
            }
        }
    }

    fn ensure_input_fields(&self, grids: &mut Option<FluidGrids>) {
        if let Some(g) = grids.as_mut() {
            let ok = g.ensure_flow_fields(&self.state.active_fields, self.state.active_color)
                && g.ensure_obstacle_fields(&self.state.active_fields);
            if !ok {
                log::warn!("[cache::ensure_input_fields] Could not allocate input fields for cached frame");
            }
        }
    }

    /// Read and/or bake one frame
    pub fn process_frame(
        &mut self,
        grids: &mut Option<FluidGrids>,
        scene: &mut Scene,
        frame: i32,
        stop: &AtomicBool,
    ) -> DomainResult<FrameReport> {
        let mut report = FrameReport::new(frame);
        let mode = self.settings.cache.mode;
        let (frame_start, frame_end) = (self.settings.cache.frame_start, self.settings.cache.frame_end);
        let is_start = frame == frame_start;

        if self.is_escaped(frame) && grids.is_some() {
            log::debug!("[cache::process_frame] Frame {} outside the cache range", frame);
            report.skipped = true;
            return Ok(report);
        }

        if grids.is_none() {
            self.reset(grids, scene);
        }

        if is_start && mode == CacheMode::Replay && self.channels.any_outdated() {
            log::info!("[cache::process_frame] Cache outdated, freeing all channels");
            self.free_all()?;
            self.reset(grids, scene);
        }

        if refresh_active_fields(&mut self.state, &self.settings, scene) {
            self.channels.get_mut(Channel::Data).outdated = true;
        }

        if grids.is_none() {
            let object_to_world = scene.domain_transform.matrix_at(frame as f32);
            let gravity = scene.gravity.unwrap_or(self.settings.gravity);
            *grids = self.state.initialize(
                &self.settings,
                &scene.domain_mesh,
                object_to_world,
                gravity,
                scene.fps,
                frame,
            );
            if grids.is_none() {
                log::error!("[cache::process_frame] Could not initialise domain at frame {}", frame);
                report.skipped = true;
                return Ok(report);
            }
        }

        let old = GridSnapshot::of(&self.state);
        self.state.begin_frame(scene.fps, &self.settings);
        self.state.gravity_final = scene.gravity.unwrap_or(self.settings.gravity);

        let with_gas = self.settings.is_gas();
        let with_liquid = self.settings.is_liquid();
        let with_noise = with_gas && self.settings.use_noise();
        let with_mesh = with_liquid && self.settings.use_liquid_mesh();
        let with_particles = with_liquid && self.settings.use_liquid_particles();
        let with_guide = self.settings.guide.enabled;
        let resumable = self.settings.cache.resumable;

        let prev_frame = (frame - 1).max(frame_start);
        let next_frame = frame + 1;
        let mut frames = ReadFrames::all(frame);

        let mut has = Flags::query(self.store.as_ref(), frame);
        let mut has_config = self.read_config(frame);
        if has_config {
            self.ensure_input_fields(grids);
        }

        let channels = self.channels;
        let mut baking = Flags::from_fn(|c| channels.is_baking(c));
        let resume = Flags::from_fn(|c| !is_start && channels.pause_frame(c) == frame);
        let next = Flags::query(self.store.as_ref(), next_frame);
        let prev = Flags::query(self.store.as_ref(), prev_frame);

        let mut bake_cache = baking.any();
        let mut read_cache = false;

        match mode {
            CacheMode::Final => {
                read_cache = true;
                bake_cache = false;
                frames.offset(self.settings.cache.frame_offset);
            }
            CacheMode::Modular if !baking.any() => {
                read_cache = true;
                bake_cache = false;
                frames.offset(self.settings.cache.frame_offset);
            }
            CacheMode::Modular => {
                if baking.data && resume.data {
                    frames.data = prev_frame;
                }
                if baking.noise && resume.noise {
                    frames.noise = prev_frame;
                }
                if baking.mesh && resume.mesh {
                    frames.mesh = prev_frame;
                }
                if baking.particles && resume.particles {
                    frames.particles = prev_frame;
                }
                if baking.guide && resume.guide {
                    frames.guide = prev_frame;
                }
                frames.noise = frames.noise.min(frames.data);
                frames.mesh = frames.mesh.min(frames.data);
                frames.particles = frames.particles.min(frames.data);
                frames.guide = frames.guide.min(frame_end);
                read_cache = true;
            }
            CacheMode::Replay => {
                baking.data = !has.data && (is_start || prev.data);
                if with_noise {
                    baking.noise = !has.noise && (is_start || prev.noise);
                }
                if with_mesh {
                    baking.mesh = !has.mesh && (is_start || prev.mesh);
                }
                if with_particles {
                    baking.particles = !has.particles && (is_start || prev.particles);
                }
                read_cache = true;
                bake_cache = false;
            }
        }

        if read_cache {
            let use_color_ramp = self.settings.display.use_color_ramp;

            if with_mesh {
                if frames.mesh != frame {
                    has_config = self.read_config(frames.mesh);
                }
                if !self.state.needs_realloc(grids.as_ref()) {
                    has.mesh = self.read_blob(Channel::Mesh, frames.mesh);
                }
            }

            if with_particles {
                if frames.particles != frame {
                    has_config = self.read_config(frames.particles);
                }
                // particle payloads carry no resume part
                has.particles = self.read_blob(Channel::Particles, frames.particles);
            }

            if with_guide {
                has.guide = self.read_grids(Channel::Guide, frames.guide, grids, false);
            }

            if with_noise {
                if frames.noise != frame {
                    has_config = self.read_config(frames.noise);
                }
                if has.data && has_config && self.state.needs_realloc(grids.as_ref()) {
                    let (res, res_min, shift) = (self.state.res, self.state.res_min, self.state.shift);
                    reallocate_and_copy(grids, &mut self.state, &self.settings, old, res, res_min, shift);
                }

                let partial = !baking.data && !baking.noise && next.noise;
                has.noise = self.read_grids(Channel::Noise, frames.noise, grids, !partial && resumable);

                let partial = !baking.data && !baking.noise && next.data && next.noise;
                has.data = self.read_grids(Channel::Data, frames.data, grids, !partial && resumable);
            } else {
                if frames.data != frame {
                    has_config = self.read_config(frames.data);
                }
                if has_config && self.state.needs_realloc(grids.as_ref()) {
                    let res = self.state.res;
                    reallocate(grids, &mut self.state, &self.settings, res, true);
                }

                let partial =
                    !baking.data && !baking.particles && !baking.mesh && next.data && !use_color_ramp;
                has.data = self.read_grids(Channel::Data, frames.data, grids, !partial && resumable);
            }

            for (channel, found) in [
                (Channel::Data, has.data),
                (Channel::Noise, has.noise),
                (Channel::Mesh, has.mesh),
                (Channel::Particles, has.particles),
                (Channel::Guide, has.guide),
            ] {
                if found {
                    report.read.push(channel);
                }
            }
        }

        match mode {
            CacheMode::Final => bake_cache = false,
            CacheMode::Modular => {
                if !baking.any() {
                    bake_cache = false;
                }
            }
            CacheMode::Replay => {
                if with_guide {
                    baking.guide = !has.guide && (is_start || prev.guide);
                }
                baking.data = !has.data && (is_start || prev.data);
                if with_noise {
                    baking.noise = !has.noise && (is_start || prev.noise);
                }
                if with_mesh {
                    baking.mesh = !has.mesh && (is_start || prev.mesh);
                }
                if with_particles {
                    baking.particles = !has.particles && (is_start || prev.particles);
                }

                let has_advanced = self.state.last_frame.is_some_and(|last| frame == last + 1);
                if is_start || has_advanced {
                    bake_cache = baking.data || baking.noise || baking.mesh || baking.particles;
                }
            }
        }

        log::debug!(
            "[cache::process_frame] Frame {} ({:?}): read {:?}, bake {}, channels baking {:?}",
            frame,
            mode,
            report.read,
            bake_cache,
            self.channels.baking()
        );

        if bake_cache {
            self.bake(grids, scene, frame, baking, has.data, stop, &mut report)?;
        }

        self.state.last_frame = Some(frame);
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn bake(
        &mut self,
        grids: &mut Option<FluidGrids>,
        scene: &mut Scene,
        frame: i32,
        baking: Flags,
        has_data: bool,
        stop: &AtomicBool,
        report: &mut FrameReport,
    ) -> DomainResult<()> {
        let is_start = frame == self.settings.cache.frame_start;
        let with_gas = self.settings.is_gas();
        let with_liquid = self.settings.is_liquid();

        self.solver.update_variables(&self.settings, &self.state);

        if is_start && self.settings.cache.export_script {
            let script = self.solver.export_script(&self.settings, &self.state)?;
            self.store.write_script(&script)?;
        }

        let pause_frame = self.channels.pause_frame(Channel::Data);

        if baking.guide && self.settings.guide.enabled {
            let mut ctx = StepContext::new(
                &self.settings,
                &mut self.state,
                grids,
                self.solver.as_mut(),
                scene,
                stop,
                pause_frame,
            );
            ctx.bake_guiding(frame)?;
            report.stats.effectors_sampled += ctx.stats.effectors_sampled;
            if let Some(g) = grids.as_ref() {
                self.store.write_grids(Channel::Guide, frame, g, false)?;
                report.baked.push(Channel::Guide);
            }
        }

        // derived channels only build on data that exists for this frame
        let mut data_ready = has_data;

        if baking.data {
            let mut ctx = StepContext::new(
                &self.settings,
                &mut self.state,
                grids,
                self.solver.as_mut(),
                scene,
                stop,
                pause_frame,
            );
            let outcome = ctx.step_frame(frame)?;
            let stats = ctx.stats;
            let outdated = ctx.outdated;
            report.stats.substeps += stats.substeps;
            report.stats.flows_sampled += stats.flows_sampled;
            report.stats.effectors_sampled += stats.effectors_sampled;

            if outdated {
                self.channels.get_mut(Channel::Data).outdated = true;
            }

            match outcome {
                StepOutcome::Completed => {
                    if let Some(g) = grids.as_ref() {
                        self.store.write_config(frame, &DomainConfig::capture(&self.state))?;
                        self.store
                            .write_grids(Channel::Data, frame, g, self.settings.cache.resumable)?;
                        report.baked.push(Channel::Data);
                        data_ready = true;
                    }
                }
                StepOutcome::Interrupted => {
                    log::info!("[cache::bake] Data bake interrupted at frame {}", frame);
                    report.interrupted = true;
                    return Ok(());
                }
            }
        }

        if !data_ready {
            return Ok(());
        }

        if baking.noise && with_gas && self.settings.use_noise() {
            if let Some(g) = grids.as_mut() {
                if self.state.total_cells > 1 {
                    self.solver.bake_noise(g, &self.state, frame)?;
                }
                self.store
                    .write_grids(Channel::Noise, frame, g, self.settings.cache.resumable)?;
                report.baked.push(Channel::Noise);
            }
        }

        if baking.mesh && with_liquid && self.settings.use_liquid_mesh() {
            if let Some(g) = grids.as_ref() {
                let payload = self.solver.bake_mesh(g, &self.state, frame)?;
                self.store.write_blob(Channel::Mesh, frame, &payload)?;
                report.baked.push(Channel::Mesh);
            }
        }

        if baking.particles && with_liquid && self.settings.use_liquid_particles() {
            if let Some(g) = grids.as_ref() {
                let payload = self.solver.bake_particles(g, &self.state, frame)?;
                self.store.write_blob(Channel::Particles, frame, &payload)?;
                report.baked.push(Channel::Particles);
            }
        }
        Ok(())
    }
}
