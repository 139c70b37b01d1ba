//! Per-domain context
//!
//! One `DomainContext` owns everything a fluid domain needs across frames.
//! Frame advances are serialized behind the core mutex. Readers of the last
//! completed state only take the read side of the frame `RwLock`, which holds
//! the grids together with the state and settings they were produced under.
//! All parallel work of a domain runs on its own rayon pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::Vec3;
use parking_lot::{Mutex, RwLock};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::cache::{CacheStore, Channel, DirectoryCache, DomainCore, FrameReport};
use crate::domain::{velocity_at, CacheMode, DomainSettings, DomainState, ProbeResult};
use crate::error::{DomainError, DomainResult};
use crate::simulation::Scene;
use crate::solver::{FluidGrids, FluidSolver, ReferenceSolver};

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub worker_threads: usize,
    pub thread_names: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
            thread_names: true,
        }
    }
}

/// Outcome of a `bake_range` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BakeSummary {
    pub frames: Vec<FrameReport>,
    /// Frame the bake paused at after a stop request
    pub paused_at: Option<i32>,
}

impl BakeSummary {
    pub fn baked_frames(&self, channel: Channel) -> usize {
        self.frames.iter().filter(|r| r.has_baked(channel)).count()
    }
}

/// Last completed frame as seen by readers
struct LiveFrame {
    grids: Option<FluidGrids>,
    state: DomainState,
    settings: DomainSettings,
}

impl LiveFrame {
    fn sync(&mut self, core: &DomainCore) {
        self.state = core.state.clone();
        self.settings = core.settings.clone();
    }
}

pub struct DomainContext {
    core: Mutex<DomainCore>,
    live: RwLock<LiveFrame>,
    stop: Arc<AtomicBool>,
    pool: ThreadPool,
}

impl DomainContext {
    pub fn new(
        settings: DomainSettings,
        solver: Box<dyn FluidSolver>,
        store: Box<dyn CacheStore>,
        config: ContextConfig,
    ) -> DomainResult<Self> {
        settings.validate()?;

        let mut builder = ThreadPoolBuilder::new().num_threads(config.worker_threads.max(1));
        if config.thread_names {
            builder = builder.thread_name(|idx| format!("fluid-worker-{}", idx));
        }
        let pool = builder
            .build()
            .map_err(|e| DomainError::InvalidSettings(format!("Failed to create worker pool: {}", e)))?;

        log::info!(
            "[context::new] Domain context with {} worker threads, cache at {}",
            config.worker_threads.max(1),
            settings.cache.directory.display()
        );

        let core = DomainCore::new(settings, solver, store);
        let live = LiveFrame {
            grids: None,
            state: core.state.clone(),
            settings: core.settings.clone(),
        };
        Ok(Self {
            core: Mutex::new(core),
            live: RwLock::new(live),
            stop: Arc::new(AtomicBool::new(false)),
            pool,
        })
    }

    /// Context with the reference solver and a directory cache at the configured location
    pub fn with_defaults(settings: DomainSettings) -> DomainResult<Self> {
        let store = DirectoryCache::new(&settings.cache);
        Self::new(
            settings,
            Box::new(ReferenceSolver::new()),
            Box::new(store),
            ContextConfig::default(),
        )
    }

    /// Shared stop flag, checked between sub-steps
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn settings(&self) -> DomainSettings {
        self.core.lock().settings.clone()
    }

    pub fn update_settings(&self, settings: DomainSettings) -> DomainResult<()> {
        settings.validate()?;
        let mut core = self.core.lock();
        core.update_settings(settings);
        self.live.write().sync(&core);
        Ok(())
    }

    /// Run `f` with exclusive access to the core, outside of any frame advance
    pub fn with_core<R>(&self, f: impl FnOnce(&mut DomainCore) -> R) -> R {
        f(&mut self.core.lock())
    }

    /// Run `f` against the last completed grids
    pub fn read_grids<R>(&self, f: impl FnOnce(Option<&FluidGrids>) -> R) -> R {
        f(self.live.read().grids.as_ref())
    }

    /// Velocity and density at a world position, without waiting for a running advance
    pub fn probe(&self, position: Vec3) -> ProbeResult {
        let live = self.live.read();
        velocity_at(&live.state, &live.settings, live.grids.as_ref(), position)
    }

    /// Process one frame on the domain's worker pool
    pub fn advance_frame(&self, scene: &mut Scene, frame: i32) -> DomainResult<FrameReport> {
        let mut core_guard = self.core.lock();
        let mut live_guard = self.live.write();
        // guards stay on this thread, the pool only sees plain references
        let core: &mut DomainCore = &mut core_guard;
        let live: &mut LiveFrame = &mut live_guard;
        let stop = &*self.stop;
        let result = self.pool.install(|| core.process_frame(&mut live.grids, scene, frame, stop));
        live.sync(core);
        result
    }

    /// Bake `channels` over the cache range one frame after the other.
    ///
    /// A paused data bake resumes from its pause frame. A stop request pauses
    /// every channel at the interrupted frame, or at the next frame when the
    /// current one was already written.
    pub fn bake_range(&self, scene: &mut Scene, channels: &[Channel]) -> DomainResult<BakeSummary> {
        self.stop.store(false, Ordering::Relaxed);
        let (start, end, mode) = {
            let mut core = self.core.lock();
            let cache = &core.settings.cache;
            let (start, end, mode) = (cache.frame_start, cache.frame_end, cache.mode);
            let resume = core.channels.pause_frame(Channel::Data);
            if mode == CacheMode::Modular {
                core.begin_bake(channels);
            }
            let first = if resume > start && resume <= end { resume } else { start };
            (first, end, mode)
        };

        let mut summary = BakeSummary::default();
        for frame in start..=end {
            let report = self.advance_frame(scene, frame)?;
            let interrupted = report.interrupted;
            summary.frames.push(report);

            let stopped = mode != CacheMode::Replay && self.stop.load(Ordering::Relaxed);
            if interrupted || (stopped && frame < end) {
                let pause = if interrupted { frame } else { frame + 1 };
                let mut core = self.core.lock();
                for &channel in channels {
                    core.pause_bake(channel, pause);
                }
                summary.paused_at = Some(pause);
                return Ok(summary);
            }
        }

        if mode == CacheMode::Modular {
            let mut core = self.core.lock();
            for &channel in channels {
                core.finish_bake(channel);
            }
        }
        log::info!(
            "[context::bake_range] Processed frames {}..={} for {:?}",
            start,
            end,
            channels
        );
        Ok(summary)
    }

    /// Delete a channel from disk and clear its bake status
    pub fn free_cache(&self, channel: Channel) -> DomainResult<()> {
        self.core.lock().free_cache(channel)
    }

    /// Drop the live grids, e.g. after the cache was freed
    pub fn reset(&self, scene: &mut Scene) {
        let mut core = self.core.lock();
        let mut live = self.live.write();
        core.reset(&mut live.grids, scene);
        live.sync(&core);
    }
}
