use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread;
use std::time::Duration;

use glam::Vec3;
use tempfile::TempDir;

use fluid_domain::domain::DomainState;
use fluid_domain::error::DomainResult;
use fluid_domain::grid::grid_index;
use fluid_domain::{
    CacheMode, Channel, ContextConfig, DirectoryCache, DomainContext, DomainSettings, DomainType,
    FlowSettings, FlowType, FluidGrids, FluidSolver, ReferenceSolver, Scene, SourceGeometry,
    SourceObject, SourceRole, TriangleMesh,
};

fn settings(dir: &TempDir, domain_type: DomainType, mode: CacheMode, res: i32) -> DomainSettings {
    let mut settings = DomainSettings {
        max_resolution: res,
        ..DomainSettings::default()
    };
    settings.set_domain_type(domain_type);
    settings.cache.directory = dir.path().to_path_buf();
    settings.cache.mode = mode;
    settings.cache.frame_start = 1;
    settings.cache.frame_end = 5;
    settings
}

fn context(settings: DomainSettings) -> DomainContext {
    let store = DirectoryCache::new(&settings.cache);
    DomainContext::new(
        settings,
        Box::new(ReferenceSolver::new()),
        Box::new(store),
        ContextConfig {
            worker_threads: 2,
            thread_names: false,
        },
    )
    .unwrap()
}

fn smoke_scene() -> Scene {
    let mut scene = Scene::new(TriangleMesh::cuboid(Vec3::ZERO, Vec3::ONE), 24.0);
    let flow = FlowSettings {
        fuel_amount: 0.0,
        temperature: 0.0,
        ..FlowSettings::default()
    };
    scene.add_source(SourceObject::new(
        "smoke",
        SourceGeometry::Mesh(TriangleMesh::cuboid(Vec3::new(0.0, 0.0, -0.5), Vec3::splat(0.25))),
        SourceRole::Flow(flow),
    ));
    scene
}

fn liquid_scene() -> Scene {
    let mut scene = Scene::new(TriangleMesh::cuboid(Vec3::ZERO, Vec3::ONE), 24.0);
    let mut flow = FlowSettings::default();
    flow.set_type(FlowType::Liquid);
    scene.add_source(SourceObject::new(
        "initial volume",
        SourceGeometry::Mesh(TriangleMesh::cuboid(Vec3::ZERO, Vec3::splat(0.5))),
        SourceRole::Flow(flow),
    ));
    scene
}

fn has_frame(context: &DomainContext, channel: Channel, frame: i32) -> bool {
    context.with_core(|core| core.store().has(channel, frame))
}

fn density(context: &DomainContext) -> Vec<f32> {
    context.read_grids(|grids| grids.and_then(|g| g.density()).map(|d| d.to_vec()).unwrap_or_default())
}

#[test]
fn test_static_liquid_volume_is_sampled_once() {
    let dir = TempDir::new().unwrap();
    let context = context(settings(&dir, DomainType::Liquid, CacheMode::Replay, 32));
    let mut scene = liquid_scene();

    let first = context.advance_frame(&mut scene, 1).unwrap();
    assert!(first.has_baked(Channel::Data));
    assert!(first.stats.flows_sampled > 0);

    let second = context.advance_frame(&mut scene, 2).unwrap();
    assert!(second.has_baked(Channel::Data));
    assert_eq!(second.stats.flows_sampled, 0);

    // the volume survives without being emitted again
    context.read_grids(|grids| {
        let grids = grids.expect("grids");
        let phi = &grids.liquid.as_ref().expect("liquid").phi;
        assert!(phi[grid_index(16, 16, 16, grids.res)] < 0.0);
        assert!(phi[grid_index(1, 1, 1, grids.res)] > 0.0);
    });
}

#[test]
fn test_replay_does_not_fill_gaps() {
    let dir = TempDir::new().unwrap();
    let context = context(settings(&dir, DomainType::Gas, CacheMode::Replay, 12));
    let mut scene = smoke_scene();

    let first = context.advance_frame(&mut scene, 1).unwrap();
    assert!(first.has_baked(Channel::Data));
    assert!(has_frame(&context, Channel::Data, 1));

    let jump = context.advance_frame(&mut scene, 5).unwrap();
    assert!(jump.baked.is_empty());
    assert!(!has_frame(&context, Channel::Data, 5));
}

#[test]
fn test_replay_reads_baked_frames_back() {
    let dir = TempDir::new().unwrap();
    let context = context(settings(&dir, DomainType::Gas, CacheMode::Replay, 12));
    let mut scene = smoke_scene();

    for frame in 1..=3 {
        assert!(context.advance_frame(&mut scene, frame).unwrap().has_baked(Channel::Data));
    }
    let baked = density(&context);
    assert!(baked.iter().any(|&d| d > 0.0));

    // stepping back replays from the cache
    let again = context.advance_frame(&mut scene, 2).unwrap();
    assert!(again.has_read(Channel::Data));
    assert!(again.baked.is_empty());
    let again = context.advance_frame(&mut scene, 3).unwrap();
    assert!(again.has_read(Channel::Data));
    assert_eq!(density(&context), baked);
}

#[test]
fn test_modular_bake_then_fresh_context_reads_cache() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, DomainType::Gas, CacheMode::Modular, 12);

    let baked = {
        let context = context(settings.clone());
        let mut scene = smoke_scene();
        let summary = context.bake_range(&mut scene, &[Channel::Data]).unwrap();
        assert_eq!(summary.paused_at, None);
        assert_eq!(summary.baked_frames(Channel::Data), 5);
        context.with_core(|core| {
            let data = core.channels.get(Channel::Data);
            assert!(data.baked && !data.baking);
        });
        density(&context)
    };
    assert!(dir.path().join("config").join("config_0005.pk").exists());

    // not baking: plays back what is on disk
    let context = context(settings);
    let mut scene = smoke_scene();
    let report = context.advance_frame(&mut scene, 5).unwrap();
    assert!(report.has_read(Channel::Data));
    assert!(report.baked.is_empty());
    assert_eq!(density(&context), baked);
}

#[test]
fn test_final_mode_reads_with_offset() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings(&dir, DomainType::Gas, CacheMode::Modular, 12);
    let context = context(settings.clone());
    let mut scene = smoke_scene();
    context.bake_range(&mut scene, &[Channel::Data]).unwrap();

    settings.cache.mode = CacheMode::Final;
    settings.cache.frame_offset = 2;
    context.update_settings(settings).unwrap();
    context.reset(&mut scene);

    let report = context.advance_frame(&mut scene, 7).unwrap();
    assert!(report.has_read(Channel::Data));
    assert!(report.baked.is_empty());
    context.with_core(|core| assert!(!core.channels.any_outdated()));

    // past end + offset with live grids
    assert!(context.advance_frame(&mut scene, 8).unwrap().skipped);
}

#[test]
fn test_source_update_outdates_and_start_frame_frees() {
    let dir = TempDir::new().unwrap();
    let context = context(settings(&dir, DomainType::Gas, CacheMode::Replay, 12));
    let mut scene = smoke_scene();

    for frame in 1..=2 {
        context.advance_frame(&mut scene, frame).unwrap();
    }
    assert!(has_frame(&context, Channel::Data, 2));

    scene.sources[0].needs_update = true;
    context.advance_frame(&mut scene, 3).unwrap();
    context.with_core(|core| assert!(core.channels.get(Channel::Data).outdated));

    let restart = context.advance_frame(&mut scene, 1).unwrap();
    assert!(restart.has_baked(Channel::Data));
    assert!(!has_frame(&context, Channel::Data, 2));
    context.with_core(|core| assert!(!core.channels.any_outdated()));
}

/// Reference solver that raises the stop flag once, while stepping `frame`.
/// A positive `dt` replaces the solver's own time step.
struct StopOnce {
    inner: ReferenceSolver,
    frame: i32,
    dt: f32,
    fired: bool,
    stop: Arc<OnceLock<Arc<AtomicBool>>>,
}

impl FluidSolver for StopOnce {
    fn adapt_timestep(&mut self, grids: &FluidGrids, state: &DomainState) {
        self.inner.adapt_timestep(grids, state)
    }

    fn timestep(&self) -> f32 {
        if self.dt > 0.0 {
            self.dt
        } else {
            self.inner.timestep()
        }
    }

    fn update_variables(&mut self, settings: &DomainSettings, state: &DomainState) {
        self.inner.update_variables(settings, state)
    }

    fn step(&mut self, grids: &mut FluidGrids, state: &DomainState, frame: i32) -> DomainResult<()> {
        if frame == self.frame && !self.fired {
            self.fired = true;
            if let Some(stop) = self.stop.get() {
                stop.store(true, Ordering::Relaxed);
            }
        }
        self.inner.step(grids, state, frame)
    }

    fn bake_noise(&mut self, grids: &mut FluidGrids, state: &DomainState, frame: i32) -> DomainResult<()> {
        self.inner.bake_noise(grids, state, frame)
    }

    fn bake_mesh(&mut self, grids: &FluidGrids, state: &DomainState, frame: i32) -> DomainResult<Vec<u8>> {
        self.inner.bake_mesh(grids, state, frame)
    }

    fn bake_particles(&mut self, grids: &FluidGrids, state: &DomainState, frame: i32) -> DomainResult<Vec<u8>> {
        self.inner.bake_particles(grids, state, frame)
    }

    fn bake_guiding(&mut self, grids: &mut FluidGrids, state: &DomainState, frame: i32) -> DomainResult<()> {
        self.inner.bake_guiding(grids, state, frame)
    }

    fn load_mesh(&mut self, frame: i32, payload: &[u8]) -> DomainResult<()> {
        self.inner.load_mesh(frame, payload)
    }

    fn load_particles(&mut self, frame: i32, payload: &[u8]) -> DomainResult<()> {
        self.inner.load_particles(frame, payload)
    }

    fn export_script(&self, settings: &DomainSettings, state: &DomainState) -> DomainResult<String> {
        self.inner.export_script(settings, state)
    }
}

/// Context whose solver requests a stop while stepping `frame`
fn stopping_context(settings: DomainSettings, frame: i32, dt: f32) -> DomainContext {
    let slot = Arc::new(OnceLock::new());
    let solver = StopOnce {
        inner: ReferenceSolver::new(),
        frame,
        dt,
        fired: false,
        stop: Arc::clone(&slot),
    };
    let store = DirectoryCache::new(&settings.cache);
    let context = DomainContext::new(settings, Box::new(solver), Box::new(store), ContextConfig::default()).unwrap();
    assert!(slot.set(context.stop_handle()).is_ok());
    context
}

// small enough for several sub-steps per frame
const SHORT_STEP: f32 = 0.01;
// longer than a frame, one sub-step
const LONG_STEP: f32 = 1.0;

#[test]
fn test_modular_stop_pauses_and_resume_continues() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, DomainType::Gas, CacheMode::Modular, 12);
    let context = stopping_context(settings, 3, SHORT_STEP);
    let mut scene = smoke_scene();

    let summary = context.bake_range(&mut scene, &[Channel::Data]).unwrap();
    assert_eq!(summary.paused_at, Some(3));
    assert!(summary.frames.last().is_some_and(|r| r.interrupted));
    context.with_core(|core| {
        assert_eq!(core.channels.pause_frame(Channel::Data), 3);
        assert!(!core.channels.is_baking(Channel::Data));
    });
    assert!(has_frame(&context, Channel::Data, 2));
    assert!(!has_frame(&context, Channel::Data, 3));

    let resumed = context.bake_range(&mut scene, &[Channel::Data]).unwrap();
    assert_eq!(resumed.paused_at, None);
    assert_eq!(resumed.frames.first().map(|r| r.frame), Some(3));
    assert!(resumed.frames[0].has_read(Channel::Data));
    for frame in 1..=5 {
        assert!(has_frame(&context, Channel::Data, frame), "frame {}", frame);
    }
    context.with_core(|core| {
        let data = core.channels.get(Channel::Data);
        assert!(data.baked);
        assert_eq!(data.pause_frame, 0);
    });
}

#[test]
fn test_interrupted_data_frame_bakes_no_noise() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings(&dir, DomainType::Gas, CacheMode::Modular, 12);
    settings.noise.enabled = true;
    let context = stopping_context(settings, 3, SHORT_STEP);
    let mut scene = smoke_scene();

    let summary = context.bake_range(&mut scene, &[Channel::Data, Channel::Noise]).unwrap();
    assert_eq!(summary.paused_at, Some(3));
    let stopped = summary.frames.last().unwrap();
    assert!(stopped.interrupted);
    assert!(stopped.baked.is_empty());
    assert!(has_frame(&context, Channel::Noise, 2));
    assert!(!has_frame(&context, Channel::Data, 3));
    assert!(!has_frame(&context, Channel::Noise, 3));

    let resumed = context.bake_range(&mut scene, &[Channel::Data, Channel::Noise]).unwrap();
    assert_eq!(resumed.paused_at, None);
    for frame in 1..=5 {
        assert!(has_frame(&context, Channel::Noise, frame), "frame {}", frame);
    }
}

#[test]
fn test_stop_after_completed_frame_resumes_at_next() {
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir, DomainType::Gas, CacheMode::Modular, 12);
    let context = stopping_context(settings, 3, LONG_STEP);
    let mut scene = smoke_scene();

    let summary = context.bake_range(&mut scene, &[Channel::Data]).unwrap();
    let last = summary.frames.last().unwrap();
    assert_eq!(last.frame, 3);
    assert!(!last.interrupted && last.has_baked(Channel::Data));
    assert_eq!(summary.paused_at, Some(4));
    context.with_core(|core| assert_eq!(core.channels.pause_frame(Channel::Data), 4));

    let resumed = context.bake_range(&mut scene, &[Channel::Data]).unwrap();
    assert_eq!(resumed.frames.first().map(|r| r.frame), Some(4));
    assert!(resumed.frames[0].has_read(Channel::Data));
    assert_eq!(resumed.baked_frames(Channel::Data), 2);
    assert!(has_frame(&context, Channel::Data, 5));
}

#[test]
fn test_probe_does_not_wait_for_core() {
    let dir = TempDir::new().unwrap();
    let context = Arc::new(context(settings(&dir, DomainType::Gas, CacheMode::Replay, 12)));
    let mut scene = smoke_scene();
    context.advance_frame(&mut scene, 1).unwrap();

    let reader = Arc::clone(&context);
    let probed = context.with_core(|_core| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(reader.probe(Vec3::new(0.0, 0.0, -0.5)).value());
        });
        rx.recv_timeout(Duration::from_secs(5))
    });
    assert!(probed.is_ok_and(|value| value > 0.0));
}

#[test]
fn test_probe_reports_outside_and_inside() {
    let dir = TempDir::new().unwrap();
    let context = context(settings(&dir, DomainType::Gas, CacheMode::Replay, 12));
    let mut scene = smoke_scene();
    assert_eq!(context.probe(Vec3::ZERO).value(), -1.0);

    context.advance_frame(&mut scene, 1).unwrap();
    assert_eq!(context.probe(Vec3::splat(5.0)).value(), -1.0);
    let inside = context.probe(Vec3::new(0.0, 0.0, -0.5));
    assert!(inside.value() > 0.0);
}
