//! Bake a small smoke scene into a directory cache
//!
//! Usage: fluid-bake [settings.toml]
//!
//! Without a settings file a 32-cell gas domain is baked in modular mode.

use anyhow::{Context, Result};
use glam::Vec3;

use fluid_domain::{
    CacheMode, Channel, DomainContext, DomainSettings, EffectorSettings, FlowSettings, Light, LightKind, Scene,
    SourceGeometry, SourceObject, SourceRole, TriangleMesh, UniformWind,
};

fn demo_scene(fps: f32) -> Scene {
    let mut scene = Scene::new(TriangleMesh::cuboid(Vec3::ZERO, Vec3::ONE), fps);

    let emitter = TriangleMesh::cuboid(Vec3::new(0.0, 0.0, -0.6), Vec3::new(0.2, 0.2, 0.1));
    let flow = FlowSettings {
        fuel_amount: 0.0,
        ..FlowSettings::default()
    };
    scene.add_source(SourceObject::new(
        "smoke emitter",
        SourceGeometry::Mesh(emitter),
        SourceRole::Flow(flow),
    ));

    let blocker = TriangleMesh::cuboid(Vec3::new(0.0, 0.0, 0.3), Vec3::new(0.3, 0.3, 0.05));
    scene.add_source(SourceObject::new(
        "collider",
        SourceGeometry::Mesh(blocker),
        SourceRole::Effector(EffectorSettings::default()),
    ));

    scene.force_fields.push(Box::new(UniformWind {
        direction: Vec3::X,
        strength: 0.5,
    }));
    scene.lights.push(Light {
        kind: LightKind::Point,
        position: Vec3::new(2.0, -2.0, 3.0),
    });
    scene
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut settings = match std::env::args().nth(1) {
        Some(path) => DomainSettings::load(&path).with_context(|| format!("Loading {}", path))?,
        None => {
            let mut settings = DomainSettings::default();
            settings.cache.mode = CacheMode::Modular;
            settings.cache.frame_end = 24;
            settings
        }
    };
    if settings.cache.mode == CacheMode::Final {
        log::warn!("Final cache mode never bakes, switching to modular");
        settings.cache.mode = CacheMode::Modular;
    }

    let mut channels = vec![Channel::Data];
    if settings.use_noise() {
        channels.push(Channel::Noise);
    }
    if settings.use_liquid_mesh() {
        channels.push(Channel::Mesh);
    }
    if settings.use_liquid_particles() {
        channels.push(Channel::Particles);
    }

    let cache_dir = settings.cache.directory.clone();
    let context = DomainContext::with_defaults(settings.clone()).context("Creating domain context")?;
    let mut scene = demo_scene(24.0);

    log::info!(
        "Baking frames {}..={} of {:?} into {}",
        settings.cache.frame_start,
        settings.cache.frame_end,
        channels,
        cache_dir.display()
    );
    let summary = context.bake_range(&mut scene, &channels).context("Baking")?;

    for channel in &channels {
        log::info!("{}: {} frames baked", channel, summary.baked_frames(*channel));
    }
    if let Some(frame) = summary.paused_at {
        log::warn!("Bake paused at frame {}", frame);
    }

    let probe = context.probe(Vec3::new(0.0, 0.0, -0.5));
    log::info!(
        "Density near the emitter: {:.3}, velocity {:?}",
        probe.value(),
        probe.velocity()
    );

    settings
        .save(cache_dir.join("settings.toml"))
        .context("Saving settings")?;
    Ok(())
}
