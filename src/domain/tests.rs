use super::*;
use crate::emission::FieldBuffer;
use crate::grid::grid_index;
use crate::solver::ReferenceSolver;
use glam::{IVec3, Mat4, Vec3};

fn gas_settings(max_resolution: i32) -> DomainSettings {
    DomainSettings {
        max_resolution,
        ..DomainSettings::default()
    }
}

fn unit_box() -> TriangleMesh {
    TriangleMesh::cuboid(Vec3::ZERO, Vec3::ONE)
}

fn fill_density(grids: &mut FluidGrids) {
    if let Some(smoke) = grids.smoke.as_mut() {
        for (i, d) in smoke.density.iter_mut().enumerate() {
            *d = i as f32 + 1.0;
        }
    }
}

#[test]
fn test_set_from_mesh_longest_axis_gets_max_resolution() {
    let settings = gas_settings(32);
    let mut state = DomainState::default();
    let mesh = TriangleMesh::cuboid(Vec3::ZERO, Vec3::new(1.0, 0.5, 0.25));
    state.set_from_mesh(&settings, &mesh, true);

    assert_eq!(state.base_res, IVec3::new(32, 16, 8));
    assert!((state.cell_size - Vec3::splat(2.0 / 32.0)).length() < 1e-6);
    assert!((state.dx - 1.0 / 32.0).abs() < 1e-6);
    assert!((state.global_size - Vec3::new(2.0, 1.0, 0.5)).length() < 1e-6);
}

#[test]
fn test_set_from_mesh_short_axes_have_floor_of_four() {
    let settings = gas_settings(16);
    let mut state = DomainState::default();
    let mesh = TriangleMesh::cuboid(Vec3::ZERO, Vec3::new(1.0, 0.05, 1.0));
    state.set_from_mesh(&settings, &mesh, true);
    assert_eq!(state.base_res.y, 4);
}

#[test]
fn test_flat_domain_keeps_previous_resolution() {
    let settings = gas_settings(16);
    let mut state = DomainState::default();
    state.set_from_mesh(&settings, &unit_box(), true);
    let before = state.base_res;

    let flat = TriangleMesh::cuboid(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
    state.set_from_mesh(&settings, &flat, true);
    assert_eq!(state.base_res, before);
}

#[test]
fn test_initialize_adaptive_gas_starts_with_one_cell() {
    let mut settings = gas_settings(16);
    settings.adaptive.enabled = true;
    let mut state = DomainState::default();
    let grids = state
        .initialize(&settings, &unit_box(), Mat4::IDENTITY, Vec3::ZERO, 25.0, 1)
        .unwrap();

    assert_eq!(state.base_res, IVec3::splat(16));
    assert_eq!(state.res, IVec3::ONE);
    assert_eq!(grids.total_cells, 1);
    assert_eq!(state.last_frame, Some(1));
    assert!((state.frame_length - 0.1).abs() < 1e-6);
}

#[test]
fn test_initialize_fixed_domain_uses_base_res() {
    let settings = gas_settings(8);
    let mut state = DomainState::default();
    let grids = state
        .initialize(&settings, &unit_box(), Mat4::IDENTITY, Vec3::ZERO, 50.0, 1)
        .unwrap();
    assert_eq!(state.res, IVec3::splat(8));
    assert_eq!(grids.total_cells, 512);
    assert!(!state.needs_realloc(Some(&grids)));
    assert!((state.frame_length - 0.05).abs() < 1e-6);
}

#[test]
fn test_reallocate_degenerate_clears_handle() {
    let settings = gas_settings(8);
    let mut state = DomainState::default();
    let mut grids = None;
    assert!(reallocate(&mut grids, &mut state, &settings, IVec3::splat(4), true));
    assert!(grids.is_some());
    assert!(!reallocate(&mut grids, &mut state, &settings, IVec3::new(4, 0, 4), true));
    assert!(grids.is_none());
}

#[test]
fn test_migration_round_trip_preserves_interior() {
    let settings = gas_settings(16);
    let mut state = DomainState::default();
    let mut grids = None;

    let a = GridSnapshot {
        res: IVec3::splat(8),
        min: IVec3::splat(4),
        max: IVec3::splat(12),
        shift: IVec3::ZERO,
    };
    reallocate(&mut grids, &mut state, &settings, a.res, true);
    fill_density(grids.as_mut().unwrap());
    let original = grids.as_ref().unwrap().density().unwrap().to_vec();

    let b = GridSnapshot {
        res: IVec3::splat(12),
        min: IVec3::splat(2),
        max: IVec3::splat(14),
        shift: IVec3::ZERO,
    };
    assert!(reallocate_and_copy(&mut grids, &mut state, &settings, a, b.res, b.min, b.shift));
    assert_eq!(grids.as_ref().unwrap().res, b.res);
    assert!(reallocate_and_copy(&mut grids, &mut state, &settings, b, a.res, a.min, a.shift));

    let back = grids.as_ref().unwrap().density().unwrap();
    for z in 1..7 {
        for y in 1..7 {
            for x in 1..7 {
                let i = grid_index(x, y, z, a.res);
                assert_eq!(back[i], original[i], "cell ({}, {}, {})", x, y, z);
            }
        }
    }
    // boundary cells are not migrated
    assert_eq!(back[grid_index(0, 3, 3, a.res)], 0.0);
}

#[test]
fn test_shift_skips_old_boundary_column() {
    let settings = gas_settings(8);
    let mut state = DomainState::default();
    let mut grids = None;
    let old = GridSnapshot {
        res: IVec3::splat(8),
        min: IVec3::ZERO,
        max: IVec3::splat(8),
        shift: IVec3::ZERO,
    };
    reallocate(&mut grids, &mut state, &settings, old.res, true);
    fill_density(grids.as_mut().unwrap());
    let source = grids.as_ref().unwrap().density().unwrap().to_vec();
    let column: Vec<f32> = (0..8)
        .flat_map(|z| (0..8).map(move |y| (y, z)))
        .map(|(y, z)| source[grid_index(0, y, z, old.res)])
        .collect();

    reallocate_and_copy(&mut grids, &mut state, &settings, old, old.res, old.min, IVec3::new(1, 0, 0));
    let moved = grids.as_ref().unwrap().density().unwrap();

    assert!(moved.iter().all(|v| !column.contains(v) || *v == 0.0));
    assert_eq!(moved[grid_index(2, 3, 3, old.res)], source[grid_index(3, 3, 3, old.res)]);
}

#[test]
fn test_adaptive_empty_domain_collapses_to_one_cell() {
    let mut settings = gas_settings(16);
    settings.adaptive.enabled = true;
    let mut state = DomainState::default();
    let mut grids = state.initialize(&settings, &unit_box(), Mat4::IDENTITY, Vec3::ZERO, 25.0, 1);
    let mut solver = ReferenceSolver::new();

    let resized =
        adaptive_domain_adjust(&mut state, &settings, &mut grids, Mat4::IDENTITY, &[], 0.1, &mut solver);

    assert!(resized);
    assert_eq!(state.res, IVec3::ONE);
    assert_eq!(state.res_min, IVec3::ZERO);
    assert_eq!(state.res_max, IVec3::ONE);
    assert_eq!(state.total_cells, 1);
    assert_eq!(grids.as_ref().unwrap().res, IVec3::ONE);
}

#[test]
fn test_adaptive_grows_around_pending_emission() {
    let mut settings = gas_settings(16);
    settings.adaptive.enabled = true;
    let mut state = DomainState::default();
    let mut grids = state.initialize(&settings, &unit_box(), Mat4::IDENTITY, Vec3::ZERO, 25.0, 1);
    let mut solver = ReferenceSolver::new();

    let mut buffer = FieldBuffer::new();
    buffer.bound_insert(Vec3::splat(4.0));
    buffer.bound_insert(Vec3::splat(8.0));
    buffer.allocate(false, true);
    if let Some(influence) = buffer.influence.as_mut() {
        influence.fill(1.0);
    }

    adaptive_domain_adjust(&mut state, &settings, &mut grids, Mat4::IDENTITY, &[buffer], 0.1, &mut solver);

    // content 4..=7 padded by margin + 1 and clamped to the box
    assert_eq!(state.res_min, IVec3::ZERO);
    assert_eq!(state.res_max, IVec3::splat(12));
    assert_eq!(state.res, IVec3::splat(12));
    assert_eq!(grids.as_ref().unwrap().total_cells, 12 * 12 * 12);
    assert!(state.res.min_element() > 0);
}

#[test]
fn test_adaptive_tracks_domain_translation() {
    let mut settings = gas_settings(16);
    settings.adaptive.enabled = true;
    let mut state = DomainState::default();
    let mut grids = state.initialize(&settings, &unit_box(), Mat4::IDENTITY, Vec3::ZERO, 25.0, 1);
    let mut solver = ReferenceSolver::new();

    // 2.5 cells along +x
    let moved = Mat4::from_translation(Vec3::new(2.5 * 0.125, 0.0, 0.0));
    state.set_transform(moved);
    adaptive_domain_adjust(&mut state, &settings, &mut grids, moved, &[], 0.1, &mut solver);

    assert_eq!(state.shift, IVec3::new(3, 0, 0));
    assert!((state.shift_f.x - 3.0).abs() < 1e-5);
    assert!((state.p0.x - (state.dp0.x + 0.5 * 0.125 * 1.0)).abs() < 1e-5);
}

#[test]
fn test_probe_outside_and_sampled() {
    let settings = gas_settings(16);
    let mut state = DomainState::default();
    let mut grids = state
        .initialize(&settings, &unit_box(), Mat4::IDENTITY, Vec3::ZERO, 25.0, 1)
        .unwrap();
    grids.smoke.as_mut().unwrap().density.fill(0.5);
    grids.velocity.fill(Vec3::new(1.0, 0.0, 0.0));

    let outside = velocity_at(&state, &settings, Some(&grids), Vec3::splat(5.0));
    assert_eq!(outside, ProbeResult::Outside);
    assert_eq!(outside.value(), -1.0);

    let inside = velocity_at(&state, &settings, Some(&grids), Vec3::ZERO);
    assert!((inside.value() - 0.5).abs() < 1e-6);
    // max(global_size) / max_resolution * 25 * 0.1
    assert!((inside.velocity().x - 2.0 / 16.0 * 2.5).abs() < 1e-5);
}

#[test]
fn test_probe_adaptive_gas_limited_to_active_cells() {
    let mut settings = gas_settings(16);
    settings.adaptive.enabled = true;
    let mut state = DomainState::default();
    let grids = state.initialize(&settings, &unit_box(), Mat4::IDENTITY, Vec3::ZERO, 25.0, 1);

    // the single active cell sits in the low corner of the box
    let corner = velocity_at(&state, &settings, grids.as_ref(), Vec3::splat(-0.99));
    assert!(matches!(corner, ProbeResult::Sampled { .. }));
    let centre = velocity_at(&state, &settings, grids.as_ref(), Vec3::ZERO);
    assert_eq!(centre, ProbeResult::Outside);

    assert_eq!(velocity_at(&state, &settings, None, Vec3::splat(-0.99)), ProbeResult::Outside);
}

#[test]
fn test_companion_particles_attach_and_detach() {
    let mut settings = DomainSettings::default();
    settings.set_domain_type(DomainType::Liquid);
    let mut companions = CompanionParticles::default();

    assert!(companions.add(&mut settings, SecondaryParticle::Bubble));
    assert!(!companions.add(&mut settings, SecondaryParticle::Bubble));
    assert!(settings.particle_types.contains(SecondaryParticle::Bubble));

    let bubble = companions.get(SecondaryParticle::Bubble).unwrap();
    assert_eq!(bubble.draw_shape, DrawShape::Circle);
    assert_eq!(bubble.draw_size, 0.01);
    assert!(bubble.color_by_velocity);

    companions.add(&mut settings, SecondaryParticle::Foam);
    assert_eq!(companions.get(SecondaryParticle::Foam).unwrap().draw_shape, DrawShape::Cross);

    assert!(companions.remove(&mut settings, SecondaryParticle::Bubble));
    assert!(!settings.particle_types.contains(SecondaryParticle::Bubble));
    assert_eq!(companions.len(), 1);
}

#[test]
fn test_domain_type_switch_resets_bundle() {
    let mut settings = DomainSettings::default();
    settings.display.color_field = DisplayField::Phi;
    settings.set_domain_type(DomainType::Liquid);
    assert!(settings.border_collisions.all_closed());
    assert_eq!(settings.cache.particle_format, CacheFormat::Raw);

    settings.set_domain_type(DomainType::Gas);
    assert!(settings.border_collisions.all_open());
    assert_eq!(settings.display.color_field, DisplayField::Density);
    assert_eq!(settings.cache.noise_format, CacheFormat::Packed);
}

#[test]
fn test_cache_range_setters_clamp() {
    let mut settings = DomainSettings::default();
    settings.set_cache_frame_start(400);
    assert_eq!(settings.cache.frame_start, settings.cache.frame_end);
    settings.set_cache_frame_end(-5);
    assert_eq!(settings.cache.frame_end, settings.cache.frame_start);
}
