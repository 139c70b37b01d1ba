use super::*;
use crate::constants::grid::PHI_MAX;
use crate::domain::{DomainSettings, DomainState};
use crate::geometry::{Particle, ParticleKind, ParticlePhysics, ParticleSystem, TriangleIndex, TriangleMesh};
use crate::source::{EffectorSettings, EffectorType, FlowSettings, FlowType, VertexMotion};
use glam::{IVec3, Mat4, Vec3};

/// 32^3 domain over [-1, 1]^3, 1/16 world units per cell, world origin at cell 16
fn context() -> SampleContext {
    let settings = DomainSettings {
        max_resolution: 32,
        ..DomainSettings::default()
    };
    let mut state = DomainState::default();
    let domain = TriangleMesh::cuboid(Vec3::ZERO, Vec3::ONE);
    state.initialize(&settings, &domain, Mat4::IDENTITY, Vec3::ZERO, 25.0, 1);
    SampleContext::new(&state, &settings, 0.1, 1)
}

/// Cube spanning cells 12..20 on every axis
fn small_cube() -> TriangleMesh {
    TriangleMesh::cuboid(Vec3::ZERO, Vec3::splat(0.25))
}

fn cell_index(buffer: &FieldBuffer, x: i32, y: i32, z: i32) -> usize {
    buffer.local_index(IVec3::new(x, y, z))
}

#[test]
fn test_ray_distance_sign() {
    let mesh = TriangleMesh::cuboid(Vec3::splat(16.0), Vec3::splat(4.0));
    let index = TriangleIndex::build(&mesh.positions, &mesh.triangles);

    let mut inside = PHI_MAX;
    update_distance(&mut inside, &index, Vec3::new(13.5, 15.5, 17.5), 0.0, false);
    assert!(inside < 0.0);
    assert!((inside + 1.5).abs() < 1e-4, "got {}", inside);

    let mut outside = PHI_MAX;
    update_distance(&mut outside, &index, Vec3::new(9.5, 15.5, 17.3), 0.0, false);
    assert!(outside > 0.0);
}

#[test]
fn test_distance_never_increases() {
    let mesh = TriangleMesh::cuboid(Vec3::splat(16.0), Vec3::splat(4.0));
    let index = TriangleIndex::build(&mesh.positions, &mesh.triangles);
    let mut d = -3.0;
    update_distance(&mut d, &index, Vec3::new(9.5, 15.5, 17.3), 0.0, false);
    assert_eq!(d, -3.0);
}

#[test]
fn test_planar_distance_is_negative_near_surface() {
    let mesh = TriangleMesh::cuboid(Vec3::splat(16.0), Vec3::splat(4.0));
    let index = TriangleIndex::build(&mesh.positions, &mesh.triangles);

    let mut near = PHI_MAX;
    update_distance(&mut near, &index, Vec3::new(20.5, 15.5, 17.5), 0.0, true);
    assert!((near + 0.5).abs() < 1e-4);

    let mut far = PHI_MAX;
    update_distance(&mut far, &index, Vec3::new(26.5, 15.5, 17.5), 0.0, true);
    assert_eq!(far, PHI_MAX);
}

#[test]
fn test_liquid_cube_fills_enclosed_cells() {
    let ctx = context();
    let mut flow = FlowSettings::default();
    flow.set_type(FlowType::Liquid);
    let mut motion = VertexMotion::default();

    let buffer = emit_from_mesh(&small_cube(), Mat4::IDENTITY, &flow, &mut motion, &ctx);

    // vertex bounds 12..20 plus a margin of 6
    assert_eq!(buffer.min, IVec3::splat(6));
    assert_eq!(buffer.max, IVec3::splat(26));
    for z in 12..20 {
        for y in 12..20 {
            for x in 12..20 {
                let i = cell_index(&buffer, x, y, z);
                assert_eq!(buffer.influence_at(i), 1.0, "cell ({}, {}, {})", x, y, z);
            }
        }
    }
    assert!(buffer.distance[cell_index(&buffer, 13, 15, 17)] < 0.0);
    assert!(buffer.distance[cell_index(&buffer, 9, 15, 17)] > 0.0);
}

#[test]
fn test_gas_surface_emission_falls_off() {
    let ctx = context();
    let flow = FlowSettings::default();
    let mut motion = VertexMotion::default();
    let buffer = emit_from_mesh(&small_cube(), Mat4::IDENTITY, &flow, &mut motion, &ctx);

    let near = buffer.influence_at(cell_index(&buffer, 12, 15, 17));
    let centre = buffer.influence_at(cell_index(&buffer, 16, 16, 16));
    // 0.5 cells from the surface with surface_distance 1.5
    assert!((near - (1.0f32 - 0.5 / 1.5).sqrt()).abs() < 1e-4, "got {}", near);
    assert_eq!(centre, 0.0);
}

#[test]
fn test_gas_volume_emission_fills_interior() {
    let ctx = context();
    let flow = FlowSettings {
        volume_density: 0.8,
        ..FlowSettings::default()
    };
    let mut motion = VertexMotion::default();
    let buffer = emit_from_mesh(&small_cube(), Mat4::IDENTITY, &flow, &mut motion, &ctx);
    assert!((buffer.influence_at(cell_index(&buffer, 15, 16, 17)) - 0.8).abs() < 1e-6);
}

#[test]
fn test_disabled_flow_allocates_without_sampling() {
    let ctx = context();
    let flow = FlowSettings {
        use_flow: false,
        ..FlowSettings::default()
    };
    let mut motion = VertexMotion::default();
    let buffer = emit_from_mesh(&small_cube(), Mat4::IDENTITY, &flow, &mut motion, &ctx);
    assert!(buffer.is_allocated());
    assert!(buffer.distance.iter().all(|&d| d == PHI_MAX));
    assert!(buffer.influence.as_ref().unwrap().iter().all(|&v| v == 0.0));
}

#[test]
fn test_empty_mesh_gives_empty_buffer() {
    let ctx = context();
    let mut motion = VertexMotion::default();
    let buffer = emit_from_mesh(&TriangleMesh::default(), Mat4::IDENTITY, &FlowSettings::default(), &mut motion, &ctx);
    assert!(!buffer.is_allocated());
}

#[test]
fn test_flow_initial_velocity_from_coordinates() {
    let ctx = context();
    let mut flow = FlowSettings::default();
    flow.set_type(FlowType::Liquid);
    flow.init_velocity = true;
    flow.vel_coord = Vec3::new(1.0, 0.0, 0.0);
    let mut motion = VertexMotion::default();
    let buffer = emit_from_mesh(&small_cube(), Mat4::IDENTITY, &flow, &mut motion, &ctx);

    let v = buffer.velocity.as_ref().unwrap()[cell_index(&buffer, 13, 15, 17)];
    // 32 cells over 2 world units, 1 / (25 * 0.1)
    assert!((v.x - 32.0 / 2.0 / 2.5).abs() < 1e-4, "got {:?}", v);
}

#[test]
fn test_collision_counts_and_motion() {
    let ctx = context();
    let effector = EffectorSettings::default();
    assert_eq!(effector.effector_type, EffectorType::Collision);
    let mut motion = VertexMotion::default();

    let first = obstacles_from_mesh(&small_cube(), Mat4::IDENTITY, &effector, &mut motion, &ctx);
    assert_eq!(first.numobjs[cell_index(&first, 13, 15, 17)], 1.0);
    assert_eq!(first.numobjs[cell_index(&first, 9, 15, 17)], 0.0);
    assert_eq!(first.velocity.as_ref().unwrap()[cell_index(&first, 12, 15, 17)], Vec3::ZERO);

    // one cell along +x in 0.1 time units
    let moved = Mat4::from_translation(Vec3::new(1.0 / 16.0, 0.0, 0.0));
    let second = obstacles_from_mesh(&small_cube(), moved, &effector, &mut motion, &ctx);
    let v = second.velocity.as_ref().unwrap()[cell_index(&second, 13, 15, 17)];
    assert!((v.x - 10.0).abs() < 1e-3, "got {:?}", v);
}

#[test]
fn test_vertex_velocities_need_matching_topology() {
    let mut motion = VertexMotion::default();
    let a = vec![Vec3::ZERO, Vec3::ONE];
    assert!(vertex_velocities(&a, &mut motion, IVec3::ZERO, 0.5).is_none());

    let b = vec![Vec3::X, Vec3::ONE];
    let vel = vertex_velocities(&b, &mut motion, IVec3::ZERO, 0.5).unwrap();
    assert_eq!(vel[0], Vec3::new(2.0, 0.0, 0.0));
    assert_eq!(vel[1], Vec3::ZERO);

    let c = vec![Vec3::X];
    assert!(vertex_velocities(&c, &mut motion, IVec3::ZERO, 0.5).is_none());
}

fn particle_system(world: Vec3) -> ParticleSystem {
    let mut system = ParticleSystem::new("emitter", ParticleKind::Emitter, ParticlePhysics::Newtonian);
    system.particles.push(Particle::new(world, Vec3::new(0.5, 0.0, 0.0)));
    system
}

#[test]
fn test_particles_mark_their_cell() {
    let ctx = context();
    // cell (16.5, 16.5, 16.5)
    let system = particle_system(Vec3::splat(0.5 / 16.0));
    let flow = FlowSettings {
        init_velocity: true,
        ..FlowSettings::default()
    };
    let buffer = emit_from_particles(&system, &flow, &ctx, 0.0);

    assert_eq!(buffer.influence_at(cell_index(&buffer, 16, 16, 16)), 1.0);
    assert_eq!(buffer.influence_at(cell_index(&buffer, 15, 16, 16)), 0.0);
    let v = buffer.velocity.as_ref().unwrap()[cell_index(&buffer, 16, 16, 16)];
    assert!((v.x - 0.5).abs() < 1e-6);
}

#[test]
fn test_particle_radius_falloff() {
    let ctx = context();
    let system = particle_system(Vec3::splat(0.5 / 16.0));
    let flow = FlowSettings {
        use_particle_size: true,
        particle_size: 2.0,
        ..FlowSettings::default()
    };
    let buffer = emit_from_particles(&system, &flow, &ctx, 0.0);

    // solid radius 1, linear falloff over the next half cell
    assert_eq!(buffer.influence_at(cell_index(&buffer, 17, 16, 16)), 1.0);
    let diagonal = buffer.influence_at(cell_index(&buffer, 17, 17, 16));
    assert!((diagonal - (1.0 - (2.0f32.sqrt() - 1.0) / 0.5)).abs() < 1e-4);
    assert_eq!(buffer.influence_at(cell_index(&buffer, 18, 16, 16)), 0.0);
}

#[test]
fn test_hair_particles_do_not_emit() {
    let ctx = context();
    let mut system = particle_system(Vec3::ZERO);
    system.kind = ParticleKind::Hair;
    let buffer = emit_from_particles(&system, &FlowSettings::default(), &ctx, 0.0);
    assert!(!buffer.is_allocated());
}
