use super::*;
use glam::{Mat4, Vec3};

fn unit_cube() -> TriangleMesh {
    TriangleMesh::cuboid(Vec3::splat(5.0), Vec3::splat(2.0))
}

#[test]
fn test_cuboid_normals_point_outward() {
    let mesh = unit_cube();
    for t in 0..mesh.triangles.len() {
        let [a, b, c] = mesh.corners(t);
        let n = (b - a).cross(c - a);
        let centroid = (a + b + c) / 3.0;
        assert!(n.dot(centroid - Vec3::splat(5.0)) > 0.0, "triangle {} faces inward", t);
    }
}

#[test]
fn test_vertex_normals_are_unit() {
    let normals = unit_cube().vertex_normals();
    assert_eq!(normals.len(), 8);
    for n in normals {
        assert!((n.length() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn test_bounds_and_transform() {
    let mesh = unit_cube().transformed(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
    let (lo, hi) = mesh.bounds().expect("mesh has vertices");
    assert_eq!(lo, Vec3::new(4.0, 3.0, 3.0));
    assert_eq!(hi, Vec3::new(8.0, 7.0, 7.0));
    assert!(TriangleMesh::default().bounds().is_none());
}

#[test]
fn test_barycentric_weights_at_corners_and_centroid() {
    let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
    assert!((barycentric_weights(a, b, c, a) - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
    assert!((barycentric_weights(a, b, c, c) - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-6);
    let w = barycentric_weights(a, b, c, (a + b + c) / 3.0);
    assert!((w - Vec3::splat(1.0 / 3.0)).length() < 1e-5);
}

#[test]
fn test_ray_cast_from_inside_hits_facing_away() {
    let mesh = unit_cube();
    let index = TriangleIndex::build(&mesh.positions, &mesh.triangles);
    let hit = index.ray_cast(Vec3::new(5.0, 4.0, 5.5), Vec3::X).expect("ray must hit the +x face");
    assert!((hit.distance - 2.0).abs() < 1e-5);
    assert!(hit.normal.dot(Vec3::X) > 0.0);
}

#[test]
fn test_ray_cast_miss_and_nearest_hit() {
    let mesh = unit_cube();
    let index = TriangleIndex::build(&mesh.positions, &mesh.triangles);
    // pointing away from the cube
    assert!(index.ray_cast(Vec3::new(10.0, 4.0, 5.5), Vec3::X).is_none());
    // towards it, the first hit is the +x face
    let hit = index.ray_cast(Vec3::new(10.0, 4.0, 5.5), -Vec3::X).expect("hit");
    assert!((hit.distance - 3.0).abs() < 1e-5);
    assert!(hit.normal.dot(-Vec3::X) < 0.0);
}

#[test]
fn test_find_nearest_respects_radius() {
    let mesh = unit_cube();
    let index = TriangleIndex::build(&mesh.positions, &mesh.triangles);
    let p = Vec3::new(8.0, 5.0, 5.0);
    let hit = index.find_nearest(p, 2.0).expect("within radius");
    assert!((hit.dist_sq - 1.0).abs() < 1e-5);
    assert!((hit.point - Vec3::new(7.0, 5.0, 5.0)).length() < 1e-5);
    assert!(index.find_nearest(p, 0.5).is_none());
}

#[test]
fn test_particle_filter_and_tree() {
    let mut system = ParticleSystem::new("emit", ParticleKind::Emitter, ParticlePhysics::Newtonian);
    system.particles.push(Particle::new(Vec3::ZERO, Vec3::X));
    let mut dead = Particle::new(Vec3::splat(3.0), Vec3::ZERO);
    dead.alive = false;
    system.particles.push(dead);

    let live: Vec<_> = system.live_particles(0.5).collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].position, Vec3::new(0.5, 0.0, 0.0));

    let tree = ParticleTree::build(&[Vec3::ZERO, Vec3::splat(4.0)]);
    let (i, d) = tree.nearest(Vec3::new(3.0, 4.0, 4.0)).expect("non-empty");
    assert_eq!(i, 1);
    assert!((d - 1.0).abs() < 1e-6);
    assert!(ParticleKind::Fluid.emits());
    assert!(!ParticleKind::Hair.emits());
}
