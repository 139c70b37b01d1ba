use super::*;
use glam::{IVec3, Mat4, Vec3};
use std::collections::HashSet;

#[test]
fn test_index_is_bijective_over_grid() {
    let res = IVec3::new(5, 3, 4);
    let mut seen = HashSet::new();
    for z in 0..res.z {
        for y in 0..res.y {
            for x in 0..res.x {
                let i = grid_index(x, y, z, res);
                assert!(i < cell_count(res));
                assert!(seen.insert(i), "index {} produced twice", i);
            }
        }
    }
    assert_eq!(seen.len(), cell_count(res));
}

#[test]
fn test_index_x_fastest() {
    let res = IVec3::new(4, 4, 4);
    assert_eq!(grid_index(1, 0, 0, res), 1);
    assert_eq!(grid_index(0, 1, 0, res), 4);
    assert_eq!(grid_index(0, 0, 1, res), 16);
}

#[test]
fn test_cell_count_degenerate() {
    assert_eq!(cell_count(IVec3::new(0, 4, 4)), 0);
    assert_eq!(cell_count(IVec3::new(4, -1, 4)), 0);
    assert_eq!(cell_count(IVec3::ONE), 1);
}

#[test]
fn test_world_to_cell() {
    let space = CellSpace::new(
        Mat4::from_translation(Vec3::new(-10.0, 0.0, 0.0)),
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::splat(0.5),
    );
    // world (11, 0, 0) -> object (1, 0, 0) -> cell (4, 2, 2)
    let c = space.world_to_cell(Vec3::new(11.0, 0.0, 0.0));
    assert!((c - Vec3::new(4.0, 2.0, 2.0)).length() < 1e-5);
}

#[test]
fn test_rotate_keep_length_ignores_scale() {
    let m = Mat4::from_scale(Vec3::splat(3.0));
    let v = rotate_keep_length(m, Vec3::new(0.0, 2.0, 0.0));
    assert!((v - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-5);
}

#[test]
fn test_trilinear_constant_and_linear() {
    let res = IVec3::new(4, 4, 4);
    let constant = vec![2.5; cell_count(res)];
    assert!((sample_trilinear(&constant, res, Vec3::splat(0.3)) - 2.5).abs() < 1e-5);

    // f(x) = x at cell centres; halfway between centres 1 and 2 is 1.5
    let mut linear = vec![0.0; cell_count(res)];
    for z in 0..4 {
        for y in 0..4 {
            for x in 0..4 {
                linear[grid_index(x, y, z, res)] = x as f32;
            }
        }
    }
    let v = sample_trilinear(&linear, res, Vec3::new(0.5, 0.5, 0.5));
    assert!((v - 1.5).abs() < 1e-5);
}
