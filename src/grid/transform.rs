use glam::{Mat3, Mat4, Vec3};

/// Mapping between world space and the domain's cell space.
///
/// Cell space has its origin at the domain corner `p0` and one unit per cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSpace {
    pub world_to_object: Mat4,
    pub p0: Vec3,
    pub cell_size: Vec3,
}

impl CellSpace {
    pub fn new(world_to_object: Mat4, p0: Vec3, cell_size: Vec3) -> Self {
        Self {
            world_to_object,
            p0,
            cell_size,
        }
    }

    /// World position to continuous cell coordinates
    #[inline]
    pub fn world_to_cell(&self, pos: Vec3) -> Vec3 {
        (self.world_to_object.transform_point3(pos) - self.p0) / self.cell_size
    }

    /// Object-space rotation of a world-space direction, not normalised
    #[inline]
    pub fn rotate_to_object(&self, dir: Vec3) -> Vec3 {
        Mat3::from_mat4(self.world_to_object) * dir
    }
}

/// Rotate `v` by the 3x3 part of `m` and restore its original length.
///
/// Used wherever a velocity changes frame without picking up the frame's scale.
pub fn rotate_keep_length(m: Mat4, v: Vec3) -> Vec3 {
    let len = v.length();
    let rotated = Mat3::from_mat4(m) * v;
    let rotated_len = rotated.length();
    if rotated_len > 0.0 {
        rotated * (len / rotated_len)
    } else {
        rotated
    }
}
