use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Triangle mesh in object space
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    /// Per-triangle corner UVs
    pub uvs: Option<Vec<[Vec2; 3]>>,
    /// Per-vertex emission weight (vertex group)
    pub vertex_weights: Option<Vec<f32>>,
}

impl TriangleMesh {
    pub fn new(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            positions,
            triangles,
            uvs: None,
            vertex_weights: None,
        }
    }

    /// Axis-aligned box with outward-facing triangles
    pub fn cuboid(center: Vec3, half_extent: Vec3) -> Self {
        let (c, h) = (center, half_extent);
        let positions = vec![
            c + Vec3::new(-h.x, -h.y, -h.z),
            c + Vec3::new(h.x, -h.y, -h.z),
            c + Vec3::new(h.x, h.y, -h.z),
            c + Vec3::new(-h.x, h.y, -h.z),
            c + Vec3::new(-h.x, -h.y, h.z),
            c + Vec3::new(h.x, -h.y, h.z),
            c + Vec3::new(h.x, h.y, h.z),
            c + Vec3::new(-h.x, h.y, h.z),
        ];
        let triangles = vec![
            [0, 2, 1], [0, 3, 2], // -z
            [4, 5, 6], [4, 6, 7], // +z
            [0, 1, 5], [0, 5, 4], // -y
            [3, 6, 2], [3, 7, 6], // +y
            [0, 4, 7], [0, 7, 3], // -x
            [1, 2, 6], [1, 6, 5], // +x
        ];
        Self::new(positions, triangles)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.triangles.is_empty()
    }

    /// Corner positions of triangle `t`
    #[inline]
    pub fn corners(&self, t: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[t];
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Area-weighted vertex normals
    pub fn vertex_normals(&self) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for (t, tri) in self.triangles.iter().enumerate() {
            let [a, b, c] = self.corners(t);
            let n = (b - a).cross(c - a);
            for &v in tri {
                normals[v as usize] += n;
            }
        }
        normals.iter().map(|n| n.normalize_or_zero()).collect()
    }

    /// Copy with every vertex transformed by `m`
    pub fn transformed(&self, m: Mat4) -> Self {
        Self {
            positions: self.positions.iter().map(|&p| m.transform_point3(p)).collect(),
            ..self.clone()
        }
    }

    /// Min and max corner, `None` for a mesh without vertices
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(self.positions.iter().fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))))
    }
}

/// Barycentric weights of `p` projected onto triangle (a, b, c)
pub fn barycentric_weights(a: Vec3, b: Vec3, c: Vec3, p: Vec3) -> Vec3 {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < f32::EPSILON {
        return Vec3::new(1.0, 0.0, 0.0);
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Vec3::new(1.0 - v - w, v, w)
}
