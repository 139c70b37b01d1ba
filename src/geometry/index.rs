use glam::Vec3;
use rstar::{ParentNode, PointDistance, RTree, RTreeNode, RTreeObject, AABB};

/// Ray intersection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    /// Unit face normal following the triangle winding
    pub normal: Vec3,
    pub triangle: usize,
}

/// Nearest surface point result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHit {
    pub point: Vec3,
    pub dist_sq: f32,
    pub triangle: usize,
}

#[derive(Debug, Clone)]
struct TriangleEntry {
    triangle: usize,
    corners: [Vec3; 3],
    envelope: AABB<[f32; 3]>,
}

impl RTreeObject for TriangleEntry {
    type Envelope = AABB<[f32; 3]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for TriangleEntry {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        let p = Vec3::from_array(*point);
        let [a, b, c] = self.corners;
        closest_point_on_triangle(p, a, b, c).distance_squared(p)
    }
}

/// Read-only triangle index shared by all sampling workers
pub struct TriangleIndex {
    tree: RTree<TriangleEntry>,
}

impl TriangleIndex {
    /// Build from positions already in the query space
    pub fn build(positions: &[Vec3], triangles: &[[u32; 3]]) -> Self {
        let entries = triangles
            .iter()
            .enumerate()
            .map(|(t, tri)| {
                let corners = [
                    positions[tri[0] as usize],
                    positions[tri[1] as usize],
                    positions[tri[2] as usize],
                ];
                let lo = corners[0].min(corners[1]).min(corners[2]);
                let hi = corners[0].max(corners[1]).max(corners[2]);
                TriangleEntry {
                    triangle: t,
                    corners,
                    envelope: AABB::from_corners(lo.to_array(), hi.to_array()),
                }
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Nearest surface point within `sqrt(max_dist_sq)` of `point`
    pub fn find_nearest(&self, point: Vec3, max_dist_sq: f32) -> Option<NearestHit> {
        let p = point.to_array();
        let entry = self.tree.nearest_neighbor(&p)?;
        let [a, b, c] = entry.corners;
        let closest = closest_point_on_triangle(point, a, b, c);
        let dist_sq = closest.distance_squared(point);
        (dist_sq <= max_dist_sq).then_some(NearestHit {
            point: closest,
            dist_sq,
            triangle: entry.triangle,
        })
    }

    /// First triangle hit along `dir` (unit length) from `origin`
    pub fn ray_cast(&self, origin: Vec3, dir: Vec3) -> Option<RayHit> {
        let inv = dir.recip();
        let mut best: Option<RayHit> = None;
        let mut stack: Vec<&ParentNode<TriangleEntry>> = vec![self.tree.root()];

        while let Some(node) = stack.pop() {
            for child in node.children() {
                let limit = best.map_or(f32::INFINITY, |h| h.distance);
                match child {
                    RTreeNode::Leaf(entry) => {
                        let [a, b, c] = entry.corners;
                        if let Some(t) = ray_triangle(origin, dir, a, b, c) {
                            if t < limit {
                                best = Some(RayHit {
                                    distance: t,
                                    normal: (b - a).cross(c - a).normalize_or_zero(),
                                    triangle: entry.triangle,
                                });
                            }
                        }
                    }
                    RTreeNode::Parent(parent) => {
                        if ray_aabb(origin, inv, &parent.envelope()).map_or(false, |t| t < limit) {
                            stack.push(parent);
                        }
                    }
                }
            }
        }

        best
    }
}

/// Entry distance of a ray into a box, `None` if it misses
pub fn ray_aabb(origin: Vec3, inv_dir: Vec3, aabb: &AABB<[f32; 3]>) -> Option<f32> {
    let lo = Vec3::from_array(aabb.lower());
    let hi = Vec3::from_array(aabb.upper());
    ray_box(origin, inv_dir, lo, hi)
}

/// Slab test against box [lo, hi]; returns the entry distance (0 when inside)
pub fn ray_box(origin: Vec3, inv_dir: Vec3, lo: Vec3, hi: Vec3) -> Option<f32> {
    let t1 = (lo - origin) * inv_dir;
    let t2 = (hi - origin) * inv_dir;
    let tmin = t1.min(t2);
    let tmax = t1.max(t2);
    // NaN from 0 * inf is dropped by max/min element
    let near = tmin.max_element().max(0.0);
    let far = tmax.min_element();
    (near <= far).then_some(near)
}

/// Two-sided Moller-Trumbore intersection
fn ray_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPS: f32 = 1.0e-7;
    // widened barycentric test so rays through shared edges never slip between triangles
    const EDGE_EPS: f32 = 1.0e-5;
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(-EDGE_EPS..=1.0 + EDGE_EPS).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < -EDGE_EPS || u + v > 1.0 + EDGE_EPS {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t > EPS).then_some(t)
}

/// Closest point on triangle (a, b, c) to `p`
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}
