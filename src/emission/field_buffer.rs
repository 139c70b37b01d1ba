use glam::{IVec3, Vec3};

use crate::constants::grid::PHI_MAX;
use crate::grid::{cell_count, grid_index, in_bounds};

/// Add `b` to `a` only where that grows `a` in `b`'s direction.
///
/// Same-signed contributions saturate at the larger one; opposing ones cancel.
#[inline]
pub fn add_if_lower(a: f32, b: f32) -> f32 {
    if b > 0.0 {
        (a + b).min(a.max(b))
    } else {
        (a + b).max(a.min(b))
    }
}

/// Local grid of emission values for one source.
///
/// Bounds are in domain cell coordinates, `min` inclusive and `max` exclusive.
/// `distance` starts at `PHI_MAX` and only ever decreases.
#[derive(Debug, Clone, Default)]
pub struct FieldBuffer {
    pub min: IVec3,
    pub max: IVec3,
    pub res: IVec3,
    pub total_cells: usize,
    pub influence: Option<Vec<f32>>,
    pub velocity: Option<Vec<Vec3>>,
    pub distance: Vec<f32>,
    pub numobjs: Vec<f32>,
    /// Set by the first `bound_insert`
    pub valid: bool,
}

impl FieldBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow the bounds to cover `point`
    pub fn bound_insert(&mut self, point: Vec3) {
        if !self.valid {
            self.min = point.floor().as_ivec3();
            self.max = point.ceil().as_ivec3();
            self.valid = true;
            return;
        }
        for i in 0..3 {
            if point[i] < self.min[i] as f32 {
                self.min[i] = point[i].floor() as i32;
            }
            if point[i] > self.max[i] as f32 {
                self.max[i] = point[i].ceil() as i32;
            }
        }
    }

    /// Allocate arrays for the current bounds. Degenerate bounds allocate nothing.
    pub fn allocate(&mut self, use_velocity: bool, use_influence: bool) {
        let res = self.max - self.min;
        if res.min_element() <= 0 {
            return;
        }
        let total = cell_count(res);

        self.res = res;
        self.total_cells = total;
        self.numobjs = vec![0.0; total];
        self.distance = vec![PHI_MAX; total];
        self.influence = use_influence.then(|| vec![0.0; total]);
        self.velocity = use_velocity.then(|| vec![Vec3::ZERO; total]);
    }

    pub fn is_allocated(&self) -> bool {
        self.total_cells > 0 && !self.distance.is_empty()
    }

    /// Release all arrays and bounds
    pub fn free(&mut self) {
        *self = Self::default();
    }

    /// Whether the global cell `p` is covered by this buffer
    #[inline]
    pub fn contains(&self, p: IVec3) -> bool {
        self.is_allocated() && in_bounds(p, self.min, self.max)
    }

    /// Local array index of the global cell `p`, which must be covered
    #[inline]
    pub fn local_index(&self, p: IVec3) -> usize {
        let l = p - self.min;
        grid_index(l.x, l.y, l.z, self.res)
    }

    /// Influence at local index, zero when the buffer carries none
    #[inline]
    pub fn influence_at(&self, index: usize) -> f32 {
        self.influence.as_ref().map_or(0.0, |v| v[index])
    }

    /// Merge `other` into `self`.
    ///
    /// The result covers the union of both bounds. Where `other` covers a cell,
    /// numobjs takes the max, distance the min, influence is summed
    /// (scaled by `sample_size`) when `additive` or maxed otherwise, and velocity
    /// is merged per axis with `add_if_lower`. An unallocated `other` is ignored.
    pub fn combine(&mut self, other: &FieldBuffer, additive: bool, sample_size: f32) {
        if !other.is_allocated() {
            return;
        }

        let old = std::mem::take(self);
        let mut out = FieldBuffer::default();
        if old.is_allocated() {
            out.min = old.min.min(other.min);
            out.max = old.max.max(other.max);
        } else {
            out.min = other.min;
            out.max = other.max;
        }
        out.valid = true;
        out.allocate(
            old.velocity.is_some() || other.velocity.is_some(),
            old.influence.is_some() || other.influence.is_some(),
        );

        for z in out.min.z..out.max.z {
            for y in out.min.y..out.max.y {
                for x in out.min.x..out.max.x {
                    let p = IVec3::new(x, y, z);
                    let o = out.local_index(p);

                    if old.contains(p) {
                        let i = old.local_index(p);
                        out.numobjs[o] = old.numobjs[i];
                        out.distance[o] = old.distance[i];
                        if let (Some(dst), Some(src)) = (out.influence.as_mut(), old.influence.as_ref()) {
                            dst[o] = src[i];
                        }
                        if let (Some(dst), Some(src)) = (out.velocity.as_mut(), old.velocity.as_ref()) {
                            dst[o] = src[i];
                        }
                    }

                    if other.contains(p) {
                        let i = other.local_index(p);
                        out.numobjs[o] = out.numobjs[o].max(other.numobjs[i]);
                        out.distance[o] = out.distance[o].min(other.distance[i]);
                        if let (Some(dst), Some(src)) = (out.influence.as_mut(), other.influence.as_ref()) {
                            dst[o] = if additive {
                                dst[o] + src[i] * sample_size
                            } else {
                                dst[o].max(src[i])
                            };
                        }
                        if let (Some(dst), Some(src)) = (out.velocity.as_mut(), other.velocity.as_ref()) {
                            let v = &mut dst[o];
                            v.x = add_if_lower(v.x, src[i].x);
                            v.y = add_if_lower(v.y, src[i].y);
                            v.z = add_if_lower(v.z, src[i].z);
                        }
                    }
                }
            }
        }

        *self = out;
    }

    /// Split the arrays into one mutable slab per z layer for parallel sampling
    pub fn slabs_mut(&mut self) -> Vec<FieldSlab<'_>> {
        if !self.is_allocated() {
            return Vec::new();
        }
        let slab = (self.res.x * self.res.y) as usize;
        let min = self.min;
        let res = self.res;

        let mut influence = self.influence.as_deref_mut().map(|v| v.chunks_mut(slab));
        let mut velocity = self.velocity.as_deref_mut().map(|v| v.chunks_mut(slab));

        self.distance
            .chunks_mut(slab)
            .zip(self.numobjs.chunks_mut(slab))
            .enumerate()
            .map(|(z, (distance, numobjs))| FieldSlab {
                z: min.z + z as i32,
                min,
                res,
                distance,
                numobjs,
                influence: influence.as_mut().and_then(|it| it.next()),
                velocity: velocity.as_mut().and_then(|it| it.next()),
            })
            .collect()
    }
}

/// One z layer of a `FieldBuffer`, owned by a single worker while sampling
pub struct FieldSlab<'a> {
    /// Global z of this layer
    pub z: i32,
    pub min: IVec3,
    pub res: IVec3,
    pub distance: &'a mut [f32],
    pub numobjs: &'a mut [f32],
    pub influence: Option<&'a mut [f32]>,
    pub velocity: Option<&'a mut [Vec3]>,
}

impl FieldSlab<'_> {
    /// Slab-local index of global cell (x, y)
    #[inline]
    pub fn index(&self, x: i32, y: i32) -> usize {
        ((x - self.min.x) + self.res.x * (y - self.min.y)) as usize
    }

    /// Global (x, y) coordinates in iteration order
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> {
        let (min, res) = (self.min, self.res);
        (min.y..min.y + res.y).flat_map(move |y| (min.x..min.x + res.x).map(move |x| (x, y)))
    }
}
