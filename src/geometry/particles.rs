use glam::Vec3;
use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};

/// What a particle system represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    Emitter,
    Fluid,
    Hair,
    /// Companion visualisation systems created by the domain
    Secondary,
}

impl ParticleKind {
    /// Only emitter and fluid particles feed a flow
    pub fn emits(self) -> bool {
        matches!(self, ParticleKind::Emitter | ParticleKind::Fluid)
    }
}

/// Physics model of a particle system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticlePhysics {
    None,
    Newtonian,
    Keyed,
    Fluid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// World-space position at the frame
    pub position: Vec3,
    /// World-space velocity in units per frame
    pub velocity: Vec3,
    pub alive: bool,
    pub visible: bool,
}

impl Particle {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position,
            velocity,
            alive: true,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleSystem {
    pub name: String,
    pub kind: ParticleKind,
    pub physics: ParticlePhysics,
    pub particles: Vec<Particle>,
    /// Display size, used as emission radius
    pub size: f32,
}

impl ParticleSystem {
    pub fn new(name: impl Into<String>, kind: ParticleKind, physics: ParticlePhysics) -> Self {
        Self {
            name: name.into(),
            kind,
            physics,
            particles: Vec::new(),
            size: 0.05,
        }
    }

    /// Particles that contribute emission at `frame_offset` frames past the sampled frame
    pub fn live_particles(&self, frame_offset: f32) -> impl Iterator<Item = Particle> + '_ {
        self.particles
            .iter()
            .filter(|p| p.alive && p.visible)
            .map(move |p| Particle {
                position: p.position + p.velocity * frame_offset,
                ..*p
            })
    }
}

/// Nearest-particle index over cell-space positions
pub struct ParticleTree {
    tree: RTree<GeomWithData<[f32; 3], usize>>,
}

impl ParticleTree {
    pub fn build(positions: &[Vec3]) -> Self {
        let points = positions
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(p.to_array(), i))
            .collect();
        Self {
            tree: RTree::bulk_load(points),
        }
    }

    /// Index and distance of the nearest particle
    pub fn nearest(&self, point: Vec3) -> Option<(usize, f32)> {
        let found = self.tree.nearest_neighbor(&point.to_array())?;
        let d = Vec3::from_array(*found.geom()).distance(point);
        Some((found.data, d))
    }
}
