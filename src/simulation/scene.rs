use glam::Vec3;

use crate::geometry::TriangleMesh;
use crate::source::{AnimatedTransform, SourceObject, SourceRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Sun,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
}

/// External force acting on smoke, evaluated in world space
pub trait ForceField: Send + Sync {
    /// Force at `position` on fluid moving with `velocity`
    fn force_at(&self, position: Vec3, velocity: Vec3) -> Vec3;
}

/// Constant push along a direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformWind {
    pub direction: Vec3,
    pub strength: f32,
}

impl ForceField for UniformWind {
    fn force_at(&self, _position: Vec3, _velocity: Vec3) -> Vec3 {
        self.direction.normalize_or_zero() * self.strength
    }
}

/// Pull towards a point, fading linearly to zero at `radius`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointAttractor {
    pub center: Vec3,
    pub strength: f32,
    pub radius: f32,
}

impl ForceField for PointAttractor {
    fn force_at(&self, position: Vec3, _velocity: Vec3) -> Vec3 {
        let to_center = self.center - position;
        let dist = to_center.length();
        if dist <= f32::EPSILON || dist >= self.radius {
            return Vec3::ZERO;
        }
        to_center / dist * self.strength * (1.0 - dist / self.radius)
    }
}

/// Everything outside the domain that a frame needs.
///
/// The scene outlives single frames: sources keep their vertex positions
/// between samples to derive motion.
pub struct Scene {
    pub domain_mesh: TriangleMesh,
    pub domain_transform: AnimatedTransform,
    pub fps: f32,
    /// Scene gravity, `None` when the domain uses its own
    pub gravity: Option<Vec3>,
    pub sources: Vec<SourceObject>,
    pub force_fields: Vec<Box<dyn ForceField>>,
    pub lights: Vec<Light>,
}

impl Scene {
    pub fn new(domain_mesh: TriangleMesh, fps: f32) -> Self {
        Self {
            domain_mesh,
            domain_transform: AnimatedTransform::fixed(Vec3::ZERO),
            fps,
            gravity: Some(Vec3::new(0.0, 0.0, -9.81)),
            sources: Vec::new(),
            force_fields: Vec::new(),
            lights: Vec::new(),
        }
    }

    pub fn add_source(&mut self, source: SourceObject) {
        self.sources.push(source);
    }

    pub fn flows(&self) -> impl Iterator<Item = &SourceObject> {
        self.sources
            .iter()
            .filter(|s| matches!(s.role, SourceRole::Flow(_)))
    }

    pub fn effectors(&self) -> impl Iterator<Item = &SourceObject> {
        self.sources
            .iter()
            .filter(|s| matches!(s.role, SourceRole::Effector(_)))
    }

    /// Light casting the smoke shadow: the first point light, else the first light
    pub fn dominant_light(&self) -> Option<Vec3> {
        self.lights
            .iter()
            .find(|l| l.kind == LightKind::Point)
            .or_else(|| self.lights.first())
            .map(|l| l.position)
    }

    /// Forget recorded vertex positions
    pub fn clear_motion(&mut self) {
        for source in &mut self.sources {
            source.motion.clear();
        }
    }
}
