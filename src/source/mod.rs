//! Flow and effector objects
//!
//! A `SourceObject` is anything in the scene that feeds the domain: smoke and
//! liquid emitters, outflows, colliders and guides. The role decides which
//! sampler renders it.

pub mod effector;
pub mod flow;
pub mod texture;

pub use effector::{EffectorSettings, EffectorType, GuideMode};
pub use flow::{FlowBehavior, FlowSettings, FlowType};
pub use texture::{EmissionTexture, TextureKind, TextureMapping, TextureSampler};

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{ParticleSystem, TriangleMesh};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub frame: f32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Keyframe {
    pub fn at(frame: f32, translation: Vec3) -> Self {
        Self {
            frame,
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Object-to-world transform sampled from keyframes, held constant outside them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimatedTransform {
    pub keys: Vec<Keyframe>,
}

impl AnimatedTransform {
    pub fn fixed(translation: Vec3) -> Self {
        Self {
            keys: vec![Keyframe::at(0.0, translation)],
        }
    }

    pub fn from_keys(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        Self { keys }
    }

    pub fn is_animated(&self) -> bool {
        self.keys.windows(2).any(|w| w[0] != Keyframe { frame: w[0].frame, ..w[1] })
    }

    /// Object-to-world matrix at scene time `time` (in frames)
    pub fn matrix_at(&self, time: f32) -> Mat4 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Mat4::IDENTITY,
        };
        if time <= first.frame {
            return first.matrix();
        }
        if time >= last.frame {
            return last.matrix();
        }

        let next = self.keys.partition_point(|k| k.frame <= time);
        let (a, b) = (&self.keys[next - 1], &self.keys[next]);
        let span = b.frame - a.frame;
        let t = if span > 0.0 { (time - a.frame) / span } else { 0.0 };
        Mat4::from_scale_rotation_translation(
            a.scale.lerp(b.scale, t),
            a.rotation.slerp(b.rotation, t),
            a.translation.lerp(b.translation, t),
        )
    }

    /// World-space origin of the object at `time`
    pub fn location_at(&self, time: f32) -> Vec3 {
        self.matrix_at(time).transform_point3(Vec3::ZERO)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceGeometry {
    Mesh(TriangleMesh),
    Particles(ParticleSystem),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceRole {
    Flow(FlowSettings),
    Effector(EffectorSettings),
}

/// Cell-space vertex positions from the previous sample, used for vertex motion
#[derive(Debug, Clone, Default)]
pub struct VertexMotion {
    pub previous: Option<Vec<Vec3>>,
}

impl VertexMotion {
    pub fn clear(&mut self) {
        self.previous = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceObject {
    pub name: String,
    pub transform: AnimatedTransform,
    pub geometry: SourceGeometry,
    pub role: SourceRole,
    /// Geometry changes over time independently of the transform
    pub deforming: bool,
    /// Driven by an active rigid body simulation
    pub rigid_body: bool,
    /// Settings changed since the data cache was baked
    pub needs_update: bool,
    #[serde(skip)]
    pub motion: VertexMotion,
}

impl SourceObject {
    pub fn new(name: impl Into<String>, geometry: SourceGeometry, role: SourceRole) -> Self {
        Self {
            name: name.into(),
            transform: AnimatedTransform::fixed(Vec3::ZERO),
            geometry,
            role,
            deforming: false,
            rigid_body: false,
            needs_update: false,
            motion: VertexMotion::default(),
        }
    }

    pub fn with_transform(mut self, transform: AnimatedTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Neither animated, deformed nor simulated
    pub fn is_static(&self) -> bool {
        !self.deforming && !self.rigid_body && !self.transform.is_animated()
    }

    pub fn flow(&self) -> Option<&FlowSettings> {
        match &self.role {
            SourceRole::Flow(f) => Some(f),
            SourceRole::Effector(_) => None,
        }
    }

    pub fn effector(&self) -> Option<&EffectorSettings> {
        match &self.role {
            SourceRole::Effector(e) => Some(e),
            SourceRole::Flow(_) => None,
        }
    }

    /// Requested sub-frame count of the role
    pub fn subframes(&self) -> i32 {
        match &self.role {
            SourceRole::Flow(f) => f.subframes,
            SourceRole::Effector(e) => e.subframes,
        }
    }
}
