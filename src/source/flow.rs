use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::texture::{EmissionTexture, TextureMapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowType {
    Smoke,
    Fire,
    SmokeFire,
    Liquid,
}

impl FlowType {
    pub fn is_gas(self) -> bool {
        !matches!(self, FlowType::Liquid)
    }

    pub fn emits_smoke(self) -> bool {
        matches!(self, FlowType::Smoke | FlowType::SmokeFire)
    }

    pub fn emits_fire(self) -> bool {
        matches!(self, FlowType::Fire | FlowType::SmokeFire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowBehavior {
    Inflow,
    Outflow,
    /// Initial fluid volume, only emitted on the first frame
    Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    pub flow_type: FlowType,
    pub behavior: FlowBehavior,
    pub use_flow: bool,
    /// Overwrite density-like fields instead of accumulating
    pub absolute: bool,
    pub init_velocity: bool,
    /// Particle flows: emit a radius around each particle
    pub use_particle_size: bool,
    /// Planar meshes: nearest-surface distance instead of the ray sign test
    pub use_plane_init: bool,

    pub density: f32,
    pub color: Vec3,
    pub fuel_amount: f32,
    pub temperature: f32,
    pub volume_density: f32,
    pub surface_distance: f32,
    pub particle_size: f32,
    pub subframes: i32,

    pub vel_multi: f32,
    pub vel_normal: f32,
    pub vel_coord: Vec3,

    pub texture: Option<EmissionTexture>,
    pub texture_mapping: TextureMapping,
    pub texture_size: f32,
    pub texture_offset: f32,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            flow_type: FlowType::Smoke,
            behavior: FlowBehavior::Inflow,
            use_flow: true,
            absolute: false,
            init_velocity: false,
            use_particle_size: false,
            use_plane_init: false,
            density: 1.0,
            color: Vec3::splat(0.7),
            fuel_amount: 1.0,
            temperature: 1.0,
            volume_density: 0.0,
            surface_distance: 1.5,
            particle_size: 1.0,
            subframes: 0,
            vel_multi: 1.0,
            vel_normal: 0.0,
            vel_coord: Vec3::ZERO,
            texture: None,
            texture_mapping: TextureMapping::Auto,
            texture_size: 1.0,
            texture_offset: 0.0,
        }
    }
}

impl FlowSettings {
    /// Switch flow type, resetting behavior to the type's natural one
    pub fn set_type(&mut self, flow_type: FlowType) {
        self.flow_type = flow_type;
        self.behavior = match flow_type {
            FlowType::Liquid => FlowBehavior::Geometry,
            _ => FlowBehavior::Inflow,
        };
    }

    /// Fuel is only carried by fire-capable flows with a non-zero amount
    pub fn has_fuel(&self) -> bool {
        self.fuel_amount != 0.0 && self.flow_type != FlowType::Smoke
    }
}
