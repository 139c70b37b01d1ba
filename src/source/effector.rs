use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectorType {
    Collision,
    Guide,
}

/// How guide velocities merge with what a cell already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuideMode {
    Averaged,
    Override,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectorSettings {
    pub effector_type: EffectorType,
    pub use_effector: bool,
    pub use_plane_init: bool,
    pub surface_distance: f32,
    pub subframes: i32,
    pub vel_multi: f32,
    pub guide_mode: GuideMode,
}

impl Default for EffectorSettings {
    fn default() -> Self {
        Self {
            effector_type: EffectorType::Collision,
            use_effector: true,
            use_plane_init: false,
            surface_distance: 0.0,
            subframes: 0,
            vel_multi: 1.0,
            guide_mode: GuideMode::Max,
        }
    }
}
