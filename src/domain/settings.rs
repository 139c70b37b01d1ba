//! User-facing domain configuration
//!
//! Everything here is plain data loaded from TOML. Convenience setters keep
//! related values consistent the way the editor would.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{atomic_write, load_error, DomainError, DomainErrorContext, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainType {
    Gas,
    Liquid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheMode {
    /// Read-only playback of a finished bake
    Final,
    /// Bake each channel separately, with pause and resume
    Modular,
    /// Bake on playback, one frame after the other
    Replay,
}

/// On-disk encoding of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheFormat {
    /// Uncompressed frame files
    Raw,
    /// Gzip-packed frame files
    Packed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawStyle {
    Wire,
    Solid,
}

/// Field shown by the viewport color ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayField {
    Density,
    Heat,
    Fuel,
    Flame,
    React,
    ColorR,
    ColorG,
    ColorB,
    VelocityX,
    VelocityY,
    VelocityZ,
    Phi,
    PhiIn,
    PhiOut,
    PhiObstacle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridPrecision {
    Full,
    Half,
    Mini,
}

/// One of the six domain walls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Border {
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
}

/// Secondary particle channels of liquid domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecondaryParticle {
    Flip,
    Spray,
    Bubble,
    Foam,
    Tracer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    pub enabled: bool,
    /// Cells of padding around detected content
    pub margin: i32,
    /// Minimum density/fuel/heat counted as content
    pub threshold: f32,
    /// How far the active region may leave the base box
    pub additional_res: i32,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            margin: 4,
            threshold: 0.002,
            additional_res: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub enabled: bool,
    /// Refinement factor between base and noise grids
    pub scale: i32,
    pub strength: f32,
    pub pos_scale: f32,
    pub time_anim: f32,
    pub seed: u32,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            scale: 2,
            strength: 1.0,
            pos_scale: 2.0,
            time_anim: 0.1,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideSettings {
    pub enabled: bool,
    pub alpha: f32,
    pub beta: i32,
    pub vel_factor: f32,
}

impl Default for GuideSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            alpha: 2.0,
            beta: 5,
            vel_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub mode: CacheMode,
    pub frame_start: i32,
    pub frame_end: i32,
    pub frame_offset: i32,
    /// Also write solver-internal fields so a bake can be resumed
    pub resumable: bool,
    pub export_script: bool,
    pub data_format: CacheFormat,
    pub noise_format: CacheFormat,
    pub mesh_format: CacheFormat,
    pub particle_format: CacheFormat,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("cache_fluid"),
            mode: CacheMode::Replay,
            frame_start: 1,
            frame_end: 250,
            frame_offset: 0,
            resumable: true,
            export_script: false,
            data_format: CacheFormat::Packed,
            noise_format: CacheFormat::Packed,
            mesh_format: CacheFormat::Raw,
            particle_format: CacheFormat::Packed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub draw_style: DrawStyle,
    pub color_field: DisplayField,
    pub precision: GridPrecision,
    /// Viewport shows a color-ramped field instead of plain density
    pub use_color_ramp: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            draw_style: DrawStyle::Wire,
            color_field: DisplayField::Density,
            precision: GridPrecision::Half,
            use_color_ramp: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderCollisions {
    pub front: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

impl BorderCollisions {
    pub fn set(&mut self, border: Border, closed: bool) {
        let flag = match border {
            Border::Front => &mut self.front,
            Border::Back => &mut self.back,
            Border::Left => &mut self.left,
            Border::Right => &mut self.right,
            Border::Top => &mut self.top,
            Border::Bottom => &mut self.bottom,
        };
        *flag = closed;
    }

    pub fn all_closed(&self) -> bool {
        self.front && self.back && self.left && self.right && self.top && self.bottom
    }

    pub fn all_open(&self) -> bool {
        !(self.front || self.back || self.left || self.right || self.top || self.bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleTypes {
    pub flip: bool,
    pub spray: bool,
    pub bubble: bool,
    pub foam: bool,
    pub tracer: bool,
}

impl ParticleTypes {
    pub fn contains(&self, kind: SecondaryParticle) -> bool {
        match kind {
            SecondaryParticle::Flip => self.flip,
            SecondaryParticle::Spray => self.spray,
            SecondaryParticle::Bubble => self.bubble,
            SecondaryParticle::Foam => self.foam,
            SecondaryParticle::Tracer => self.tracer,
        }
    }

    pub fn set(&mut self, kind: SecondaryParticle, enabled: bool) {
        let flag = match kind {
            SecondaryParticle::Flip => &mut self.flip,
            SecondaryParticle::Spray => &mut self.spray,
            SecondaryParticle::Bubble => &mut self.bubble,
            SecondaryParticle::Foam => &mut self.foam,
            SecondaryParticle::Tracer => &mut self.tracer,
        };
        *flag = enabled;
    }

    /// Secondary particles beyond plain FLIP need the particles channel
    pub fn any_secondary(&self) -> bool {
        self.spray || self.bubble || self.foam || self.tracer
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSettings {
    pub domain_type: DomainType,
    /// Cells along the longest domain axis
    pub max_resolution: i32,
    /// Cells at the grid edge never used as migration source or target
    pub boundary_width: i32,
    pub time_scale: f32,
    pub cfl_condition: f32,
    pub timesteps_minimum: i32,
    pub timesteps_maximum: i32,
    pub gravity: Vec3,
    /// Buoyancy from density
    pub alpha: f32,
    /// Buoyancy from heat
    pub beta: f32,
    pub dissolve_speed: f32,
    pub flame_smoke_color: Vec3,
    pub use_mesh: bool,
    pub border_collisions: BorderCollisions,
    pub particle_types: ParticleTypes,
    pub adaptive: AdaptiveSettings,
    pub noise: NoiseSettings,
    pub guide: GuideSettings,
    pub cache: CacheSettings,
    pub display: DisplaySettings,
}

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            domain_type: DomainType::Gas,
            max_resolution: 32,
            boundary_width: 1,
            time_scale: 1.0,
            cfl_condition: 4.0,
            timesteps_minimum: 1,
            timesteps_maximum: 4,
            gravity: Vec3::new(0.0, 0.0, -9.81),
            alpha: 1.0,
            beta: 1.0,
            dissolve_speed: 0.0,
            flame_smoke_color: Vec3::new(0.7, 0.7, 0.7),
            use_mesh: false,
            border_collisions: BorderCollisions::default(),
            particle_types: ParticleTypes::default(),
            adaptive: AdaptiveSettings::default(),
            noise: NoiseSettings::default(),
            guide: GuideSettings::default(),
            cache: CacheSettings::default(),
            display: DisplaySettings::default(),
        }
    }
}

impl DomainSettings {
    pub fn from_toml_str(s: &str) -> DomainResult<Self> {
        let settings: DomainSettings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| load_error(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Write the settings as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> DomainResult<()> {
        let content = toml::to_string_pretty(self).domain_context("Could not serialize settings")?;
        atomic_write(path.as_ref(), content.as_bytes())
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.max_resolution < 1 {
            return Err(DomainError::InvalidSettings(format!(
                "max_resolution must be positive, got {}",
                self.max_resolution
            )));
        }
        if self.noise.scale < 1 {
            return Err(DomainError::InvalidSettings(format!(
                "noise scale must be positive, got {}",
                self.noise.scale
            )));
        }
        if self.time_scale <= 0.0 {
            return Err(DomainError::InvalidSettings(format!(
                "time_scale must be positive, got {}",
                self.time_scale
            )));
        }
        if self.timesteps_minimum < 1 || self.timesteps_maximum < self.timesteps_minimum {
            return Err(DomainError::InvalidSettings(format!(
                "invalid time step range {}..{}",
                self.timesteps_minimum, self.timesteps_maximum
            )));
        }
        Ok(())
    }

    pub fn is_gas(&self) -> bool {
        self.domain_type == DomainType::Gas
    }

    pub fn is_liquid(&self) -> bool {
        self.domain_type == DomainType::Liquid
    }

    pub fn use_adaptive(&self) -> bool {
        self.adaptive.enabled
    }

    pub fn use_noise(&self) -> bool {
        self.is_gas() && self.noise.enabled
    }

    pub fn use_liquid_mesh(&self) -> bool {
        self.is_liquid() && self.use_mesh
    }

    pub fn use_liquid_particles(&self) -> bool {
        self.is_liquid() && self.particle_types.any_secondary()
    }

    /// Padding the adaptive region may extend beyond the base box
    pub fn adapt_pad(&self) -> i32 {
        if self.adaptive.enabled {
            self.adaptive.additional_res
        } else {
            0
        }
    }

    pub fn set_cache_frame_start(&mut self, value: i32) {
        self.cache.frame_start = value.min(self.cache.frame_end);
    }

    pub fn set_cache_frame_end(&mut self, value: i32) {
        self.cache.frame_end = value.max(self.cache.frame_start);
    }

    pub fn set_data_format(&mut self, format: CacheFormat) {
        if format == self.cache.data_format {
            return;
        }
        self.cache.data_format = format;
    }

    pub fn set_noise_format(&mut self, format: CacheFormat) {
        if format == self.cache.noise_format {
            return;
        }
        self.cache.noise_format = format;
    }

    pub fn set_mesh_format(&mut self, format: CacheFormat) {
        if format == self.cache.mesh_format {
            return;
        }
        self.cache.mesh_format = format;
    }

    pub fn set_particle_format(&mut self, format: CacheFormat) {
        if format == self.cache.particle_format {
            return;
        }
        self.cache.particle_format = format;
    }

    /// Close (`clear == false`) or open a domain wall
    pub fn set_collision_extent(&mut self, border: Border, clear: bool) {
        self.border_collisions.set(border, !clear);
    }

    pub fn set_particle_type(&mut self, kind: SecondaryParticle, clear: bool) {
        self.particle_types.set(kind, !clear);
    }

    /// Switch gas/liquid and reset the settings bundle tied to the type
    pub fn set_domain_type(&mut self, domain_type: DomainType) {
        const BORDERS: [Border; 6] = [
            Border::Front,
            Border::Back,
            Border::Right,
            Border::Left,
            Border::Top,
            Border::Bottom,
        ];

        match domain_type {
            DomainType::Gas => {
                for border in BORDERS {
                    self.set_collision_extent(border, true);
                }
                self.set_data_format(CacheFormat::Packed);
                self.set_noise_format(CacheFormat::Packed);
                self.set_mesh_format(CacheFormat::Raw);
                self.set_particle_format(CacheFormat::Packed);
                self.display.draw_style = DrawStyle::Wire;
            }
            DomainType::Liquid => {
                for border in BORDERS {
                    self.set_collision_extent(border, false);
                }
                self.set_data_format(CacheFormat::Packed);
                self.set_mesh_format(CacheFormat::Raw);
                self.set_particle_format(CacheFormat::Raw);
                self.display.draw_style = DrawStyle::Solid;
            }
        }

        self.domain_type = domain_type;
        self.fields_sanitize();
    }

    /// Fall back to a supported display field and precision for the domain type
    pub fn fields_sanitize(&mut self) {
        match self.domain_type {
            DomainType::Gas => {
                if matches!(
                    self.display.color_field,
                    DisplayField::Phi
                        | DisplayField::PhiIn
                        | DisplayField::PhiOut
                        | DisplayField::PhiObstacle
                ) {
                    self.display.color_field = DisplayField::Density;
                }
                if self.display.precision == GridPrecision::Mini {
                    self.display.precision = GridPrecision::Half;
                }
            }
            DomainType::Liquid => {
                if matches!(
                    self.display.color_field,
                    DisplayField::ColorR
                        | DisplayField::ColorG
                        | DisplayField::ColorB
                        | DisplayField::Density
                        | DisplayField::Flame
                        | DisplayField::Fuel
                        | DisplayField::Heat
                ) {
                    self.display.color_field = DisplayField::Phi;
                }
            }
        }
    }
}
