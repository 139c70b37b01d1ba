//! Solver grid storage
//!
//! One `FluidGrids` value is the complete simulation state of a domain at its
//! current active resolution. Optional groups exist only while some source
//! needs them. Resizing never mutates a grid in place: a new value is built and
//! swapped in.

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::constants::grid::PHI_MAX;
use crate::domain::settings::DomainType;
use crate::grid::cell_count;

/// Fields that some flow or effector currently requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActiveFields {
    pub invel: bool,
    pub outflow: bool,
    pub heat: bool,
    pub fire: bool,
    pub colors: bool,
    pub color_set: bool,
    pub obstacle: bool,
    pub guide: bool,
}

/// Allocate `n` copies of `value`, `None` if the allocator refuses
pub(crate) fn try_filled<T: Clone>(n: usize, value: T) -> Option<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(n).ok()?;
    v.resize(n, value);
    Some(v)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorGrid {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
}

impl VectorGrid {
    pub fn try_zeros(n: usize) -> Option<Self> {
        Some(Self {
            x: try_filled(n, 0.0)?,
            y: try_filled(n, 0.0)?,
            z: try_filled(n, 0.0)?,
        })
    }

    #[inline]
    pub fn get(&self, i: usize) -> Vec3 {
        Vec3::new(self.x[i], self.y[i], self.z[i])
    }

    #[inline]
    pub fn set(&mut self, i: usize, v: Vec3) {
        self.x[i] = v.x;
        self.y[i] = v.y;
        self.z[i] = v.z;
    }

    #[inline]
    pub fn add(&mut self, i: usize, v: Vec3) {
        self.x[i] += v.x;
        self.y[i] += v.y;
        self.z[i] += v.z;
    }

    pub fn fill(&mut self, v: Vec3) {
        self.x.fill(v.x);
        self.y.fill(v.y);
        self.z.fill(v.z);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmokeGrids {
    pub density: Vec<f32>,
    pub density_in: Vec<f32>,
    pub shadow: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidGrids {
    pub phi: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatGrids {
    pub heat: Vec<f32>,
    pub heat_in: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FireGrids {
    pub fuel: Vec<f32>,
    pub fuel_in: Vec<f32>,
    pub react: Vec<f32>,
    pub react_in: Vec<f32>,
    pub flame: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorGrids {
    pub r: Vec<f32>,
    pub g: Vec<f32>,
    pub b: Vec<f32>,
    pub r_in: Vec<f32>,
    pub g_in: Vec<f32>,
    pub b_in: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutflowGrids {
    pub phiout_in: Vec<f32>,
    pub phioutstatic_in: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleGrids {
    pub phi_obs_in: Vec<f32>,
    pub phi_obsstatic_in: Vec<f32>,
    pub num_obstacle: Vec<f32>,
    pub velocity: VectorGrid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuideGrids {
    pub phi_guide_in: Vec<f32>,
    pub num_guide: Vec<f32>,
    pub velocity: VectorGrid,
}

/// Refined smoke fields at `res * noise_scale`; texture coordinates stay at base res
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseGrids {
    pub res: IVec3,
    pub density: Vec<f32>,
    pub fire: Option<[Vec<f32>; 3]>,
    pub color: Option<[Vec<f32>; 3]>,
    pub tex: [Vec<f32>; 3],
    pub tex2: [Vec<f32>; 3],
}

impl NoiseGrids {
    pub fn fuel(&self) -> Option<&[f32]> {
        self.fire.as_ref().map(|f| f[0].as_slice())
    }
}

/// What to allocate for a new grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub domain_type: DomainType,
    pub active_fields: ActiveFields,
    pub active_color: Vec3,
    /// Refinement factor when noise is enabled
    pub noise_scale: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FluidGrids {
    pub res: IVec3,
    pub total_cells: usize,
    pub flags: Vec<i32>,
    pub velocity: VectorGrid,
    pub force: VectorGrid,
    pub phi_in: Vec<f32>,
    pub phistatic_in: Vec<f32>,
    pub emission_in: Vec<f32>,
    pub smoke: Option<SmokeGrids>,
    pub liquid: Option<LiquidGrids>,
    pub heat: Option<HeatGrids>,
    pub fire: Option<FireGrids>,
    pub color: Option<ColorGrids>,
    pub outflow: Option<OutflowGrids>,
    pub initial_velocity: Option<VectorGrid>,
    pub obstacle: Option<ObstacleGrids>,
    pub guide: Option<GuideGrids>,
    pub noise: Option<NoiseGrids>,
}

impl FluidGrids {
    /// Allocate every grid for `res`. `None` for degenerate resolutions or
    /// when memory is unavailable.
    pub fn try_new(res: IVec3, layout: &GridLayout) -> Option<Self> {
        let n = cell_count(res);
        if n == 0 {
            return None;
        }

        let (smoke, liquid) = match layout.domain_type {
            DomainType::Gas => (
                Some(SmokeGrids {
                    density: try_filled(n, 0.0)?,
                    density_in: try_filled(n, 0.0)?,
                    shadow: try_filled(n, 0.0)?,
                }),
                None,
            ),
            DomainType::Liquid => (None, Some(LiquidGrids { phi: try_filled(n, PHI_MAX)? })),
        };

        let noise = match (layout.domain_type, layout.noise_scale) {
            (DomainType::Gas, Some(scale)) if scale > 0 => {
                let noise_res = res * scale;
                let m = cell_count(noise_res);
                Some(NoiseGrids {
                    res: noise_res,
                    density: try_filled(m, 0.0)?,
                    fire: None,
                    color: None,
                    tex: base_texture_coords(res, false)?,
                    tex2: base_texture_coords(res, true)?,
                })
            }
            _ => None,
        };

        let mut grids = Self {
            res,
            total_cells: n,
            flags: try_filled(n, 0)?,
            velocity: VectorGrid::try_zeros(n)?,
            force: VectorGrid::try_zeros(n)?,
            phi_in: try_filled(n, PHI_MAX)?,
            phistatic_in: try_filled(n, PHI_MAX)?,
            emission_in: try_filled(n, 0.0)?,
            smoke,
            liquid,
            heat: None,
            fire: None,
            color: None,
            outflow: None,
            initial_velocity: None,
            obstacle: None,
            guide: None,
            noise,
        };

        if !grids.ensure_flow_fields(&layout.active_fields, layout.active_color)
            || !grids.ensure_obstacle_fields(&layout.active_fields)
        {
            return None;
        }
        Some(grids)
    }

    pub fn is_gas(&self) -> bool {
        self.smoke.is_some()
    }

    pub fn density(&self) -> Option<&[f32]> {
        self.smoke.as_ref().map(|s| s.density.as_slice())
    }

    pub fn fuel(&self) -> Option<&[f32]> {
        self.fire.as_ref().map(|f| f.fuel.as_slice())
    }

    /// Create flow-related optional groups required by `active`. Returns false
    /// when an allocation fails.
    pub fn ensure_flow_fields(&mut self, active: &ActiveFields, active_color: Vec3) -> bool {
        let n = self.total_cells;

        if active.invel && self.initial_velocity.is_none() {
            match VectorGrid::try_zeros(n) {
                Some(v) => self.initial_velocity = Some(v),
                None => return false,
            }
        }
        if active.outflow && self.outflow.is_none() {
            match (try_filled(n, PHI_MAX), try_filled(n, PHI_MAX)) {
                (Some(phiout_in), Some(phioutstatic_in)) => {
                    self.outflow = Some(OutflowGrids { phiout_in, phioutstatic_in })
                }
                _ => return false,
            }
        }

        if !self.is_gas() {
            return true;
        }

        if active.heat && self.heat.is_none() {
            match (try_filled(n, 0.0), try_filled(n, 0.0)) {
                (Some(heat), Some(heat_in)) => self.heat = Some(HeatGrids { heat, heat_in }),
                _ => return false,
            }
        }
        if active.fire && self.fire.is_none() {
            let fire = (|| {
                Some(FireGrids {
                    fuel: try_filled(n, 0.0)?,
                    fuel_in: try_filled(n, 0.0)?,
                    react: try_filled(n, 0.0)?,
                    react_in: try_filled(n, 0.0)?,
                    flame: try_filled(n, 0.0)?,
                })
            })();
            match fire {
                Some(f) => self.fire = Some(f),
                None => return false,
            }
            if let Some(noise) = self.noise.as_mut() {
                let m = cell_count(noise.res);
                match (try_filled(m, 0.0), try_filled(m, 0.0), try_filled(m, 0.0)) {
                    (Some(a), Some(b), Some(c)) => noise.fire = Some([a, b, c]),
                    _ => return false,
                }
            }
        }
        if active.colors && self.color.is_none() {
            // existing smoke takes the active color
            let density = self.density().map(|d| d.to_vec()).unwrap_or_default();
            let channel = |c: f32| -> Option<Vec<f32>> {
                let mut v = try_filled(n, 0.0)?;
                for (dst, d) in v.iter_mut().zip(density.iter()) {
                    *dst = c * d;
                }
                Some(v)
            };
            let color = (|| {
                Some(ColorGrids {
                    r: channel(active_color.x)?,
                    g: channel(active_color.y)?,
                    b: channel(active_color.z)?,
                    r_in: channel(active_color.x)?,
                    g_in: channel(active_color.y)?,
                    b_in: channel(active_color.z)?,
                })
            })();
            match color {
                Some(c) => self.color = Some(c),
                None => return false,
            }
            if let Some(noise) = self.noise.as_mut() {
                let m = cell_count(noise.res);
                match (try_filled(m, 0.0), try_filled(m, 0.0), try_filled(m, 0.0)) {
                    (Some(a), Some(b), Some(c)) => noise.color = Some([a, b, c]),
                    _ => return false,
                }
            }
        }
        true
    }

    /// Create obstacle and guide groups required by `active`
    pub fn ensure_obstacle_fields(&mut self, active: &ActiveFields) -> bool {
        let n = self.total_cells;
        if active.obstacle && self.obstacle.is_none() {
            let obstacle = (|| {
                Some(ObstacleGrids {
                    phi_obs_in: try_filled(n, PHI_MAX)?,
                    phi_obsstatic_in: try_filled(n, PHI_MAX)?,
                    num_obstacle: try_filled(n, 0.0)?,
                    velocity: VectorGrid::try_zeros(n)?,
                })
            })();
            match obstacle {
                Some(o) => self.obstacle = Some(o),
                None => return false,
            }
        }
        if active.guide && self.guide.is_none() {
            let guide = (|| {
                Some(GuideGrids {
                    phi_guide_in: try_filled(n, PHI_MAX)?,
                    num_guide: try_filled(n, 0.0)?,
                    velocity: VectorGrid::try_zeros(n)?,
                })
            })();
            match guide {
                Some(g) => self.guide = Some(g),
                None => return false,
            }
        }
        true
    }

    /// Named scalar field, as stored in cache files
    pub fn field(&self, name: &str) -> Option<&Vec<f32>> {
        let f = match name {
            "density" => &self.smoke.as_ref()?.density,
            "shadow" => &self.smoke.as_ref()?.shadow,
            "phi" => &self.liquid.as_ref()?.phi,
            "heat" => &self.heat.as_ref()?.heat,
            "fuel" => &self.fire.as_ref()?.fuel,
            "react" => &self.fire.as_ref()?.react,
            "flame" => &self.fire.as_ref()?.flame,
            "color_r" => &self.color.as_ref()?.r,
            "color_g" => &self.color.as_ref()?.g,
            "color_b" => &self.color.as_ref()?.b,
            "velocity_x" => &self.velocity.x,
            "velocity_y" => &self.velocity.y,
            "velocity_z" => &self.velocity.z,
            "guide_velocity_x" => &self.guide.as_ref()?.velocity.x,
            "guide_velocity_y" => &self.guide.as_ref()?.velocity.y,
            "guide_velocity_z" => &self.guide.as_ref()?.velocity.z,
            "noise_density" => &self.noise.as_ref()?.density,
            "noise_fuel" => &self.noise.as_ref()?.fire.as_ref()?[0],
            "noise_react" => &self.noise.as_ref()?.fire.as_ref()?[1],
            "noise_flame" => &self.noise.as_ref()?.fire.as_ref()?[2],
            "noise_color_r" => &self.noise.as_ref()?.color.as_ref()?[0],
            "noise_color_g" => &self.noise.as_ref()?.color.as_ref()?[1],
            "noise_color_b" => &self.noise.as_ref()?.color.as_ref()?[2],
            "noise_tex_u" => &self.noise.as_ref()?.tex[0],
            "noise_tex_v" => &self.noise.as_ref()?.tex[1],
            "noise_tex_w" => &self.noise.as_ref()?.tex[2],
            "noise_tex_u2" => &self.noise.as_ref()?.tex2[0],
            "noise_tex_v2" => &self.noise.as_ref()?.tex2[1],
            "noise_tex_w2" => &self.noise.as_ref()?.tex2[2],
            _ => return None,
        };
        Some(f)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Vec<f32>> {
        let f = match name {
            "density" => &mut self.smoke.as_mut()?.density,
            "shadow" => &mut self.smoke.as_mut()?.shadow,
            "phi" => &mut self.liquid.as_mut()?.phi,
            "heat" => &mut self.heat.as_mut()?.heat,
            "fuel" => &mut self.fire.as_mut()?.fuel,
            "react" => &mut self.fire.as_mut()?.react,
            "flame" => &mut self.fire.as_mut()?.flame,
            "color_r" => &mut self.color.as_mut()?.r,
            "color_g" => &mut self.color.as_mut()?.g,
            "color_b" => &mut self.color.as_mut()?.b,
            "velocity_x" => &mut self.velocity.x,
            "velocity_y" => &mut self.velocity.y,
            "velocity_z" => &mut self.velocity.z,
            "guide_velocity_x" => &mut self.guide.as_mut()?.velocity.x,
            "guide_velocity_y" => &mut self.guide.as_mut()?.velocity.y,
            "guide_velocity_z" => &mut self.guide.as_mut()?.velocity.z,
            "noise_density" => &mut self.noise.as_mut()?.density,
            "noise_fuel" => &mut self.noise.as_mut()?.fire.as_mut()?[0],
            "noise_react" => &mut self.noise.as_mut()?.fire.as_mut()?[1],
            "noise_flame" => &mut self.noise.as_mut()?.fire.as_mut()?[2],
            "noise_color_r" => &mut self.noise.as_mut()?.color.as_mut()?[0],
            "noise_color_g" => &mut self.noise.as_mut()?.color.as_mut()?[1],
            "noise_color_b" => &mut self.noise.as_mut()?.color.as_mut()?[2],
            "noise_tex_u" => &mut self.noise.as_mut()?.tex[0],
            "noise_tex_v" => &mut self.noise.as_mut()?.tex[1],
            "noise_tex_w" => &mut self.noise.as_mut()?.tex[2],
            "noise_tex_u2" => &mut self.noise.as_mut()?.tex2[0],
            "noise_tex_v2" => &mut self.noise.as_mut()?.tex2[1],
            "noise_tex_w2" => &mut self.noise.as_mut()?.tex2[2],
            _ => return None,
        };
        Some(f)
    }
}

/// Field names per cache file
pub mod fields {
    pub const DATA_DISPLAY: &[&str] = &[
        "density", "heat", "fuel", "react", "flame", "color_r", "color_g", "color_b", "shadow", "phi",
    ];
    pub const DATA_RESUME: &[&str] = &["velocity_x", "velocity_y", "velocity_z"];
    pub const NOISE_DISPLAY: &[&str] = &[
        "noise_density",
        "noise_fuel",
        "noise_react",
        "noise_flame",
        "noise_color_r",
        "noise_color_g",
        "noise_color_b",
    ];
    pub const NOISE_RESUME: &[&str] = &[
        "noise_tex_u",
        "noise_tex_v",
        "noise_tex_w",
        "noise_tex_u2",
        "noise_tex_v2",
        "noise_tex_w2",
    ];
    pub const GUIDE: &[&str] = &["guide_velocity_x", "guide_velocity_y", "guide_velocity_z"];
}

/// Texture coordinates at cell centres, the second set offset by half a cell
fn base_texture_coords(res: IVec3, offset: bool) -> Option<[Vec<f32>; 3]> {
    let n = cell_count(res);
    let mut u = try_filled(n, 0.0)?;
    let mut v = try_filled(n, 0.0)?;
    let mut w = try_filled(n, 0.0)?;
    let shift = if offset { 0.5 } else { 0.0 };
    let mut i = 0;
    for z in 0..res.z {
        for y in 0..res.y {
            for x in 0..res.x {
                u[i] = (x as f32 + 0.5 + shift) / res.x as f32;
                v[i] = (y as f32 + 0.5 + shift) / res.y as f32;
                w[i] = (z as f32 + 0.5 + shift) / res.z as f32;
                i += 1;
            }
        }
    }
    Some([u, v, w])
}
