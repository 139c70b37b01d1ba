//! Domain state and lifecycle
//!
//! `DomainState` holds the geometry and timing of the simulation volume:
//! resolution, active sub-region, shift, world bounds and sub-step clock.
//! The grids themselves live in `solver::FluidGrids` and are owned by the
//! caller so they can be swapped behind a lock.

pub mod adaptive;
pub mod allocator;
pub mod particles;
pub mod probe;
pub mod settings;

pub use adaptive::adaptive_domain_adjust;
pub use allocator::{reallocate, reallocate_and_copy, GridSnapshot};
pub use particles::{CompanionParticles, DrawShape};
pub use probe::{velocity_at, ProbeResult};
pub use settings::{
    AdaptiveSettings, Border, CacheFormat, CacheMode, CacheSettings, DisplayField, DomainSettings,
    DomainType, SecondaryParticle,
};

use glam::{IVec3, Mat4, Vec3};

use crate::constants::grid::EPSILON;
use crate::constants::time::{DT_DEFAULT, FPS_REFERENCE};
use crate::emission::DomainLimits;
use crate::geometry::TriangleMesh;
use crate::grid::{cell_count, CellSpace};
use crate::solver::{ActiveFields, FluidGrids, GridLayout};

#[derive(Debug, Clone, PartialEq)]
pub struct DomainState {
    /// Resolution of the full domain box
    pub base_res: IVec3,
    /// Resolution of the active region
    pub res: IVec3,
    pub res_min: IVec3,
    pub res_max: IVec3,
    pub res_noise: IVec3,
    /// Whole cells the domain has moved since initialisation
    pub shift: IVec3,
    /// Accumulated translation in cells, offset by half a cell
    pub shift_f: Vec3,
    pub cell_size: Vec3,
    pub p0: Vec3,
    pub p1: Vec3,
    /// Domain corner before shifting
    pub dp0: Vec3,
    pub global_size: Vec3,
    /// Cell size normalised to the longest axis
    pub dx: f32,
    /// Scale the resolution was derived from
    pub scale: f32,
    pub dt: f32,
    pub frame_length: f32,
    pub time_per_frame: f32,
    pub time_total: f32,
    pub total_cells: usize,
    pub object_to_world: Mat4,
    pub world_to_object: Mat4,
    pub prev_loc: Vec3,
    pub active_fields: ActiveFields,
    pub active_color: Vec3,
    pub gravity_final: Vec3,
    pub last_frame: Option<i32>,
}

impl Default for DomainState {
    fn default() -> Self {
        Self {
            base_res: IVec3::ONE,
            res: IVec3::ZERO,
            res_min: IVec3::ZERO,
            res_max: IVec3::ZERO,
            res_noise: IVec3::ZERO,
            shift: IVec3::ZERO,
            shift_f: Vec3::ZERO,
            cell_size: Vec3::ONE,
            p0: Vec3::ZERO,
            p1: Vec3::ONE,
            dp0: Vec3::ZERO,
            global_size: Vec3::ONE,
            dx: 1.0,
            scale: 1.0,
            dt: DT_DEFAULT,
            frame_length: DT_DEFAULT,
            time_per_frame: 0.0,
            time_total: 0.0,
            total_cells: 0,
            object_to_world: Mat4::IDENTITY,
            world_to_object: Mat4::IDENTITY,
            prev_loc: Vec3::ZERO,
            active_fields: ActiveFields::default(),
            active_color: Vec3::ZERO,
            gravity_final: Vec3::ZERO,
            last_frame: None,
        }
    }
}

/// Frame length in solver time units
pub fn frame_length(fps: f32, time_scale: f32) -> f32 {
    DT_DEFAULT * (FPS_REFERENCE / fps) * time_scale
}

impl DomainState {
    pub fn cell_space(&self) -> CellSpace {
        CellSpace::new(self.world_to_object, self.p0, self.cell_size)
    }

    pub fn limits(&self, settings: &DomainSettings) -> DomainLimits {
        DomainLimits {
            base_res: self.base_res,
            adapt_pad: settings.adapt_pad(),
        }
    }

    pub fn layout(&self, settings: &DomainSettings) -> GridLayout {
        GridLayout {
            domain_type: settings.domain_type,
            active_fields: self.active_fields,
            active_color: self.active_color,
            noise_scale: settings.use_noise().then_some(settings.noise.scale),
        }
    }

    /// Update the object transform
    pub fn set_transform(&mut self, object_to_world: Mat4) {
        self.object_to_world = object_to_world;
        self.world_to_object = object_to_world.inverse();
    }

    /// Start a new output frame on the sub-step clock
    pub fn begin_frame(&mut self, fps: f32, settings: &DomainSettings) {
        self.frame_length = frame_length(fps, settings.time_scale);
        self.dt = self.frame_length;
        self.time_per_frame = 0.0;
    }

    /// Derive bounds, cell size and (with `init`) base resolution from the domain mesh.
    ///
    /// The longest axis gets `max_resolution` cells, the others are rounded with
    /// a floor of 4. A flat domain keeps its previous resolution.
    pub fn set_from_mesh(&mut self, settings: &DomainSettings, mesh: &TriangleMesh, init: bool) {
        let (min, max) = match mesh.bounds() {
            Some(b) => b,
            None => return,
        };
        let res = settings.max_resolution;

        self.p0 = min;
        self.p1 = max;
        self.dx = 1.0 / res as f32;

        let raw = max - min;
        let (object_scale, _, _) = self.object_to_world.to_scale_rotation_translation();
        let size = (raw * object_scale).abs();
        self.global_size = size;
        self.dp0 = min;

        if !init || size.min_element() < EPSILON {
            return;
        }

        let mut base = IVec3::ZERO;
        let axis = if size.x >= size.y.max(size.z) {
            0
        } else if size.y >= size.x.max(size.z) {
            1
        } else {
            2
        };
        let scale = res as f32 / size[axis];
        self.scale = size[axis] / object_scale[axis].abs();
        for i in 0..3 {
            base[i] = if i == axis {
                res
            } else {
                ((size[i] * scale + 0.5) as i32).max(4)
            };
        }

        self.base_res = base;
        self.cell_size = raw / base.as_vec3();
    }

    /// First-time setup. Returns the freshly allocated grids, `None` if
    /// allocation failed.
    pub fn initialize(
        &mut self,
        settings: &DomainSettings,
        mesh: &TriangleMesh,
        object_to_world: Mat4,
        gravity: Vec3,
        fps: f32,
        frame: i32,
    ) -> Option<FluidGrids> {
        self.set_transform(object_to_world);
        self.set_from_mesh(settings, mesh, true);
        self.gravity_final = gravity;

        self.shift = IVec3::ZERO;
        self.shift_f = Vec3::splat(0.5);
        self.prev_loc = object_to_world.transform_point3(Vec3::ZERO);

        let res = if settings.is_gas() && settings.use_adaptive() {
            IVec3::ONE
        } else {
            self.base_res
        };
        self.res = res;
        self.total_cells = cell_count(res);
        self.res_min = IVec3::ZERO;
        self.res_max = res;
        self.res_noise = res * settings.noise.scale;

        self.begin_frame(fps, settings);
        self.last_frame = Some(frame);

        let grids = FluidGrids::try_new(res, &self.layout(settings));
        if grids.is_none() {
            log::error!(
                "[domain::initialize] Could not allocate grids at {:?} ({} cells)",
                res,
                self.total_cells
            );
        }
        grids
    }

    /// Forget everything that depends on the grids
    pub fn reset(&mut self) {
        self.last_frame = None;
        self.total_cells = 0;
        self.active_fields = ActiveFields::default();
        self.time_total = 0.0;
    }

    /// Grid resolution differs from the active region recorded in the state
    pub fn needs_realloc(&self, grids: Option<&FluidGrids>) -> bool {
        match grids {
            Some(g) => g.res != self.res_max - self.res_min,
            None => true,
        }
    }

    /// World-space centre of active cell (x, y, z)
    pub fn voxel_center_world(&self, x: i32, y: i32, z: i32) -> Vec3 {
        let local = self.p0
            + self.cell_size * (IVec3::new(x, y, z) + self.res_min).as_vec3()
            + self.cell_size * 0.5;
        self.object_to_world.transform_point3(local)
    }
}

#[cfg(test)]
mod tests;
