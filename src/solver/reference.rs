use glam::{IVec3, Vec3};
use noise::{NoiseFn, Perlin};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{FluidGrids, FluidSolver};
use crate::constants::grid::{EPSILON, FLAG_OBSTACLE};
use crate::domain::{DomainSettings, DomainState};
use crate::error::DomainResult;
use crate::grid::{grid_index, sample_trilinear};

/// Cell-space points on a liquid surface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfacePoints {
    pub frame: i32,
    pub points: Vec<[f32; 3]>,
}

#[derive(Serialize)]
struct ScriptExport<'a> {
    settings: &'a DomainSettings,
    base_res: [i32; 3],
    res: [i32; 3],
    dx: f32,
    frame_length: f32,
    gravity: [f32; 3],
}

/// Explicit smoke/liquid stepper: buoyancy, forces and semi-Lagrangian
/// advection of the scalar fields. Pressure is not projected.
pub struct ReferenceSolver {
    dt: f32,
    cfl: f32,
    timesteps_min: i32,
    timesteps_max: i32,
    alpha: f32,
    beta: f32,
    dissolve: f32,
    guide_alpha: f32,
    guide_vel_factor: f32,
    noise_strength: f32,
    noise_pos_scale: f32,
    noise_time_anim: f32,
    perlin: Perlin,
    pub steps_taken: usize,
    pub mesh: Option<SurfacePoints>,
    pub particles: Option<SurfacePoints>,
}

impl Default for ReferenceSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceSolver {
    pub fn new() -> Self {
        Self {
            dt: 0.1,
            cfl: 4.0,
            timesteps_min: 1,
            timesteps_max: 4,
            alpha: 1.0,
            beta: 1.0,
            dissolve: 0.0,
            guide_alpha: 2.0,
            guide_vel_factor: 2.0,
            noise_strength: 1.0,
            noise_pos_scale: 2.0,
            noise_time_anim: 0.1,
            perlin: Perlin::new(0),
            steps_taken: 0,
            mesh: None,
            particles: None,
        }
    }

    fn step_gas(&self, grids: &mut FluidGrids, state: &DomainState) {
        let n = grids.total_cells;
        let dt = state.dt;

        // inputs become the current state
        if let Some(smoke) = grids.smoke.as_mut() {
            smoke.density.copy_from_slice(&smoke.density_in);
        }
        if let Some(heat) = grids.heat.as_mut() {
            heat.heat.copy_from_slice(&heat.heat_in);
        }
        if let Some(fire) = grids.fire.as_mut() {
            fire.fuel.copy_from_slice(&fire.fuel_in);
            fire.react.copy_from_slice(&fire.react_in);
        }
        if let Some(color) = grids.color.as_mut() {
            color.r.copy_from_slice(&color.r_in);
            color.g.copy_from_slice(&color.g_in);
            color.b.copy_from_slice(&color.b_in);
        }

        if let Some(initial) = grids.initial_velocity.as_ref() {
            for i in 0..n {
                let v = initial.get(i);
                if grids.emission_in[i] > 0.0 && v != Vec3::ZERO {
                    grids.velocity.set(i, v);
                }
            }
        }

        let up = -state.gravity_final * state.dx;
        for i in 0..n {
            let d = grids.smoke.as_ref().map_or(0.0, |s| s.density[i]);
            let h = grids.heat.as_ref().map_or(0.0, |h| h.heat[i]);
            let buoyancy = up * (self.alpha * d + self.beta * h);
            grids.velocity.add(i, (buoyancy + grids.force.get(i)) * dt);
        }

        if let Some(guide) = grids.guide.as_ref() {
            let blend = (self.guide_alpha * dt).min(1.0);
            for i in 0..n {
                if guide.num_guide[i] > 0.0 {
                    let v = grids.velocity.get(i);
                    grids.velocity.set(i, v + (guide.velocity.get(i) - v) * blend);
                }
            }
        }

        self.apply_obstacles(grids);

        let vel = [
            grids.velocity.x.clone(),
            grids.velocity.y.clone(),
            grids.velocity.z.clone(),
        ];
        let res = grids.res;
        if let Some(smoke) = grids.smoke.as_mut() {
            advect(&mut smoke.density, &vel, res, dt);
            let keep = (1.0 - self.dissolve * dt).clamp(0.0, 1.0);
            smoke.density.iter_mut().for_each(|d| *d *= keep);
        }
        if let Some(heat) = grids.heat.as_mut() {
            advect(&mut heat.heat, &vel, res, dt);
        }
        if let Some(fire) = grids.fire.as_mut() {
            advect(&mut fire.fuel, &vel, res, dt);
            advect(&mut fire.react, &vel, res, dt);
            for i in 0..n {
                fire.flame[i] = if fire.fuel[i] > EPSILON { fire.react[i] } else { 0.0 };
            }
        }
        if let Some(color) = grids.color.as_mut() {
            advect(&mut color.r, &vel, res, dt);
            advect(&mut color.g, &vel, res, dt);
            advect(&mut color.b, &vel, res, dt);
        }
    }

    fn step_liquid(&self, grids: &mut FluidGrids) {
        let n = grids.total_cells;
        let outflow = grids.outflow.as_ref();
        if let Some(liquid) = grids.liquid.as_mut() {
            for i in 0..n {
                let mut phi = liquid.phi[i].min(grids.phi_in[i]).min(grids.phistatic_in[i]);
                if let Some(out) = outflow {
                    phi = phi.max(-out.phiout_in[i].min(out.phioutstatic_in[i]));
                }
                liquid.phi[i] = phi;
            }
        }
        self.apply_obstacles(grids);
    }

    fn apply_obstacles(&self, grids: &mut FluidGrids) {
        let obstacle = match grids.obstacle.as_ref() {
            Some(o) => o,
            None => return,
        };
        for i in 0..grids.total_cells {
            let inside = obstacle.phi_obs_in[i] < 0.0 || obstacle.phi_obsstatic_in[i] < 0.0;
            if inside {
                grids.flags[i] |= FLAG_OBSTACLE;
                let v = if obstacle.num_obstacle[i] > 0.0 {
                    obstacle.velocity.get(i) / obstacle.num_obstacle[i]
                } else {
                    Vec3::ZERO
                };
                grids.velocity.set(i, v);
            } else {
                grids.flags[i] &= !FLAG_OBSTACLE;
            }
        }
    }
}

/// Semi-Lagrangian advection of one field, parallel over z slabs
fn advect(field: &mut [f32], vel: &[Vec<f32>; 3], res: IVec3, dt: f32) {
    let source = field.to_vec();
    let slab = (res.x * res.y) as usize;
    let inv_res = res.as_vec3().recip();

    field.par_chunks_mut(slab).enumerate().for_each(|(z, out)| {
        let z = z as i32;
        for y in 0..res.y {
            for x in 0..res.x {
                let i = grid_index(x, y, z, res);
                let v = Vec3::new(vel[0][i], vel[1][i], vel[2][i]);
                let back = Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5) - v * dt;
                out[(x + res.x * y) as usize] = sample_trilinear(&source, res, back * inv_res);
            }
        }
    });
}

impl FluidSolver for ReferenceSolver {
    fn adapt_timestep(&mut self, grids: &FluidGrids, state: &DomainState) {
        let vmax = (0..grids.total_cells)
            .map(|i| grids.velocity.get(i).length())
            .fold(0.0f32, f32::max);

        let frame_length = state.frame_length;
        let dt_max = frame_length / self.timesteps_min.max(1) as f32;
        let dt_min = frame_length / self.timesteps_max.max(self.timesteps_min).max(1) as f32;
        let mut dt = if vmax > EPSILON { self.cfl / vmax } else { dt_max };
        dt = dt.clamp(dt_min, dt_max);

        let remaining = frame_length - state.time_per_frame;
        if remaining > EPSILON {
            dt = dt.min(remaining);
        }
        self.dt = dt;
    }

    fn timestep(&self) -> f32 {
        self.dt
    }

    fn update_variables(&mut self, settings: &DomainSettings, _state: &DomainState) {
        self.cfl = settings.cfl_condition;
        self.timesteps_min = settings.timesteps_minimum;
        self.timesteps_max = settings.timesteps_maximum;
        self.alpha = settings.alpha;
        self.beta = settings.beta;
        self.dissolve = settings.dissolve_speed;
        self.guide_alpha = settings.guide.alpha;
        self.guide_vel_factor = settings.guide.vel_factor;
        self.noise_strength = settings.noise.strength;
        self.noise_pos_scale = settings.noise.pos_scale;
        self.noise_time_anim = settings.noise.time_anim;
        self.perlin = Perlin::new(settings.noise.seed);
    }

    fn step(&mut self, grids: &mut FluidGrids, state: &DomainState, _frame: i32) -> DomainResult<()> {
        if grids.is_gas() {
            self.step_gas(grids, state);
        } else {
            self.step_liquid(grids);
        }
        self.steps_taken += 1;
        Ok(())
    }

    fn bake_noise(&mut self, grids: &mut FluidGrids, state: &DomainState, _frame: i32) -> DomainResult<()> {
        let res = grids.res;
        let base_density = grids.density().map(|d| d.to_vec()).unwrap_or_default();
        let base_fuel = grids.fuel().map(|f| f.to_vec());
        let time = (state.time_total * self.noise_time_anim) as f64;
        let (strength, pos_scale) = (self.noise_strength, self.noise_pos_scale as f64);
        let perlin = &self.perlin;

        let noise = match grids.noise.as_mut() {
            Some(noise) => noise,
            None => return Ok(()),
        };
        if base_density.is_empty() {
            return Ok(());
        }

        let nres = noise.res;
        let scale = (nres.x / res.x.max(1)).max(1);
        let inv = nres.as_vec3().recip();
        let tex = &noise.tex;

        let mut i = 0;
        for z in 0..nres.z {
            for y in 0..nres.y {
                for x in 0..nres.x {
                    let base = IVec3::new(x, y, z) / scale;
                    let bi = grid_index(base.x, base.y, base.z, res);
                    let co = [
                        tex[0][bi] as f64 * pos_scale,
                        tex[1][bi] as f64 * pos_scale,
                        tex[2][bi] as f64 * pos_scale + time,
                    ];
                    let detail = 1.0 + strength * perlin.get(co) as f32;
                    let pos01 = (Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5)) * inv;
                    let d = sample_trilinear(&base_density, res, pos01);
                    noise.density[i] = (d * detail).max(0.0);
                    if let (Some(fire), Some(fuel)) = (noise.fire.as_mut(), base_fuel.as_ref()) {
                        fire[0][i] = (sample_trilinear(fuel, res, pos01) * detail).max(0.0);
                    }
                    i += 1;
                }
            }
        }
        Ok(())
    }

    fn bake_mesh(&mut self, grids: &FluidGrids, _state: &DomainState, frame: i32) -> DomainResult<Vec<u8>> {
        let surface = SurfacePoints {
            frame,
            points: surface_cells(grids),
        };
        let payload = bincode::serialize(&surface)?;
        self.mesh = Some(surface);
        Ok(payload)
    }

    fn bake_particles(&mut self, grids: &FluidGrids, _state: &DomainState, frame: i32) -> DomainResult<Vec<u8>> {
        // fast surface cells shed spray
        let points = surface_cells(grids)
            .into_iter()
            .filter(|p| {
                let c = IVec3::new(p[0] as i32, p[1] as i32, p[2] as i32);
                let v = grids.velocity.get(grid_index(c.x, c.y, c.z, grids.res));
                v.length() > 1.0
            })
            .collect();
        let particles = SurfacePoints { frame, points };
        let payload = bincode::serialize(&particles)?;
        self.particles = Some(particles);
        Ok(payload)
    }

    fn bake_guiding(&mut self, grids: &mut FluidGrids, _state: &DomainState, _frame: i32) -> DomainResult<()> {
        if let Some(guide) = grids.guide.as_mut() {
            let f = self.guide_vel_factor;
            guide.velocity.x.iter_mut().for_each(|v| *v *= f);
            guide.velocity.y.iter_mut().for_each(|v| *v *= f);
            guide.velocity.z.iter_mut().for_each(|v| *v *= f);
        }
        Ok(())
    }

    fn load_mesh(&mut self, _frame: i32, payload: &[u8]) -> DomainResult<()> {
        self.mesh = Some(bincode::deserialize(payload)?);
        Ok(())
    }

    fn load_particles(&mut self, _frame: i32, payload: &[u8]) -> DomainResult<()> {
        self.particles = Some(bincode::deserialize(payload)?);
        Ok(())
    }

    fn export_script(&self, settings: &DomainSettings, state: &DomainState) -> DomainResult<String> {
        let export = ScriptExport {
            settings,
            base_res: state.base_res.to_array(),
            res: state.res.to_array(),
            dx: state.dx,
            frame_length: state.frame_length,
            gravity: state.gravity_final.to_array(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

/// Liquid cells with an outside neighbour along x, y or z
fn surface_cells(grids: &FluidGrids) -> Vec<[f32; 3]> {
    let phi = match grids.liquid.as_ref() {
        Some(l) => &l.phi,
        None => return Vec::new(),
    };
    let res = grids.res;
    let mut points = Vec::new();
    for z in 0..res.z {
        for y in 0..res.y {
            for x in 0..res.x {
                if phi[grid_index(x, y, z, res)] >= 0.0 {
                    continue;
                }
                let outside = [IVec3::X, IVec3::Y, IVec3::Z, -IVec3::X, -IVec3::Y, -IVec3::Z]
                    .iter()
                    .map(|d| IVec3::new(x, y, z) + *d)
                    .filter(|p| p.cmpge(IVec3::ZERO).all() && p.cmplt(res).all())
                    .any(|p| phi[grid_index(p.x, p.y, p.z, res)] >= 0.0);
                if outside {
                    points.push([x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5]);
                }
            }
        }
    }
    points
}
