//! Mesh flow emission and effector level sets

use glam::{Mat4, Vec2, Vec3};
use rayon::prelude::*;

use super::{update_distance, vertex_velocities, SampleContext};
use crate::constants::sampling::{MESH_BOUNDS_MARGIN, SURFACE_SEARCH_RADIUS};
use crate::constants::time::{DT_DEFAULT, FPS_REFERENCE};
use crate::emission::{clamp_bounds_in_domain, FieldBuffer};
use crate::geometry::{barycentric_weights, TriangleIndex, TriangleMesh};
use crate::source::{
    EffectorSettings, EffectorType, FlowBehavior, FlowSettings, GuideMode, TextureMapping,
    TextureSampler, VertexMotion,
};

/// Mesh and lookup structures in cell space
struct CellMesh<'a> {
    mesh: &'a TriangleMesh,
    positions: Vec<Vec3>,
    index: TriangleIndex,
}

impl<'a> CellMesh<'a> {
    fn new(mesh: &'a TriangleMesh, positions: Vec<Vec3>) -> Self {
        let index = TriangleIndex::build(&positions, &mesh.triangles);
        Self {
            mesh,
            positions,
            index,
        }
    }

    fn vertices(&self, triangle: usize) -> [usize; 3] {
        let [a, b, c] = self.mesh.triangles[triangle];
        [a as usize, b as usize, c as usize]
    }

    /// Barycentric weights of `point` on `triangle`
    fn weights(&self, triangle: usize, point: Vec3) -> ([usize; 3], Vec3) {
        let v = self.vertices(triangle);
        let w = barycentric_weights(
            self.positions[v[0]],
            self.positions[v[1]],
            self.positions[v[2]],
            point,
        );
        (v, w)
    }
}

#[inline]
fn interp(values: &[Vec3], v: [usize; 3], w: Vec3) -> Vec3 {
    values[v[0]] * w.x + values[v[1]] * w.y + values[v[2]] * w.z
}

fn bounds_margin() -> i32 {
    MESH_BOUNDS_MARGIN.ceil() as i32
}

/// Emission buffer of a mesh flow
pub fn emit_from_mesh(
    mesh: &TriangleMesh,
    object_to_world: Mat4,
    flow: &FlowSettings,
    motion: &mut VertexMotion,
    ctx: &SampleContext,
) -> FieldBuffer {
    let mut buffer = FieldBuffer::new();
    if mesh.is_empty() {
        return buffer;
    }

    let positions = ctx.cell_positions(&mesh.positions, object_to_world);
    let vertex_vel = if flow.init_velocity {
        vertex_velocities(&positions, motion, ctx.shift, ctx.dt)
    } else {
        None
    };
    for &p in &positions {
        buffer.bound_insert(p);
    }
    let flow_center = ctx.space.world_to_cell(object_to_world.transform_point3(Vec3::ZERO));

    clamp_bounds_in_domain(
        &mut buffer.min,
        &mut buffer.max,
        None,
        None,
        bounds_margin(),
        ctx.dt,
        ctx.limits,
    );
    buffer.allocate(flow.init_velocity, true);

    if !flow.use_flow || !buffer.is_allocated() {
        return buffer;
    }

    let cell_mesh = CellMesh::new(mesh, positions);
    if cell_mesh.index.is_empty() {
        return buffer;
    }
    let sampler = FlowSampler {
        flow,
        normals: TriangleMesh::new(cell_mesh.positions.clone(), mesh.triangles.clone()).vertex_normals(),
        cell_mesh: &cell_mesh,
        vertex_vel: vertex_vel.as_deref(),
        flow_center,
        ctx,
        texture: flow.texture.as_ref().map(|t| t.sampler()),
    };
    let emits = matches!(flow.behavior, FlowBehavior::Geometry | FlowBehavior::Inflow);

    buffer.slabs_mut().into_par_iter().for_each(|mut slab| {
        let z = slab.z;
        for (x, y) in slab.cells() {
            let i = slab.index(x, y);
            let start = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5);

            if emits {
                let (influence, velocity) = sampler.sample(start, Vec3::new(x as f32, y as f32, z as f32));
                if let Some(inf) = slab.influence.as_deref_mut() {
                    inf[i] = influence;
                }
                if let Some(vel) = slab.velocity.as_deref_mut() {
                    vel[i] += velocity;
                }
            }

            update_distance(
                &mut slab.distance[i],
                &cell_mesh.index,
                start,
                flow.surface_distance,
                flow.use_plane_init,
            );
        }
    });

    buffer
}

struct FlowSampler<'a> {
    flow: &'a FlowSettings,
    cell_mesh: &'a CellMesh<'a>,
    normals: Vec<Vec3>,
    vertex_vel: Option<&'a [Vec3]>,
    flow_center: Vec3,
    ctx: &'a SampleContext,
    texture: Option<TextureSampler>,
}

impl FlowSampler<'_> {
    /// Influence and initial velocity at one cell
    fn sample(&self, start: Vec3, cell: Vec3) -> (f32, Vec3) {
        let flow = self.flow;
        let index = &self.cell_mesh.index;
        let is_gas = flow.flow_type.is_gas();
        let mut emission = if is_gas { 0.0 } else { 1.0 };
        let mut volume_factor = 0.0;
        let mut velocity = Vec3::ZERO;

        // inside a closed mesh: the +x hit faces along the ray and a -x ray also hits
        if is_gas && flow.volume_density != 0.0 {
            if let Some(hit) = index.ray_cast(start, Vec3::X) {
                if Vec3::X.dot(hit.normal) >= 0.0 && index.ray_cast(start, Vec3::NEG_X).is_some() {
                    volume_factor = flow.volume_density;
                }
            }
        }

        let nearest = match index.find_nearest(start, SURFACE_SEARCH_RADIUS * SURFACE_SEARCH_RADIUS) {
            Some(n) => n,
            None => return (f32::max(volume_factor, emission), velocity),
        };
        let (v, w) = self.cell_mesh.weights(nearest.triangle, nearest.point);

        if is_gas {
            emission = if flow.surface_distance != 0.0 {
                let d = (nearest.dist_sq.sqrt() / flow.surface_distance).clamp(0.0, 1.0);
                (1.0 - d).powf(0.5)
            } else {
                0.0
            };

            if let Some(weights) = self.cell_mesh.mesh.vertex_weights.as_ref() {
                emission *= weights[v[0]] * w.x + weights[v[1]] * w.y + weights[v[2]] * w.z;
            }

            if let Some(texture) = self.texture.as_ref() {
                let co = self.texture_coords(cell, nearest.triangle, w);
                emission *= texture.intensity(co);
            }
        }

        if flow.init_velocity && emission != 0.0 {
            if flow.vel_normal != 0.0 {
                let normal = interp(&self.normals, v, w).normalize_or_zero();
                velocity += normal * flow.vel_normal;
            }
            if let Some(vertex_vel) = self.vertex_vel {
                if flow.vel_multi != 0.0 {
                    velocity += interp(vertex_vel, v, w) * flow.vel_multi;
                }
            }
            // world units per second to cells per solver time unit
            let size_mult = self.ctx.base_res.max_element() as f32 / self.ctx.global_size.max_element();
            let time_mult = 1.0 / (FPS_REFERENCE * DT_DEFAULT);
            velocity += flow.vel_coord * size_mult * time_mult;
        }

        (f32::max(volume_factor, emission), velocity)
    }

    fn texture_coords(&self, cell: Vec3, triangle: usize, w: Vec3) -> Vec3 {
        let flow = self.flow;
        match flow.texture_mapping {
            TextureMapping::Auto => {
                let base = self.ctx.base_res.as_vec3();
                let mut co = (cell - self.flow_center) / base;
                co.z -= flow.texture_offset;
                co / flow.texture_size
            }
            TextureMapping::Uv => match self.cell_mesh.mesh.uvs.as_ref() {
                Some(uvs) => {
                    let [a, b, c] = uvs[triangle];
                    let uv: Vec2 = a * w.x + b * w.y + c * w.z;
                    Vec3::new(uv.x * 2.0 - 1.0, uv.y * 2.0 - 1.0, flow.texture_offset)
                }
                None => Vec3::ZERO,
            },
        }
    }
}

/// Level set, motion and object count of a mesh effector
pub fn obstacles_from_mesh(
    mesh: &TriangleMesh,
    object_to_world: Mat4,
    effector: &EffectorSettings,
    motion: &mut VertexMotion,
    ctx: &SampleContext,
) -> FieldBuffer {
    let mut buffer = FieldBuffer::new();
    if mesh.is_empty() {
        return buffer;
    }

    let positions = ctx.cell_positions(&mesh.positions, object_to_world);
    let vertex_vel = vertex_velocities(&positions, motion, ctx.shift, ctx.dt);
    for &p in &positions {
        buffer.bound_insert(p);
    }

    clamp_bounds_in_domain(
        &mut buffer.min,
        &mut buffer.max,
        None,
        None,
        bounds_margin(),
        ctx.dt,
        ctx.limits,
    );
    buffer.allocate(true, false);

    if !effector.use_effector || !buffer.is_allocated() {
        return buffer;
    }

    let cell_mesh = CellMesh::new(mesh, positions);
    if cell_mesh.index.is_empty() {
        return buffer;
    }
    let vertex_vel = vertex_vel.as_deref();

    buffer.slabs_mut().into_par_iter().for_each(|mut slab| {
        let z = slab.z;
        for (x, y) in slab.cells() {
            let i = slab.index(x, y);
            let start = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5);

            update_distance(
                &mut slab.distance[i],
                &cell_mesh.index,
                start,
                effector.surface_distance,
                effector.use_plane_init,
            );

            if let Some(vel) = slab.velocity.as_deref_mut() {
                vel[i] = effector_velocity(effector, &cell_mesh, vertex_vel, start, vel[i]);
            }

            if slab.distance[i] < 0.0 {
                slab.numobjs[i] += 1.0;
            }
        }
    });

    buffer
}

fn effector_velocity(
    effector: &EffectorSettings,
    cell_mesh: &CellMesh,
    vertex_vel: Option<&[Vec3]>,
    start: Vec3,
    current: Vec3,
) -> Vec3 {
    let vertex_vel = match vertex_vel {
        Some(v) => v,
        None => return Vec3::ZERO,
    };
    let nearest = match cell_mesh
        .index
        .find_nearest(start, SURFACE_SEARCH_RADIUS * SURFACE_SEARCH_RADIUS)
    {
        Some(n) => n,
        None => return Vec3::ZERO,
    };
    let (v, w) = cell_mesh.weights(nearest.triangle, nearest.point);
    let hit_vel = interp(vertex_vel, v, w);

    match effector.effector_type {
        EffectorType::Collision => hit_vel,
        EffectorType::Guide => {
            let hit_vel = hit_vel * effector.vel_multi;
            match effector.guide_mode {
                GuideMode::Averaged => (current + hit_vel) * 0.5,
                GuideMode::Override => hit_vel,
                GuideMode::Min => hit_vel.abs().min(current.abs()),
                GuideMode::Max => hit_vel.abs().max(current.abs()),
            }
        }
    }
}
