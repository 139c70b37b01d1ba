//! Collision and guide effectors

use glam::{IVec3, Vec3};

use super::sampling::{sample_with_subframes, FrameKind, StepTiming};
use crate::constants::grid::PHI_MAX;
use crate::domain::{DomainSettings, DomainState};
use crate::emission::FieldBuffer;
use crate::grid::{grid_index, in_bounds};
use crate::solver::{FluidGrids, VectorGrid};
use crate::source::{EffectorType, SourceObject, SourceRole};

/// Recompute the obstacle and guide flags. Returns true when an effector
/// asked for its bake to be invalidated.
pub fn update_obstacle_flags(state: &mut DomainState, sources: &mut [SourceObject]) -> bool {
    let mut active = state.active_fields;
    active.obstacle = false;
    active.guide = false;
    let mut outdated = false;

    for source in sources.iter_mut() {
        let effector = match &source.role {
            SourceRole::Effector(e) => e,
            SourceRole::Flow(_) => continue,
        };
        if source.needs_update {
            source.needs_update = false;
            outdated = true;
        }
        match effector.effector_type {
            EffectorType::Collision => active.obstacle = true,
            EffectorType::Guide => active.guide = true,
        }
    }

    state.active_fields = active;
    outdated
}

/// Static effectors are only sampled on the first or resume frame
pub fn escape_effector(source: &SourceObject, settings: &DomainSettings, kind: FrameKind) -> bool {
    let is_static = source.is_static() && !settings.use_adaptive();
    is_static && !kind.is_first && !kind.is_resume
}

pub fn compute_obstacle_emission(
    sources: &mut [SourceObject],
    state: &DomainState,
    settings: &DomainSettings,
    timing: StepTiming,
    kind: FrameKind,
) -> (Vec<FieldBuffer>, usize) {
    let mut sampled = 0;
    let buffers = sources
        .iter_mut()
        .map(|source| {
            if source.effector().is_none() || escape_effector(source, settings, kind) {
                return FieldBuffer::new();
            }
            sampled += 1;
            sample_with_subframes(source, state, settings, timing, kind, false, false)
        })
        .collect();
    (buffers, sampled)
}

pub fn reset_obstacle_grids(grids: &mut FluidGrids, is_first: bool, adaptive: bool) {
    if let Some(obstacle) = grids.obstacle.as_mut() {
        obstacle.phi_obs_in.fill(PHI_MAX);
        if is_first || adaptive {
            obstacle.phi_obsstatic_in.fill(PHI_MAX);
        }
        obstacle.num_obstacle.fill(0.0);
        obstacle.velocity.fill(Vec3::ZERO);
    }
    if let Some(guide) = grids.guide.as_mut() {
        guide.phi_guide_in.fill(PHI_MAX);
        guide.num_guide.fill(0.0);
        guide.velocity.fill(Vec3::ZERO);
    }
}

#[inline]
fn join_effector(
    i: usize,
    e: usize,
    buffer: &FieldBuffer,
    phi: &mut [f32],
    count: &mut [f32],
    velocity: &mut VectorGrid,
) {
    phi[i] = buffer.distance[e].min(phi[i]);
    // overlapping effectors average later through the count
    if buffer.numobjs[e] > 0.0 {
        count[i] += 1.0;
        if let Some(v) = buffer.velocity.as_ref() {
            velocity.add(i, v[e]);
        }
    }
}

/// Write one effector's buffer into the obstacle or guide inputs
pub fn apply_effector(
    grids: &mut FluidGrids,
    state: &DomainState,
    source: &SourceObject,
    effector_type: EffectorType,
    buffer: &FieldBuffer,
    settings: &DomainSettings,
    kind: FrameKind,
) {
    if !buffer.is_allocated() {
        return;
    }
    let is_static = source.is_static() && !settings.use_adaptive();
    let use_static = (kind.is_first || kind.is_resume) && is_static;
    let res = state.res;

    for gz in buffer.min.z..buffer.max.z {
        for gy in buffer.min.y..buffer.max.y {
            for gx in buffer.min.x..buffer.max.x {
                let g = IVec3::new(gx, gy, gz);
                let d = g - state.res_min;
                if !in_bounds(d, IVec3::ZERO, res) {
                    continue;
                }
                let e = buffer.local_index(g);
                let i = grid_index(d.x, d.y, d.z, res);

                match effector_type {
                    EffectorType::Collision => {
                        if let Some(o) = grids.obstacle.as_mut() {
                            let phi = if use_static {
                                &mut o.phi_obsstatic_in
                            } else {
                                &mut o.phi_obs_in
                            };
                            join_effector(i, e, buffer, phi, &mut o.num_obstacle, &mut o.velocity);
                        }
                    }
                    EffectorType::Guide => {
                        if let Some(guide) = grids.guide.as_mut() {
                            join_effector(
                                i,
                                e,
                                buffer,
                                &mut guide.phi_guide_in,
                                &mut guide.num_guide,
                                &mut guide.velocity,
                            );
                        }
                    }
                }
            }
        }
    }
}
