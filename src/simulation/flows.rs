//! Flow sources: active-field flags, emission and application to the grids

use glam::IVec3;

use super::sampling::{sample_with_subframes, FrameKind, StepTiming};
use crate::constants::grid::{EPSILON, PHI_MAX};
use crate::domain::{DomainSettings, DomainState, DomainType};
use crate::emission::{add_if_lower, FieldBuffer};
use crate::grid::{grid_index, in_bounds};
use crate::solver::FluidGrids;
use crate::source::{FlowBehavior, FlowSettings, FlowType, SourceObject, SourceRole};

/// Recompute which optional grids the flows need.
///
/// Returns true when a flow asked for its bake to be invalidated.
pub fn update_flow_flags(state: &mut DomainState, settings: &DomainSettings, sources: &mut [SourceObject]) -> bool {
    let mut active = state.active_fields;
    active.invel = false;
    active.outflow = false;
    active.heat = false;
    active.fire = false;
    let mut outdated = false;

    for source in sources.iter_mut() {
        let flow = match &source.role {
            SourceRole::Flow(f) => f,
            SourceRole::Effector(_) => continue,
        };
        if source.needs_update {
            source.needs_update = false;
            outdated = true;
        }
        if flow.init_velocity {
            active.invel = true;
        }
        if flow.behavior == FlowBehavior::Outflow {
            active.outflow = true;
        }
        if settings.domain_type == DomainType::Liquid {
            continue;
        }

        if flow.temperature != 0.0 {
            active.heat = true;
        }
        if flow.fuel_amount != 0.0 || flow.flow_type.emits_fire() {
            active.fire = true;
        }
        if flow.density != 0.0 && flow.flow_type.emits_smoke() {
            if !active.color_set {
                state.active_color = flow.color;
                active.color_set = true;
            } else if state.active_color != flow.color {
                state.active_color = flow.color;
                active.colors = true;
            }
        }
    }

    if settings.is_gas() && active.fire {
        // fire always carries heat
        active.heat = true;
        if !active.color_set {
            state.active_color = settings.flame_smoke_color;
            active.color_set = true;
        } else if state.active_color != settings.flame_smoke_color {
            state.active_color = settings.flame_smoke_color;
            active.colors = true;
        }
    }

    state.active_fields = active;
    outdated
}

/// Flows whose emission would be thrown away this frame
pub fn escape_flow(source: &SourceObject, flow: &FlowSettings, settings: &DomainSettings, kind: FrameKind) -> bool {
    let is_static = source.is_static() && !settings.use_adaptive();
    let liquid_flow = flow.flow_type == FlowType::Liquid;

    if liquid_flow && flow.behavior == FlowBehavior::Geometry && !kind.is_first {
        return true;
    }
    if (liquid_flow && settings.is_gas()) || (flow.flow_type.is_gas() && settings.is_liquid()) {
        return true;
    }
    liquid_flow && is_static && !kind.is_first && !kind.is_resume && !flow.init_velocity
}

/// Emission buffers of every flow, indexed like `sources`. Escaped flows and
/// effectors get an empty buffer.
pub fn compute_flow_emission(
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
            let flow = match &source.role {
                SourceRole::Flow(f) => f.clone(),
                SourceRole::Effector(_) => return FieldBuffer::new(),
            };
            if escape_flow(source, &flow, settings, kind) {
                return FieldBuffer::new();
            }
            sampled += 1;
            sample_with_subframes(source, state, settings, timing, kind, !flow.absolute, true)
        })
        .collect();
    (buffers, sampled)
}

/// Reset inputs before flows are written into them
pub fn reset_flow_grids(grids: &mut FluidGrids, is_first: bool) {
    if is_first {
        grids.phistatic_in.fill(PHI_MAX);
    }
    grids.phi_in.fill(PHI_MAX);

    if let Some(outflow) = grids.outflow.as_mut() {
        if is_first {
            outflow.phioutstatic_in.fill(PHI_MAX);
        }
        outflow.phiout_in.fill(PHI_MAX);
    }
    if let Some(smoke) = grids.smoke.as_mut() {
        smoke.density_in.copy_from_slice(&smoke.density);
    }
    if let Some(heat) = grids.heat.as_mut() {
        heat.heat_in.copy_from_slice(&heat.heat);
    }
    if let Some(color) = grids.color.as_mut() {
        color.r_in.copy_from_slice(&color.r);
        color.g_in.copy_from_slice(&color.g);
        color.b_in.copy_from_slice(&color.b);
    }
    if let Some(fire) = grids.fire.as_mut() {
        fire.fuel_in.copy_from_slice(&fire.fuel);
        fire.react_in.copy_from_slice(&fire.react);
    }
    grids.emission_in.fill(0.0);
    if let Some(initial) = grids.initial_velocity.as_mut() {
        initial.fill(glam::Vec3::ZERO);
    }
    // force fields may be skipped entirely, so forces start from zero here
    grids.force.fill(glam::Vec3::ZERO);
}

/// Zero density-like inputs and join the outflow level set
fn apply_outflow(grids: &mut FluidGrids, i: usize, distance: f32, use_static: bool) {
    if let Some(outflow) = grids.outflow.as_mut() {
        let phi = if use_static {
            &mut outflow.phioutstatic_in
        } else {
            &mut outflow.phiout_in
        };
        phi[i] = distance.min(phi[i]);
    }
    if let Some(smoke) = grids.smoke.as_mut() {
        smoke.density_in[i] = 0.0;
    }
    if let Some(heat) = grids.heat.as_mut() {
        heat.heat_in[i] = 0.0;
    }
    if let Some(fire) = grids.fire.as_mut() {
        fire.fuel_in[i] = 0.0;
        fire.react_in[i] = 0.0;
    }
    if let Some(color) = grids.color.as_mut() {
        color.r_in[i] = 0.0;
        color.g_in[i] = 0.0;
        color.b_in[i] = 0.0;
    }
}

fn apply_inflow(grids: &mut FluidGrids, flow: &FlowSettings, i: usize, emission: f32, distance: f32, use_static: bool) {
    let FluidGrids {
        phi_in,
        phistatic_in,
        emission_in,
        smoke,
        heat,
        fire,
        color,
        ..
    } = grids;

    let phi = if use_static { phistatic_in } else { phi_in };
    phi[i] = distance.min(phi[i]);
    emission_in[i] = emission.max(emission_in[i]);

    let dens_old = smoke.as_ref().map_or(0.0, |s| s.density[i]);
    let dens_flow = if flow.flow_type == FlowType::Fire {
        0.0
    } else {
        emission * flow.density
    };
    let fuel_flow = if fire.is_some() {
        emission * flow.fuel_amount
    } else {
        0.0
    };

    if let Some(h) = heat.as_mut() {
        if emission > 0.0 {
            h.heat_in[i] = add_if_lower(h.heat[i], flow.temperature);
        }
    }

    if flow.absolute {
        if let Some(s) = smoke.as_mut() {
            if flow.flow_type != FlowType::Fire && dens_flow > s.density[i] {
                // keep what other emitters wrote into this cell
                s.density_in[i] = dens_flow.max(s.density_in[i]);
            }
        }
        if let Some(f) = fire.as_mut() {
            if flow.flow_type != FlowType::Smoke && fuel_flow != 0.0 && fuel_flow > f.fuel[i] {
                f.fuel_in[i] = fuel_flow.max(f.fuel_in[i]);
            }
        }
    } else {
        if let Some(s) = smoke.as_mut() {
            if flow.flow_type != FlowType::Fire {
                s.density_in[i] = (s.density_in[i] + dens_flow).clamp(0.0, 1.0);
            }
        }
        if let Some(f) = fire.as_mut() {
            if flow.flow_type != FlowType::Smoke && flow.fuel_amount != 0.0 {
                f.fuel_in[i] = (f.fuel_in[i] + fuel_flow).clamp(0.0, 10.0);
            }
        }
    }

    if let (Some(c), Some(s)) = (color.as_mut(), smoke.as_ref()) {
        let total = dens_old + dens_flow;
        if dens_flow != 0.0 && total != 0.0 {
            let scale = s.density[i] / total;
            c.r_in[i] = (c.r[i] + flow.color.x * dens_flow) * scale;
            c.g_in[i] = (c.g[i] + flow.color.y * dens_flow) * scale;
            c.b_in[i] = (c.b[i] + flow.color.z * dens_flow) * scale;
        }
    }

    if let Some(f) = fire.as_mut() {
        // soft falloff instead of a hard 1.0 for new fuel
        let value = 1.0 - (1.0 - emission).powi(2);
        if f.fuel_in[i] > EPSILON && value > f.react[i] {
            let ratio = fuel_flow / f.fuel_in[i];
            f.react_in[i] = (value * ratio + (1.0 - ratio) * f.react[i]).clamp(0.0, value);
        }
    }
}

/// Write one flow's buffer into the domain inputs
pub fn apply_flow(
    grids: &mut FluidGrids,
    state: &DomainState,
    source: &SourceObject,
    flow: &FlowSettings,
    buffer: &FieldBuffer,
    settings: &DomainSettings,
    kind: FrameKind,
) {
    if !buffer.is_allocated() {
        return;
    }
    let is_static = source.is_static() && !settings.use_adaptive();
    let is_geometry = flow.behavior == FlowBehavior::Geometry;
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
                let distance = buffer.distance[e];

                match flow.behavior {
                    FlowBehavior::Outflow => {
                        let use_static = (kind.is_first || kind.is_resume) && is_static;
                        apply_outflow(grids, i, distance, use_static);
                    }
                    FlowBehavior::Geometry if !kind.is_first => {
                        apply_inflow(grids, flow, i, 0.0, PHI_MAX, false);
                    }
                    FlowBehavior::Geometry | FlowBehavior::Inflow => {
                        let use_static = (kind.is_first || kind.is_resume) && is_static && !is_geometry;
                        apply_inflow(grids, flow, i, buffer.influence_at(e), distance, use_static);

                        if flow.init_velocity {
                            if let (Some(initial), Some(velocity)) =
                                (grids.initial_velocity.as_mut(), buffer.velocity.as_ref())
                            {
                                // strongest emitter wins
                                let v = velocity[e];
                                if v.length_squared() > initial.get(i).length_squared() {
                                    initial.set(i, v);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
