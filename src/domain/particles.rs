//! Companion visualisation particle systems for liquid secondary particles

use serde::{Deserialize, Serialize};

use super::settings::{DomainSettings, SecondaryParticle};
use crate::geometry::{Particle, ParticlePhysics};

const DRAW_SIZE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawShape {
    Dot,
    Circle,
    Cross,
}

impl DrawShape {
    fn for_kind(kind: SecondaryParticle) -> Self {
        match kind {
            SecondaryParticle::Bubble => DrawShape::Circle,
            SecondaryParticle::Foam => DrawShape::Cross,
            _ => DrawShape::Dot,
        }
    }
}

/// Display-only particle system filled from the particles cache channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionSystem {
    pub kind: SecondaryParticle,
    pub name: String,
    pub draw_size: f32,
    pub draw_shape: DrawShape,
    pub color_by_velocity: bool,
    pub physics: ParticlePhysics,
    pub particles: Vec<Particle>,
}

impl CompanionSystem {
    fn new(kind: SecondaryParticle) -> Self {
        let label = match kind {
            SecondaryParticle::Flip => "Liquid",
            SecondaryParticle::Spray => "Spray",
            SecondaryParticle::Bubble => "Bubbles",
            SecondaryParticle::Foam => "Foam",
            SecondaryParticle::Tracer => "Tracers",
        };
        Self {
            kind,
            name: format!("{} Particle System", label),
            draw_size: DRAW_SIZE,
            draw_shape: DrawShape::for_kind(kind),
            color_by_velocity: true,
            physics: ParticlePhysics::None,
            particles: Vec::new(),
        }
    }
}

/// Companion systems attached to a liquid domain, at most one per kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanionParticles {
    systems: Vec<CompanionSystem>,
}

impl CompanionParticles {
    pub fn contains(&self, kind: SecondaryParticle) -> bool {
        self.systems.iter().any(|s| s.kind == kind)
    }

    pub fn get(&self, kind: SecondaryParticle) -> Option<&CompanionSystem> {
        self.systems.iter().find(|s| s.kind == kind)
    }

    pub fn get_mut(&mut self, kind: SecondaryParticle) -> Option<&mut CompanionSystem> {
        self.systems.iter_mut().find(|s| s.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompanionSystem> {
        self.systems.iter()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Attach a system for `kind` and set the particle bit. Returns false if
    /// one was already attached.
    pub fn add(&mut self, settings: &mut DomainSettings, kind: SecondaryParticle) -> bool {
        settings.set_particle_type(kind, false);
        if self.contains(kind) {
            return false;
        }
        self.systems.push(CompanionSystem::new(kind));
        log::debug!("[particles::add] Attached companion system for {:?}", kind);
        true
    }

    /// Detach the system for `kind` and clear the particle bit
    pub fn remove(&mut self, settings: &mut DomainSettings, kind: SecondaryParticle) -> bool {
        settings.set_particle_type(kind, true);
        let before = self.systems.len();
        self.systems.retain(|s| s.kind != kind);
        before != self.systems.len()
    }

    /// Toggle `kind`: attach when absent, detach when present
    pub fn toggle(&mut self, settings: &mut DomainSettings, kind: SecondaryParticle) -> bool {
        if self.contains(kind) {
            self.remove(settings, kind);
            false
        } else {
            self.add(settings, kind);
            true
        }
    }
}
