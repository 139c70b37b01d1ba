use glam::Vec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureKind {
    Perlin,
    Fbm,
}

/// How emission texture coordinates are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureMapping {
    /// From cell position relative to the flow centre
    Auto,
    /// From the mesh UV layer
    Uv,
}

/// Procedural texture modulating flow emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionTexture {
    pub kind: TextureKind,
    pub seed: u32,
    pub frequency: f32,
    pub octaves: usize,
}

impl Default for EmissionTexture {
    fn default() -> Self {
        Self {
            kind: TextureKind::Perlin,
            seed: 0,
            frequency: 1.0,
            octaves: 4,
        }
    }
}

impl EmissionTexture {
    pub fn sampler(&self) -> TextureSampler {
        let source = match self.kind {
            TextureKind::Perlin => NoiseSource::Perlin(Perlin::new(self.seed)),
            TextureKind::Fbm => {
                NoiseSource::Fbm(Fbm::<Perlin>::new(self.seed).set_octaves(self.octaves.max(1)))
            }
        };
        TextureSampler {
            source,
            frequency: self.frequency as f64,
        }
    }
}

enum NoiseSource {
    Perlin(Perlin),
    Fbm(Fbm<Perlin>),
}

/// Built once per source pass and shared read-only by the workers
pub struct TextureSampler {
    source: NoiseSource,
    frequency: f64,
}

impl TextureSampler {
    /// Intensity in [0, 1] at texture coordinate `co`
    pub fn intensity(&self, co: Vec3) -> f32 {
        let p = [
            co.x as f64 * self.frequency,
            co.y as f64 * self.frequency,
            co.z as f64 * self.frequency,
        ];
        let v = match &self.source {
            NoiseSource::Perlin(n) => n.get(p),
            NoiseSource::Fbm(n) => n.get(p),
        };
        ((v as f32 + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}
