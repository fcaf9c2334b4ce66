//! Coherent noise sources sampled in world space.
//!
//! [`CoherentNoise`] is the boundary to the noise primitive: any deterministic
//! `(x, y) -> [0, 1]` function can drive the generators. [`PerlinNoise`] is a
//! single-octave source used for shoreline distortion and climate variation;
//! [`NoiseField`] composites octaves of Perlin noise into the base height and
//! moisture fields.

use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::tile::TileFrame;

/// A deterministic 2D noise function with output in `[0, 1]`.
pub trait CoherentNoise: Send + Sync {
    /// Sample the noise at a world-space coordinate.
    fn sample(&self, x: f64, y: f64) -> f64;
}

impl<F> CoherentNoise for F
where
    F: Fn(f64, f64) -> f64 + Send + Sync,
{
    fn sample(&self, x: f64, y: f64) -> f64 {
        self(x, y)
    }
}

/// Single-octave Perlin noise remapped from `[-1, 1]` to `[0, 1]`.
#[derive(Clone, Debug)]
pub struct PerlinNoise {
    perlin: Perlin,
}

impl PerlinNoise {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
        }
    }
}

impl Default for PerlinNoise {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CoherentNoise for PerlinNoise {
    fn sample(&self, x: f64, y: f64) -> f64 {
        ((self.perlin.get([x, y]) + 1.0) * 0.5).clamp(0.0, 1.0)
    }
}

/// Configuration for an octaved noise field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    /// Noise seed.
    pub seed: u32,
    /// World units per noise unit at the first octave. Larger values produce
    /// broader features.
    pub scale: f64,
    /// Number of octaves to composite.
    pub octaves: u32,
    /// Amplitude multiplier between successive octaves.
    pub persistence: f64,
    /// Frequency multiplier between successive octaves.
    pub lacunarity: f64,
    /// World-space offset added before sampling.
    pub offset: [f64; 2],
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            scale: 50.0,
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
            offset: [0.0, 0.0],
        }
    }
}

impl NoiseSettings {
    /// Clamp values that would make the field degenerate.
    pub fn validated(mut self) -> Self {
        self.scale = self.scale.max(0.01);
        self.octaves = self.octaves.max(1);
        self.lacunarity = self.lacunarity.max(1.0);
        self.persistence = self.persistence.clamp(0.0, 1.0);
        self
    }
}

/// Fractal Perlin field normalized into `[0, 1]`.
///
/// Each octave doubles (by `lacunarity`) in frequency and halves (by
/// `persistence`) in amplitude. The sum is divided by the geometric series of
/// amplitudes so the output range does not depend on the octave count.
#[derive(Clone, Debug)]
pub struct NoiseField {
    perlin: Perlin,
    settings: NoiseSettings,
    max_amplitude: f64,
}

impl NoiseField {
    pub fn new(settings: NoiseSettings) -> Self {
        let settings = settings.validated();
        let mut max_amplitude = 0.0;
        let mut amp = 1.0;
        for _ in 0..settings.octaves {
            max_amplitude += amp;
            amp *= settings.persistence;
        }
        Self {
            perlin: Perlin::new(settings.seed),
            settings,
            max_amplitude,
        }
    }

    /// Sample the field at a world position.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        if self.max_amplitude == 0.0 {
            return 0.5;
        }

        let mut total = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;
        let nx = (x + self.settings.offset[0]) / self.settings.scale;
        let ny = (y + self.settings.offset[1]) / self.settings.scale;

        for _ in 0..self.settings.octaves {
            total += self.perlin.get([nx * frequency, ny * frequency]) * amplitude;
            frequency *= self.settings.lacunarity;
            amplitude *= self.settings.persistence;
        }

        ((total / self.max_amplitude + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Sample the field at every vertex of `frame`, row-major.
    pub fn sample_grid(&self, frame: &TileFrame) -> Vec<f32> {
        let mut values = Vec::with_capacity(frame.len());
        for y in 0..frame.height {
            for x in 0..frame.width {
                let p = frame.sample_position(x, y);
                values.push(self.sample(p.x, p.y) as f32);
            }
        }
        values
    }

    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }
}

impl CoherentNoise for NoiseField {
    fn sample(&self, x: f64, y: f64) -> f64 {
        NoiseField::sample(self, x, y)
    }
}
