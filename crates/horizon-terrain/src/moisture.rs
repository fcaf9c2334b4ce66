//! Moisture map derivation from elevation, temperature and noise.

use serde::{Deserialize, Serialize};

use crate::layered_map::{HeatMap, HeightMap, LayeredMap, MoistureMap};
use crate::noise_field::{NoiseField, NoiseSettings};
use crate::tile::TileFrame;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoistureSettings {
    pub noise: NoiseSettings,
    /// Elevation at which the lowland term reaches zero.
    pub height_reference: f64,
    pub height_weight: f64,
    /// Weight of the dryness-from-heat term. Zero by default; the term is
    /// computed so it can be switched on from configuration.
    pub temperature_weight: f64,
    pub noise_weight: f64,
}

impl Default for MoistureSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings {
                seed: 2,
                scale: 80.0,
                octaves: 4,
                ..NoiseSettings::default()
            },
            height_reference: 25.0,
            height_weight: 0.4,
            temperature_weight: 0.0,
            noise_weight: 0.6,
        }
    }
}

/// Derive the moisture layer. Values are clamped to `[0, 1]`; `min`/`max` are
/// the observed extremes.
pub fn generate_moisture_map(
    frame: &TileFrame,
    settings: &MoistureSettings,
    height: &HeightMap,
    heat: &HeatMap,
) -> MoistureMap {
    let noise = NoiseField::new(settings.noise.clone()).sample_grid(frame);
    let reference = settings.height_reference.max(f64::EPSILON);

    let values = noise
        .iter()
        .zip(&height.values)
        .zip(&heat.values)
        .map(|((&n, &h), &t)| {
            let lowland = 1.0 - h as f64 / reference;
            let dryness = 1.0 - t as f64;
            let m = settings.height_weight * lowland
                + settings.temperature_weight * dryness
                + settings.noise_weight * n as f64;
            m.clamp(0.0, 1.0) as f32
        })
        .collect();

    MoistureMap(LayeredMap::from_values(frame.width, frame.height, values))
}
