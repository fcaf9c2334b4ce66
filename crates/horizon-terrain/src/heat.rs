//! Heat map derivation from latitude, elevation and local noise.

use serde::{Deserialize, Serialize};

use crate::layered_map::{HeatMap, HeightMap, LayeredMap};
use crate::noise_field::{CoherentNoise, PerlinNoise};
use crate::tile::TileFrame;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatSettings {
    /// World-space Y of the hottest latitude.
    pub equator: f64,
    /// Larger values narrow the warm band around the equator.
    pub equator_scale: f64,
    /// Tiles from the equator to the cold edge, before scaling.
    pub max_tile_depth: u32,
    /// Elevation at which the altitude term reaches zero.
    pub height_reference: f64,
    pub noise_scale: f64,
    pub noise_seed: u32,
    pub latitude_weight: f64,
    pub height_weight: f64,
    pub noise_weight: f64,
}

impl Default for HeatSettings {
    fn default() -> Self {
        Self {
            equator: 125.0,
            equator_scale: 0.7,
            max_tile_depth: 4,
            height_reference: 110.0,
            noise_scale: 0.01,
            noise_seed: 1,
            latitude_weight: 0.5,
            height_weight: 0.3,
            noise_weight: 0.2,
        }
    }
}

impl HeatSettings {
    /// Distance from the equator at which the latitude term reaches zero.
    pub fn latitude_span(&self, tile_size: f64) -> f64 {
        tile_size * self.max_tile_depth as f64 / (1.0 + self.equator_scale)
    }

    /// Latitude term in `[0, 1]`, 1 on the equator.
    pub fn latitude(&self, y: f64, tile_size: f64) -> f64 {
        let span = self.latitude_span(tile_size);
        if span <= 0.0 {
            return 0.0;
        }
        1.0 - ((y - self.equator).abs() / span).clamp(0.0, 1.0)
    }
}

/// Derive the heat layer. Values and the declared range are `[0, 1]`.
pub fn generate_heat_map(
    frame: &TileFrame,
    settings: &HeatSettings,
    height: &HeightMap,
) -> HeatMap {
    let noise = PerlinNoise::new(settings.noise_seed);
    let reference = settings.height_reference.max(f64::EPSILON);

    let mut values = Vec::with_capacity(frame.len());
    for y in 0..frame.height {
        for x in 0..frame.width {
            let p = frame.sample_position(x, y);
            let latitude = settings.latitude(p.y, frame.world_size);
            let altitude = (1.0 - height.get(x, y) as f64 / reference).clamp(0.0, 1.0);
            let local = noise
                .sample(p.x * settings.noise_scale, p.y * settings.noise_scale)
                .clamp(0.0, 1.0);

            let heat = settings.latitude_weight * latitude
                + settings.height_weight * altitude
                + settings.noise_weight * local;
            values.push(heat.clamp(0.0, 1.0) as f32);
        }
    }

    HeatMap(LayeredMap::with_range(frame.width, frame.height, values, 0.0, 1.0))
}
