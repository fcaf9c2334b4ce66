//! Aggregate settings for the full map pipeline.

use serde::{Deserialize, Serialize};

use crate::heat::{HeatSettings, generate_heat_map};
use crate::height::{HeightSettings, generate_height_map};
use crate::layered_map::{HeatMap, HeightMap, MoistureMap};
use crate::moisture::{MoistureSettings, generate_moisture_map};
use crate::tile::TileFrame;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    pub height: HeightSettings,
    pub heat: HeatSettings,
    pub moisture: MoistureSettings,
}

impl TerrainSettings {
    /// Derive every noise seed from one world seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.height.noise.seed = seed;
        self.height.shoreline.noise_seed = seed.wrapping_add(1);
        self.heat.noise_seed = seed.wrapping_add(2);
        self.moisture.noise.seed = seed.wrapping_add(3);
        self
    }

    /// Run height, heat and moisture derivation in order.
    pub fn generate(&self, frame: &TileFrame) -> (HeightMap, HeatMap, MoistureMap) {
        let height = generate_height_map(frame, &self.height);
        let heat = generate_heat_map(frame, &self.heat, &height);
        let moisture = generate_moisture_map(frame, &self.moisture, &height, &heat);
        (height, heat, moisture)
    }
}
