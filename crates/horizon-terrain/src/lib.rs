//! Procedural terrain fields: region-seeded shoreline and river shaping over
//! octaved noise, and the height → heat → moisture map pipeline.

mod heat;
mod height;
mod layered_map;
mod moisture;
mod noise_field;
mod settings;

pub mod preview;
pub mod region;
pub mod river;
pub mod shoreline;
pub mod tile;

pub use heat::{HeatSettings, generate_heat_map};
pub use height::{HeightCurve, HeightField, HeightSettings, generate_height_map};
pub use layered_map::{
    HeatMap, HeightMap, LayerKind, LayeredMap, MapStack, MoistureMap, PipelineError,
};
pub use moisture::{MoistureSettings, generate_moisture_map};
pub use noise_field::{CoherentNoise, NoiseField, NoiseSettings, PerlinNoise};
pub use preview::PreviewImage;
pub use river::{RiverPath, RiverSettings};
pub use settings::TerrainSettings;
pub use shoreline::{Shape, ShorelineField, ShorelineSettings};
pub use tile::{Rect, TileFrame};
