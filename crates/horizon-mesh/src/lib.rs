//! Terrain mesh data and the builder boundary used by the streaming core.

mod grid_mesher;
mod mesh_data;

pub use grid_mesher::{GridMeshBuilder, MeshBuilder, MeshSettings, lod_step};
pub use mesh_data::{MeshData, TerrainVertex};
