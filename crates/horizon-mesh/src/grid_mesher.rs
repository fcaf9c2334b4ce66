//! Regular-grid terrain mesher with LOD decimation.
//!
//! LOD `n` keeps every `lod_step(n)`-th sample along each axis, always
//! including the last row and column so that the mesh covers the whole chunk
//! at every LOD.

use glam::{DVec2, Vec3};
use horizon_terrain::{HeatMap, HeightMap, MoistureMap};
use serde::{Deserialize, Serialize};

use crate::mesh_data::{MeshData, TerrainVertex};

/// Chunk geometry shared by map generation and meshing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// Samples along one chunk edge at LOD 0.
    pub num_verts_per_line: usize,
    /// Side length of a chunk in world units.
    pub mesh_world_size: f64,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            num_verts_per_line: 121,
            mesh_world_size: 240.0,
        }
    }
}

impl MeshSettings {
    pub fn vertex_spacing(&self) -> f64 {
        self.mesh_world_size / (self.num_verts_per_line.max(2) - 1) as f64
    }

    /// World-space center of the chunk at integer coordinate `coord`.
    pub fn chunk_center(&self, coord: (i32, i32)) -> DVec2 {
        DVec2::new(coord.0 as f64, coord.1 as f64) * self.mesh_world_size
    }
}

/// Sample stride for a mesh LOD.
pub fn lod_step(lod: u32) -> usize {
    if lod == 0 { 1 } else { lod as usize * 2 }
}

/// Builds a renderable mesh from a chunk's three layers.
pub trait MeshBuilder: Send + Sync {
    fn build(
        &self,
        height: &HeightMap,
        heat: &HeatMap,
        moisture: &MoistureMap,
        settings: &MeshSettings,
        lod: u32,
    ) -> MeshData;
}

/// The default [`MeshBuilder`]: one vertex per kept sample, two triangles per
/// cell.
#[derive(Clone, Copy, Debug, Default)]
pub struct GridMeshBuilder;

/// Indices along one axis kept at `step`.
fn kept_indices(len: usize, step: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut kept: Vec<usize> = (0..len).step_by(step.max(1)).collect();
    if kept.last() != Some(&(len - 1)) {
        kept.push(len - 1);
    }
    kept
}

impl MeshBuilder for GridMeshBuilder {
    fn build(
        &self,
        height: &HeightMap,
        heat: &HeatMap,
        moisture: &MoistureMap,
        settings: &MeshSettings,
        lod: u32,
    ) -> MeshData {
        let (w, h) = height.dimensions();
        if w < 2 || h < 2 {
            return MeshData {
                lod,
                ..Default::default()
            };
        }

        let step = lod_step(lod);
        let cols = kept_indices(w, step);
        let rows = kept_indices(h, step);
        let spacing = settings.mesh_world_size as f32 / (w - 1) as f32;
        let half = settings.mesh_world_size as f32 * 0.5;

        let sample = |x: usize, y: usize| height.get(x.min(w - 1), y.min(h - 1));

        let mut vertices = Vec::with_capacity(cols.len() * rows.len());
        for &y in &rows {
            for &x in &cols {
                let elevation = height.get(x, y);

                let x0 = x.saturating_sub(step);
                let x1 = (x + step).min(w - 1);
                let y0 = y.saturating_sub(step);
                let y1 = (y + step).min(h - 1);
                let dx = (sample(x1, y) - sample(x0, y)) / ((x1 - x0).max(1) as f32 * spacing);
                // Rows run towards -Z.
                let dz = (sample(x, y0) - sample(x, y1)) / ((y1 - y0).max(1) as f32 * spacing);
                let normal = Vec3::new(-dx, 1.0, -dz).normalize_or(Vec3::Y);

                vertices.push(TerrainVertex {
                    position: [
                        -half + x as f32 * spacing,
                        elevation,
                        half - y as f32 * spacing,
                    ],
                    normal: normal.to_array(),
                    uv: [x as f32 / (w - 1) as f32, y as f32 / (h - 1) as f32],
                    heat: heat.get(x, y),
                    moisture: moisture.get(x, y),
                });
            }
        }

        let line = cols.len() as u32;
        let mut indices = Vec::with_capacity((cols.len() - 1) * (rows.len() - 1) * 6);
        for r in 0..rows.len() as u32 - 1 {
            for c in 0..line - 1 {
                let a = r * line + c;
                let b = a + 1;
                let d = a + line;
                let e = d + 1;
                indices.extend_from_slice(&[a, e, d, e, a, b]);
            }
        }

        MeshData {
            vertices,
            indices,
            lod,
            verts_per_line: cols.len(),
        }
    }
}
