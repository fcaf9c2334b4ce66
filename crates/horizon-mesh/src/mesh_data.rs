//! Mesh output of a terrain meshing pass.

/// A single terrain vertex, laid out for direct GPU upload.
///
/// Layout (40 bytes total):
///   - `[0..12]`  position `[f32; 3]`, chunk-local X, height, Z
///   - `[12..24]` normal `[f32; 3]`
///   - `[24..32]` uv `[f32; 2]` across the whole chunk
///   - `[32..36]` heat in `[0, 1]`
///   - `[36..40]` moisture in `[0, 1]`
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub heat: f32,
    pub moisture: f32,
}

static_assertions::assert_eq_size!(TerrainVertex, [u8; 40]);

/// Vertices and triangle indices for one chunk at one LOD.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<TerrainVertex>,
    /// Triangles, 3 indices each.
    pub indices: Vec<u32>,
    /// Mesh LOD this data was built for.
    pub lod: u32,
    /// Vertices along one edge of the mesh grid.
    pub verts_per_line: usize,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex buffer as raw bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index buffer as raw bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
