use horizon_lod::LodError;
use horizon_terrain::PipelineError;
use thiserror::Error;

use crate::chunk::ChunkStage;
use crate::ticket::{ChunkCoord, RequestKind};

#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("invalid LOD configuration: {0}")]
    Lod(#[from] LodError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker pool has been shut down")]
    PoolClosed,

    #[error("background job panicked: {message}")]
    JobPanicked { message: String },

    #[error("invalid chunk geometry: size {size}, {verts_per_line} samples per edge")]
    InvalidChunkGeometry { size: f64, verts_per_line: usize },

    #[error("worker pool saturated ({in_flight} requests in flight)")]
    Saturated { in_flight: usize },

    #[error("chunk {coord} received a {kind:?} result while {stage:?}")]
    UnexpectedResult {
        coord: ChunkCoord,
        stage: ChunkStage,
        kind: RequestKind,
    },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
