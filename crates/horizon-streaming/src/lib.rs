//! Chunk streaming: sequences height → heat → moisture generation and LOD
//! mesh building per chunk on a background worker pool, tracks visibility
//! around a moving viewer, and publishes the results as events.

mod chunk;
mod error;
mod events;
mod settings;
mod streamer;
mod ticket;
mod worker_pool;

pub use chunk::{ChunkLayers, ChunkStage, LodSlot, TerrainChunk, TickOutcome};
pub use error::StreamingError;
pub use events::{EventQueue, StreamEvent};
pub use settings::StreamingSettings;
pub use streamer::{JobOutput, StreamerStats, TerrainStreamer};
pub use ticket::{ChunkCoord, RequestKind, Ticket};
pub use worker_pool::{Completion, Job, Rejected, WorkerPool};
