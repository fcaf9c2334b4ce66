//! Identity of asynchronous requests.

use std::fmt;

use glam::DVec2;

/// Integer grid coordinate of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk whose center is nearest to `position`.
    pub fn containing(position: DVec2, chunk_size: f64) -> Self {
        Self {
            x: (position.x / chunk_size).round() as i32,
            y: (position.y / chunk_size).round() as i32,
        }
    }

    pub fn as_tuple(self) -> (i32, i32) {
        (self.x, self.y)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// What a request produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Height,
    Heat,
    Moisture,
    /// Mesh for the LOD tier at this index.
    Mesh(usize),
}

/// Tag carried by every request and its result.
///
/// A result is applied only if a chunk with the same coordinate and epoch
/// still exists; anything else is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub coord: ChunkCoord,
    pub epoch: u64,
    pub kind: RequestKind,
}

impl Ticket {
    pub fn new(coord: ChunkCoord, epoch: u64, kind: RequestKind) -> Self {
        Self { coord, epoch, kind }
    }
}
