//! Streaming event queue.
//!
//! The streamer publishes [`StreamEvent`]s as chunks change state. Consumers
//! such as a renderer or physics layer pull them with
//! [`EventQueue::drain`] once per frame.

use std::collections::VecDeque;

use crate::ticket::ChunkCoord;

/// A change a consumer may need to react to.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// All three layers of a chunk are available.
    ChunkReady {
        coord: ChunkCoord,
        /// Observed elevation range of the chunk.
        height_range: (f32, f32),
    },
    /// The chunk crossed the view distance. Only emitted on the edge.
    VisibilityChanged { coord: ChunkCoord, visible: bool },
    /// A cached mesh became the chunk's active mesh.
    MeshActivated {
        coord: ChunkCoord,
        /// Index into the configured LOD tiers.
        lod_index: usize,
        /// Mesh LOD of that tier.
        lod: u32,
    },
    /// The collider mesh was applied. Emitted at most once per chunk.
    ColliderApplied { coord: ChunkCoord },
    /// The chunk left the visible radius and its data was dropped.
    ChunkUnloaded { coord: ChunkCoord },
}

impl StreamEvent {
    pub fn coord(&self) -> ChunkCoord {
        match self {
            Self::ChunkReady { coord, .. }
            | Self::VisibilityChanged { coord, .. }
            | Self::MeshActivated { coord, .. }
            | Self::ColliderApplied { coord }
            | Self::ChunkUnloaded { coord } => *coord,
        }
    }
}

/// FIFO of events waiting to be consumed.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<StreamEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: StreamEvent) {
        self.events.push_back(event);
    }

    /// Remove and return every queued event in publication order.
    pub fn drain(&mut self) -> Vec<StreamEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order_and_empties() {
        let mut queue = EventQueue::new();
        let a = ChunkCoord::new(0, 0);
        let b = ChunkCoord::new(1, -1);
        queue.push(StreamEvent::VisibilityChanged {
            coord: a,
            visible: true,
        });
        queue.push(StreamEvent::ColliderApplied { coord: b });
        assert_eq!(queue.len(), 2);

        let events = queue.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].coord(), a);
        assert_eq!(events[1], StreamEvent::ColliderApplied { coord: b });
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }
}
