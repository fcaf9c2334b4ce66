//! Per-chunk state machine.
//!
//! A chunk moves through `Unloaded → HeightPending → HeatPending →
//! MoisturePending → Ready`, one step per completed request. Each `on_*_ready`
//! transition returns the ticket for the next request. Once `Ready`, every
//! [`TerrainChunk::tick`] picks a LOD tier for the current viewer distance and
//! reports which meshes to request and which state edges were crossed.

use std::sync::Arc;

use glam::DVec2;
use horizon_lod::{LodSelector, distance_to_bounds};
use horizon_mesh::MeshData;
use horizon_terrain::{HeatMap, HeightMap, MapStack, MoistureMap};

use crate::error::StreamingError;
use crate::ticket::{ChunkCoord, RequestKind, Ticket};

/// Generation stage of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkStage {
    Unloaded,
    HeightPending,
    HeatPending,
    MoisturePending,
    Ready,
}

impl ChunkStage {
    /// The request whose result this stage is waiting for.
    pub fn awaiting(self) -> Option<RequestKind> {
        match self {
            Self::HeightPending => Some(RequestKind::Height),
            Self::HeatPending => Some(RequestKind::Heat),
            Self::MoisturePending => Some(RequestKind::Moisture),
            Self::Unloaded | Self::Ready => None,
        }
    }
}

/// Mesh cache entry for one LOD tier.
#[derive(Clone, Debug, Default)]
pub enum LodSlot {
    #[default]
    NotRequested,
    Requested,
    Cached(Arc<MeshData>),
}

impl LodSlot {
    pub fn mesh(&self) -> Option<&Arc<MeshData>> {
        match self {
            Self::Cached(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// The three layers of a ready chunk, shared with mesh jobs.
#[derive(Debug)]
pub struct ChunkLayers {
    pub height: HeightMap,
    pub heat: HeatMap,
    pub moisture: MoistureMap,
}

/// What a visibility tick changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Tier indices whose meshes should be requested now.
    pub mesh_requests: Vec<usize>,
    /// Tier index that became the active mesh.
    pub activated: Option<usize>,
    /// New visibility, only when it changed.
    pub visibility: Option<bool>,
    /// True on the tick the collider was applied.
    pub collider_applied: bool,
}

impl TickOutcome {
    pub fn is_empty(&self) -> bool {
        self.mesh_requests.is_empty()
            && self.activated.is_none()
            && self.visibility.is_none()
            && !self.collider_applied
    }
}

#[derive(Debug)]
pub struct TerrainChunk {
    coord: ChunkCoord,
    center: DVec2,
    size: f64,
    epoch: u64,
    stage: ChunkStage,
    maps: MapStack,
    layers: Option<Arc<ChunkLayers>>,
    lod_slots: Vec<LodSlot>,
    active_lod: Option<usize>,
    visible: bool,
    collider_applied: bool,
    /// Last scan cycle that found this chunk inside the visible radius.
    pub last_seen: u64,
}

impl TerrainChunk {
    pub fn new(coord: ChunkCoord, center: DVec2, size: f64, epoch: u64, tier_count: usize) -> Self {
        Self {
            coord,
            center,
            size,
            epoch,
            stage: ChunkStage::Unloaded,
            maps: MapStack::new(),
            layers: None,
            lod_slots: vec![LodSlot::NotRequested; tier_count],
            active_lod: None,
            visible: false,
            collider_applied: false,
            last_seen: 0,
        }
    }

    fn ticket(&self, kind: RequestKind) -> Ticket {
        Ticket::new(self.coord, self.epoch, kind)
    }

    fn expect_stage(&self, stage: ChunkStage, kind: RequestKind) -> Result<(), StreamingError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(StreamingError::UnexpectedResult {
                coord: self.coord,
                stage: self.stage,
                kind,
            })
        }
    }

    /// Start generation. Returns the height request ticket.
    pub fn begin_loading(&mut self) -> Result<Ticket, StreamingError> {
        self.expect_stage(ChunkStage::Unloaded, RequestKind::Height)?;
        self.stage = ChunkStage::HeightPending;
        Ok(self.ticket(RequestKind::Height))
    }

    /// Store the height map and return the heat request ticket.
    pub fn on_height_ready(&mut self, map: HeightMap) -> Result<Ticket, StreamingError> {
        self.expect_stage(ChunkStage::HeightPending, RequestKind::Height)?;
        self.maps.insert_height(map)?;
        self.stage = ChunkStage::HeatPending;
        Ok(self.ticket(RequestKind::Heat))
    }

    /// Store the heat map and return the moisture request ticket.
    pub fn on_heat_ready(&mut self, map: HeatMap) -> Result<Ticket, StreamingError> {
        self.expect_stage(ChunkStage::HeatPending, RequestKind::Heat)?;
        self.maps.insert_heat(map)?;
        self.stage = ChunkStage::MoisturePending;
        Ok(self.ticket(RequestKind::Moisture))
    }

    /// Store the moisture map. The chunk is `Ready` afterwards.
    pub fn on_moisture_ready(&mut self, map: MoistureMap) -> Result<(), StreamingError> {
        self.expect_stage(ChunkStage::MoisturePending, RequestKind::Moisture)?;
        self.maps.insert_moisture(map)?;
        match std::mem::take(&mut self.maps).into_layers() {
            Ok((height, heat, moisture)) => {
                self.layers = Some(Arc::new(ChunkLayers {
                    height,
                    heat,
                    moisture,
                }));
                self.stage = ChunkStage::Ready;
                Ok(())
            }
            Err(stack) => {
                self.maps = stack;
                Err(StreamingError::UnexpectedResult {
                    coord: self.coord,
                    stage: self.stage,
                    kind: RequestKind::Moisture,
                })
            }
        }
    }

    /// Cache a mesh for a tier that was requested.
    pub fn on_mesh_ready(
        &mut self,
        lod_index: usize,
        mesh: MeshData,
    ) -> Result<(), StreamingError> {
        let kind = RequestKind::Mesh(lod_index);
        self.expect_stage(ChunkStage::Ready, kind)?;
        match self.lod_slots.get_mut(lod_index) {
            Some(slot) if matches!(slot, LodSlot::Requested) => {
                *slot = LodSlot::Cached(Arc::new(mesh));
                Ok(())
            }
            _ => Err(StreamingError::UnexpectedResult {
                coord: self.coord,
                stage: self.stage,
                kind,
            }),
        }
    }

    /// Ticket for a mesh request of tier `lod_index`.
    pub fn mesh_ticket(&self, lod_index: usize) -> Ticket {
        self.ticket(RequestKind::Mesh(lod_index))
    }

    /// Put a tier back to `NotRequested` after its request could not be
    /// queued, so the next tick asks again.
    pub fn reset_slot(&mut self, lod_index: usize) {
        if let Some(slot) = self.lod_slots.get_mut(lod_index) {
            if matches!(slot, LodSlot::Requested) {
                *slot = LodSlot::NotRequested;
            }
        }
    }

    pub fn distance_to(&self, viewer: DVec2) -> f64 {
        distance_to_bounds(self.center, self.size, viewer)
    }

    /// Run one visibility and LOD update for a viewer at `distance`.
    ///
    /// Chunks that are not `Ready` are never visible and never request meshes.
    pub fn tick(&mut self, distance: f64, selector: &LodSelector) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.stage != ChunkStage::Ready {
            return outcome;
        }

        let visible = selector.is_visible(distance);
        if visible {
            let index = selector.select_lod(distance);
            match &self.lod_slots[index] {
                LodSlot::Cached(_) => {
                    if self.active_lod != Some(index) {
                        self.active_lod = Some(index);
                        outcome.activated = Some(index);
                    }
                }
                LodSlot::NotRequested => {
                    self.lod_slots[index] = LodSlot::Requested;
                    outcome.mesh_requests.push(index);
                }
                LodSlot::Requested => {}
            }
        }

        let collider = selector.collider_index();
        if selector.wants_collider_mesh(distance) {
            if matches!(self.lod_slots[collider], LodSlot::NotRequested) {
                self.lod_slots[collider] = LodSlot::Requested;
                outcome.mesh_requests.push(collider);
            }
            if !self.collider_applied
                && selector.wants_collider(distance)
                && matches!(self.lod_slots[collider], LodSlot::Cached(_))
            {
                self.collider_applied = true;
                outcome.collider_applied = true;
            }
        }

        if visible != self.visible {
            self.visible = visible;
            outcome.visibility = Some(visible);
        }
        outcome
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn center(&self) -> DVec2 {
        self.center
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stage(&self) -> ChunkStage {
        self.stage
    }

    pub fn is_ready(&self) -> bool {
        self.stage == ChunkStage::Ready
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn collider_applied(&self) -> bool {
        self.collider_applied
    }

    pub fn active_lod(&self) -> Option<usize> {
        self.active_lod
    }

    pub fn active_mesh(&self) -> Option<&Arc<MeshData>> {
        self.active_lod.and_then(|i| self.lod_slots[i].mesh())
    }

    pub fn lod_slot(&self, lod_index: usize) -> Option<&LodSlot> {
        self.lod_slots.get(lod_index)
    }

    /// Layers still being assembled.
    pub fn maps(&self) -> &MapStack {
        &self.maps
    }

    /// All three layers, once `Ready`.
    pub fn layers(&self) -> Option<&Arc<ChunkLayers>> {
        self.layers.as_ref()
    }
}
