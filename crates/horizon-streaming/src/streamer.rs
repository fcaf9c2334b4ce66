//! The terrain streamer.
//!
//! [`TerrainStreamer`] owns every loaded chunk and the worker pool. Callers
//! drive it from one thread:
//!
//! ```text
//! loop {
//!     streamer.poll();            // apply finished generation and mesh jobs
//!     streamer.update(viewer);    // rescan, unload, visibility and LOD ticks
//!     for event in streamer.drain_events() { /* render, physics */ }
//! }
//! ```
//!
//! Results carry a [`Ticket`]; a result whose chunk was unloaded or replaced,
//! or whose chunk is no longer waiting for it, is discarded without touching
//! any state. A request that fails for its current chunk is abandoned: a mesh
//! tier is asked for again on the next tick, a chunk still generating is
//! unloaded and reloaded by a later scan.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::DVec2;
use horizon_lod::{LodLevels, LodSelector};
use horizon_mesh::{GridMeshBuilder, MeshBuilder, MeshData, MeshSettings};
use horizon_terrain::{
    HeatMap, HeightMap, LayerKind, MoistureMap, PipelineError, TerrainSettings, TileFrame,
    generate_heat_map, generate_height_map, generate_moisture_map,
};
use rustc_hash::FxHashMap;

use crate::chunk::{ChunkLayers, TerrainChunk};
use crate::error::StreamingError;
use crate::events::{EventQueue, StreamEvent};
use crate::settings::StreamingSettings;
use crate::ticket::{ChunkCoord, RequestKind, Ticket};
use crate::worker_pool::{Completion, Job, WorkerPool};

/// Result of a background job.
#[derive(Debug)]
pub enum JobOutput {
    Height(HeightMap),
    Heat(HeatMap),
    Moisture(MoistureMap),
    Mesh(MeshData),
}

/// Snapshot of streamer counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamerStats {
    pub loaded: usize,
    pub visible: usize,
    pub ready: usize,
    pub requests_issued: u64,
    pub stale_discarded: u64,
    pub meshes_built: u64,
    pub in_flight: usize,
    pub backlog: usize,
}

pub struct TerrainStreamer {
    terrain: Arc<TerrainSettings>,
    mesh: Arc<MeshSettings>,
    mesh_builder: Arc<dyn MeshBuilder>,
    selector: LodSelector,
    streaming: StreamingSettings,
    pool: WorkerPool<JobOutput>,
    chunks: FxHashMap<ChunkCoord, TerrainChunk>,
    /// Requests the pool refused while saturated, retried in order.
    backlog: VecDeque<(Ticket, Job<JobOutput>)>,
    events: EventQueue,
    viewer: DVec2,
    last_scan_position: Option<DVec2>,
    scan_cycle: u64,
    next_epoch: u64,
    requests_issued: u64,
    stale_discarded: u64,
    meshes_built: u64,
}

impl TerrainStreamer {
    /// Create a streamer using the default grid mesher.
    pub fn new(
        terrain: TerrainSettings,
        mesh: MeshSettings,
        lod: LodLevels,
        streaming: StreamingSettings,
    ) -> Result<Self, StreamingError> {
        Self::with_mesh_builder(terrain, mesh, lod, streaming, Arc::new(GridMeshBuilder))
    }

    pub fn with_mesh_builder(
        terrain: TerrainSettings,
        mesh: MeshSettings,
        lod: LodLevels,
        streaming: StreamingSettings,
        mesh_builder: Arc<dyn MeshBuilder>,
    ) -> Result<Self, StreamingError> {
        if !(mesh.mesh_world_size.is_finite() && mesh.mesh_world_size > 0.0)
            || mesh.num_verts_per_line < 2
        {
            return Err(StreamingError::InvalidChunkGeometry {
                size: mesh.mesh_world_size,
                verts_per_line: mesh.num_verts_per_line,
            });
        }
        let selector = LodSelector::new(lod)?;
        let threads = match streaming.worker_threads {
            0 => WorkerPool::<JobOutput>::default_thread_count(),
            n => n,
        };
        let pool = WorkerPool::new(threads, streaming.max_in_flight)?;

        tracing::info!(
            threads,
            chunk_size = mesh.mesh_world_size,
            max_view_distance = selector.max_view_distance(),
            lod_tiers = selector.tier_count(),
            "terrain streamer started"
        );

        Ok(Self {
            terrain: Arc::new(terrain),
            mesh: Arc::new(mesh),
            mesh_builder,
            selector,
            streaming,
            pool,
            chunks: FxHashMap::default(),
            backlog: VecDeque::new(),
            events: EventQueue::new(),
            viewer: DVec2::ZERO,
            last_scan_position: None,
            scan_cycle: 0,
            next_epoch: 1,
            requests_issued: 0,
            stale_discarded: 0,
            meshes_built: 0,
        })
    }

    /// Move the viewer and run one visibility pass.
    ///
    /// The visible set is rescanned only once the viewer has moved more than
    /// the configured threshold since the last scan.
    pub fn update(&mut self, viewer: DVec2) {
        self.viewer = viewer;
        self.flush_backlog();

        let moved = match self.last_scan_position {
            Some(last) => last.distance_squared(viewer) > self.streaming.viewer_move_threshold_sq(),
            None => true,
        };
        if moved {
            self.rescan(viewer);
        }

        let ready: Vec<ChunkCoord> = self
            .chunks
            .values()
            .filter(|c| c.is_ready())
            .map(|c| c.coord())
            .collect();
        for coord in ready {
            self.tick_chunk(coord);
        }
    }

    /// Apply every finished job. Returns the number of results drained.
    pub fn poll(&mut self) -> usize {
        let completions = self.pool.drain_results();
        let count = completions.len();
        for completion in completions {
            self.apply(completion);
        }
        self.flush_backlog();
        count
    }

    /// Take all events published since the last call.
    pub fn drain_events(&mut self) -> Vec<StreamEvent> {
        self.events.drain()
    }

    pub fn stats(&self) -> StreamerStats {
        StreamerStats {
            loaded: self.chunks.len(),
            visible: self.chunks.values().filter(|c| c.is_visible()).count(),
            ready: self.chunks.values().filter(|c| c.is_ready()).count(),
            requests_issued: self.requests_issued,
            stale_discarded: self.stale_discarded,
            meshes_built: self.meshes_built,
            in_flight: self.pool.in_flight_count(),
            backlog: self.backlog.len(),
        }
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&TerrainChunk> {
        self.chunks.get(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &TerrainChunk> {
        self.chunks.values()
    }

    /// Outstanding requests for one chunk, queued or running.
    pub fn pending_requests(&self, coord: ChunkCoord) -> usize {
        self.pool.pending_for(&coord)
            + self
                .backlog
                .iter()
                .filter(|(ticket, _)| ticket.coord == coord)
                .count()
    }

    pub fn selector(&self) -> &LodSelector {
        &self.selector
    }

    pub fn viewer(&self) -> DVec2 {
        self.viewer
    }

    pub fn scan_cycle(&self) -> u64 {
        self.scan_cycle
    }

    /// Stop the workers. Queued jobs finish; their results are never applied.
    pub fn shutdown(&mut self) {
        self.backlog.clear();
        self.pool.shutdown();
        tracing::info!(loaded = self.chunks.len(), "terrain streamer stopped");
    }

    fn frame(&self, center: DVec2) -> TileFrame {
        TileFrame::square(
            center,
            self.mesh.mesh_world_size,
            self.mesh.num_verts_per_line,
        )
    }

    fn rescan(&mut self, viewer: DVec2) {
        self.scan_cycle += 1;
        self.last_scan_position = Some(viewer);

        let size = self.mesh.mesh_world_size;
        let here = ChunkCoord::containing(viewer, size);
        let radius = (self.selector.max_view_distance() / size).round() as i32;

        let mut created = 0usize;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let coord = ChunkCoord::new(here.x + dx, here.y + dy);
                match self.chunks.get_mut(&coord) {
                    Some(chunk) => chunk.last_seen = self.scan_cycle,
                    None => {
                        self.load_chunk(coord);
                        created += 1;
                    }
                }
            }
        }

        let cycle = self.scan_cycle;
        let grace = self.streaming.unload_after_scans.max(1);
        let expired: Vec<ChunkCoord> = self
            .chunks
            .values()
            .filter(|c| cycle.saturating_sub(c.last_seen) >= grace)
            .map(|c| c.coord())
            .collect();
        for &coord in &expired {
            self.unload(coord);
        }

        tracing::debug!(
            cycle,
            center = %here,
            radius,
            created,
            unloaded = expired.len(),
            loaded = self.chunks.len(),
            "visible set rescanned"
        );
    }

    /// Drop a chunk, closing its visibility edge first.
    fn unload(&mut self, coord: ChunkCoord) {
        let Some(chunk) = self.chunks.remove(&coord) else {
            return;
        };
        if chunk.is_visible() {
            self.events.push(StreamEvent::VisibilityChanged {
                coord,
                visible: false,
            });
        }
        self.events.push(StreamEvent::ChunkUnloaded { coord });
    }

    fn load_chunk(&mut self, coord: ChunkCoord) {
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let center = self.mesh.chunk_center(coord.as_tuple());
        let mut chunk = TerrainChunk::new(
            coord,
            center,
            self.mesh.mesh_world_size,
            epoch,
            self.selector.tier_count(),
        );
        chunk.last_seen = self.scan_cycle;

        match chunk.begin_loading() {
            Ok(ticket) => {
                self.chunks.insert(coord, chunk);
                let frame = self.frame(center);
                let terrain = Arc::clone(&self.terrain);
                self.dispatch(
                    ticket,
                    Box::new(move || {
                        JobOutput::Height(generate_height_map(&frame, &terrain.height))
                    }),
                );
            }
            Err(err) => tracing::error!(%coord, %err, "failed to start chunk"),
        }
    }

    fn dispatch(&mut self, ticket: Ticket, job: Job<JobOutput>) {
        self.requests_issued += 1;
        if !self.backlog.is_empty() {
            self.backlog.push_back((ticket, job));
            return;
        }
        if let Err(rejected) = self.pool.submit(ticket, job) {
            match rejected.error {
                StreamingError::Saturated { .. } => {
                    self.backlog.push_back((rejected.ticket, rejected.job));
                }
                err => self.abandon(rejected.ticket, &err),
            }
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.chunks
            .get(&ticket.coord)
            .is_some_and(|c| c.epoch() == ticket.epoch)
    }

    fn flush_backlog(&mut self) {
        while let Some((ticket, job)) = self.backlog.pop_front() {
            if !self.is_current(&ticket) {
                tracing::trace!(
                    coord = %ticket.coord,
                    kind = ?ticket.kind,
                    "dropping backlog request for unloaded chunk"
                );
                continue;
            }
            if let Err(rejected) = self.pool.submit(ticket, job) {
                match rejected.error {
                    StreamingError::Saturated { .. } => {
                        self.backlog.push_front((rejected.ticket, rejected.job));
                        break;
                    }
                    err => self.abandon(rejected.ticket, &err),
                }
            }
        }
    }

    /// Give up on a request for a current chunk so it can be issued again.
    fn abandon(&mut self, ticket: Ticket, err: &StreamingError) {
        tracing::warn!(coord = %ticket.coord, kind = ?ticket.kind, %err, "request dropped");
        if !self.is_current(&ticket) {
            return;
        }
        match ticket.kind {
            RequestKind::Mesh(index) => {
                if let Some(chunk) = self.chunks.get_mut(&ticket.coord) {
                    chunk.reset_slot(index);
                }
            }
            RequestKind::Height | RequestKind::Heat | RequestKind::Moisture => {
                self.unload(ticket.coord);
            }
        }
    }

    fn discard(&mut self, ticket: Ticket, reason: &str) {
        self.stale_discarded += 1;
        tracing::debug!(
            coord = %ticket.coord,
            epoch = ticket.epoch,
            kind = ?ticket.kind,
            reason,
            "discarding stale result"
        );
    }

    fn apply(&mut self, completion: Completion<JobOutput>) {
        let Completion {
            ticket,
            output,
            elapsed_us,
        } = completion;

        let center = match self.chunks.get(&ticket.coord) {
            Some(chunk) if chunk.epoch() == ticket.epoch => chunk.center(),
            Some(_) => return self.discard(ticket, "chunk was replaced"),
            None => return self.discard(ticket, "chunk was unloaded"),
        };

        tracing::trace!(coord = %ticket.coord, kind = ?ticket.kind, elapsed_us, "result received");

        let output = match output {
            Ok(output) => output,
            Err(err) => return self.abandon(ticket, &err),
        };
        match self.advance(ticket, output, center) {
            Ok(Some((next, job))) => self.dispatch(next, job),
            Ok(None) => self.tick_chunk(ticket.coord),
            Err(err) => {
                let reason = err.to_string();
                self.discard(ticket, &reason);
            }
        }
    }

    /// Feed one result into its chunk. Returns the follow-up request, if any.
    fn advance(
        &mut self,
        ticket: Ticket,
        output: JobOutput,
        center: DVec2,
    ) -> Result<Option<(Ticket, Job<JobOutput>)>, StreamingError> {
        let frame = self.frame(center);
        let terrain = Arc::clone(&self.terrain);
        let Some(chunk) = self.chunks.get_mut(&ticket.coord) else {
            return Ok(None);
        };

        let unexpected = |chunk: &TerrainChunk| StreamingError::UnexpectedResult {
            coord: ticket.coord,
            stage: chunk.stage(),
            kind: ticket.kind,
        };

        match (ticket.kind, output) {
            (RequestKind::Height, JobOutput::Height(map)) => {
                let height = map.clone();
                let next = chunk.on_height_ready(map)?;
                tracing::debug!(coord = %ticket.coord, "height ready");
                let job: Job<JobOutput> = Box::new(move || {
                    JobOutput::Heat(generate_heat_map(&frame, &terrain.heat, &height))
                });
                Ok(Some((next, job)))
            }
            (RequestKind::Heat, JobOutput::Heat(map)) => {
                let heat = map.clone();
                let next = chunk.on_heat_ready(map)?;
                let height = chunk.maps().height().cloned().ok_or(
                    PipelineError::MissingUpstream {
                        layer: LayerKind::Moisture,
                        missing: LayerKind::Height,
                    },
                )?;
                tracing::debug!(coord = %ticket.coord, "heat ready");
                let job: Job<JobOutput> = Box::new(move || {
                    JobOutput::Moisture(generate_moisture_map(
                        &frame,
                        &terrain.moisture,
                        &height,
                        &heat,
                    ))
                });
                Ok(Some((next, job)))
            }
            (RequestKind::Moisture, JobOutput::Moisture(map)) => {
                chunk.on_moisture_ready(map)?;
                let height_range = chunk
                    .layers()
                    .map(|l| (l.height.min, l.height.max))
                    .unwrap_or_default();
                tracing::debug!(coord = %ticket.coord, ?height_range, "chunk ready");
                self.events.push(StreamEvent::ChunkReady {
                    coord: ticket.coord,
                    height_range,
                });
                Ok(None)
            }
            (RequestKind::Mesh(index), JobOutput::Mesh(mesh)) => {
                chunk.on_mesh_ready(index, mesh)?;
                self.meshes_built += 1;
                Ok(None)
            }
            _ => Err(unexpected(chunk)),
        }
    }

    fn mesh_job(&self, layers: Arc<ChunkLayers>, lod: u32) -> Job<JobOutput> {
        let builder = Arc::clone(&self.mesh_builder);
        let settings = Arc::clone(&self.mesh);
        Box::new(move || {
            JobOutput::Mesh(builder.build(
                &layers.height,
                &layers.heat,
                &layers.moisture,
                &settings,
                lod,
            ))
        })
    }

    fn tick_chunk(&mut self, coord: ChunkCoord) {
        let Some(chunk) = self.chunks.get_mut(&coord) else {
            return;
        };
        let distance = chunk.distance_to(self.viewer);
        let outcome = chunk.tick(distance, &self.selector);
        if outcome.is_empty() {
            return;
        }

        let layers = chunk.layers().cloned();
        let requests: Vec<(Ticket, u32)> = outcome
            .mesh_requests
            .iter()
            .map(|&i| (chunk.mesh_ticket(i), self.selector.tier(i).lod))
            .collect();

        if let Some(visible) = outcome.visibility {
            self.events
                .push(StreamEvent::VisibilityChanged { coord, visible });
        }
        if let Some(lod_index) = outcome.activated {
            self.events.push(StreamEvent::MeshActivated {
                coord,
                lod_index,
                lod: self.selector.tier(lod_index).lod,
            });
        }
        if outcome.collider_applied {
            tracing::debug!(%coord, "collider applied");
            self.events.push(StreamEvent::ColliderApplied { coord });
        }

        if let Some(layers) = layers {
            for (ticket, lod) in requests {
                let job = self.mesh_job(Arc::clone(&layers), lod);
                self.dispatch(ticket, job);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::LodSlot;
    use horizon_terrain::LayeredMap;
    use std::time::{Duration, Instant};

    fn test_mesh() -> MeshSettings {
        MeshSettings {
            num_verts_per_line: 9,
            mesh_world_size: 240.0,
        }
    }

    fn streamer_with(streaming: StreamingSettings) -> TerrainStreamer {
        let mut terrain = TerrainSettings::default().with_seed(3);
        terrain.height.use_rivers = false;
        TerrainStreamer::new(terrain, test_mesh(), LodLevels::default(), streaming).unwrap()
    }

    fn test_streamer(max_in_flight: usize) -> TerrainStreamer {
        streamer_with(StreamingSettings {
            worker_threads: 2,
            max_in_flight,
            ..Default::default()
        })
    }

    fn pump_until(
        streamer: &mut TerrainStreamer,
        viewer: DVec2,
        events: &mut Vec<StreamEvent>,
        done: impl Fn(&TerrainStreamer) -> bool,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_secs(30);
        while Instant::now() < deadline {
            streamer.poll();
            streamer.update(viewer);
            events.extend(streamer.drain_events());
            if done(streamer) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn flat(v: f32) -> LayeredMap {
        LayeredMap::from_values(9, 9, vec![v; 81])
    }

    #[test]
    fn test_initial_scan_covers_view_radius() {
        let mut streamer = test_streamer(256);
        streamer.update(DVec2::ZERO);
        // round(600 / 240) = 3 chunks each way.
        assert_eq!(streamer.stats().loaded, 49);
        assert_eq!(streamer.scan_cycle(), 1);
        assert_eq!(streamer.stats().requests_issued, 49);
    }

    #[test]
    fn test_small_moves_do_not_rescan() {
        let mut streamer = test_streamer(256);
        streamer.update(DVec2::ZERO);
        streamer.update(DVec2::new(10.0, 10.0));
        assert_eq!(streamer.scan_cycle(), 1);
        streamer.update(DVec2::new(30.0, 0.0));
        assert_eq!(streamer.scan_cycle(), 2);
    }

    #[test]
    fn test_pipeline_reaches_ready_and_activates_mesh() {
        let mut streamer = test_streamer(8);
        let origin = ChunkCoord::new(0, 0);
        let mut events = Vec::new();

        let done = pump_until(&mut streamer, DVec2::ZERO, &mut events, |s| {
            s.chunk(origin)
                .is_some_and(|c| c.collider_applied() && c.active_mesh().is_some())
        });
        assert!(done, "origin chunk never became active");

        let chunk = streamer.chunk(origin).unwrap();
        assert!(chunk.is_ready());
        assert!(chunk.is_visible());
        assert_eq!(chunk.active_lod(), Some(0));
        assert!(events.contains(&StreamEvent::ChunkReady {
            coord: origin,
            height_range: chunk
                .layers()
                .map(|l| (l.height.min, l.height.max))
                .unwrap(),
        }));
        assert!(events.contains(&StreamEvent::MeshActivated {
            coord: origin,
            lod_index: 0,
            lod: 0,
        }));
        assert!(streamer.stats().meshes_built >= 1);
    }

    #[test]
    fn test_events_fire_once_per_edge() {
        let mut streamer = test_streamer(64);
        let origin = ChunkCoord::new(0, 0);
        let mut events = Vec::new();
        assert!(pump_until(&mut streamer, DVec2::ZERO, &mut events, |s| {
            s.chunk(origin).is_some_and(|c| c.collider_applied())
        }));
        for _ in 0..20 {
            streamer.poll();
            streamer.update(DVec2::ZERO);
            events.extend(streamer.drain_events());
        }

        let count =
            |pred: &dyn Fn(&StreamEvent) -> bool| events.iter().filter(|&e| pred(e)).count();
        let shown = StreamEvent::VisibilityChanged {
            coord: origin,
            visible: true,
        };
        assert_eq!(count(&|e| *e == shown), 1);
        assert_eq!(
            count(&|e| matches!(e, StreamEvent::ColliderApplied { coord } if *coord == origin)),
            1
        );
        assert_eq!(
            count(&|e| matches!(e, StreamEvent::ChunkReady { coord, .. } if *coord == origin)),
            1
        );
    }

    #[test]
    fn test_stale_results_are_discarded() {
        let mut streamer = test_streamer(256);
        streamer.update(DVec2::ZERO);
        let origin = ChunkCoord::new(0, 0);
        let epoch = streamer.chunk(origin).unwrap().epoch();

        // Wrong epoch.
        streamer.apply(Completion {
            ticket: Ticket::new(origin, epoch + 1000, RequestKind::Height),
            output: Ok(JobOutput::Height(HeightMap(flat(1.0)))),
            elapsed_us: 0,
        });
        // Unknown chunk.
        streamer.apply(Completion {
            ticket: Ticket::new(ChunkCoord::new(500, 500), 1, RequestKind::Height),
            output: Ok(JobOutput::Height(HeightMap(flat(1.0)))),
            elapsed_us: 0,
        });
        // Right chunk, but it is not waiting for heat.
        streamer.apply(Completion {
            ticket: Ticket::new(origin, epoch, RequestKind::Heat),
            output: Ok(JobOutput::Heat(HeatMap(flat(0.5)))),
            elapsed_us: 0,
        });

        let stats = streamer.stats();
        assert_eq!(stats.stale_discarded, 3);
        let chunk = streamer.chunk(origin).unwrap();
        assert_eq!(chunk.stage(), crate::chunk::ChunkStage::HeightPending);
        assert!(chunk.maps().height().is_none());
        assert_eq!(stats.requests_issued, 49);
    }

    #[test]
    fn test_manual_results_drive_transitions() {
        let mut streamer = test_streamer(256);
        streamer.update(DVec2::ZERO);
        let origin = ChunkCoord::new(0, 0);
        let epoch = streamer.chunk(origin).unwrap().epoch();
        let issued = streamer.stats().requests_issued;

        streamer.apply(Completion {
            ticket: Ticket::new(origin, epoch, RequestKind::Height),
            output: Ok(JobOutput::Height(HeightMap(flat(1.0)))),
            elapsed_us: 0,
        });
        assert_eq!(
            streamer.chunk(origin).unwrap().stage(),
            crate::chunk::ChunkStage::HeatPending
        );
        assert_eq!(streamer.stats().requests_issued, issued + 1);

        // The real height job for the same ticket is now stale.
        streamer.apply(Completion {
            ticket: Ticket::new(origin, epoch, RequestKind::Height),
            output: Ok(JobOutput::Height(HeightMap(flat(2.0)))),
            elapsed_us: 0,
        });
        assert_eq!(streamer.stats().stale_discarded, 1);
        assert_eq!(streamer.chunk(origin).unwrap().maps().height().unwrap().min, 1.0);
    }

    #[test]
    fn test_chunks_unload_after_leaving_radius() {
        let mut streamer = test_streamer(16);
        let origin = ChunkCoord::new(0, 0);
        streamer.update(DVec2::ZERO);
        assert!(streamer.chunk(origin).is_some());

        let far = DVec2::new(100_000.0, 0.0);
        streamer.update(far);
        // Missing from one scan: kept.
        assert!(streamer.chunk(origin).is_some());

        streamer.update(far + DVec2::new(100.0, 0.0));
        assert!(streamer.chunk(origin).is_none());
        let events = streamer.drain_events();
        assert!(events.contains(&StreamEvent::ChunkUnloaded { coord: origin }));

        // Results for the unloaded chunks drain as stale.
        let deadline = Instant::now() + Duration::from_secs(30);
        while streamer.stats().stale_discarded == 0 && Instant::now() < deadline {
            streamer.poll();
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(streamer.stats().stale_discarded > 0);
    }

    #[test]
    fn test_unloading_visible_chunk_closes_visibility_edge() {
        let mut streamer = streamer_with(StreamingSettings {
            worker_threads: 2,
            max_in_flight: 64,
            unload_after_scans: 1,
            ..Default::default()
        });
        let origin = ChunkCoord::new(0, 0);
        let mut events = Vec::new();
        assert!(pump_until(&mut streamer, DVec2::ZERO, &mut events, |s| {
            s.chunk(origin).is_some_and(|c| c.is_visible())
        }));

        streamer.update(DVec2::new(100_000.0, 0.0));
        events.extend(streamer.drain_events());
        assert!(streamer.chunk(origin).is_none());

        let position = |wanted: &StreamEvent| events.iter().position(|e| e == wanted);
        let shown = StreamEvent::VisibilityChanged {
            coord: origin,
            visible: true,
        };
        let hidden = StreamEvent::VisibilityChanged {
            coord: origin,
            visible: false,
        };
        let unloaded = StreamEvent::ChunkUnloaded { coord: origin };
        assert_eq!(events.iter().filter(|&e| *e == shown).count(), 1);
        assert_eq!(events.iter().filter(|&e| *e == hidden).count(), 1);
        assert!(position(&hidden).unwrap() < position(&unloaded).unwrap());
    }

    #[test]
    fn test_hidden_chunks_unload_without_visibility_event() {
        let mut streamer = streamer_with(StreamingSettings {
            worker_threads: 2,
            unload_after_scans: 1,
            ..Default::default()
        });
        streamer.update(DVec2::ZERO);
        streamer.drain_events();

        streamer.update(DVec2::new(100_000.0, 0.0));
        let events = streamer.drain_events();
        assert!(events.contains(&StreamEvent::ChunkUnloaded {
            coord: ChunkCoord::new(0, 0)
        }));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, StreamEvent::VisibilityChanged { .. }))
        );
    }

    #[test]
    fn test_refused_mesh_request_is_asked_again() {
        let mut streamer = test_streamer(256);
        streamer.update(DVec2::ZERO);
        let origin = ChunkCoord::new(0, 0);
        let epoch = streamer.chunk(origin).unwrap().epoch();

        streamer.apply(Completion {
            ticket: Ticket::new(origin, epoch, RequestKind::Height),
            output: Ok(JobOutput::Height(HeightMap(flat(1.0)))),
            elapsed_us: 0,
        });
        streamer.apply(Completion {
            ticket: Ticket::new(origin, epoch, RequestKind::Heat),
            output: Ok(JobOutput::Heat(HeatMap(flat(0.5)))),
            elapsed_us: 0,
        });

        // Mesh requests issued from here on are refused.
        streamer.pool.shutdown();
        streamer.apply(Completion {
            ticket: Ticket::new(origin, epoch, RequestKind::Moisture),
            output: Ok(JobOutput::Moisture(MoistureMap(flat(0.4)))),
            elapsed_us: 0,
        });

        let chunk = streamer.chunk(origin).unwrap();
        assert!(chunk.is_ready());
        assert!(matches!(chunk.lod_slot(0), Some(LodSlot::NotRequested)));
        assert!(chunk.active_mesh().is_none());
        assert_eq!(streamer.stats().meshes_built, 0);
    }

    #[test]
    fn test_failed_generation_unloads_chunk_until_next_scan() {
        let mut streamer = test_streamer(256);
        streamer.update(DVec2::ZERO);
        streamer.drain_events();
        let origin = ChunkCoord::new(0, 0);
        let epoch = streamer.chunk(origin).unwrap().epoch();

        streamer.apply(Completion {
            ticket: Ticket::new(origin, epoch, RequestKind::Height),
            output: Err(StreamingError::JobPanicked {
                message: "boom".to_string(),
            }),
            elapsed_us: 0,
        });
        assert!(streamer.chunk(origin).is_none());
        assert_eq!(
            streamer.drain_events(),
            vec![StreamEvent::ChunkUnloaded { coord: origin }]
        );

        streamer.update(DVec2::new(30.0, 0.0));
        let reloaded = streamer.chunk(origin).unwrap();
        assert_ne!(reloaded.epoch(), epoch);
        assert_eq!(reloaded.stage(), crate::chunk::ChunkStage::HeightPending);
    }

    #[test]
    fn test_invalid_chunk_geometry_rejected() {
        for mesh in [
            MeshSettings {
                mesh_world_size: 0.0,
                ..test_mesh()
            },
            MeshSettings {
                mesh_world_size: -240.0,
                ..test_mesh()
            },
            MeshSettings {
                num_verts_per_line: 1,
                ..test_mesh()
            },
        ] {
            let result = TerrainStreamer::new(
                TerrainSettings::default(),
                mesh,
                LodLevels::default(),
                StreamingSettings::default(),
            );
            assert!(matches!(
                result,
                Err(StreamingError::InvalidChunkGeometry { .. })
            ));
        }
    }

    #[test]
    fn test_saturation_goes_to_backlog() {
        let mut streamer = test_streamer(4);
        streamer.update(DVec2::ZERO);
        let stats = streamer.stats();
        assert_eq!(stats.requests_issued, 49);
        assert!(stats.backlog > 0);
        assert!(streamer.pending_requests(ChunkCoord::new(3, 3)) <= 1);
    }

    #[test]
    fn test_invalid_lod_table_rejected() {
        let lod = LodLevels {
            levels: Vec::new(),
            ..Default::default()
        };
        let result = TerrainStreamer::new(
            TerrainSettings::default(),
            MeshSettings::default(),
            lod,
            StreamingSettings::default(),
        );
        assert!(matches!(result, Err(StreamingError::Lod(_))));
    }
}
