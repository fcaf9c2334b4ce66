//! Flies a viewer across procedurally generated terrain and streams chunks
//! around it, logging streaming statistics as it goes.

mod export;

use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use glam::DVec2;
use horizon_config::{CliArgs, Config};
use horizon_streaming::{ChunkCoord, StreamEvent, StreamingError, TerrainStreamer};
use tracing::{error, info, warn};

use crate::export::{ExportError, export_layers};

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Streaming(#[from] StreamingError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Counts of events seen during a run.
#[derive(Debug, Default)]
struct EventTally {
    ready: usize,
    shown: usize,
    hidden: usize,
    activated: usize,
    colliders: usize,
    unloaded: usize,
}

impl EventTally {
    fn record(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::ChunkReady { .. } => self.ready += 1,
            StreamEvent::VisibilityChanged { visible: true, .. } => self.shown += 1,
            StreamEvent::VisibilityChanged { visible: false, .. } => self.hidden += 1,
            StreamEvent::MeshActivated { .. } => self.activated += 1,
            StreamEvent::ColliderApplied { .. } => self.colliders += 1,
            StreamEvent::ChunkUnloaded { .. } => self.unloaded += 1,
        }
    }
}

fn viewer_position(config: &Config, tick: u32) -> DVec2 {
    DVec2::from_array(config.viewer.start) + DVec2::from_array(config.viewer.velocity) * tick as f64
}

fn run(config: &Config) -> Result<(), DemoError> {
    let mut streamer = TerrainStreamer::new(
        config.terrain.clone(),
        config.mesh.clone(),
        config.lod.clone(),
        config.streaming.clone(),
    )?;

    let interval = Duration::from_millis(config.viewer.tick_interval_ms);
    let mut tally = EventTally::default();
    let start = Instant::now();
    let mut viewer = viewer_position(config, 0);

    for tick in 0..config.viewer.ticks {
        viewer = viewer_position(config, tick);
        streamer.poll();
        streamer.update(viewer);
        for event in streamer.drain_events() {
            tally.record(&event);
        }

        if config.viewer.stats_every > 0 && tick % config.viewer.stats_every == 0 {
            let stats = streamer.stats();
            info!(
                tick,
                x = viewer.x,
                y = viewer.y,
                loaded = stats.loaded,
                ready = stats.ready,
                visible = stats.visible,
                in_flight = stats.in_flight,
                backlog = stats.backlog,
                "streaming"
            );
        }

        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    if let Some(dir) = &config.debug.preview_dir {
        export_viewer_chunk(&mut streamer, config, viewer, dir)?;
    }

    let stats = streamer.stats();
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        requests = stats.requests_issued,
        meshes = stats.meshes_built,
        stale = stats.stale_discarded,
        ready_events = tally.ready,
        shown = tally.shown,
        hidden = tally.hidden,
        activated = tally.activated,
        colliders = tally.colliders,
        unloaded = tally.unloaded,
        "flight finished"
    );

    streamer.shutdown();
    Ok(())
}

/// Wait for the chunk under the viewer to finish generating, then write its
/// layer previews.
fn export_viewer_chunk(
    streamer: &mut TerrainStreamer,
    config: &Config,
    viewer: DVec2,
    dir: &Path,
) -> Result<(), DemoError> {
    let coord = ChunkCoord::containing(viewer, config.mesh.mesh_world_size);
    let deadline = Instant::now() + Duration::from_secs(30);

    while Instant::now() < deadline {
        if let Some(layers) = streamer.chunk(coord).and_then(|c| c.layers()) {
            let written = export_layers(dir, coord, layers)?;
            info!(%coord, files = written.len(), dir = %dir.display(), "previews written");
            return Ok(());
        }
        streamer.poll();
        streamer.update(viewer);
        std::thread::sleep(Duration::from_millis(5));
    }

    warn!(%coord, "chunk under the viewer never became ready; no previews written");
    Ok(())
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = match args.config.clone().map_or_else(Config::default_dir, Ok) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    horizon_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
