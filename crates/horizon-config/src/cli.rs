//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Horizon terrain streaming demo.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "horizon", about = "Streams procedural terrain around a moving viewer")]
pub struct CliArgs {
    /// World seed. Every noise seed is derived from it.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Maximum view distance. LOD thresholds are scaled to end here.
    #[arg(long)]
    pub view_distance: Option<f64>,

    /// Background worker threads (0 = auto).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Number of update ticks to run.
    #[arg(long)]
    pub ticks: Option<u32>,

    /// Log level (error, warn, info, debug, trace) or a full filter string.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Write PNG previews of the final chunk into this directory.
    #[arg(long)]
    pub preview_dir: Option<PathBuf>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.terrain = std::mem::take(&mut self.terrain).with_seed(seed);
        }
        if let Some(distance) = args.view_distance {
            self.scale_view_distance(distance);
        }
        if let Some(workers) = args.workers {
            self.streaming.worker_threads = workers;
        }
        if let Some(ticks) = args.ticks {
            self.viewer.ticks = ticks;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(ref dir) = args.preview_dir {
            self.debug.preview_dir = Some(dir.clone());
        }
    }

    /// Scale every LOD threshold so the last one equals `distance`.
    /// Non-positive distances and empty tables are left unchanged.
    fn scale_view_distance(&mut self, distance: f64) {
        let Some(last) = self.lod.levels.last().map(|l| l.visible_distance_threshold) else {
            return;
        };
        if distance <= 0.0 || last <= 0.0 {
            log::warn!("Ignoring view distance override {distance}");
            return;
        }
        let factor = distance / last;
        for level in &mut self.lod.levels {
            level.visible_distance_threshold *= factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            seed: Some(42),
            workers: Some(6),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.terrain.height.noise.seed, 42);
        assert_eq!(config.terrain.moisture.noise.seed, 45);
        assert_eq!(config.streaming.worker_threads, 6);
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.viewer.ticks, 600);
        assert_eq!(config.lod, horizon_lod::LodLevels::default());
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_view_distance_scales_thresholds() {
        let mut config = Config::default();
        let args = CliArgs {
            view_distance: Some(1200.0),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        let thresholds: Vec<f64> = config
            .lod
            .levels
            .iter()
            .map(|l| l.visible_distance_threshold)
            .collect();
        assert_eq!(thresholds, vec![400.0, 800.0, 1200.0]);
        assert!(config.lod.validate().is_ok());
    }

    #[test]
    fn test_invalid_view_distance_ignored() {
        let mut config = Config::default();
        let args = CliArgs {
            view_distance: Some(-5.0),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.lod, horizon_lod::LodLevels::default());
    }

    #[test]
    fn test_parse_from_args() {
        let args = CliArgs::parse_from([
            "horizon",
            "--seed",
            "7",
            "--ticks",
            "30",
            "--preview-dir",
            "out",
        ]);
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.ticks, Some(30));
        assert_eq!(args.preview_dir, Some(PathBuf::from("out")));
        assert!(args.config.is_none());
    }
}
