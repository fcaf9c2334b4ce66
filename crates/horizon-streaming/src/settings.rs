use serde::{Deserialize, Serialize};

/// Tuning for the streaming core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Background worker threads. `0` picks a count from the CPU count.
    pub worker_threads: usize,
    /// Maximum requests queued or running at once. Further requests wait in
    /// the streamer's backlog.
    pub max_in_flight: usize,
    /// Distance the viewer must travel before the visible set is rescanned.
    pub viewer_move_threshold: f64,
    /// Scans a chunk may be missing from before it is unloaded.
    pub unload_after_scans: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_in_flight: 256,
            viewer_move_threshold: 25.0,
            unload_after_scans: 2,
        }
    }
}

impl StreamingSettings {
    pub fn viewer_move_threshold_sq(&self) -> f64 {
        self.viewer_move_threshold * self.viewer_move_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = StreamingSettings::default();
        assert_eq!(s.worker_threads, 0);
        assert_eq!(s.viewer_move_threshold_sq(), 625.0);
        assert_eq!(s.unload_after_scans, 2);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let s: StreamingSettings = ron::from_str("(worker_threads: 3)").unwrap();
        assert_eq!(s.worker_threads, 3);
        assert_eq!(s.max_in_flight, 256);
    }
}
