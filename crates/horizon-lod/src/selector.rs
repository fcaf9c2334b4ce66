//! Distance-based LOD selection with configurable view-distance thresholds.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from building an invalid LOD table.
#[derive(Debug, Error, PartialEq)]
pub enum LodError {
    #[error("at least one LOD level is required")]
    Empty,

    #[error("LOD thresholds must be positive and strictly increasing (level {index}: {threshold})")]
    NotIncreasing { index: usize, threshold: f64 },

    #[error("collider LOD index {index} out of range for {count} levels")]
    ColliderOutOfRange { index: usize, count: usize },
}

/// One detail tier: the mesh LOD to build and the viewer distance up to which
/// it is used.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodInfo {
    /// Mesh simplification level passed to the mesh builder. 0 is full detail.
    pub lod: u32,
    /// Distance from the viewer to the chunk edge below which this tier
    /// applies.
    pub visible_distance_threshold: f64,
}

impl LodInfo {
    pub fn new(lod: u32, visible_distance_threshold: f64) -> Self {
        Self {
            lod,
            visible_distance_threshold,
        }
    }
}

/// Ordered LOD tiers plus the tier used for collision meshes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodLevels {
    pub levels: Vec<LodInfo>,
    /// Index into `levels` of the tier whose mesh doubles as the collider.
    pub collider_index: usize,
    /// Viewer distance to the chunk edge below which the collider is applied.
    pub collider_distance: f64,
}

impl Default for LodLevels {
    fn default() -> Self {
        Self {
            levels: vec![
                LodInfo::new(0, 200.0),
                LodInfo::new(1, 400.0),
                LodInfo::new(4, 600.0),
            ],
            collider_index: 0,
            collider_distance: 5.0,
        }
    }
}

impl LodLevels {
    /// Build and validate a LOD table.
    pub fn new(levels: Vec<LodInfo>, collider_index: usize) -> Result<Self, LodError> {
        let table = Self {
            levels,
            collider_index,
            ..Self::default()
        };
        table.validate()?;
        Ok(table)
    }

    /// Check that the table is non-empty, thresholds are positive and strictly
    /// increasing, and the collider index is in range.
    pub fn validate(&self) -> Result<(), LodError> {
        if self.levels.is_empty() {
            return Err(LodError::Empty);
        }
        let mut previous = 0.0;
        for (index, info) in self.levels.iter().enumerate() {
            let threshold = info.visible_distance_threshold;
            if threshold.is_nan() || threshold <= previous {
                return Err(LodError::NotIncreasing { index, threshold });
            }
            previous = threshold;
        }
        if self.collider_index >= self.levels.len() {
            return Err(LodError::ColliderOutOfRange {
                index: self.collider_index,
                count: self.levels.len(),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Selects LOD tiers based on distance from the viewer.
#[derive(Clone, Debug)]
pub struct LodSelector {
    levels: LodLevels,
}

impl LodSelector {
    pub fn new(levels: LodLevels) -> Result<Self, LodError> {
        levels.validate()?;
        Ok(Self { levels })
    }

    /// Index of the tier to use at `distance`.
    ///
    /// This is the tier after the last threshold the distance exceeds, capped
    /// at the final tier; 0 when no threshold is exceeded. Distances beyond
    /// [`Self::max_view_distance`] still map to the final tier; visibility is
    /// decided separately by [`Self::is_visible`].
    pub fn select_lod(&self, distance: f64) -> usize {
        let tiers = &self.levels.levels;
        let mut index = 0;
        for (i, info) in tiers.iter().enumerate().take(tiers.len() - 1) {
            if distance > info.visible_distance_threshold {
                index = i + 1;
            } else {
                break;
            }
        }
        index
    }

    /// Distance beyond which chunks are hidden: the last tier's threshold.
    pub fn max_view_distance(&self) -> f64 {
        self.levels
            .levels
            .last()
            .map(|l| l.visible_distance_threshold)
            .unwrap_or(0.0)
    }

    pub fn is_visible(&self, distance: f64) -> bool {
        distance <= self.max_view_distance()
    }

    pub fn tier(&self, index: usize) -> LodInfo {
        self.levels.levels[index]
    }

    pub fn tier_count(&self) -> usize {
        self.levels.len()
    }

    pub fn collider_index(&self) -> usize {
        self.levels.collider_index
    }

    /// Whether the collider tier's mesh should be requested at `distance`.
    pub fn wants_collider_mesh(&self, distance: f64) -> bool {
        distance < self.levels.levels[self.levels.collider_index].visible_distance_threshold
    }

    /// Whether the collider should be applied at `distance`.
    pub fn wants_collider(&self, distance: f64) -> bool {
        distance < self.levels.collider_distance
    }

    pub fn levels(&self) -> &LodLevels {
        &self.levels
    }
}

/// Distance from `viewer` to the nearest point of the axis-aligned square of
/// side `size` centered on `center`. Zero inside.
pub fn distance_to_bounds(center: DVec2, size: f64, viewer: DVec2) -> f64 {
    let half = DVec2::splat(size * 0.5);
    let closest = viewer.clamp(center - half, center + half);
    viewer.distance(closest)
}
