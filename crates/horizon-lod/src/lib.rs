//! Level-of-detail management: distance-based LOD selection over configurable
//! view-distance thresholds, and the collider LOD.

mod selector;

pub use selector::{LodError, LodInfo, LodLevels, LodSelector, distance_to_bounds};
