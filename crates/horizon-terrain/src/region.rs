//! Deterministic region utilities.
//!
//! Regions are fixed-size world squares that act as the unit of seeding for
//! shoreline shapes and river sources. Every tile that overlaps a region must
//! regenerate exactly the same shapes and rivers for it, so everything here is
//! a pure function of its inputs: stable fixed-point hashing, a ChaCha RNG per
//! region, epsilon snapping, and `libm` trigonometry.

use glam::DVec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Grid that every shape center, river point and sample position is rounded to.
pub const POSITION_EPSILON: f64 = 0.001;

const SNAP_SCALE: f64 = 1.0 / POSITION_EPSILON;

// ---------------------------------------------------------------------------
// Region addressing
// ---------------------------------------------------------------------------

/// Return the region "center" enclosing `position`.
///
/// This is the floor-divided, re-multiplied corner of the region square; the
/// whole region spans `[center, center + region_size)` on both axes.
pub fn region_center(position: DVec2, region_size: f64) -> DVec2 {
    DVec2::new(
        (position.x / region_size).floor() * region_size,
        (position.y / region_size).floor() * region_size,
    )
}

/// Iterate over the region centers within `radius` regions of `center`,
/// row by row, `center` included.
pub fn regions_around(
    center: DVec2,
    region_size: f64,
    radius: i32,
) -> impl Iterator<Item = DVec2> {
    (-radius..=radius).flat_map(move |dy| {
        (-radius..=radius).map(move |dx| {
            DVec2::new(
                center.x + region_size * dx as f64,
                center.y + region_size * dy as f64,
            )
        })
    })
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Stable 32-bit hash of a 2D point.
///
/// Coordinates are truncated to fixed point with two decimal places and
/// combined as `x * 31 + y` with wrapping arithmetic. No process-local state is
/// involved, so the result is identical across runs and machines.
pub fn stable_hash(point: DVec2) -> i32 {
    let x = (point.x * 100.0) as i32;
    let y = (point.y * 100.0) as i32;
    x.wrapping_mul(31).wrapping_add(y)
}

/// Deterministic RNG for the region at `center`.
pub fn region_rng(center: DVec2) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(stable_hash(center) as i64 as u64)
}

// ---------------------------------------------------------------------------
// Snapping
// ---------------------------------------------------------------------------

/// Round a coordinate to the [`POSITION_EPSILON`] grid.
#[inline]
pub fn snap(value: f64) -> f64 {
    (value * SNAP_SCALE).round() / SNAP_SCALE
}

/// Round both axes of a point to the [`POSITION_EPSILON`] grid.
#[inline]
pub fn snap_point(point: DVec2) -> DVec2 {
    DVec2::new(snap(point.x), snap(point.y))
}

// ---------------------------------------------------------------------------
// Deterministic math (libm)
// ---------------------------------------------------------------------------

/// Deterministic sine using libm (not platform libc).
#[inline]
pub fn det_sin(x: f64) -> f64 {
    libm::sin(x)
}

/// Deterministic cosine using libm.
#[inline]
pub fn det_cos(x: f64) -> f64 {
    libm::cos(x)
}

/// Deterministic atan2 using libm.
#[inline]
pub fn det_atan2(y: f64, x: f64) -> f64 {
    libm::atan2(y, x)
}
