//! River network: per-region sources, steepest-descent tracing, and channel
//! carving.
//!
//! Sources are seeded from the region RNG, so every tile that can see a river
//! traces it from the same source. Tracing walks the global sample lattice and
//! reads heights through a [`HeightLookup`]; as long as the lookup returns the
//! same value for the same lattice vertex regardless of which tile asks, the
//! traced polyline is identical everywhere.

use std::f64::consts::{FRAC_PI_4, TAU};

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::region::{det_cos, det_sin, region_center, region_rng, regions_around, snap_point};
use crate::tile::{Rect, TileFrame};

/// Parameters of the river generator. Widths and depths are in world units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiverSettings {
    pub region_size: f64,
    /// Fade from full carving to untouched terrain beyond the channel width.
    pub transition_width: f64,
    /// Channel floor depth below sea level.
    pub depth: f64,
    pub base_width: f64,
    /// Width gained per unit of flow volume.
    pub width_growth: f64,
    pub rivers_per_region: u32,
    pub max_steps: u32,
    /// Flow volume added per traced step.
    pub flow_increment: f64,
    pub initial_flow: f64,
}

impl Default for RiverSettings {
    fn default() -> Self {
        Self {
            region_size: 2000.0,
            transition_width: 150.0,
            depth: 35.0,
            base_width: 50.0,
            width_growth: 0.2,
            rivers_per_region: 3,
            max_steps: 100,
            flow_increment: 0.1,
            initial_flow: 1.0,
        }
    }
}

impl RiverSettings {
    /// Regions to scan in each direction around the tile's own region.
    pub fn regions_to_check(&self) -> i32 {
        // Influence radius is one region size.
        ((self.region_size * 2.0) / self.region_size).ceil() as i32 + 2
    }

    /// Channel width for a segment ending with `flow` volume.
    pub fn segment_width(&self, flow: f64) -> f64 {
        self.base_width * (1.0 + flow * self.width_growth)
    }

    /// Largest flow volume a fully traced river can reach.
    pub fn max_flow(&self) -> f64 {
        self.initial_flow + self.max_steps as f64 * self.flow_increment
    }

    /// Farthest distance from a source at which its river can still carve,
    /// given a lattice `spacing`.
    pub fn reach_from_source(&self, spacing: f64) -> f64 {
        // Each step moves one spacing; snapping can add at most a micro-unit.
        let path = self.max_steps as f64 * (spacing + 0.001);
        path + self.segment_width(self.max_flow()) + self.transition_width
    }

    /// Extra margin around a tile inside which tracing may sample heights.
    pub fn lookup_margin(&self, spacing: f64) -> f64 {
        self.reach_from_source(spacing) + (self.max_steps as f64 + 1.0) * (spacing + 0.001)
    }
}

/// A traced river polyline.
///
/// `volumes[i]` is the flow volume after reaching `points[i]`; it starts at the
/// initial flow and grows by a fixed increment per step, so it never decreases
/// downstream.
#[derive(Clone, Debug, PartialEq)]
pub struct RiverPath {
    pub source: DVec2,
    pub points: Vec<DVec2>,
    pub volumes: Vec<f64>,
}

impl RiverPath {
    pub fn new(source: DVec2, initial_flow: f64) -> Self {
        Self {
            source,
            points: vec![source],
            volumes: vec![initial_flow],
        }
    }

    /// Flow volume at the mouth.
    pub fn flow_volume(&self) -> f64 {
        self.volumes.last().copied().unwrap_or(0.0)
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    fn push(&mut self, point: DVec2, increment: f64) {
        let flow = self.flow_volume() + increment;
        self.points.push(point);
        self.volumes.push(flow);
    }
}

/// Height source used while tracing.
pub trait HeightLookup {
    /// Height at (or nearest to) `point`, in the same units as sea level.
    fn height_at(&self, point: DVec2) -> f64;

    /// Distance between adjacent lattice vertices; also the tracing step.
    fn spacing(&self) -> f64;
}

/// Lookup over a tile grid that falls back to a closure for lattice vertices
/// outside the grid.
///
/// Both paths resolve `point` to its nearest global lattice vertex first, so a
/// neighbouring tile asking about the same vertex gets the same answer provided
/// `fallback` evaluates the same function the grid was filled from.
pub struct LatticeLookup<'a, F> {
    frame: &'a TileFrame,
    values: &'a [f32],
    fallback: F,
}

impl<'a, F> LatticeLookup<'a, F>
where
    F: Fn(DVec2) -> f32,
{
    pub fn new(frame: &'a TileFrame, values: &'a [f32], fallback: F) -> Self {
        Self {
            frame,
            values,
            fallback,
        }
    }
}

impl<F> HeightLookup for LatticeLookup<'_, F>
where
    F: Fn(DVec2) -> f32,
{
    fn height_at(&self, point: DVec2) -> f64 {
        let (ix, iy) = self.frame.nearest_lattice_index(point);
        match self.frame.grid_index(ix, iy) {
            Some(i) => self.values[i] as f64,
            None => (self.fallback)(self.frame.lattice_position(ix, iy)) as f64,
        }
    }

    fn spacing(&self) -> f64 {
        self.frame.vertex_spacing()
    }
}

/// Source points of the rivers seeded by the region at `center`.
///
/// Each source draws an angle then a distance fraction from the region RNG.
pub fn region_sources(center: DVec2, settings: &RiverSettings) -> Vec<DVec2> {
    let mut rng = region_rng(center);
    (0..settings.rivers_per_region)
        .map(|_| {
            let angle = rng.random::<f64>() * TAU;
            let dist = rng.random::<f64>() * 0.3 + 0.2;
            let offset = DVec2::new(det_cos(angle), det_sin(angle)) * settings.region_size * dist;
            snap_point(center + offset)
        })
        .collect()
}

/// Follow steepest descent from `source`.
///
/// Stops when the current height is at or below `sea_level`, when no compass
/// neighbour is strictly lower, or after `max_steps` iterations.
pub fn trace_river(
    source: DVec2,
    lookup: &dyn HeightLookup,
    sea_level: f64,
    settings: &RiverSettings,
) -> RiverPath {
    let mut river = RiverPath::new(source, settings.initial_flow);
    let spacing = lookup.spacing();
    let mut current = source;

    for _ in 0..settings.max_steps {
        let current_height = lookup.height_at(current);
        if current_height <= sea_level {
            break;
        }

        let mut lowest = None;
        let mut lowest_height = current_height;
        for i in 0..8 {
            let angle = i as f64 * FRAC_PI_4;
            let candidate =
                snap_point(current + DVec2::new(det_cos(angle), det_sin(angle)) * spacing);
            let h = lookup.height_at(candidate);
            if h < lowest_height {
                lowest_height = h;
                lowest = Some(candidate);
            }
        }

        let Some(next) = lowest else {
            break;
        };
        river.push(next, settings.flow_increment);
        current = next;
    }

    river
}

/// Trace every river that can reach `bounds`.
pub fn collect_rivers(
    bounds: Rect,
    lookup: &dyn HeightLookup,
    sea_level: f64,
    settings: &RiverSettings,
) -> Vec<RiverPath> {
    let r = settings.region_size;
    let reach = settings.reach_from_source(lookup.spacing());
    let home = region_center(bounds.center(), r);

    let mut rivers = Vec::new();
    for center in regions_around(home, r, settings.regions_to_check()) {
        // Sources lie at most half a region from the region center.
        if bounds.distance_to_point(center) > reach + r * 0.5 {
            continue;
        }
        for source in region_sources(center, settings) {
            if bounds.distance_to_point(source) > reach {
                continue;
            }
            rivers.push(trace_river(source, lookup, sea_level, settings));
        }
    }
    rivers
}

/// Distance from `point` to the segment `a..b`; point distance when the
/// segment has zero length.
pub fn distance_to_segment(point: DVec2, a: DVec2, b: DVec2) -> f64 {
    let line = b - a;
    let len_sq = line.length_squared();
    if len_sq == 0.0 {
        return point.distance(a);
    }
    let t = ((point - a).dot(line) / len_sq).clamp(0.0, 1.0);
    point.distance(a + line * t)
}

/// Strongest carving influence in `[0, 1]` of any river segment at `point`.
pub fn river_influence(point: DVec2, rivers: &[RiverPath], settings: &RiverSettings) -> f64 {
    let mut influence: f64 = 0.0;
    for river in rivers {
        for i in 1..river.points.len() {
            let dist = distance_to_segment(point, river.points[i - 1], river.points[i]);
            let reach = settings.segment_width(river.volumes[i]) + settings.transition_width;
            if dist < reach {
                influence = influence.max(1.0 - (dist / reach).clamp(0.0, 1.0));
            }
        }
    }
    influence
}

/// Blend a height towards the channel floor.
pub fn carve(height: f64, influence: f64, sea_level: f64, settings: &RiverSettings) -> f64 {
    if influence <= 0.0 {
        return height;
    }
    let floor = sea_level - settings.depth;
    height + (floor - height) * influence
}

/// Carve rivers into a grid of world-unit heights laid out by `frame`.
///
/// `fallback` must evaluate the same height function `values` was filled
/// from, for lattice vertices outside the grid.
pub fn apply_rivers<F>(
    values: &mut [f32],
    frame: &TileFrame,
    sea_level: f64,
    settings: &RiverSettings,
    fallback: F,
) -> Vec<RiverPath>
where
    F: Fn(DVec2) -> f32,
{
    let rivers = {
        let lookup = LatticeLookup::new(frame, values, fallback);
        collect_rivers(frame.bounds(), &lookup, sea_level, settings)
    };

    if rivers.iter().all(|r| r.segment_count() == 0) {
        return rivers;
    }

    for y in 0..frame.height {
        for x in 0..frame.width {
            let i = y * frame.width + x;
            let p = frame.sample_position(x, y);
            let influence = river_influence(p, &rivers, settings);
            values[i] = carve(values[i] as f64, influence, sea_level, settings) as f32;
        }
    }
    rivers
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Analytic lookup on a fixed lattice.
    struct FnLookup<F: Fn(DVec2) -> f64> {
        f: F,
        spacing: f64,
    }

    impl<F: Fn(DVec2) -> f64> HeightLookup for FnLookup<F> {
        fn height_at(&self, point: DVec2) -> f64 {
            let snapped = (point / self.spacing).round() * self.spacing;
            (self.f)(snapped)
        }

        fn spacing(&self) -> f64 {
            self.spacing
        }
    }

    fn bowl(center: DVec2) -> FnLookup<impl Fn(DVec2) -> f64> {
        FnLookup {
            f: move |p: DVec2| 10.0 + p.distance(center) * 0.5,
            spacing: 4.0,
        }
    }

    #[test]
    fn test_source_at_local_minimum_stops_after_one_step() {
        let source = DVec2::new(40.0, -80.0);
        let lookup = bowl(source);
        let river = trace_river(source, &lookup, 0.0, &RiverSettings::default());
        assert_eq!(river.points, vec![source]);
        assert_eq!(river.volumes, vec![1.0]);
        assert_eq!(river.segment_count(), 0);
    }

    #[test]
    fn test_stops_at_sea_level() {
        let lookup = FnLookup {
            f: |_p: DVec2| -1.0,
            spacing: 4.0,
        };
        let river = trace_river(DVec2::ZERO, &lookup, 0.0, &RiverSettings::default());
        assert_eq!(river.points.len(), 1);
    }

    #[test]
    fn test_descends_slope_and_respects_max_steps() {
        let lookup = FnLookup {
            f: |p: DVec2| 1000.0 + p.x,
            spacing: 4.0,
        };
        let settings = RiverSettings {
            max_steps: 10,
            ..Default::default()
        };
        let river = trace_river(DVec2::ZERO, &lookup, 0.0, &settings);
        assert_eq!(river.points.len(), 11);
        for w in river.points.windows(2) {
            assert!(w[1].x < w[0].x, "river should flow towards -x");
        }
        assert!((river.flow_volume() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_flow_volume_monotonic() {
        let lookup = FnLookup {
            f: |p: DVec2| 500.0 + p.x * 0.3 + p.y * 0.7,
            spacing: 4.0,
        };
        let river = trace_river(DVec2::new(12.0, 8.0), &lookup, 0.0, &RiverSettings::default());
        assert!(river.points.len() > 2);
        assert_eq!(river.points.len(), river.volumes.len());
        for w in river.volumes.windows(2) {
            assert!(w[1] >= w[0]);
        }
        let settings = RiverSettings::default();
        let widths: Vec<f64> = river.volumes.iter().map(|v| settings.segment_width(*v)).collect();
        for w in widths.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn test_region_sources_deterministic_and_in_ring() {
        let settings = RiverSettings::default();
        let center = DVec2::new(-4000.0, 2000.0);
        let a = region_sources(center, &settings);
        let b = region_sources(center, &settings);
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        for s in a {
            let d = s.distance(center);
            assert!(d >= 400.0 - 0.01 && d <= 1000.0 + 0.01, "source distance {d}");
        }
    }

    #[test]
    fn test_zero_length_segment_uses_point_distance() {
        let a = DVec2::new(3.0, 3.0);
        assert_eq!(distance_to_segment(DVec2::new(6.0, 7.0), a, a), 5.0);
        assert_eq!(
            distance_to_segment(DVec2::new(5.0, 2.0), DVec2::ZERO, DVec2::new(10.0, 0.0)),
            2.0
        );
        assert_eq!(
            distance_to_segment(DVec2::new(-3.0, 4.0), DVec2::ZERO, DVec2::new(10.0, 0.0)),
            5.0
        );
    }

    #[test]
    fn test_influence_is_max_not_sum() {
        let settings = RiverSettings::default();
        let river = RiverPath {
            source: DVec2::ZERO,
            points: vec![DVec2::ZERO, DVec2::new(100.0, 0.0)],
            volumes: vec![1.0, 1.0],
        };
        let p = DVec2::new(50.0, 60.0);
        let single = river_influence(p, std::slice::from_ref(&river), &settings);
        let doubled = river_influence(p, &[river.clone(), river], &settings);
        assert!(single > 0.0 && single < 1.0);
        assert_eq!(single, doubled);

        let reach = settings.segment_width(1.0) + settings.transition_width;
        assert!((single - (1.0 - 60.0 / reach)).abs() < 1e-12);
    }

    #[test]
    fn test_carve_blends_towards_channel_floor() {
        let settings = RiverSettings::default();
        assert_eq!(carve(80.0, 0.0, 5.0, &settings), 80.0);
        assert_eq!(carve(80.0, 1.0, 5.0, &settings), -30.0);
        assert_eq!(carve(80.0, 0.5, 5.0, &settings), 25.0);
    }

    #[test]
    fn test_lattice_lookup_uses_grid_then_fallback() {
        let frame = TileFrame::square(DVec2::ZERO, 8.0, 3);
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let lookup = LatticeLookup::new(&frame, &values, |p: DVec2| (p.x + p.y) as f32);
        assert_eq!(lookup.height_at(DVec2::new(-4.0, 4.0)), 1.0);
        assert_eq!(lookup.height_at(DVec2::new(0.3, -0.2)), 5.0);
        assert_eq!(lookup.height_at(DVec2::new(8.1, 0.0)), 8.0);
        assert_eq!(lookup.spacing(), 4.0);
    }

    #[test]
    fn test_adjacent_tiles_trace_identical_rivers() {
        let height = |p: DVec2| (300.0 - p.x * 0.05 + (p.y * 0.01).sin() * 20.0) as f32;
        let settings = RiverSettings::default();
        let size = 480.0;
        let a = TileFrame::square(DVec2::new(240.0, 240.0), size, 121);
        let b = TileFrame::square(DVec2::new(240.0 + size, 240.0), size, 121);

        let grid = |frame: &TileFrame| -> Vec<f32> {
            let mut v = Vec::with_capacity(frame.len());
            for y in 0..frame.height {
                for x in 0..frame.width {
                    v.push(height(frame.sample_position(x, y)));
                }
            }
            v
        };

        let mut va = grid(&a);
        let mut vb = grid(&b);
        let rivers_a = apply_rivers(&mut va, &a, 0.0, &settings, height);
        let rivers_b = apply_rivers(&mut vb, &b, 0.0, &settings, height);

        for ra in &rivers_a {
            if let Some(rb) = rivers_b.iter().find(|r| r.source == ra.source) {
                assert_eq!(ra, rb, "river from {:?} traced differently", ra.source);
            }
        }
        for y in 0..121 {
            assert_eq!(va[y * 121 + 120], vb[y * 121], "seam mismatch at row {y}");
        }
    }
}
