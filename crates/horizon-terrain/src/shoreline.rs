//! Shoreline shaping: carves water bodies into a raw height field.
//!
//! Every region contributes one large oval near its midpoint and a handful of
//! smaller ovals scattered across it. Each oval's boundary is wobbled by
//! coherent noise sampled around its rim. A sample inside the union of ovals
//! keeps its height; samples near or beyond the nearest boundary fade to the
//! sea floor over a fixed world-space transition band.
//!
//! Shapes are regenerated from the region RNG on every call, so two tiles that
//! overlap the same region see bit-identical shapes and agree along their
//! shared edges.

use std::f64::consts::TAU;

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::noise_field::{CoherentNoise, PerlinNoise};
use crate::region::{
    det_atan2, det_cos, det_sin, region_center, region_rng, regions_around, snap_point,
};
use crate::tile::{Rect, TileFrame};

/// Radii at or below this are treated as degenerate.
const DEGENERATE_RADIUS: f64 = 1e-6;

/// Parameters of the shoreline generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShorelineSettings {
    /// Side length of a seeding region in world units.
    pub region_size: f64,
    /// Width of the fade from full height to sea floor, in world units.
    pub transition_width: f64,
    /// World-to-noise scale of the boundary distortion.
    pub noise_scale: f64,
    /// Distortion strength of the main shape. Small shapes use 80% of it.
    pub noise_strength: f64,
    /// Small shapes generated per region.
    pub small_shapes_per_region: u32,
    /// Seed of the boundary distortion noise.
    pub noise_seed: u32,
}

impl Default for ShorelineSettings {
    fn default() -> Self {
        Self {
            region_size: 1250.0,
            transition_width: 150.0,
            noise_scale: 0.003,
            noise_strength: 0.5,
            small_shapes_per_region: 5,
            noise_seed: 0,
        }
    }
}

impl ShorelineSettings {
    /// Farthest a region's shapes can reach beyond its main shape's nominal
    /// placement, transition band included.
    pub fn influence_radius(&self) -> f64 {
        let r = self.region_size;
        let max_shape_radius = r * 0.4;
        let offset = r * 0.2;
        let distortion = max_shape_radius * self.noise_strength;
        max_shape_radius + offset + distortion + self.transition_width
    }

    /// Regions to scan in each direction around the tile's own region.
    pub fn regions_to_check(&self) -> i32 {
        ((self.influence_radius() * 2.0) / self.region_size).ceil() as i32 + 2
    }

    /// How far a region's shapes can extend past the region square.
    fn region_margin(&self) -> f64 {
        let r = self.region_size;
        let main = r * 0.4 * self.noise_strength;
        let small = r * 0.2 * (1.0 + 0.8 * self.noise_strength);
        main.max(small)
    }
}

/// A noise-distorted ellipse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shape {
    pub center: DVec2,
    pub radii: DVec2,
    pub rotation: f64,
    pub distortion: f64,
}

impl Shape {
    /// Radius of a circle around `center` that contains the shape at any
    /// distortion.
    pub fn bounding_radius(&self) -> f64 {
        self.radii.max_element() * (1.0 + self.distortion)
    }

    /// Signed distance from `point` to the distorted boundary, scaled by the
    /// smaller distorted radius. Negative inside.
    pub fn signed_distance(
        &self,
        point: DVec2,
        noise: &dyn CoherentNoise,
        noise_scale: f64,
    ) -> f64 {
        let local = point - self.center;
        if self.radii.x <= DEGENERATE_RADIUS || self.radii.y <= DEGENERATE_RADIUS {
            return local.length();
        }

        let (s, c) = (det_sin(-self.rotation), det_cos(-self.rotation));
        let rotated = DVec2::new(local.x * c - local.y * s, local.x * s + local.y * c);

        let angle = det_atan2(rotated.y, rotated.x);
        let n = noise.sample(
            point.x * noise_scale + det_cos(angle) * 3.0,
            point.y * noise_scale + det_sin(angle) * 3.0,
        );
        let radii = self.radii * (1.0 + n * self.distortion);

        ((rotated / radii).length() - 1.0) * radii.min_element()
    }
}

/// Generate all shapes seeded by the region at `center`.
///
/// Draw order is fixed: main shape (jitter x, jitter y, rotation), then for
/// each small shape (x, y, size, aspect, rotation).
pub fn region_shapes(center: DVec2, settings: &ShorelineSettings) -> Vec<Shape> {
    let r = settings.region_size;
    let mut rng = region_rng(center);
    let mut shapes = Vec::with_capacity(1 + settings.small_shapes_per_region as usize);

    let jitter_x: f64 = rng.random();
    let jitter_y: f64 = rng.random();
    let rotation: f64 = rng.random();
    shapes.push(Shape {
        center: snap_point(
            center
                + DVec2::new(
                    r * 0.5 + r * (jitter_x - 0.5) * 0.2,
                    r * 0.5 + r * (jitter_y - 0.5) * 0.2,
                ),
        ),
        radii: DVec2::new(r * 0.4, r * 0.3),
        rotation: rotation * TAU,
        distortion: settings.noise_strength,
    });

    for _ in 0..settings.small_shapes_per_region {
        let x: f64 = rng.random();
        let y: f64 = rng.random();
        let size = r * (0.05 + rng.random::<f64>() * 0.15);
        let aspect = 0.5 + rng.random::<f64>() * 0.5;
        let rotation: f64 = rng.random();
        shapes.push(Shape {
            center: snap_point(center + DVec2::new(r * x, r * y)),
            radii: DVec2::new(size, size * aspect),
            rotation: rotation * TAU,
            distortion: settings.noise_strength * 0.8,
        });
    }

    shapes
}

/// Pool the shapes of every region that can influence `bounds`.
///
/// Regions whose shapes cannot reach the rectangle are skipped and shapes
/// whose bounding circle misses it are dropped. Neither filter changes any
/// sample inside `bounds`.
pub fn collect_shapes(bounds: Rect, settings: &ShorelineSettings) -> Vec<Shape> {
    let r = settings.region_size;
    let margin = settings.region_margin();
    let home = region_center(bounds.center(), r);

    regions_around(home, r, settings.regions_to_check())
        .filter(|c| {
            let region = Rect::new(*c, *c + DVec2::splat(r)).expand(margin);
            region.min.x <= bounds.max.x
                && region.max.x >= bounds.min.x
                && region.min.y <= bounds.max.y
                && region.max.y >= bounds.min.y
        })
        .flat_map(|c| region_shapes(c, settings))
        .filter(|shape| bounds.intersects_circle(shape.center, shape.bounding_radius()))
        .collect()
}

/// Shoreline evaluator for one area of the world.
pub struct ShorelineField {
    shapes: Vec<Shape>,
    settings: ShorelineSettings,
    noise: PerlinNoise,
}

impl ShorelineField {
    /// Build a field valid for every point inside `bounds`.
    pub fn new(bounds: Rect, settings: &ShorelineSettings) -> Self {
        Self {
            shapes: collect_shapes(bounds, settings),
            settings: settings.clone(),
            noise: PerlinNoise::new(settings.noise_seed),
        }
    }

    /// Build a field from an explicit shape list.
    pub fn from_shapes(shapes: Vec<Shape>, settings: &ShorelineSettings) -> Self {
        Self {
            shapes,
            settings: settings.clone(),
            noise: PerlinNoise::new(settings.noise_seed),
        }
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Minimum signed distance over all shapes, `+inf` with no shapes.
    pub fn min_distance(&self, point: DVec2) -> f64 {
        self.shapes
            .iter()
            .map(|s| s.signed_distance(point, &self.noise, self.settings.noise_scale))
            .fold(f64::INFINITY, f64::min)
    }

    /// Fraction of the original height kept at `point`: 1 deep inside a shape,
    /// 0 on or outside every boundary.
    pub fn land_factor(&self, point: DVec2) -> f64 {
        let d = self.min_distance(point);
        if self.settings.transition_width <= 0.0 {
            return if d < 0.0 { 1.0 } else { 0.0 };
        }
        (-d / self.settings.transition_width).clamp(0.0, 1.0)
    }

    /// Blend `height` towards the sea floor at `point`.
    pub fn apply(&self, height: f64, point: DVec2) -> f64 {
        height * self.land_factor(point)
    }
}

/// Carve water bodies into a row-major grid laid out by `frame`.
pub fn apply_shoreline(values: &mut [f32], frame: &TileFrame, settings: &ShorelineSettings) {
    let field = ShorelineField::new(frame.bounds(), settings);
    for y in 0..frame.height {
        for x in 0..frame.width {
            let i = y * frame.width + x;
            let p = frame.sample_position(x, y);
            values[i] = field.apply(values[i] as f64, p) as f32;
        }
    }
}
