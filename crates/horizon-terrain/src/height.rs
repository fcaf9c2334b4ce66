//! Height map derivation.
//!
//! Raw octaved noise in `[0, 1]` is optionally carved by the shoreline
//! generator, remapped through a [`HeightCurve`], scaled to world units, and
//! optionally carved by rivers. [`HeightField`] evaluates the same function at
//! a single point so river tracing can look past the edge of the tile.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::layered_map::{HeightMap, LayeredMap};
use crate::noise_field::{NoiseField, NoiseSettings};
use crate::river::{RiverSettings, apply_rivers};
use crate::shoreline::{ShorelineField, ShorelineSettings};
use crate::tile::{Rect, TileFrame};

/// Piecewise-linear response curve.
///
/// Keys are `[input, output]` pairs sorted by input. Inputs below the first
/// key or above the last are clamped to the end values. An empty curve is the
/// identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightCurve {
    pub keys: Vec<[f64; 2]>,
}

impl Default for HeightCurve {
    /// Flattens the lower third into lowlands and ramps up linearly above.
    fn default() -> Self {
        Self {
            keys: vec![[0.0, 0.0], [0.3, 0.05], [1.0, 1.0]],
        }
    }
}

impl HeightCurve {
    pub fn linear() -> Self {
        Self {
            keys: vec![[0.0, 0.0], [1.0, 1.0]],
        }
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return t;
        };
        if t <= first[0] {
            return first[1];
        }
        if t >= last[0] {
            return last[1];
        }
        for pair in self.keys.windows(2) {
            let [x0, y0] = pair[0];
            let [x1, y1] = pair[1];
            if t <= x1 {
                let span = x1 - x0;
                if span <= 0.0 {
                    return y1;
                }
                return y0 + (y1 - y0) * (t - x0) / span;
            }
        }
        last[1]
    }

    /// Sort keys by input. Deserialized curves may arrive unordered.
    pub fn sorted(mut self) -> Self {
        self.keys.sort_by(|a, b| a[0].total_cmp(&b[0]));
        self
    }
}

/// Everything that shapes the height layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightSettings {
    pub noise: NoiseSettings,
    pub curve: HeightCurve,
    /// World units at curve output 1.0.
    pub height_multiplier: f64,
    /// Elevation of the water surface in world units.
    pub sea_level: f64,
    pub use_shoreline: bool,
    pub use_rivers: bool,
    pub shoreline: ShorelineSettings,
    pub rivers: RiverSettings,
}

impl Default for HeightSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            curve: HeightCurve::default(),
            height_multiplier: 100.0,
            sea_level: 5.0,
            use_shoreline: true,
            use_rivers: true,
            shoreline: ShorelineSettings::default(),
            rivers: RiverSettings::default(),
        }
    }
}

/// Pre-river height function, valid for points inside the bounds it was
/// built for.
pub struct HeightField {
    noise: NoiseField,
    shoreline: Option<ShorelineField>,
    curve: HeightCurve,
    multiplier: f64,
}

impl HeightField {
    pub fn new(bounds: Rect, settings: &HeightSettings) -> Self {
        Self {
            noise: NoiseField::new(settings.noise.clone()),
            shoreline: settings
                .use_shoreline
                .then(|| ShorelineField::new(bounds, &settings.shoreline)),
            curve: settings.curve.clone().sorted(),
            multiplier: settings.height_multiplier,
        }
    }

    /// Raw noise after shoreline carving, before the curve.
    pub fn shaped_noise(&self, point: DVec2) -> f64 {
        let raw = self.noise.sample(point.x, point.y);
        match &self.shoreline {
            Some(field) => field.apply(raw, point),
            None => raw,
        }
    }

    /// Height in world units at `point`, rivers excluded.
    pub fn sample(&self, point: DVec2) -> f64 {
        self.curve.evaluate(self.shaped_noise(point)) * self.multiplier
    }
}

/// Generate the height layer for `frame`.
pub fn generate_height_map(frame: &TileFrame, settings: &HeightSettings) -> HeightMap {
    let spacing = frame.vertex_spacing();
    let bounds = if settings.use_rivers {
        frame.bounds().expand(settings.rivers.lookup_margin(spacing))
    } else {
        frame.bounds()
    };
    let field = HeightField::new(bounds, settings);

    let mut values = Vec::with_capacity(frame.len());
    for y in 0..frame.height {
        for x in 0..frame.width {
            values.push(field.sample(frame.sample_position(x, y)) as f32);
        }
    }

    if settings.use_rivers {
        let rivers = apply_rivers(
            &mut values,
            frame,
            settings.sea_level,
            &settings.rivers,
            |p| field.sample(p) as f32,
        );
        tracing::trace!(
            center = ?frame.center,
            rivers = rivers.len(),
            "carved rivers"
        );
    }

    HeightMap(LayeredMap::from_values(frame.width, frame.height, values))
}
