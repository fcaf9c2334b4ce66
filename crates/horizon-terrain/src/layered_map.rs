//! Scalar grids shared by the height, heat and moisture stages.
//!
//! The three layers are distinct newtypes over [`LayeredMap`], so a derivation
//! function can only be handed the upstream layers it needs. [`MapStack`] is
//! the runtime counterpart used by the streaming core: it accepts the layers of
//! one tile strictly in pipeline order.

use thiserror::Error;

/// A row-major grid of scalar samples and the range they were declared or
/// observed to cover.
#[derive(Clone, Debug, PartialEq)]
pub struct LayeredMap {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
    pub min: f32,
    pub max: f32,
}

impl LayeredMap {
    /// Wrap `values` and record their observed range.
    ///
    /// An empty grid reports `min == max == 0`.
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), width * height);
        let (min, max) = observed_range(&values);
        Self {
            width,
            height,
            values,
            min,
            max,
        }
    }

    /// Wrap `values` with a fixed declared range.
    pub fn with_range(width: usize, height: usize, values: Vec<f32>, min: f32, max: f32) -> Self {
        debug_assert_eq!(values.len(), width * height);
        Self {
            width,
            height,
            values,
            min,
            max,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Map a value into `[0, 1]` relative to this map's range.
    pub fn normalized(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span <= f32::EPSILON {
            0.0
        } else {
            ((value - self.min) / span).clamp(0.0, 1.0)
        }
    }
}

/// Minimum and maximum of a slice, `(0, 0)` when empty.
pub fn observed_range(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

macro_rules! layer_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name(pub LayeredMap);

        impl std::ops::Deref for $name {
            type Target = LayeredMap;

            fn deref(&self) -> &LayeredMap {
                &self.0
            }
        }

        impl $name {
            pub fn into_inner(self) -> LayeredMap {
                self.0
            }
        }
    };
}

layer_newtype!(
    /// Elevation in world units. `min`/`max` are observed.
    HeightMap
);
layer_newtype!(
    /// Temperature in `[0, 1]`. The range is declared, not observed.
    HeatMap
);
layer_newtype!(
    /// Moisture in `[0, 1]`. `min`/`max` are observed.
    MoistureMap
);

/// Which layer of the pipeline a map belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Height,
    Heat,
    Moisture,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Height => write!(f, "height"),
            Self::Heat => write!(f, "heat"),
            Self::Moisture => write!(f, "moisture"),
        }
    }
}

/// Errors from out-of-order or mismatched layer insertion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("cannot insert {layer} map: the {missing} map has not been generated")]
    MissingUpstream { layer: LayerKind, missing: LayerKind },

    #[error("{layer} map already present")]
    AlreadyPresent { layer: LayerKind },

    #[error("{layer} map is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        layer: LayerKind,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// The layers generated so far for one tile.
#[derive(Clone, Debug, Default)]
pub struct MapStack {
    height: Option<HeightMap>,
    heat: Option<HeatMap>,
    moisture: Option<MoistureMap>,
}

impl MapStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_height(&mut self, map: HeightMap) -> Result<(), PipelineError> {
        if self.height.is_some() {
            return Err(PipelineError::AlreadyPresent {
                layer: LayerKind::Height,
            });
        }
        self.height = Some(map);
        Ok(())
    }

    pub fn insert_heat(&mut self, map: HeatMap) -> Result<(), PipelineError> {
        let height = self.height.as_ref().ok_or(PipelineError::MissingUpstream {
            layer: LayerKind::Heat,
            missing: LayerKind::Height,
        })?;
        if self.heat.is_some() {
            return Err(PipelineError::AlreadyPresent {
                layer: LayerKind::Heat,
            });
        }
        check_dimensions(LayerKind::Heat, height.dimensions(), map.dimensions())?;
        self.heat = Some(map);
        Ok(())
    }

    pub fn insert_moisture(&mut self, map: MoistureMap) -> Result<(), PipelineError> {
        let height = self.height.as_ref().ok_or(PipelineError::MissingUpstream {
            layer: LayerKind::Moisture,
            missing: LayerKind::Height,
        })?;
        if self.heat.is_none() {
            return Err(PipelineError::MissingUpstream {
                layer: LayerKind::Moisture,
                missing: LayerKind::Heat,
            });
        }
        if self.moisture.is_some() {
            return Err(PipelineError::AlreadyPresent {
                layer: LayerKind::Moisture,
            });
        }
        check_dimensions(LayerKind::Moisture, height.dimensions(), map.dimensions())?;
        self.moisture = Some(map);
        Ok(())
    }

    pub fn height(&self) -> Option<&HeightMap> {
        self.height.as_ref()
    }

    pub fn heat(&self) -> Option<&HeatMap> {
        self.heat.as_ref()
    }

    pub fn moisture(&self) -> Option<&MoistureMap> {
        self.moisture.as_ref()
    }

    /// Returns true once all three layers are present.
    pub fn is_complete(&self) -> bool {
        self.height.is_some() && self.heat.is_some() && self.moisture.is_some()
    }

    /// Borrow all three layers if the stack is complete.
    pub fn layers(&self) -> Option<(&HeightMap, &HeatMap, &MoistureMap)> {
        match (&self.height, &self.heat, &self.moisture) {
            (Some(h), Some(t), Some(m)) => Some((h, t, m)),
            _ => None,
        }
    }

    /// Take all three layers out of a complete stack. Returns the stack
    /// unchanged if a layer is missing.
    pub fn into_layers(self) -> Result<(HeightMap, HeatMap, MoistureMap), Self> {
        match self {
            Self {
                height: Some(h),
                heat: Some(t),
                moisture: Some(m),
            } => Ok((h, t, m)),
            incomplete => Err(incomplete),
        }
    }
}

fn check_dimensions(
    layer: LayerKind,
    expected: (usize, usize),
    actual: (usize, usize),
) -> Result<(), PipelineError> {
    if expected == actual {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch {
            layer,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(w: usize, h: usize, v: f32) -> LayeredMap {
        LayeredMap::from_values(w, h, vec![v; w * h])
    }

    #[test]
    fn test_observed_range() {
        let map = LayeredMap::from_values(2, 2, vec![3.0, -1.0, 7.5, 0.0]);
        assert_eq!(map.min, -1.0);
        assert_eq!(map.max, 7.5);
        assert_eq!(map.get(0, 1), 7.5);
        assert_eq!(observed_range(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_normalized_handles_flat_map() {
        let flat = grid(3, 3, 4.0);
        assert_eq!(flat.normalized(4.0), 0.0);
        let ramp = LayeredMap::from_values(2, 1, vec![10.0, 20.0]);
        assert_eq!(ramp.normalized(15.0), 0.5);
        assert_eq!(ramp.normalized(40.0), 1.0);
    }

    #[test]
    fn test_stack_rejects_heat_before_height() {
        let mut stack = MapStack::new();
        let err = stack.insert_heat(HeatMap(grid(4, 4, 0.5))).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingUpstream {
                layer: LayerKind::Heat,
                missing: LayerKind::Height
            }
        );
    }

    #[test]
    fn test_stack_moisture_requires_height_and_heat() {
        let mut stack = MapStack::new();
        assert!(matches!(
            stack.insert_moisture(MoistureMap(grid(4, 4, 0.5))),
            Err(PipelineError::MissingUpstream {
                missing: LayerKind::Height,
                ..
            })
        ));

        stack.insert_height(HeightMap(grid(4, 4, 1.0))).unwrap();
        assert!(matches!(
            stack.insert_moisture(MoistureMap(grid(4, 4, 0.5))),
            Err(PipelineError::MissingUpstream {
                missing: LayerKind::Heat,
                ..
            })
        ));

        stack.insert_heat(HeatMap(grid(4, 4, 0.5))).unwrap();
        stack.insert_moisture(MoistureMap(grid(4, 4, 0.5))).unwrap();
        assert!(stack.is_complete());
        assert!(stack.layers().is_some());
        let (h, _, m) = stack.into_layers().unwrap();
        assert_eq!(h.dimensions(), m.dimensions());
    }

    #[test]
    fn test_into_layers_returns_incomplete_stack() {
        let mut stack = MapStack::new();
        stack.insert_height(HeightMap(grid(2, 2, 1.0))).unwrap();
        let back = stack.into_layers().unwrap_err();
        assert!(back.height().is_some());
    }

    #[test]
    fn test_stack_rejects_dimension_mismatch() {
        let mut stack = MapStack::new();
        stack.insert_height(HeightMap(grid(4, 4, 1.0))).unwrap();
        let err = stack.insert_heat(HeatMap(grid(5, 4, 0.5))).unwrap_err();
        assert!(matches!(err, PipelineError::DimensionMismatch { .. }));
        assert!(stack.heat().is_none());
    }

    #[test]
    fn test_stack_rejects_duplicate_layer() {
        let mut stack = MapStack::new();
        stack.insert_height(HeightMap(grid(2, 2, 1.0))).unwrap();
        assert_eq!(
            stack.insert_height(HeightMap(grid(2, 2, 1.0))),
            Err(PipelineError::AlreadyPresent {
                layer: LayerKind::Height
            })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = PipelineError::MissingUpstream {
            layer: LayerKind::Moisture,
            missing: LayerKind::Heat,
        };
        assert_eq!(
            err.to_string(),
            "cannot insert moisture map: the heat map has not been generated"
        );
    }
}
