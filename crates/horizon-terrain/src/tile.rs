//! World-space placement of a sample grid.

use glam::DVec2;

use crate::region::snap_point;

/// Axis-aligned rectangle in world space.
///
/// Invariant: `min.x <= max.x` and `min.y <= max.y`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    /// Create a rectangle from two corners, sorting components.
    pub fn new(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create a rectangle from a center point and half-extents.
    pub fn from_center_half_extents(center: DVec2, half: DVec2) -> Self {
        Self::new(center - half, center + half)
    }

    /// Grow the rectangle by `amount` on every side.
    pub fn expand(&self, amount: f64) -> Self {
        Self {
            min: self.min - DVec2::splat(amount),
            max: self.max + DVec2::splat(amount),
        }
    }

    /// Euclidean distance from `point` to the closest point of the rectangle.
    /// Zero for points inside or on the boundary.
    pub fn distance_to_point(&self, point: DVec2) -> f64 {
        let clamped = point.clamp(self.min, self.max);
        point.distance(clamped)
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Returns true if a circle overlaps the rectangle (touching counts).
    pub fn intersects_circle(&self, center: DVec2, radius: f64) -> bool {
        self.distance_to_point(center) <= radius
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }
}

/// Placement of a `width × height` vertex grid in world space.
///
/// Column `x` runs towards +X from the left edge and row `y` runs towards -Y
/// from the top edge, so row 0 is the northern edge of the tile. Vertices sit
/// `world_size / (width - 1)` apart, which makes the edge columns of two
/// adjacent tiles coincide in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileFrame {
    /// World-space center of the tile.
    pub center: DVec2,
    /// Side length of the tile in world units.
    pub world_size: f64,
    /// Vertices per row.
    pub width: usize,
    /// Vertices per column.
    pub height: usize,
}

impl TileFrame {
    pub fn new(center: DVec2, world_size: f64, width: usize, height: usize) -> Self {
        Self {
            center,
            world_size,
            width,
            height,
        }
    }

    /// Square grid shorthand.
    pub fn square(center: DVec2, world_size: f64, vertices_per_line: usize) -> Self {
        Self::new(center, world_size, vertices_per_line, vertices_per_line)
    }

    /// Distance between adjacent vertices.
    pub fn vertex_spacing(&self) -> f64 {
        if self.width > 1 {
            self.world_size / (self.width - 1) as f64
        } else {
            self.world_size
        }
    }

    /// World position of the top-left vertex.
    pub fn top_left(&self) -> DVec2 {
        DVec2::new(
            self.center.x - self.world_size * 0.5,
            self.center.y + self.world_size * 0.5,
        )
    }

    /// Snapped world position of grid vertex `(x, y)`.
    pub fn sample_position(&self, x: usize, y: usize) -> DVec2 {
        let spacing = self.vertex_spacing();
        let top_left = self.top_left();
        snap_point(DVec2::new(
            top_left.x + x as f64 * spacing,
            top_left.y - y as f64 * spacing,
        ))
    }

    /// Grid indices of the lattice vertex nearest to `point`. The indices may
    /// fall outside the grid; the lattice continues past the tile edges.
    pub fn nearest_lattice_index(&self, point: DVec2) -> (i64, i64) {
        let spacing = self.vertex_spacing();
        let top_left = self.top_left();
        (
            ((point.x - top_left.x) / spacing).round() as i64,
            ((top_left.y - point.y) / spacing).round() as i64,
        )
    }

    /// Snapped world position of a lattice vertex, in or out of the grid.
    pub fn lattice_position(&self, x: i64, y: i64) -> DVec2 {
        let spacing = self.vertex_spacing();
        let top_left = self.top_left();
        snap_point(DVec2::new(
            top_left.x + x as f64 * spacing,
            top_left.y - y as f64 * spacing,
        ))
    }

    /// Returns the flat grid index if `(x, y)` lies inside the grid.
    pub fn grid_index(&self, x: i64, y: i64) -> Option<usize> {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            Some(y as usize * self.width + x as usize)
        } else {
            None
        }
    }

    /// World-space rectangle covered by the sample vertices.
    pub fn bounds(&self) -> Rect {
        Rect::from_center_half_extents(self.center, DVec2::splat(self.world_size * 0.5))
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_position_corners() {
        let frame = TileFrame::square(DVec2::new(100.0, 50.0), 10.0, 11);
        assert_eq!(frame.sample_position(0, 0), DVec2::new(95.0, 55.0));
        assert_eq!(frame.sample_position(10, 10), DVec2::new(105.0, 45.0));
        assert_eq!(frame.sample_position(5, 5), DVec2::new(100.0, 50.0));
    }

    #[test]
    fn test_adjacent_tiles_share_edge_positions() {
        let size = 240.0;
        let a = TileFrame::square(DVec2::new(0.0, 0.0), size, 121);
        let b = TileFrame::square(DVec2::new(size, 0.0), size, 121);
        for y in 0..121 {
            assert_eq!(a.sample_position(120, y), b.sample_position(0, y));
        }
    }

    #[test]
    fn test_lattice_matches_grid_inside() {
        let frame = TileFrame::square(DVec2::new(-30.0, 12.0), 64.0, 33);
        let p = frame.sample_position(7, 19);
        let (ix, iy) = frame.nearest_lattice_index(p);
        assert_eq!((ix, iy), (7, 19));
        assert_eq!(frame.lattice_position(ix, iy), p);
        assert_eq!(frame.grid_index(ix, iy), Some(19 * 33 + 7));
        assert_eq!(frame.grid_index(-1, 0), None);
        assert_eq!(frame.grid_index(0, 33), None);
    }

    #[test]
    fn test_rect_distance() {
        let rect = Rect::new(DVec2::new(0.0, 0.0), DVec2::new(10.0, 10.0));
        assert_eq!(rect.distance_to_point(DVec2::new(5.0, 5.0)), 0.0);
        assert_eq!(rect.distance_to_point(DVec2::new(13.0, 14.0)), 5.0);
        assert!(rect.intersects_circle(DVec2::new(-3.0, 5.0), 3.0));
        assert!(!rect.intersects_circle(DVec2::new(-3.0, 5.0), 2.9));
        assert!(rect.contains(DVec2::new(10.0, 0.0)));
        assert_eq!(rect.expand(1.0).min, DVec2::new(-1.0, -1.0));
    }
}
