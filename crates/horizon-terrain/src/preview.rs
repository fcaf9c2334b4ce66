//! Colour-mapped previews of the three map layers.
//!
//! Height is drawn in grayscale between its observed extremes. Heat and
//! moisture are drawn on a blue→red ramp between the map's declared (heat) or
//! observed (moisture) range.

use crate::layered_map::{HeatMap, HeightMap, LayeredMap, MoistureMap};

/// Row-major RGBA image.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    /// Length = `width * height * 4`.
    pub pixels: Vec<u8>,
}

impl PreviewImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        }
    }

    /// # Panics
    ///
    /// Panics if `x >= width` or `y >= height`.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let idx = ((y * self.width + x) * 4) as usize;
        self.pixels[idx..idx + 4].copy_from_slice(&rgba);
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Linear blue (0) to red (1) ramp.
pub fn heat_color(t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    [(t * 255.0) as u8, 0, ((1.0 - t) * 255.0) as u8, 255]
}

pub fn gray(t: f32) -> [u8; 4] {
    let v = (t.clamp(0.0, 1.0) * 255.0) as u8;
    [v, v, v, 255]
}

fn render(map: &LayeredMap, color: impl Fn(f32) -> [u8; 4]) -> PreviewImage {
    let mut image = PreviewImage::new(map.width as u32, map.height as u32);
    for y in 0..map.height {
        for x in 0..map.width {
            let t = map.normalized(map.get(x, y));
            image.set_pixel(x as u32, y as u32, color(t));
        }
    }
    image
}

pub fn render_height(map: &HeightMap) -> PreviewImage {
    render(map, gray)
}

pub fn render_heat(map: &HeatMap) -> PreviewImage {
    render(map, heat_color)
}

pub fn render_moisture(map: &MoistureMap) -> PreviewImage {
    render(map, heat_color)
}
