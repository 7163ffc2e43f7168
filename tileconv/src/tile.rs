//! 8x8 tiles and their extraction from a raster.

use image::RgbImage;

use crate::color::{Color, ColorSet};
use crate::error::{Error, Result};

/// Width and height of a tile in pixels
pub const TILE_SIZE: usize = 8;
/// Number of pixels in a tile
pub const TILE_AREA: usize = TILE_SIZE * TILE_SIZE;

/// A single 8x8 block of colors, stored row by row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pixels: [Color; TILE_AREA],
}

impl Tile {
    pub fn new(pixels: [Color; TILE_AREA]) -> Self {
        Tile { pixels }
    }

    /// A tile filled with one color
    pub fn filled(color: Color) -> Self {
        Tile {
            pixels: [color; TILE_AREA],
        }
    }

    pub fn pixels(&self) -> &[Color; TILE_AREA] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Color {
        self.pixels[y * TILE_SIZE + x]
    }

    fn remapped(&self, map: impl Fn(usize, usize) -> (usize, usize)) -> Self {
        let mut pixels = [Color::BLACK; TILE_AREA];
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                let (sx, sy) = map(x, y);
                pixels[y * TILE_SIZE + x] = self.pixel(sx, sy);
            }
        }
        Tile { pixels }
    }

    /// Mirror left to right
    pub fn x_flipped(&self) -> Self {
        self.remapped(|x, y| (TILE_SIZE - 1 - x, y))
    }

    /// Mirror top to bottom
    pub fn y_flipped(&self) -> Self {
        self.remapped(|x, y| (x, TILE_SIZE - 1 - y))
    }

    /// Mirror on both axes
    pub fn xy_flipped(&self) -> Self {
        self.remapped(|x, y| (TILE_SIZE - 1 - x, TILE_SIZE - 1 - y))
    }

    /// True if every pixel is `color`
    pub fn is_blank(&self, color: Color) -> bool {
        self.pixels.iter().all(|&c| c == color)
    }

    /// The distinct colors used by this tile
    pub fn color_set(&self) -> ColorSet {
        self.pixels.iter().copied().collect()
    }
}

/// Split an image into tiles in row-major order.
///
/// Returns the tiles and the width of the image in tiles.
pub fn extract_tiles(img: &RgbImage) -> Result<(Vec<Tile>, usize)> {
    let (width, height) = img.dimensions();
    if width == 0
        || height == 0
        || width as usize % TILE_SIZE != 0
        || height as usize % TILE_SIZE != 0
    {
        return Err(Error::InvalidDimensions(width, height, TILE_SIZE as u32));
    }

    let columns = width as usize / TILE_SIZE;
    let rows = height as usize / TILE_SIZE;
    let mut tiles = vec![Tile::filled(Color::BLACK); columns * rows];

    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let tile_index = (y / TILE_SIZE) * columns + x / TILE_SIZE;
        let pixel_index = (y % TILE_SIZE) * TILE_SIZE + x % TILE_SIZE;
        tiles[tile_index].pixels[pixel_index] = Color::from(*pixel);
    }

    Ok((tiles, columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient() -> Tile {
        let mut pixels = [Color::BLACK; TILE_AREA];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = Color::from_rgb5((i % TILE_SIZE) as u8, (i / TILE_SIZE) as u8, 0);
        }
        Tile::new(pixels)
    }

    #[test]
    fn flips() {
        let tile = gradient();
        assert_eq!(tile.x_flipped().pixel(0, 3), tile.pixel(7, 3));
        assert_eq!(tile.y_flipped().pixel(2, 0), tile.pixel(2, 7));
        assert_eq!(tile.xy_flipped().pixel(0, 0), tile.pixel(7, 7));
        assert_eq!(tile.x_flipped().y_flipped(), tile.xy_flipped());
        assert_eq!(tile.x_flipped().x_flipped(), tile);
        assert_ne!(tile.x_flipped(), tile);
    }

    #[test]
    fn blank_and_color_set() {
        let tile = Tile::filled(Color::WHITE);
        assert!(tile.is_blank(Color::WHITE));
        assert!(!tile.is_blank(Color::BLACK));
        assert_eq!(tile.color_set().len(), 1);
        assert_eq!(gradient().color_set().len(), TILE_AREA);
    }

    #[test]
    fn extract_row_major() {
        let mut img = RgbImage::new(16, 8);
        for y in 0..8 {
            for x in 8..16 {
                img.put_pixel(x, y, image::Rgb([255, 255, 255]));
            }
        }
        let (tiles, columns) = extract_tiles(&img).unwrap();
        assert_eq!(columns, 2);
        assert_eq!(tiles, vec![Tile::filled(Color::BLACK), Tile::filled(Color::WHITE)]);
    }

    #[test]
    fn extract_rejects_partial_tiles() {
        let img = RgbImage::new(12, 8);
        assert!(matches!(
            extract_tiles(&img),
            Err(Error::InvalidDimensions(12, 8, 8))
        ));
    }
}
