//! Tile deduplication and tileset building.

use image::RgbImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{Error, Result};
use crate::format::FormatDescriptor;
use crate::tile::{Tile, TILE_SIZE};
use crate::tilemap::{TileCell, NO_PALETTE};

/// Tiles per row in a rendered tileset image
pub const TILESET_IMAGE_COLUMNS: usize = 16;

/// Tiles that are entirely `color` map to `tile_id` without entering the tileset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlankTile {
    pub tile_id: u16,
    pub color: Color,
}

/// Deduplicated tiles in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tileset {
    tiles: Vec<Tile>,
}

impl Tileset {
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Find the first tile matching `tile`, trying flipped variants only when allowed.
    ///
    /// Returns the index and the (x, y) flips that turn the stored tile into `tile`.
    pub fn find(&self, tile: &Tile, allow_flip: bool) -> Option<(usize, bool, bool)> {
        let variants: Vec<(Tile, bool, bool)> = if allow_flip {
            vec![
                (*tile, false, false),
                (tile.x_flipped(), true, false),
                (tile.y_flipped(), false, true),
                (tile.xy_flipped(), true, true),
            ]
        } else {
            vec![(*tile, false, false)]
        };

        self.tiles.iter().enumerate().find_map(|(index, stored)| {
            variants
                .iter()
                .find(|(variant, _, _)| variant == stored)
                .map(|&(_, x_flip, y_flip)| (index, x_flip, y_flip))
        })
    }

    /// Render the tiles into an image, `TILESET_IMAGE_COLUMNS` tiles wide
    pub fn to_image(&self) -> RgbImage {
        let columns = TILESET_IMAGE_COLUMNS.min(self.tiles.len().max(1));
        let rows = self.tiles.len().div_ceil(columns).max(1);
        let mut img = RgbImage::new((columns * TILE_SIZE) as u32, (rows * TILE_SIZE) as u32);

        for (i, tile) in self.tiles.iter().enumerate() {
            let base_x = (i % columns) * TILE_SIZE;
            let base_y = (i / columns) * TILE_SIZE;
            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    img.put_pixel(
                        (base_x + x) as u32,
                        (base_y + y) as u32,
                        tile.pixel(x, y).into(),
                    );
                }
            }
        }

        img
    }
}

/// Convert raw tiles into cells referencing a deduplicated tileset.
///
/// `palettes` holds the palette index for each tile (or `-1`). Flipped
/// matches are only considered when the format can flip tiles.
pub fn build_tileset(
    tiles: &[Tile],
    palettes: &[i8],
    descriptor: &FormatDescriptor,
    start_id: usize,
    blank: Option<BlankTile>,
) -> Result<(Vec<TileCell>, Tileset)> {
    if start_id > descriptor.tileset_capacity {
        return Err(Error::TooManyUniqueTiles {
            needed: 0,
            start_id,
            capacity: descriptor.tileset_capacity,
        });
    }

    let mut tileset = Tileset::default();
    let mut cells = Vec::with_capacity(tiles.len());

    for (i, tile) in tiles.iter().enumerate() {
        let palette = if descriptor.has_palette() {
            palettes.get(i).copied().unwrap_or(NO_PALETTE).max(0)
        } else {
            NO_PALETTE
        };

        if let Some(blank) = blank.filter(|b| tile.is_blank(b.color)) {
            cells.push(TileCell::new(blank.tile_id).with_palette(palette));
            continue;
        }

        let (index, x_flip, y_flip) = match tileset.find(tile, descriptor.can_flip) {
            Some(found) => found,
            None => {
                let needed = tileset.len() + 1;
                if start_id
                    .checked_add(needed)
                    .map_or(true, |n| n > descriptor.tileset_capacity)
                {
                    return Err(Error::TooManyUniqueTiles {
                        needed,
                        start_id,
                        capacity: descriptor.tileset_capacity,
                    });
                }
                tileset.tiles.push(*tile);
                (tileset.len() - 1, false, false)
            }
        };

        cells.push(
            TileCell::new((index + start_id) as u16)
                .with_flip(x_flip, y_flip)
                .with_palette(palette),
        );
    }

    debug!("Blank tile shortcut: {:?}", blank);
    info!(
        "Deduplicated {} tiles into {} unique tiles",
        tiles.len(),
        tileset.len()
    );

    Ok((cells, tileset))
}
