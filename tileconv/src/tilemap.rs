//! Tilemap grids and the cells they hold.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::format::{Format, FormatDescriptor};

/// Palette value of a cell that carries no palette
pub const NO_PALETTE: i8 = -1;

/// One grid position of a tilemap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCell {
    pub tile_id: u16,
    #[serde(default)]
    pub x_flip: bool,
    #[serde(default)]
    pub y_flip: bool,
    #[serde(default)]
    pub priority: bool,
    #[serde(default)]
    pub secondary_palette_select: bool,
    #[serde(default = "no_palette")]
    pub palette: i8,
}

fn no_palette() -> i8 {
    NO_PALETTE
}

impl Default for TileCell {
    fn default() -> Self {
        TileCell::new(0)
    }
}

impl TileCell {
    /// A cell referencing `tile_id` with no attributes
    pub fn new(tile_id: u16) -> Self {
        TileCell {
            tile_id,
            x_flip: false,
            y_flip: false,
            priority: false,
            secondary_palette_select: false,
            palette: NO_PALETTE,
        }
    }

    pub fn with_flip(mut self, x_flip: bool, y_flip: bool) -> Self {
        self.x_flip = x_flip;
        self.y_flip = y_flip;
        self
    }

    pub fn with_palette(mut self, palette: i8) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    /// Clear every field the format cannot represent
    pub fn normalized_for(self, descriptor: &FormatDescriptor) -> Self {
        TileCell {
            tile_id: self.tile_id,
            x_flip: self.x_flip && descriptor.can_flip,
            y_flip: self.y_flip && descriptor.can_flip,
            priority: self.priority && descriptor.has_priority,
            secondary_palette_select: self.secondary_palette_select
                && descriptor.has_secondary_palette,
            palette: if descriptor.has_palette() {
                self.palette.max(0)
            } else {
                NO_PALETTE
            },
        }
    }
}

impl FormatDescriptor {
    /// Reject a cell whose fields fall outside this format's ranges.
    ///
    /// Unsupported flags must be cleared and the palette must be `-1`
    /// unless the format stores one.
    pub fn check_cell(&self, index: usize, cell: &TileCell) -> Result<()> {
        let out_of_range = |reason: String| Error::CellOutOfRange {
            index,
            format: self.name,
            reason,
        };

        if cell.tile_id as usize >= self.tileset_capacity {
            return Err(out_of_range(format!(
                "tile ID {} exceeds {}",
                cell.tile_id,
                self.tileset_capacity - 1
            )));
        }
        if !self.can_flip && (cell.x_flip || cell.y_flip) {
            return Err(out_of_range("flipping is not supported".to_string()));
        }
        if !self.has_priority && cell.priority {
            return Err(out_of_range("priority is not supported".to_string()));
        }
        if !self.has_secondary_palette && cell.secondary_palette_select {
            return Err(out_of_range(
                "secondary palette select is not supported".to_string(),
            ));
        }
        match self.max_palette() {
            Some(max) if cell.palette < 0 || cell.palette as u8 > max => Err(out_of_range(
                format!("palette {} is outside 0..={}", cell.palette, max),
            )),
            None if cell.palette != NO_PALETTE => {
                Err(out_of_range("palettes are not supported".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// A row-major grid of cells in a specific format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tilemap {
    pub format: Format,
    pub width: usize,
    pub cells: Vec<TileCell>,
}

impl Tilemap {
    /// Create a tilemap, adopting the format's fixed width if it has one
    pub fn new(format: Format, width: usize, cells: Vec<TileCell>) -> Self {
        Tilemap {
            format,
            width: format.descriptor().width_for(width).max(1),
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of rows, counting a partial last row
    pub fn height(&self) -> usize {
        self.cells.len().div_ceil(self.width)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&TileCell> {
        if x >= self.width {
            return None;
        }
        self.cells.get(y * self.width + x)
    }

    pub fn rows(&self) -> std::slice::Chunks<'_, TileCell> {
        self.cells.chunks(self.width)
    }

    /// Check every cell against the format's ranges
    pub fn validate(&self) -> Result<()> {
        let descriptor = self.format.descriptor();
        self.cells
            .iter()
            .enumerate()
            .try_for_each(|(i, cell)| descriptor.check_cell(i, cell))
    }

    /// Convert to another format.
    ///
    /// Fields the target cannot represent are cleared, cells that still do
    /// not fit are rejected, and the target's fixed width wins.
    pub fn reformat(&self, target: Format) -> Result<Tilemap> {
        let descriptor = target.descriptor();
        let cells = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let cell = cell.normalized_for(descriptor);
                descriptor.check_cell(i, &cell).map(|_| cell)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Tilemap::new(target, self.width, cells))
    }
}
