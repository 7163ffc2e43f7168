//! Conversion of images into retro console tilesets, tilemaps and palettes,
//! and decoding of existing binary tilemaps back into editable cells.

pub mod codec;
pub mod color;
pub mod convert;
pub mod error;
pub mod format;
pub mod import;
pub mod palette_file;
pub mod quantize;
pub mod tile;
pub mod tilemap;
pub mod tileset;

pub use color::{Color, ColorSet};
pub use convert::{Config, Conversion, ImageConverter};
pub use error::{Error, Result, Stream};
pub use format::{guess_format, Format, FormatDescriptor};
pub use palette_file::PaletteFormat;
pub use quantize::{Palette, Quantizer};
pub use tile::Tile;
pub use tilemap::{TileCell, Tilemap};
pub use tileset::{BlankTile, Tileset};
