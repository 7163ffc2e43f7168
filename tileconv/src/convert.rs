//! Image conversion pipeline
//!
//! Turns an image into a deduplicated tileset, a tilemap in one of the
//! supported formats, and a palette file. Every artifact is encoded in
//! memory first and only then written to disk.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::codec::{self, Encoded};
use crate::color::{Color, ColorSet};
use crate::error::{Error, Result};
use crate::format::{Family, Format};
use crate::import::load_tilemap_bytes;
use crate::palette_file::{self, PaletteFormat};
use crate::quantize::{Palette, Quantizer};
use crate::tile::{extract_tiles, Tile};
use crate::tilemap::{Tilemap, NO_PALETTE};
use crate::tileset::{build_tileset, BlankTile, Tileset};

/// Configuration for the image conversion process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input image file path
    pub input: PathBuf,
    /// Target tilemap format
    pub format: Format,
    /// Tilemap width in cells, defaults to the image width in tiles
    pub width: Option<usize>,
    /// Offset added to every tileset index
    pub start_id: usize,
    /// Tiles entirely of one color that map to a fixed ID
    pub blank_tile: Option<BlankTile>,
    /// Color forced into slot 0 of every palette
    pub color_zero: Option<Color>,
    /// Output tilemap path
    pub tilemap_output: Option<PathBuf>,
    /// Output attrmap path, derived from the tilemap path when unset
    pub attrmap_output: Option<PathBuf>,
    /// Output palette path
    pub palette_output: Option<PathBuf>,
    /// Palette file format, guessed from the palette path when unset
    pub palette_format: Option<PaletteFormat>,
    /// Output tileset image path
    pub tileset_output: Option<PathBuf>,
}

impl Config {
    /// Load a configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::unreadable(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The attrmap path, if the format has one and a tilemap is being written
    pub fn attrmap_path(&self) -> Option<PathBuf> {
        if self.format.descriptor().family != Family::Attrmap {
            return None;
        }
        self.attrmap_output.clone().or_else(|| {
            self.tilemap_output
                .as_ref()
                .map(|path| path.with_extension("attrmap"))
        })
    }

    fn palette_target(&self) -> Result<Option<(PathBuf, PaletteFormat)>> {
        let Some(path) = &self.palette_output else {
            return Ok(None);
        };
        let format = match self.palette_format {
            Some(format) => format,
            None => PaletteFormat::from_path(path)?,
        };
        Ok(format.writes_file().then(|| (path.clone(), format)))
    }

    /// Label used by palette formats that carry a title
    fn palette_name(&self) -> String {
        self.input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("palette")
            .to_string()
    }
}

/// Everything produced by a successful conversion
#[derive(Debug, Clone)]
pub struct Conversion {
    pub tilemap: Tilemap,
    pub tileset: Tileset,
    pub palettes: Vec<Palette>,
    /// Artifacts written, in write order
    pub written: Vec<PathBuf>,
}

/// Main struct for the image conversion process
pub struct ImageConverter {
    config: Config,
}

impl ImageConverter {
    /// Create a new image converter with the given configuration
    pub fn new(config: Config) -> Self {
        ImageConverter { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the entire conversion and write the configured artifacts.
    ///
    /// Hard failures write nothing. A palette overflow writes only the
    /// palette file and then returns `TooManyPalettes`.
    pub fn convert(&self) -> Result<Conversion> {
        let descriptor = self.config.format.descriptor();
        info!("Converting {} to {}", self.config.input.display(), descriptor.name);

        let img = self.read_image()?;
        let (tiles, columns) = extract_tiles(&img)?;
        info!("Extracted {} tiles, {} per row", tiles.len(), columns);

        // Resolve the palette target early so a bad extension fails before any work
        let palette_target = self.config.palette_target()?;

        let (palettes, tile_palettes, overflow) = self.assign_palettes(&tiles)?;

        let (cells, tileset) = build_tileset(
            &tiles,
            &tile_palettes,
            descriptor,
            self.config.start_id,
            self.config.blank_tile,
        )?;

        if let Some(overflow) = overflow {
            warn!("{}", overflow);
            if let Some((path, format)) = &palette_target {
                let bytes = palette_file::encode(&palettes, *format, &self.config.palette_name())?;
                write_atomic(path, &bytes)?;
                info!("Wrote oversized palette file {}", path.display());
            }
            return Err(overflow);
        }

        let tilemap = Tilemap::new(
            self.config.format,
            self.config.width.unwrap_or(columns),
            cells,
        );
        tilemap.validate()?;

        // Encode everything before the first write
        let mut artifacts: Vec<(PathBuf, Vec<u8>)> = Vec::new();
        if let Some((path, format)) = &palette_target {
            let bytes = palette_file::encode(&palettes, *format, &self.config.palette_name())?;
            artifacts.push((path.clone(), bytes));
        }
        if let Some(path) = &self.config.tilemap_output {
            let Encoded { tiles, attributes } = codec::encode(&tilemap);
            artifacts.push((path.clone(), tiles));
            if let (Some(attributes), Some(attr_path)) = (attributes, self.config.attrmap_path()) {
                artifacts.push((attr_path, attributes));
            }
        }
        if let Some(path) = &self.config.tileset_output {
            artifacts.push((path.clone(), png_bytes(&tileset.to_image())?));
        }

        let mut written = Vec::with_capacity(artifacts.len());
        for (path, bytes) in artifacts {
            write_atomic(&path, &bytes)?;
            debug!("Wrote {} bytes to {}", bytes.len(), path.display());
            written.push(path);
        }

        info!(
            "Converted {} cells, {} unique tiles, {} palettes",
            tilemap.len(),
            tileset.len(),
            palettes.len()
        );

        Ok(Conversion {
            tilemap,
            tileset,
            palettes,
            written,
        })
    }

    fn read_image(&self) -> Result<RgbImage> {
        let img = image::open(&self.config.input)
            .map_err(|e| Error::unreadable(&self.config.input, e))?;
        Ok(img.to_rgb8())
    }

    /// Quantize every tile and pick the cell palette value for each.
    ///
    /// Blank tiles take part too, so the blank-tile shortcut lands on a
    /// palette holding the blank color. Returns the palettes, one cell
    /// palette per tile and the soft overflow error if more palettes were
    /// needed than the format addresses.
    fn assign_palettes(&self, tiles: &[Tile]) -> Result<(Vec<Palette>, Vec<i8>, Option<Error>)> {
        let descriptor = self.config.format.descriptor();
        let sets: Vec<ColorSet> = tiles.iter().map(Tile::color_set).collect();

        let quantizer = Quantizer::new(
            descriptor.palette_size,
            descriptor.palette_count,
            self.config.color_zero,
        );
        let quantized = quantizer.quantize(&sets)?;

        let tile_palettes = if descriptor.has_palette() {
            quantized
                .assignment
                .iter()
                .map(|&palette| (palette + descriptor.palette_base as usize) as i8)
                .collect()
        } else {
            vec![NO_PALETTE; tiles.len()]
        };

        let overflow = quantized.overflow();
        Ok((quantized.palettes, tile_palettes, overflow))
    }
}

/// Normalize a tilemap to another format
pub fn reformat(tilemap: &Tilemap, target: Format) -> Result<Tilemap> {
    let reformatted = tilemap.reformat(target)?;
    info!(
        "Reformatted {} cells from {} to {}",
        tilemap.len(),
        tilemap.format,
        target
    );
    Ok(reformatted)
}

/// Read and decode a tilemap file, plus its attrmap for attrmap formats.
///
/// Without an explicit attrmap path, the tilemap path with an `.attrmap`
/// extension is tried.
pub fn decode_file(
    format: Format,
    path: &Path,
    attrmap: Option<&Path>,
    width: usize,
) -> Result<Tilemap> {
    let tiles = load_tilemap_bytes(path)?;
    let attributes = if format.descriptor().family == Family::Attrmap {
        let attr_path = attrmap
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.with_extension("attrmap"));
        Some(load_tilemap_bytes(&attr_path)?)
    } else {
        None
    };
    codec::decode(format, &tiles, attributes.as_deref(), width)
}

/// Encode and write a tilemap, returning the paths written
pub fn write_tilemap(
    tilemap: &Tilemap,
    path: &Path,
    attrmap: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    tilemap.validate()?;
    let Encoded { tiles, attributes } = codec::encode(tilemap);

    let attr_artifact = attributes.map(|bytes| {
        let attr_path = attrmap
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.with_extension("attrmap"));
        (attr_path, bytes)
    });

    write_atomic(path, &tiles)?;
    let mut written = vec![path.to_path_buf()];
    if let Some((attr_path, bytes)) = attr_artifact {
        write_atomic(&attr_path, &bytes)?;
        written.push(attr_path);
    }
    Ok(written)
}

fn png_bytes(img: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Write `bytes` next to `path` and rename into place
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::unwritable(path, "not a file path"))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);

    let result = fs::write(&temp, bytes).and_then(|_| fs::rename(&temp, path));
    if let Err(e) = result {
        let _ = fs::remove_file(&temp);
        return Err(Error::unwritable(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_json_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"input": "town.png", "format": "rle-nibble", "color_zero": "ffffff"}"#,
        )
        .unwrap();
        assert_eq!(config.format, Format::RleNibble);
        assert_eq!(config.color_zero, Some(Color::WHITE));
        assert_eq!(config.start_id, 0);
        assert!(config.tilemap_output.is_none());
        assert_eq!(Config::default().format, Format::Plain);
    }

    #[test]
    fn attrmap_path_derivation() {
        let mut config = Config {
            format: Format::GbcAttrmap,
            tilemap_output: Some(PathBuf::from("out/map.tilemap")),
            ..Config::default()
        };
        assert_eq!(config.attrmap_path(), Some(PathBuf::from("out/map.attrmap")));

        config.attrmap_output = Some(PathBuf::from("attrs.bin"));
        assert_eq!(config.attrmap_path(), Some(PathBuf::from("attrs.bin")));

        config.format = Format::Plain;
        assert_eq!(config.attrmap_path(), None);
    }

    #[test]
    fn atomic_write_replaces_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let path = dir.join("data.bin");
        write_atomic(&path, &[1, 2, 3]).unwrap();
        write_atomic(&path, &[4]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![4]);
        assert!(!dir.join(".data.bin.tmp").exists());

        let missing = dir.join("missing").join("data.bin");
        assert!(matches!(
            write_atomic(&missing, &[1]),
            Err(Error::UnwritableFile { .. })
        ));
    }

    #[test]
    fn tilemap_file_round_trip() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let path = dir.join("map.tilemap");
        let tilemap = Tilemap::new(
            Format::GbcAttrmap,
            2,
            vec![
                crate::tilemap::TileCell::new(3).with_palette(1),
                crate::tilemap::TileCell::new(300)
                    .with_flip(true, false)
                    .with_palette(7),
            ],
        );
        let written = write_tilemap(&tilemap, &path, None).unwrap();
        assert_eq!(written, vec![path.clone(), dir.join("map.attrmap")]);

        let decoded = decode_file(Format::GbcAttrmap, &path, None, 2).unwrap();
        assert_eq!(decoded, tilemap);
    }

    #[test]
    fn reformat_drops_unsupported_fields() {
        let tilemap = Tilemap::new(
            Format::Gba4bpp,
            1,
            vec![crate::tilemap::TileCell::new(9)
                .with_flip(true, true)
                .with_palette(3)],
        );
        let plain = reformat(&tilemap, Format::Plain).unwrap();
        assert_eq!(plain.cells, vec![crate::tilemap::TileCell::new(9)]);
        assert!(matches!(
            reformat(&tilemap, Format::RleNibbleFlip),
            Err(Error::CellOutOfRange { .. })
        ));
    }
}
