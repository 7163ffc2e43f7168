//! Tilemap formats and their immutable descriptors.
//!
//! Every `Format` maps to exactly one static `FormatDescriptor` holding its
//! capacities, capability flags and byte layout. The codec, the tileset
//! builder and the quantizer all read these values instead of branching on
//! the format themselves.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Size of the NSCR-style header written before NDS screen data
pub const NDS_HEADER_LEN: usize = 0x24;

/// A binary tilemap layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[default]
    #[serde(rename = "plain")]
    Plain,
    #[serde(rename = "gbc-attrmap")]
    GbcAttrmap,
    #[serde(rename = "gbc-attrs")]
    GbcAttrs,
    #[serde(rename = "gba-4bpp")]
    Gba4bpp,
    #[serde(rename = "gba-8bpp")]
    Gba8bpp,
    #[serde(rename = "nds-4bpp")]
    Nds4bpp,
    #[serde(rename = "nds-8bpp")]
    Nds8bpp,
    #[serde(rename = "sgb-border")]
    SgbBorder,
    #[serde(rename = "snes-attrs")]
    SnesAttrs,
    #[serde(rename = "genesis-attrs")]
    GenesisAttrs,
    #[serde(rename = "tg16-attrs")]
    Tg16Attrs,
    #[serde(rename = "rle-nibble")]
    RleNibble,
    #[serde(rename = "rle-nibble-flip")]
    RleNibbleFlip,
    #[serde(rename = "ff-terminated")]
    FfTerminated,
    #[serde(rename = "ff-terminated-flip")]
    FfTerminatedFlip,
    #[serde(rename = "ff-rle")]
    FfRle,
}

/// How cells are laid out in the byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Fixed number of bytes per cell, no terminator
    Flat,
    /// One tile ID byte per cell, attributes in a parallel stream
    Attrmap,
    /// Stream ends with a reserved terminator byte
    Sentinel { terminator: u8 },
}

/// Bit layout of a single encoded cell (or run, for RLE layouts)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellLayout {
    /// One tile ID byte
    Byte,
    /// 6-bit tile ID, X flip in bit 6, Y flip in bit 7
    ByteFlip,
    /// Tile ID byte plus a GBC attribute byte
    Gbc,
    /// GBA/NDS screen entry
    Gba,
    /// SGB border entry
    Sgb,
    /// SNES BG entry
    Snes,
    /// Genesis nametable entry, big endian
    Genesis,
    /// PC Engine BAT entry
    Tg16,
    /// Tile ID in the high nibble, run length in the low nibble
    NibbleRun,
    /// Y flip, X flip, 2-bit tile ID, then a run length nibble
    NibbleRunFlip,
    /// A tile ID byte followed by a run length byte
    BytePairRun,
}

impl CellLayout {
    /// Longest run one encoded unit can express (1 for non-RLE layouts)
    pub fn max_run(self) -> usize {
        match self {
            CellLayout::NibbleRun | CellLayout::NibbleRunFlip => 0x0f,
            CellLayout::BytePairRun => 0xff,
            _ => 1,
        }
    }
}

/// Immutable description of one format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub format: Format,
    pub name: &'static str,
    /// Number of distinct tile IDs the format can reference
    pub tileset_capacity: usize,
    /// Number of palettes tiles may be spread over
    pub palette_count: usize,
    /// Colors per palette
    pub palette_size: usize,
    /// Value added to a palette index before it is stored in a cell
    pub palette_base: u8,
    /// Width of the palette field, 0 if cells carry no palette
    pub palette_bits: u8,
    pub bytes_per_cell: usize,
    pub can_flip: bool,
    pub has_priority: bool,
    pub has_secondary_palette: bool,
    /// Grid width implied by the format, overriding any requested width
    pub fixed_width: Option<usize>,
    pub family: Family,
    pub layout: CellLayout,
    /// Bytes preceding the cell data
    pub header_len: usize,
    /// Default file extension for the tilemap
    pub extension: &'static str,
}

impl FormatDescriptor {
    pub fn has_palette(&self) -> bool {
        self.palette_bits > 0
    }

    /// Largest palette value a cell may hold
    pub fn max_palette(&self) -> Option<u8> {
        if self.has_palette() {
            Some(((1u16 << self.palette_bits) - 1) as u8)
        } else {
            None
        }
    }

    pub fn width_for(&self, requested: usize) -> usize {
        self.fixed_width.unwrap_or(requested)
    }
}

const fn flat(
    format: Format,
    name: &'static str,
    layout: CellLayout,
    bytes_per_cell: usize,
    tileset_capacity: usize,
    palettes: (usize, usize, u8),
) -> FormatDescriptor {
    FormatDescriptor {
        format,
        name,
        tileset_capacity,
        palette_count: palettes.0,
        palette_size: palettes.1,
        palette_base: 0,
        palette_bits: palettes.2,
        bytes_per_cell,
        can_flip: false,
        has_priority: false,
        has_secondary_palette: false,
        fixed_width: None,
        family: Family::Flat,
        layout,
        header_len: 0,
        extension: "tilemap",
    }
}

const fn town_map(
    format: Format,
    name: &'static str,
    layout: CellLayout,
    terminator: u8,
    tileset_capacity: usize,
) -> FormatDescriptor {
    FormatDescriptor {
        fixed_width: Some(20),
        family: Family::Sentinel { terminator },
        extension: "bin",
        ..flat(format, name, layout, 1, tileset_capacity, (1, 4, 0))
    }
}

static DESCRIPTORS: [FormatDescriptor; 16] = [
    flat(Format::Plain, "plain", CellLayout::Byte, 1, 256, (1, 4, 0)),
    FormatDescriptor {
        can_flip: true,
        has_priority: true,
        has_secondary_palette: true,
        family: Family::Attrmap,
        ..flat(Format::GbcAttrmap, "gbc-attrmap", CellLayout::Gbc, 1, 512, (8, 4, 3))
    },
    FormatDescriptor {
        can_flip: true,
        has_priority: true,
        has_secondary_palette: true,
        ..flat(Format::GbcAttrs, "gbc-attrs", CellLayout::Gbc, 2, 512, (8, 4, 3))
    },
    FormatDescriptor {
        can_flip: true,
        ..flat(Format::Gba4bpp, "gba-4bpp", CellLayout::Gba, 2, 1024, (16, 16, 4))
    },
    FormatDescriptor {
        can_flip: true,
        ..flat(Format::Gba8bpp, "gba-8bpp", CellLayout::Gba, 2, 1024, (1, 256, 0))
    },
    FormatDescriptor {
        can_flip: true,
        fixed_width: Some(32),
        header_len: NDS_HEADER_LEN,
        extension: "nscr",
        ..flat(Format::Nds4bpp, "nds-4bpp", CellLayout::Gba, 2, 1024, (16, 16, 4))
    },
    FormatDescriptor {
        can_flip: true,
        fixed_width: Some(32),
        header_len: NDS_HEADER_LEN,
        extension: "nscr",
        ..flat(Format::Nds8bpp, "nds-8bpp", CellLayout::Gba, 2, 1024, (1, 256, 0))
    },
    FormatDescriptor {
        can_flip: true,
        fixed_width: Some(32),
        palette_base: 4,
        ..flat(Format::SgbBorder, "sgb-border", CellLayout::Sgb, 2, 256, (4, 16, 3))
    },
    FormatDescriptor {
        can_flip: true,
        has_priority: true,
        ..flat(Format::SnesAttrs, "snes-attrs", CellLayout::Snes, 2, 1024, (8, 16, 3))
    },
    FormatDescriptor {
        can_flip: true,
        has_priority: true,
        ..flat(Format::GenesisAttrs, "genesis-attrs", CellLayout::Genesis, 2, 2048, (4, 16, 2))
    },
    flat(Format::Tg16Attrs, "tg16-attrs", CellLayout::Tg16, 2, 4096, (16, 16, 4)),
    town_map(Format::RleNibble, "rle-nibble", CellLayout::NibbleRun, 0x00, 16),
    FormatDescriptor {
        can_flip: true,
        ..town_map(Format::RleNibbleFlip, "rle-nibble-flip", CellLayout::NibbleRunFlip, 0x00, 4)
    },
    town_map(Format::FfTerminated, "ff-terminated", CellLayout::Byte, 0xff, 255),
    FormatDescriptor {
        can_flip: true,
        ..town_map(Format::FfTerminatedFlip, "ff-terminated-flip", CellLayout::ByteFlip, 0xff, 63)
    },
    FormatDescriptor {
        bytes_per_cell: 2,
        ..town_map(Format::FfRle, "ff-rle", CellLayout::BytePairRun, 0xff, 255)
    },
];

impl Format {
    pub const ALL: [Format; 16] = [
        Format::Plain,
        Format::GbcAttrmap,
        Format::GbcAttrs,
        Format::Gba4bpp,
        Format::Gba8bpp,
        Format::Nds4bpp,
        Format::Nds8bpp,
        Format::SgbBorder,
        Format::SnesAttrs,
        Format::GenesisAttrs,
        Format::Tg16Attrs,
        Format::RleNibble,
        Format::RleNibbleFlip,
        Format::FfTerminated,
        Format::FfTerminatedFlip,
        Format::FfRle,
    ];

    /// Look up the descriptor for this format
    pub fn descriptor(self) -> &'static FormatDescriptor {
        &DESCRIPTORS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from parsing a format name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFormatError(String);

impl fmt::Display for ParseFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tilemap format {:?} (expected one of: ", self.0)?;
        for (i, format) in Format::ALL.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(format.name())?;
        }
        f.write_str(")")
    }
}

impl std::error::Error for ParseFormatError {}

impl FromStr for Format {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .iter()
            .copied()
            .find(|format| format.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseFormatError(s.to_string()))
    }
}

/// GB screen, 20x18 cells
const GB_SCREEN: usize = 20 * 18;
/// GB background, 32x32 cells
const GB_BACKGROUND: usize = 32 * 32;
/// GBA screen, 30x20 cells
const GBA_SCREEN: usize = 30 * 20;
/// SGB border, 32x28 cells
const SGB_SCREEN: usize = 32 * 28;
/// Genesis plane, 40x28 cells
const GENESIS_SCREEN: usize = 40 * 28;

/// Best-effort guess of a tilemap's format from its name and size.
///
/// Falls back to `current` whenever the hints are ambiguous or absent.
pub fn guess_format(filename: &Path, file_size: usize, current: Format) -> Format {
    let extension = filename
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let stem = filename
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_ascii_lowercase())
        .unwrap_or_default();
    let descriptor = current.descriptor();
    let one_byte_flat = descriptor.family == Family::Flat && descriptor.bytes_per_cell == 1;
    let two_byte_flat = descriptor.family == Family::Flat
        && descriptor.bytes_per_cell == 2
        && descriptor.header_len == 0;

    match extension.as_str() {
        "attrmap" => return Format::GbcAttrmap,
        "nscr" if current == Format::Nds8bpp => return current,
        "nscr" => return Format::Nds4bpp,
        _ => {}
    }

    if stem.contains("sgb") {
        return Format::SgbBorder;
    }

    match file_size {
        GB_SCREEN | GB_BACKGROUND if one_byte_flat => current,
        GB_SCREEN | GB_BACKGROUND if current != Format::GbcAttrmap => Format::Plain,
        n if n == GB_SCREEN * 2 && !two_byte_flat => Format::GbcAttrs,
        n if (n == GBA_SCREEN * 2 || n == GB_BACKGROUND * 2) && !two_byte_flat => Format::Gba4bpp,
        n if n == SGB_SCREEN * 2 => Format::SgbBorder,
        n if n == GENESIS_SCREEN * 2 => Format::GenesisAttrs,
        n if n > NDS_HEADER_LEN
            && (n - NDS_HEADER_LEN) % (GB_BACKGROUND * 2) == 0
            && current != Format::Nds8bpp =>
        {
            Format::Nds4bpp
        }
        _ => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_format() {
        for format in Format::ALL {
            assert_eq!(format.descriptor().format, format);
        }
    }

    #[test]
    fn names_round_trip() {
        for format in Format::ALL {
            assert_eq!(format.name().parse::<Format>(), Ok(format));
            let json = serde_json::to_string(&format).unwrap();
            assert_eq!(json, format!("\"{}\"", format.name()));
        }
        assert!("gameboy".parse::<Format>().is_err());
    }

    #[test]
    fn capabilities() {
        let plain = Format::Plain.descriptor();
        assert!(!plain.can_flip);
        assert!(!plain.has_palette());
        assert_eq!(plain.max_palette(), None);

        let gbc = Format::GbcAttrmap.descriptor();
        assert!(gbc.can_flip && gbc.has_priority && gbc.has_secondary_palette);
        assert_eq!(gbc.family, Family::Attrmap);
        assert_eq!(gbc.max_palette(), Some(7));

        let nds = Format::Nds8bpp.descriptor();
        assert_eq!(nds.fixed_width, Some(32));
        assert_eq!(nds.header_len, NDS_HEADER_LEN);
        assert_eq!(nds.width_for(20), 32);
        assert_eq!(Format::Plain.descriptor().width_for(20), 20);

        let rle = Format::RleNibble.descriptor();
        assert_eq!(rle.family, Family::Sentinel { terminator: 0x00 });
        assert_eq!(rle.fixed_width, Some(20));
        assert_eq!(rle.layout.max_run(), 15);
        assert_eq!(Format::FfRle.descriptor().layout.max_run(), 255);
    }

    #[test]
    fn guess_by_name() {
        let guess = |name: &str, size, current| guess_format(Path::new(name), size, current);
        assert_eq!(guess("map.attrmap", 360, Format::Plain), Format::GbcAttrmap);
        assert_eq!(guess("title.nscr", 2084, Format::Plain), Format::Nds4bpp);
        assert_eq!(guess("title.nscr", 2084, Format::Nds8bpp), Format::Nds8bpp);
        assert_eq!(guess("sgb_border.bin", 100, Format::Plain), Format::SgbBorder);
    }

    #[test]
    fn guess_by_size() {
        let guess = |size, current| guess_format(Path::new("screen.bin"), size, current);
        assert_eq!(guess(360, Format::Gba4bpp), Format::Plain);
        assert_eq!(guess(360, Format::FfTerminated), Format::Plain);
        assert_eq!(guess(1024, Format::Plain), Format::Plain);
        assert_eq!(guess(720, Format::Plain), Format::GbcAttrs);
        assert_eq!(guess(1200, Format::Plain), Format::Gba4bpp);
        assert_eq!(guess(2048, Format::SnesAttrs), Format::SnesAttrs);
        assert_eq!(guess(1792, Format::Plain), Format::SgbBorder);
        assert_eq!(guess(2240, Format::Plain), Format::GenesisAttrs);
        assert_eq!(guess(2084, Format::Plain), Format::Nds4bpp);
        assert_eq!(guess(17, Format::RleNibble), Format::RleNibble);
    }
}
