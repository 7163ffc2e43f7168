//! Tilemap encoding and decoding.
//!
//! Three families of layouts are handled:
//! - flat streams with a fixed number of bytes per cell (optionally after a header)
//! - attrmap streams, tile IDs and attribute bytes in two parallel files
//! - sentinel streams ending in a reserved terminator byte, some run-length encoded

use bitfield::bitfield;
use itertools::Itertools;
use log::debug;

use crate::error::{Error, LengthMismatch, Result, Stream};
use crate::format::{CellLayout, Family, Format, FormatDescriptor, NDS_HEADER_LEN};
use crate::tilemap::{TileCell, Tilemap, NO_PALETTE};

bitfield! {
    /// GBC background attribute byte
    pub struct GbcAttribute(u8);
    impl Debug;
    u8;
    pub palette, set_palette: 2, 0;
    pub bank, set_bank: 3;
    pub secondary_palette, set_secondary_palette: 4;
    pub x_flip, set_x_flip: 5;
    pub y_flip, set_y_flip: 6;
    pub priority, set_priority: 7;
}

bitfield! {
    /// GBA and NDS text background screen entry
    pub struct GbaEntry(u16);
    impl Debug;
    u16;
    pub tile_id, set_tile_id: 9, 0;
    pub x_flip, set_x_flip: 10;
    pub y_flip, set_y_flip: 11;
    pub palette, set_palette: 15, 12;
}

bitfield! {
    /// Super Game Boy border entry
    pub struct SgbEntry(u16);
    impl Debug;
    u16;
    pub tile_id, set_tile_id: 7, 0;
    pub palette, set_palette: 12, 10;
    pub x_flip, set_x_flip: 14;
    pub y_flip, set_y_flip: 15;
}

bitfield! {
    /// SNES background tilemap entry
    pub struct SnesEntry(u16);
    impl Debug;
    u16;
    pub tile_id, set_tile_id: 9, 0;
    pub palette, set_palette: 12, 10;
    pub priority, set_priority: 13;
    pub x_flip, set_x_flip: 14;
    pub y_flip, set_y_flip: 15;
}

bitfield! {
    /// Genesis nametable entry, stored big endian
    pub struct GenesisEntry(u16);
    impl Debug;
    u16;
    pub tile_id, set_tile_id: 10, 0;
    pub x_flip, set_x_flip: 11;
    pub y_flip, set_y_flip: 12;
    pub palette, set_palette: 14, 13;
    pub priority, set_priority: 15;
}

bitfield! {
    /// PC Engine BAT entry
    pub struct Tg16Entry(u16);
    impl Debug;
    u16;
    pub tile_id, set_tile_id: 11, 0;
    pub palette, set_palette: 15, 12;
}

bitfield! {
    /// One byte of a flipped town map: tile ID plus flips
    pub struct FlipByte(u8);
    impl Debug;
    u8;
    pub tile_id, set_tile_id: 5, 0;
    pub x_flip, set_x_flip: 6;
    pub y_flip, set_y_flip: 7;
}

bitfield! {
    /// One run of a flipped nibble town map
    pub struct FlipNibbleRun(u8);
    impl Debug;
    u8;
    pub count, set_count: 3, 0;
    pub tile_id, set_tile_id: 5, 4;
    pub x_flip, set_x_flip: 6;
    pub y_flip, set_y_flip: 7;
}

/// Encoded tilemap bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub tiles: Vec<u8>,
    /// Parallel attribute stream, only for attrmap formats
    pub attributes: Option<Vec<u8>>,
}

fn palette_field(cell: &TileCell) -> u16 {
    cell.palette.max(0) as u16
}

fn palette_from(descriptor: &FormatDescriptor, value: u16) -> i8 {
    if descriptor.has_palette() {
        value as i8
    } else {
        NO_PALETTE
    }
}

fn gbc_attribute(cell: &TileCell) -> u8 {
    let mut attr = GbcAttribute(0);
    attr.set_palette(palette_field(cell) as u8);
    attr.set_bank(cell.tile_id & 0x100 != 0);
    attr.set_secondary_palette(cell.secondary_palette_select);
    attr.set_x_flip(cell.x_flip);
    attr.set_y_flip(cell.y_flip);
    attr.set_priority(cell.priority);
    attr.0
}

fn gbc_cell(tile_id: u8, attr: u8) -> TileCell {
    let attr = GbcAttribute(attr);
    TileCell {
        tile_id: tile_id as u16 | if attr.bank() { 0x100 } else { 0 },
        x_flip: attr.x_flip(),
        y_flip: attr.y_flip(),
        priority: attr.priority(),
        secondary_palette_select: attr.secondary_palette(),
        palette: attr.palette() as i8,
    }
}

/// Pack a cell into a 16-bit entry
fn pack_word(layout: CellLayout, cell: &TileCell) -> u16 {
    match layout {
        CellLayout::Gba => {
            let mut entry = GbaEntry(0);
            entry.set_tile_id(cell.tile_id);
            entry.set_x_flip(cell.x_flip);
            entry.set_y_flip(cell.y_flip);
            entry.set_palette(palette_field(cell));
            entry.0
        }
        CellLayout::Sgb => {
            let mut entry = SgbEntry(0);
            entry.set_tile_id(cell.tile_id);
            entry.set_palette(palette_field(cell));
            entry.set_x_flip(cell.x_flip);
            entry.set_y_flip(cell.y_flip);
            entry.0
        }
        CellLayout::Snes => {
            let mut entry = SnesEntry(0);
            entry.set_tile_id(cell.tile_id);
            entry.set_palette(palette_field(cell));
            entry.set_priority(cell.priority);
            entry.set_x_flip(cell.x_flip);
            entry.set_y_flip(cell.y_flip);
            entry.0
        }
        CellLayout::Genesis => {
            let mut entry = GenesisEntry(0);
            entry.set_tile_id(cell.tile_id);
            entry.set_x_flip(cell.x_flip);
            entry.set_y_flip(cell.y_flip);
            entry.set_palette(palette_field(cell));
            entry.set_priority(cell.priority);
            entry.0
        }
        CellLayout::Tg16 => {
            let mut entry = Tg16Entry(0);
            entry.set_tile_id(cell.tile_id);
            entry.set_palette(palette_field(cell));
            entry.0
        }
        _ => unreachable!("{:?} is not a 16-bit layout", layout),
    }
}

/// Unpack a 16-bit entry
fn unpack_word(descriptor: &FormatDescriptor, word: u16) -> TileCell {
    match descriptor.layout {
        CellLayout::Gba => {
            let entry = GbaEntry(word);
            TileCell::new(entry.tile_id())
                .with_flip(entry.x_flip(), entry.y_flip())
                .with_palette(palette_from(descriptor, entry.palette()))
        }
        CellLayout::Sgb => {
            let entry = SgbEntry(word);
            TileCell::new(entry.tile_id())
                .with_flip(entry.x_flip(), entry.y_flip())
                .with_palette(palette_from(descriptor, entry.palette()))
        }
        CellLayout::Snes => {
            let entry = SnesEntry(word);
            TileCell::new(entry.tile_id())
                .with_flip(entry.x_flip(), entry.y_flip())
                .with_priority(entry.priority())
                .with_palette(palette_from(descriptor, entry.palette()))
        }
        CellLayout::Genesis => {
            let entry = GenesisEntry(word);
            TileCell::new(entry.tile_id())
                .with_flip(entry.x_flip(), entry.y_flip())
                .with_priority(entry.priority())
                .with_palette(palette_from(descriptor, entry.palette()))
        }
        CellLayout::Tg16 => {
            let entry = Tg16Entry(word);
            TileCell::new(entry.tile_id()).with_palette(palette_from(descriptor, entry.palette()))
        }
        layout => unreachable!("{:?} is not a 16-bit layout", layout),
    }
}

/// The raw byte a sentinel-family cell is stored as (run count excluded)
fn pack_byte(layout: CellLayout, cell: &TileCell) -> u8 {
    match layout {
        CellLayout::Byte | CellLayout::NibbleRun | CellLayout::BytePairRun => cell.tile_id as u8,
        CellLayout::ByteFlip => {
            let mut byte = FlipByte(0);
            byte.set_tile_id(cell.tile_id as u8);
            byte.set_x_flip(cell.x_flip);
            byte.set_y_flip(cell.y_flip);
            byte.0
        }
        CellLayout::NibbleRunFlip => {
            let mut byte = FlipNibbleRun(0);
            byte.set_tile_id(cell.tile_id as u8);
            byte.set_x_flip(cell.x_flip);
            byte.set_y_flip(cell.y_flip);
            byte.0
        }
        layout => unreachable!("{:?} is not a byte layout", layout),
    }
}

fn unpack_byte(layout: CellLayout, byte: u8) -> TileCell {
    match layout {
        CellLayout::Byte | CellLayout::BytePairRun => TileCell::new(byte as u16),
        CellLayout::NibbleRun => TileCell::new((byte >> 4) as u16),
        CellLayout::ByteFlip => {
            let byte = FlipByte(byte);
            TileCell::new(byte.tile_id() as u16).with_flip(byte.x_flip(), byte.y_flip())
        }
        CellLayout::NibbleRunFlip => {
            let byte = FlipNibbleRun(byte);
            TileCell::new(byte.tile_id() as u16).with_flip(byte.x_flip(), byte.y_flip())
        }
        layout => unreachable!("{:?} is not a byte layout", layout),
    }
}

/// NSCR-style header for NDS screens
fn nds_header(format: Format, width: usize, cell_count: usize) -> Vec<u8> {
    let data_size = (cell_count * 2) as u32;
    let height = cell_count.div_ceil(width);
    let mut header = Vec::with_capacity(NDS_HEADER_LEN);
    header.extend_from_slice(b"RCSN");
    header.extend_from_slice(&[0xff, 0xfe, 0x00, 0x01]);
    header.extend_from_slice(&(NDS_HEADER_LEN as u32 + data_size).to_le_bytes());
    header.extend_from_slice(&0x10u16.to_le_bytes());
    header.extend_from_slice(&1u16.to_le_bytes());
    header.extend_from_slice(b"NRCS");
    header.extend_from_slice(&(NDS_HEADER_LEN as u32 - 0x10 + data_size).to_le_bytes());
    header.extend_from_slice(&((width * 8) as u16).to_le_bytes());
    header.extend_from_slice(&((height * 8) as u16).to_le_bytes());
    let screen_format: u32 = if format == Format::Nds8bpp { 1 } else { 0 };
    header.extend_from_slice(&screen_format.to_le_bytes());
    header.extend_from_slice(&data_size.to_le_bytes());
    header
}

/// Encode a tilemap into its format's byte streams.
///
/// Cells are expected to be within the format's ranges already.
pub fn encode(tilemap: &Tilemap) -> Encoded {
    let descriptor = tilemap.format.descriptor();
    let cells = &tilemap.cells;

    let encoded = match descriptor.family {
        Family::Attrmap => Encoded {
            tiles: cells.iter().map(|c| c.tile_id as u8).collect(),
            attributes: Some(cells.iter().map(gbc_attribute).collect()),
        },
        Family::Flat => {
            let mut tiles = Vec::with_capacity(
                descriptor.header_len + cells.len() * descriptor.bytes_per_cell,
            );
            if descriptor.header_len > 0 {
                tiles.extend(nds_header(tilemap.format, tilemap.width, cells.len()));
            }
            for cell in cells {
                match descriptor.layout {
                    CellLayout::Byte => tiles.push(cell.tile_id as u8),
                    CellLayout::Gbc => {
                        tiles.push(cell.tile_id as u8);
                        tiles.push(gbc_attribute(cell));
                    }
                    CellLayout::Genesis => {
                        tiles.extend(pack_word(descriptor.layout, cell).to_be_bytes())
                    }
                    layout => tiles.extend(pack_word(layout, cell).to_le_bytes()),
                }
            }
            Encoded {
                tiles,
                attributes: None,
            }
        }
        Family::Sentinel { terminator } => {
            let mut tiles = encode_runs(descriptor, cells);
            tiles.push(terminator);
            Encoded {
                tiles,
                attributes: None,
            }
        }
    };

    debug!(
        "Encoded {} cells as {} into {} bytes",
        cells.len(),
        descriptor.name,
        encoded.tiles.len()
    );
    encoded
}

/// Emit greedy maximal runs of identical raw values
fn encode_runs(descriptor: &FormatDescriptor, cells: &[TileCell]) -> Vec<u8> {
    let layout = descriptor.layout;
    let max_run = layout.max_run();
    let mut bytes = Vec::new();

    if max_run == 1 {
        bytes.extend(cells.iter().map(|cell| pack_byte(layout, cell)));
        return bytes;
    }

    for (value, run) in &cells.iter().chunk_by(|cell| pack_byte(layout, cell)) {
        let mut remaining = run.count();
        while remaining > 0 {
            let count = remaining.min(max_run);
            match layout {
                CellLayout::NibbleRun => bytes.push((value << 4) | count as u8),
                CellLayout::NibbleRunFlip => bytes.push(value | count as u8),
                CellLayout::BytePairRun => bytes.extend([value, count as u8]),
                _ => unreachable!(),
            }
            remaining -= count;
        }
    }

    bytes
}

/// Decode tilemap bytes.
///
/// `attributes` is only read for attrmap formats. `width` is ignored for
/// formats with a fixed width.
pub fn decode(
    format: Format,
    tiles: &[u8],
    attributes: Option<&[u8]>,
    width: usize,
) -> Result<Tilemap> {
    let descriptor = format.descriptor();
    let cells = match descriptor.family {
        Family::Flat => decode_flat(descriptor, tiles)?,
        Family::Attrmap => decode_attrmap(tiles, attributes)?,
        Family::Sentinel { terminator } => decode_sentinel(descriptor, terminator, tiles)?,
    };

    if cells.is_empty() {
        return Err(Error::TilemapEmpty {
            stream: Stream::Tiles,
        });
    }

    debug!("Decoded {} cells as {}", cells.len(), descriptor.name);
    Ok(Tilemap::new(format, width, cells))
}

fn decode_flat(descriptor: &FormatDescriptor, bytes: &[u8]) -> Result<Vec<TileCell>> {
    let data = bytes.get(descriptor.header_len..).unwrap_or_default();
    if data.is_empty() {
        return Err(Error::TilemapEmpty {
            stream: Stream::Tiles,
        });
    }
    if data.len() % descriptor.bytes_per_cell != 0 {
        return Err(Error::OddByteCountForTwoByteFormat {
            stream: Stream::Tiles,
            len: data.len(),
            bytes_per_cell: descriptor.bytes_per_cell,
        });
    }

    let cells = data
        .chunks_exact(descriptor.bytes_per_cell)
        .map(|chunk| match descriptor.layout {
            CellLayout::Byte => TileCell::new(chunk[0] as u16),
            CellLayout::Gbc => gbc_cell(chunk[0], chunk[1]),
            CellLayout::Genesis => {
                unpack_word(descriptor, u16::from_be_bytes([chunk[0], chunk[1]]))
            }
            _ => unpack_word(descriptor, u16::from_le_bytes([chunk[0], chunk[1]])),
        })
        .collect();
    Ok(cells)
}

fn decode_attrmap(tiles: &[u8], attributes: Option<&[u8]>) -> Result<Vec<TileCell>> {
    if tiles.is_empty() {
        return Err(Error::TilemapEmpty {
            stream: Stream::Tiles,
        });
    }
    let attributes = attributes.unwrap_or_default();
    if attributes.len() != tiles.len() {
        return Err(Error::AttributeStreamLengthMismatch {
            stream: Stream::Attributes,
            kind: if attributes.len() < tiles.len() {
                LengthMismatch::TooShort
            } else {
                LengthMismatch::TooLong
            },
            expected: tiles.len(),
            actual: attributes.len(),
        });
    }

    Ok(tiles
        .iter()
        .zip(attributes)
        .map(|(&tile, &attr)| gbc_cell(tile, attr))
        .collect())
}

fn decode_sentinel(
    descriptor: &FormatDescriptor,
    terminator: u8,
    bytes: &[u8],
) -> Result<Vec<TileCell>> {
    let layout = descriptor.layout;
    let mut cells = Vec::new();
    let mut offset = 0;

    while let Some(&byte) = bytes.get(offset) {
        if byte == terminator {
            let end = offset + 1;
            if end < bytes.len() {
                return Err(Error::DataAfterTerminator {
                    stream: Stream::Tiles,
                    offset: end,
                });
            }
            return Ok(cells);
        }

        let (cell, count, width) = match layout {
            CellLayout::NibbleRun => (unpack_byte(layout, byte), (byte & 0x0f) as usize, 1),
            CellLayout::NibbleRunFlip => (
                unpack_byte(layout, byte),
                FlipNibbleRun(byte).count() as usize,
                1,
            ),
            CellLayout::BytePairRun => match bytes.get(offset + 1) {
                Some(&count) => (unpack_byte(layout, byte), count as usize, 2),
                None => break,
            },
            _ => (unpack_byte(layout, byte), 1, 1),
        };
        cells.extend(std::iter::repeat(cell).take(count));
        offset += width;
    }

    Err(Error::TerminatorNotFound {
        stream: Stream::Tiles,
    })
}
