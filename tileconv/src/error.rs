//! Error taxonomy shared by every stage of the conversion pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which byte stream a decode error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stream {
    Tiles,
    Attributes,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Tiles => write!(f, "tile"),
            Stream::Attributes => write!(f, "attribute"),
        }
    }
}

/// Direction of a stream length mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthMismatch {
    TooShort,
    TooLong,
}

impl fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthMismatch::TooShort => write!(f, "too short"),
            LengthMismatch::TooLong => write!(f, "too long"),
        }
    }
}

/// Errors that can occur while converting, decoding or writing tile data
#[derive(Error, Debug)]
pub enum Error {
    #[error("Tile {tile} uses {colors} colors, more than the palette size of {capacity}")]
    ColorSetTooLarge {
        tile: usize,
        colors: usize,
        capacity: usize,
    },

    #[error("Too many unique tiles: {needed} needed from start ID {start_id}, capacity {capacity}")]
    TooManyUniqueTiles {
        needed: usize,
        start_id: usize,
        capacity: usize,
    },

    #[error("Too many palettes: {count} generated, format allows {max}")]
    TooManyPalettes { count: usize, max: usize },

    #[error("The {stream} stream contains no tilemap data")]
    TilemapEmpty { stream: Stream },

    #[error("The {stream} stream ended without a terminator")]
    TerminatorNotFound { stream: Stream },

    #[error("The {stream} stream has data after its terminator at offset {offset}")]
    DataAfterTerminator { stream: Stream, offset: usize },

    #[error("The {stream} stream is {kind}: {actual} bytes, expected {expected}")]
    AttributeStreamLengthMismatch {
        stream: Stream,
        kind: LengthMismatch,
        expected: usize,
        actual: usize,
    },

    #[error("The {stream} stream has {len} bytes, not a multiple of {bytes_per_cell}")]
    OddByteCountForTwoByteFormat {
        stream: Stream,
        len: usize,
        bytes_per_cell: usize,
    },

    #[error("Cell {index} does not fit the {format} format: {reason}")]
    CellOutOfRange {
        index: usize,
        format: &'static str,
        reason: String,
    },

    #[error("Image dimensions {0}x{1} are not multiples of the tile size {2}")]
    InvalidDimensions(u32, u32, u32),

    #[error("Cannot read {path}: {reason}")]
    UnreadableFile { path: PathBuf, reason: String },

    #[error("Cannot write {path}: {reason}")]
    UnwritableFile { path: PathBuf, reason: String },

    #[error("Unsupported file extension: {path}")]
    UnsupportedExtension { path: PathBuf },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short machine-parseable tag for the error kind
    pub fn tag(&self) -> &'static str {
        match self {
            Error::ColorSetTooLarge { .. } => "color-set-too-large",
            Error::TooManyUniqueTiles { .. } => "too-many-unique-tiles",
            Error::TooManyPalettes { .. } => "too-many-palettes",
            Error::TilemapEmpty { .. } => "tilemap-empty",
            Error::TerminatorNotFound { .. } => "terminator-not-found",
            Error::DataAfterTerminator { .. } => "data-after-terminator",
            Error::AttributeStreamLengthMismatch { .. } => "attribute-stream-length-mismatch",
            Error::OddByteCountForTwoByteFormat { .. } => "odd-byte-count",
            Error::CellOutOfRange { .. } => "cell-out-of-range",
            Error::InvalidDimensions(..) => "invalid-dimensions",
            Error::UnreadableFile { .. } => "unreadable-file",
            Error::UnwritableFile { .. } => "unwritable-file",
            Error::UnsupportedExtension { .. } => "unsupported-extension",
            Error::Image(_) => "image",
            Error::Json(_) => "json",
        }
    }

    /// Soft failures leave valid output behind for inspection
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::TooManyPalettes { .. })
    }

    /// The stream a decode error was found in, if any
    pub fn stream(&self) -> Option<Stream> {
        match self {
            Error::TilemapEmpty { stream }
            | Error::TerminatorNotFound { stream }
            | Error::DataAfterTerminator { stream, .. }
            | Error::AttributeStreamLengthMismatch { stream, .. }
            | Error::OddByteCountForTwoByteFormat { stream, .. } => Some(*stream),
            _ => None,
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Error::UnreadableFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unwritable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Error::UnwritableFile {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
