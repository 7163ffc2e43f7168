//! Color types and utilities for tile conversion.
//!
//! This module contains:
//! - `Color`, an RGB value normalized to 5 bits per channel
//! - luminance ordering used when laying out palettes
//! - `ColorSet`, the distinct colors used by one tile

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of significant bits kept per color channel
pub const CHANNEL_BITS: u32 = 5;
/// Largest value of a normalized channel
pub const CHANNEL_MAX: u8 = (1 << CHANNEL_BITS) - 1;

/// An RGB color normalized to 5 bits per channel
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color {
        r: CHANNEL_MAX,
        g: CHANNEL_MAX,
        b: CHANNEL_MAX,
    };

    /// Create a color from 5-bit channels, masking off anything above
    pub const fn from_rgb5(r: u8, g: u8, b: u8) -> Self {
        Color {
            r: r & CHANNEL_MAX,
            g: g & CHANNEL_MAX,
            b: b & CHANNEL_MAX,
        }
    }

    /// Normalize an 8-bit RGB color
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Color {
            r: r >> 3,
            g: g >> 3,
            b: b >> 3,
        }
    }

    /// The 5-bit channels
    pub fn to_rgb5(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    /// Expand back to 8 bits per channel
    pub fn to_rgb8(self) -> (u8, u8, u8) {
        (expand(self.r), expand(self.g), expand(self.b))
    }

    /// `rrggbb` of the expanded 8-bit channels
    pub fn to_hex(self) -> String {
        let (r, g, b) = self.to_rgb8();
        hex::encode([r, g, b])
    }

    /// Perceived brightness of the expanded color
    pub fn luminance(self) -> f32 {
        let (r, g, b) = self.to_rgb8();
        0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
    }
}

fn expand(channel: u8) -> u8 {
    (channel << 3) | (channel >> 2)
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Errors from parsing a hex color string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color {:?}, expected RRGGBB", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Color {
    type Err = ParseColorError;

    /// Parse `RRGGBB` or `#RRGGBB`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('#');
        let mut rgb = [0u8; 3];
        hex::decode_to_slice(digits, &mut rgb).map_err(|_| ParseColorError(s.to_string()))?;
        Ok(Color::from_rgb8(rgb[0], rgb[1], rgb[2]))
    }
}

impl From<image::Rgb<u8>> for Color {
    fn from(pixel: image::Rgb<u8>) -> Self {
        Color::from_rgb8(pixel[0], pixel[1], pixel[2])
    }
}

impl From<Color> for image::Rgb<u8> {
    fn from(color: Color) -> Self {
        let (r, g, b) = color.to_rgb8();
        image::Rgb([r, g, b])
    }
}

/// The distinct colors of one tile
pub type ColorSet = BTreeSet<Color>;

/// Sort colors by descending luminance, keeping `pinned` first when present.
///
/// The sort is stable, so equally bright colors keep their incoming order.
pub fn sort_by_luminance(colors: &mut Vec<Color>, pinned: Option<Color>) {
    colors.sort_by(|a, b| b.luminance().total_cmp(&a.luminance()));
    if let Some(pinned) = pinned {
        if let Some(position) = colors.iter().position(|&c| c == pinned) {
            let color = colors.remove(position);
            colors.insert(0, color);
        }
    }
}
