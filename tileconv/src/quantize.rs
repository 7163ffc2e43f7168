//! Deterministic color-set quantization.
//!
//! Tiles are grouped onto as few palettes as a first-fit packing finds,
//! under a per-palette color capacity. The same input in the same order
//! always yields the same palettes in the same order.

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::color::{sort_by_luminance, Color, ColorSet};
use crate::error::{Error, Result};

/// A fixed-length list of colors assigned to one or more tiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    colors: Vec<Color>,
    used: usize,
}

impl Palette {
    /// Build a palette from `colors`, padding with black up to `size`
    pub fn new(mut colors: Vec<Color>, size: usize) -> Self {
        let used = colors.len();
        if colors.len() < size {
            colors.resize(size, Color::BLACK);
        }
        Palette { colors, used }
    }

    /// Every slot, including black padding
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Only the slots holding colors that tiles actually use
    pub fn used_colors(&self) -> &[Color] {
        &self.colors[..self.used]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// True if every color of `set` is used by this palette
    pub fn covers(&self, set: &ColorSet) -> bool {
        set.iter().all(|c| self.used_colors().contains(c))
    }

    /// Index of `color` among the palette slots
    pub fn index_of(&self, color: Color) -> Option<usize> {
        self.colors.iter().position(|&c| c == color)
    }
}

/// Output of a quantization run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    pub palettes: Vec<Palette>,
    /// Palette index for each input color set
    pub assignment: Vec<usize>,
    max_palettes: usize,
}

impl Quantized {
    /// The soft palette overflow condition, if more palettes were needed than allowed
    pub fn overflow(&self) -> Option<Error> {
        (self.palettes.len() > self.max_palettes).then(|| Error::TooManyPalettes {
            count: self.palettes.len(),
            max: self.max_palettes,
        })
    }
}

/// Configuration for the greedy color-set packing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    /// Colors per palette
    pub palette_size: usize,
    /// Palettes the target format can address
    pub palette_count: usize,
    /// Color forced into every set and pinned to slot 0
    pub color_zero: Option<Color>,
}

impl Quantizer {
    pub fn new(palette_size: usize, palette_count: usize, color_zero: Option<Color>) -> Self {
        Quantizer {
            palette_size,
            palette_count,
            color_zero,
        }
    }

    /// Quantize one color set per tile into palettes
    pub fn quantize(&self, tile_sets: &[ColorSet]) -> Result<Quantized> {
        let sets = self.with_color_zero(tile_sets)?;

        let unique: Vec<&ColorSet> = sets.iter().unique().collect();
        let maximal = remove_strict_subsets(&unique);
        debug!(
            "{} color sets, {} unique, {} after subset removal",
            sets.len(),
            unique.len(),
            maximal.len()
        );

        let mut merged = self.pack(&maximal);
        merged.sort_by(|a, b| b.len().cmp(&a.len()));

        let palettes: Vec<Palette> = merged
            .into_iter()
            .map(|set| self.build_palette(set))
            .collect();

        let assignment = sets
            .iter()
            .map(|set| palettes.iter().position(|p| p.covers(set)).unwrap_or_default())
            .collect();

        info!(
            "Packed {} tiles onto {} palettes of {} colors",
            sets.len(),
            palettes.len(),
            self.palette_size
        );

        Ok(Quantized {
            palettes,
            assignment,
            max_palettes: self.palette_count,
        })
    }

    /// Add color zero to each set and reject any set that cannot fit a palette
    fn with_color_zero(&self, tile_sets: &[ColorSet]) -> Result<Vec<ColorSet>> {
        tile_sets
            .iter()
            .enumerate()
            .map(|(tile, set)| {
                let mut set = set.clone();
                if let Some(zero) = self.color_zero {
                    set.insert(zero);
                }
                if set.len() > self.palette_size {
                    return Err(Error::ColorSetTooLarge {
                        tile,
                        colors: set.len(),
                        capacity: self.palette_size,
                    });
                }
                Ok(set)
            })
            .collect()
    }

    /// First-fit merge of sets whose union stays within the palette size
    fn pack(&self, sets: &[&ColorSet]) -> Vec<ColorSet> {
        let mut merged: Vec<ColorSet> = Vec::new();
        for &set in sets {
            match merged
                .iter_mut()
                .find(|acc| acc.union(set).count() <= self.palette_size)
            {
                Some(acc) => acc.extend(set.iter().copied()),
                None => merged.push(set.clone()),
            }
        }
        merged
    }

    fn build_palette(&self, set: ColorSet) -> Palette {
        let mut colors: Vec<Color> = set.into_iter().collect();
        sort_by_luminance(&mut colors, self.color_zero);
        Palette::new(colors, self.palette_size)
    }
}

/// Keep only sets that are not strictly contained in another set
fn remove_strict_subsets<'a>(sets: &[&'a ColorSet]) -> Vec<&'a ColorSet> {
    sets.iter()
        .copied()
        .filter(|set| {
            !sets
                .iter()
                .any(|other| other.len() > set.len() && set.is_subset(other))
        })
        .collect()
}
