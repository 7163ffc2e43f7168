//! Palette file writers for third-party palette formats.
//!
//! These are pure serializers: palettes are written exactly as given,
//! including any black padding.

use std::fmt::{self, Write as _};
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{Error, Result};
use crate::quantize::Palette;

/// A palette file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaletteFormat {
    /// `RGB r, g, b` assembly macros with 5-bit channels
    #[serde(rename = "rgb-asm")]
    RgbAsm,
    #[serde(rename = "jasc-pal")]
    JascPal,
    #[serde(rename = "act")]
    AdobeColorTable,
    #[serde(rename = "aco")]
    AdobeColorSwatch,
    #[serde(rename = "ase")]
    AdobeSwatchExchange,
    #[serde(rename = "animator-col")]
    AnimatorProCol,
    #[serde(rename = "riff-pal")]
    RiffPal,
    #[serde(rename = "paint-net")]
    PaintNetTxt,
    #[serde(rename = "gimp")]
    GimpGpl,
    #[serde(rename = "corel-xml")]
    CorelXml,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "fractint-map")]
    FractintMap,
    #[serde(rename = "lospec-hex")]
    LospecHex,
    #[serde(rename = "png")]
    PngImage,
    #[serde(rename = "bmp")]
    BmpImage,
    /// The palette is implied by the tileset image; nothing is written
    #[serde(rename = "indexed-tileset")]
    IndexedTileset,
}

/// Name and default extension of every format, in declaration order
const FORMAT_INFO: [(PaletteFormat, &str, &str); 16] = [
    (PaletteFormat::RgbAsm, "rgb-asm", "asm"),
    (PaletteFormat::JascPal, "jasc-pal", "pal"),
    (PaletteFormat::AdobeColorTable, "act", "act"),
    (PaletteFormat::AdobeColorSwatch, "aco", "aco"),
    (PaletteFormat::AdobeSwatchExchange, "ase", "ase"),
    (PaletteFormat::AnimatorProCol, "animator-col", "col"),
    (PaletteFormat::RiffPal, "riff-pal", "riff.pal"),
    (PaletteFormat::PaintNetTxt, "paint-net", "txt"),
    (PaletteFormat::GimpGpl, "gimp", "gpl"),
    (PaletteFormat::CorelXml, "corel-xml", "xml"),
    (PaletteFormat::Json, "json", "json"),
    (PaletteFormat::FractintMap, "fractint-map", "map"),
    (PaletteFormat::LospecHex, "lospec-hex", "hex"),
    (PaletteFormat::PngImage, "png", "png"),
    (PaletteFormat::BmpImage, "bmp", "bmp"),
    (PaletteFormat::IndexedTileset, "indexed-tileset", ""),
];

/// Entries in an Adobe Color Table
const ACT_ENTRIES: usize = 256;
/// Animator Pro COL magic number
const ANIMATOR_PRO_MAGIC: u16 = 0xb123;
/// RIFF palette version
const RIFF_PAL_VERSION: u16 = 0x0300;

impl PaletteFormat {
    pub const ALL: [PaletteFormat; 16] = [
        PaletteFormat::RgbAsm,
        PaletteFormat::JascPal,
        PaletteFormat::AdobeColorTable,
        PaletteFormat::AdobeColorSwatch,
        PaletteFormat::AdobeSwatchExchange,
        PaletteFormat::AnimatorProCol,
        PaletteFormat::RiffPal,
        PaletteFormat::PaintNetTxt,
        PaletteFormat::GimpGpl,
        PaletteFormat::CorelXml,
        PaletteFormat::Json,
        PaletteFormat::FractintMap,
        PaletteFormat::LospecHex,
        PaletteFormat::PngImage,
        PaletteFormat::BmpImage,
        PaletteFormat::IndexedTileset,
    ];

    pub fn name(self) -> &'static str {
        FORMAT_INFO[self as usize].1
    }

    /// Default file extension, empty for `IndexedTileset`
    pub fn extension(self) -> &'static str {
        FORMAT_INFO[self as usize].2
    }

    /// False for formats that produce no file
    pub fn writes_file(self) -> bool {
        self != PaletteFormat::IndexedTileset
    }

    /// Pick a format from a file name suffix.
    ///
    /// The longest matching suffix wins, so `.riff.pal` selects RIFF PAL
    /// while a bare `.pal` is JASC-PAL. `.inc` is also accepted for assembly.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_ascii_lowercase())
            .unwrap_or_default();
        if file_name.ends_with(".inc") {
            return Ok(PaletteFormat::RgbAsm);
        }
        FORMAT_INFO
            .iter()
            .filter(|(_, _, ext)| !ext.is_empty())
            .filter(|(_, _, ext)| {
                file_name.len() > ext.len() + 1
                    && file_name.ends_with(ext)
                    && file_name[..file_name.len() - ext.len()].ends_with('.')
            })
            .max_by_key(|(_, _, ext)| ext.len())
            .map(|(format, _, _)| *format)
            .ok_or_else(|| Error::UnsupportedExtension {
                path: path.to_path_buf(),
            })
    }
}

impl fmt::Display for PaletteFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaletteFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FORMAT_INFO
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(format, _, _)| *format)
            .ok_or_else(|| format!("unknown palette format {:?}", s))
    }
}

/// Serialize palettes in the given format.
///
/// `name` labels the palette in formats that carry a title.
pub fn encode(palettes: &[Palette], format: PaletteFormat, name: &str) -> Result<Vec<u8>> {
    let colors: Vec<Color> = palettes.iter().flat_map(|p| p.colors().iter().copied()).collect();

    let bytes = match format {
        PaletteFormat::RgbAsm => rgb_asm(palettes).into_bytes(),
        PaletteFormat::JascPal => jasc_pal(&colors).into_bytes(),
        PaletteFormat::AdobeColorTable => adobe_color_table(&colors),
        PaletteFormat::AdobeColorSwatch => adobe_color_swatch(&colors),
        PaletteFormat::AdobeSwatchExchange => adobe_swatch_exchange(palettes, name),
        PaletteFormat::AnimatorProCol => animator_pro_col(&colors),
        PaletteFormat::RiffPal => riff_pal(&colors),
        PaletteFormat::PaintNetTxt => paint_net(&colors, name).into_bytes(),
        PaletteFormat::GimpGpl => gimp_gpl(palettes, &colors, name).into_bytes(),
        PaletteFormat::CorelXml => corel_xml(palettes, name).into_bytes(),
        PaletteFormat::Json => json(palettes)?,
        PaletteFormat::FractintMap => fractint_map(&colors).into_bytes(),
        PaletteFormat::LospecHex => lospec_hex(&colors).into_bytes(),
        PaletteFormat::PngImage => pixel_grid(palettes, ImageFormat::Png)?,
        PaletteFormat::BmpImage => pixel_grid(palettes, ImageFormat::Bmp)?,
        PaletteFormat::IndexedTileset => Vec::new(),
    };

    Ok(bytes)
}

fn rgb_asm(palettes: &[Palette]) -> String {
    let mut out = String::new();
    for (i, palette) in palettes.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        for color in palette.colors() {
            let (r, g, b) = color.to_rgb5();
            let _ = writeln!(out, "\tRGB {:02}, {:02}, {:02}", r, g, b);
        }
    }
    out
}

fn jasc_pal(colors: &[Color]) -> String {
    let mut out = format!("JASC-PAL\r\n0100\r\n{}\r\n", colors.len());
    for color in colors {
        let (r, g, b) = color.to_rgb8();
        let _ = write!(out, "{} {} {}\r\n", r, g, b);
    }
    out
}

fn adobe_color_table(colors: &[Color]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ACT_ENTRIES * 3 + 4);
    for i in 0..ACT_ENTRIES {
        let (r, g, b) = colors.get(i).copied().unwrap_or(Color::BLACK).to_rgb8();
        out.extend([r, g, b]);
    }
    out.extend((colors.len().min(ACT_ENTRIES) as u16).to_be_bytes());
    out.extend(0xffffu16.to_be_bytes());
    out
}

fn utf16_be(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
}

fn adobe_color_swatch(colors: &[Color]) -> Vec<u8> {
    let mut out = Vec::new();
    for version in [1u16, 2] {
        out.extend(version.to_be_bytes());
        out.extend((colors.len() as u16).to_be_bytes());
        for (i, color) in colors.iter().enumerate() {
            let (r, g, b) = color.to_rgb8();
            // color space 0 is RGB, channels scaled to 16 bits
            out.extend(0u16.to_be_bytes());
            for channel in [r, g, b] {
                out.extend((channel as u16 * 257).to_be_bytes());
            }
            out.extend(0u16.to_be_bytes());
            if version == 2 {
                let name = format!("Color {}", i);
                out.extend((name.encode_utf16().count() as u32 + 1).to_be_bytes());
                out.extend(utf16_be(&name));
                out.extend(0u16.to_be_bytes());
            }
        }
    }
    out
}

fn ase_name(name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend((name.encode_utf16().count() as u16 + 1).to_be_bytes());
    out.extend(utf16_be(name));
    out.extend(0u16.to_be_bytes());
    out
}

fn ase_block(out: &mut Vec<u8>, kind: u16, body: &[u8]) {
    out.extend(kind.to_be_bytes());
    out.extend((body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
}

fn adobe_swatch_exchange(palettes: &[Palette], name: &str) -> Vec<u8> {
    const GROUP_START: u16 = 0xc001;
    const GROUP_END: u16 = 0xc002;
    const COLOR_ENTRY: u16 = 0x0001;
    const NORMAL_COLOR: u16 = 2;

    let blocks: usize = palettes.iter().map(|p| p.len() + 2).sum();
    let mut out = Vec::new();
    out.extend(b"ASEF");
    out.extend(1u16.to_be_bytes());
    out.extend(0u16.to_be_bytes());
    out.extend((blocks as u32).to_be_bytes());

    for (i, palette) in palettes.iter().enumerate() {
        ase_block(&mut out, GROUP_START, &ase_name(&format!("{} {}", name, i)));
        for (j, color) in palette.colors().iter().enumerate() {
            let (r, g, b) = color.to_rgb8();
            let mut body = ase_name(&format!("Color {}", j));
            body.extend(b"RGB ");
            for channel in [r, g, b] {
                body.extend((channel as f32 / 255.0).to_be_bytes());
            }
            body.extend(NORMAL_COLOR.to_be_bytes());
            ase_block(&mut out, COLOR_ENTRY, &body);
        }
        ase_block(&mut out, GROUP_END, &[]);
    }
    out
}

fn animator_pro_col(colors: &[Color]) -> Vec<u8> {
    let size = 8 + colors.len() * 3;
    let mut out = Vec::with_capacity(size);
    out.extend((size as u32).to_le_bytes());
    out.extend(ANIMATOR_PRO_MAGIC.to_le_bytes());
    out.extend(0u16.to_le_bytes());
    for color in colors {
        let (r, g, b) = color.to_rgb8();
        out.extend([r, g, b]);
    }
    out
}

fn riff_pal(colors: &[Color]) -> Vec<u8> {
    let data_size = 4 + colors.len() * 4;
    let mut out = Vec::with_capacity(20 + data_size);
    out.extend(b"RIFF");
    out.extend(((12 + data_size) as u32).to_le_bytes());
    out.extend(b"PAL data");
    out.extend((data_size as u32).to_le_bytes());
    out.extend(RIFF_PAL_VERSION.to_le_bytes());
    out.extend((colors.len() as u16).to_le_bytes());
    for color in colors {
        let (r, g, b) = color.to_rgb8();
        out.extend([r, g, b, 0]);
    }
    out
}

fn paint_net(colors: &[Color], name: &str) -> String {
    let mut out = format!(
        ";paint.net Palette File\n;Palette Name: {}\n;Colors: {}\n",
        name,
        colors.len()
    );
    for color in colors {
        let _ = writeln!(out, "FF{}", color.to_hex().to_ascii_uppercase());
    }
    out
}

fn gimp_gpl(palettes: &[Palette], colors: &[Color], name: &str) -> String {
    let columns = palettes.first().map(|p| p.len()).unwrap_or(0);
    let mut out = format!("GIMP Palette\nName: {}\nColumns: {}\n#\n", name, columns);
    for (i, color) in colors.iter().enumerate() {
        let (r, g, b) = color.to_rgb8();
        let _ = writeln!(out, "{:3} {:3} {:3}\tIndex {}", r, g, b, i);
    }
    out
}

fn corel_xml(palettes: &[Palette], name: &str) -> String {
    let mut out = format!(
        "<?xml version=\"1.0\"?>\n<palette name=\"{}\">\n<colors>\n",
        xml_escape(name)
    );
    for palette in palettes {
        out.push_str("<page>\n");
        for (i, color) in palette.colors().iter().enumerate() {
            let (r, g, b) = color.to_rgb8();
            let _ = writeln!(
                out,
                "<color cs=\"RGB\" tints=\"{},{},{}\" name=\"Color {}\"/>",
                r as f32 / 255.0,
                g as f32 / 255.0,
                b as f32 / 255.0,
                i
            );
        }
        out.push_str("</page>\n");
    }
    out.push_str("</colors>\n</palette>\n");
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Serialize)]
struct JsonPalette {
    colors: Vec<String>,
    native: Vec<[u8; 3]>,
}

#[derive(Serialize)]
struct JsonPalettes {
    palettes: Vec<JsonPalette>,
}

fn json(palettes: &[Palette]) -> Result<Vec<u8>> {
    let document = JsonPalettes {
        palettes: palettes
            .iter()
            .map(|palette| JsonPalette {
                colors: palette.colors().iter().map(|c| c.to_string()).collect(),
                native: palette
                    .colors()
                    .iter()
                    .map(|c| {
                        let (r, g, b) = c.to_rgb5();
                        [r, g, b]
                    })
                    .collect(),
            })
            .collect(),
    };
    let mut bytes = serde_json::to_vec_pretty(&document)?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn fractint_map(colors: &[Color]) -> String {
    let mut out = String::new();
    for color in colors {
        let (r, g, b) = color.to_rgb8();
        let _ = writeln!(out, "{} {} {}", r, g, b);
    }
    out
}

fn lospec_hex(colors: &[Color]) -> String {
    colors.iter().map(|c| c.to_hex() + "\n").collect()
}

/// One pixel per color, one row per palette
fn pixel_grid(palettes: &[Palette], format: ImageFormat) -> Result<Vec<u8>> {
    let width = palettes.iter().map(|p| p.len()).max().unwrap_or(0).max(1);
    let height = palettes.len().max(1);
    let mut img = RgbImage::new(width as u32, height as u32);
    for (y, palette) in palettes.iter().enumerate() {
        for (x, color) in palette.colors().iter().enumerate() {
            img.put_pixel(x as u32, y as u32, (*color).into());
        }
    }

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palettes() -> Vec<Palette> {
        vec![
            Palette::new(vec![Color::WHITE, Color::from_rgb5(31, 0, 0)], 4),
            Palette::new(vec![Color::from_rgb5(0, 0, 31)], 4),
        ]
    }

    fn text(format: PaletteFormat) -> String {
        String::from_utf8(encode(&palettes(), format, "title").unwrap()).unwrap()
    }

    fn bytes(format: PaletteFormat) -> Vec<u8> {
        encode(&palettes(), format, "title").unwrap()
    }

    #[test]
    fn names_and_extensions() {
        for format in PaletteFormat::ALL {
            assert_eq!(format.name().parse::<PaletteFormat>(), Ok(format));
        }
        let from = |p: &str| PaletteFormat::from_path(Path::new(p));
        assert_eq!(from("a.gpl").unwrap(), PaletteFormat::GimpGpl);
        assert_eq!(from("a.PAL").unwrap(), PaletteFormat::JascPal);
        assert_eq!(from("a.inc").unwrap(), PaletteFormat::RgbAsm);
        assert_eq!(from("a.asm").unwrap(), PaletteFormat::RgbAsm);
        assert_eq!(from("town.riff.pal").unwrap(), PaletteFormat::RiffPal);
        assert_eq!(from("dir/Town.RIFF.PAL").unwrap(), PaletteFormat::RiffPal);
        assert_eq!(from("town.pal").unwrap(), PaletteFormat::JascPal);
        assert_eq!(PaletteFormat::RiffPal.extension(), "riff.pal");
        assert!(matches!(from(".pal"), Err(Error::UnsupportedExtension { .. })));
        assert!(matches!(from("a.doc"), Err(Error::UnsupportedExtension { .. })));
        assert!(matches!(from("palette"), Err(Error::UnsupportedExtension { .. })));
    }

    #[test]
    fn rgb_asm_layout() {
        let expected = "\tRGB 31, 31, 31\n\tRGB 31, 00, 00\n\tRGB 00, 00, 00\n\tRGB 00, 00, 00\n\n\
                        \tRGB 00, 00, 31\n\tRGB 00, 00, 00\n\tRGB 00, 00, 00\n\tRGB 00, 00, 00\n";
        assert_eq!(text(PaletteFormat::RgbAsm), expected);
    }

    #[test]
    fn jasc_layout() {
        let out = text(PaletteFormat::JascPal);
        assert!(out.starts_with("JASC-PAL\r\n0100\r\n8\r\n255 255 255\r\n255 0 0\r\n"));
        assert_eq!(out.lines().count(), 11);
    }

    #[test]
    fn act_layout() {
        let out = bytes(PaletteFormat::AdobeColorTable);
        assert_eq!(out.len(), 772);
        assert_eq!(&out[..6], &[255, 255, 255, 255, 0, 0]);
        assert_eq!(&out[768..], &[0, 8, 0xff, 0xff]);
    }

    #[test]
    fn aco_layout() {
        let out = bytes(PaletteFormat::AdobeColorSwatch);
        assert_eq!(&out[..4], &[0, 1, 0, 8]);
        assert_eq!(&out[4..14], &[0, 0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0, 0]);
        let v2 = 4 + 8 * 10;
        assert_eq!(&out[v2..v2 + 4], &[0, 2, 0, 8]);
        // "Color 0" is 7 code units plus the terminator
        assert_eq!(&out[v2 + 14..v2 + 18], &[0, 0, 0, 8]);
        assert_eq!(&out[v2 + 18..v2 + 20], &[0, b'C']);
    }

    #[test]
    fn ase_layout() {
        let out = bytes(PaletteFormat::AdobeSwatchExchange);
        assert_eq!(&out[..4], b"ASEF");
        assert_eq!(&out[4..8], &[0, 1, 0, 0]);
        assert_eq!(&out[8..12], &12u32.to_be_bytes());
        assert_eq!(&out[12..14], &[0xc0, 0x01]);
        assert_eq!(&out[out.len() - 6..], &[0xc0, 0x02, 0, 0, 0, 0]);
    }

    #[test]
    fn animator_and_riff_layouts() {
        let col = bytes(PaletteFormat::AnimatorProCol);
        assert_eq!(col.len(), 8 + 24);
        assert_eq!(&col[..8], &[32, 0, 0, 0, 0x23, 0xb1, 0, 0]);

        let riff = bytes(PaletteFormat::RiffPal);
        assert_eq!(riff.len(), 24 + 32);
        assert_eq!(&riff[..4], b"RIFF");
        assert_eq!(&riff[4..8], &48u32.to_le_bytes());
        assert_eq!(&riff[8..16], b"PAL data");
        assert_eq!(&riff[16..20], &36u32.to_le_bytes());
        assert_eq!(&riff[20..24], &[0x00, 0x03, 8, 0]);
        assert_eq!(&riff[24..28], &[255, 255, 255, 0]);
    }

    #[test]
    fn text_layouts() {
        let paint = text(PaletteFormat::PaintNetTxt);
        assert!(paint.contains(";Colors: 8\nFFFFFFFF\nFFFF0000\n"));

        let gimp = text(PaletteFormat::GimpGpl);
        assert!(gimp.starts_with(
            "GIMP Palette\nName: title\nColumns: 4\n#\n255 255 255\tIndex 0\n"
        ));

        let corel = text(PaletteFormat::CorelXml);
        assert_eq!(corel.matches("<page>").count(), 2);
        assert!(corel.contains("<color cs=\"RGB\" tints=\"1,0,0\" name=\"Color 1\"/>"));

        let map = text(PaletteFormat::FractintMap);
        assert!(map.starts_with("255 255 255\n255 0 0\n0 0 0\n"));

        let hex = text(PaletteFormat::LospecHex);
        assert_eq!(hex.lines().collect::<Vec<_>>()[..2], ["ffffff", "ff0000"]);
    }

    #[test]
    fn json_layout() {
        let value: serde_json::Value =
            serde_json::from_slice(&bytes(PaletteFormat::Json)).unwrap();
        assert_eq!(value["palettes"][0]["colors"][1], "#ff0000");
        assert_eq!(value["palettes"][1]["native"][0], serde_json::json!([0, 0, 31]));
    }

    #[test]
    fn image_layouts() {
        let png = bytes(PaletteFormat::PngImage);
        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(1, 0), &image::Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(0, 1), &image::Rgb([0, 0, 255]));

        let bmp = bytes(PaletteFormat::BmpImage);
        assert_eq!(&bmp[..2], b"BM");
    }

    #[test]
    fn indexed_tileset_writes_nothing() {
        assert!(bytes(PaletteFormat::IndexedTileset).is_empty());
        assert!(!PaletteFormat::IndexedTileset.writes_file());
    }
}
