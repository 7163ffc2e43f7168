use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use tempfile::TempDir;
use tileconv::convert::decode_file;
use tileconv::{BlankTile, Color, Config, Error, Format, ImageConverter, PaletteFormat};

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A white tile with a black pixel in the top left corner
fn marked_tile(img: &mut RgbImage, tx: u32, ty: u32) {
    for y in 0..8 {
        for x in 0..8 {
            img.put_pixel(tx * 8 + x, ty * 8 + y, Rgb([255, 255, 255]));
        }
    }
    img.put_pixel(tx * 8, ty * 8, Rgb([0, 0, 0]));
}

fn fill_tile(img: &mut RgbImage, tx: u32, ty: u32, colors: &[[u8; 3]]) {
    for y in 0..8 {
        for x in 0..8 {
            let color = colors[((y * 8 + x) as usize) % colors.len()];
            img.put_pixel(tx * 8 + x, ty * 8 + y, Rgb(color));
        }
    }
}

fn game_boy_screen(dir: &Path) -> PathBuf {
    let mut img = RgbImage::new(160, 144);
    for ty in 0..18 {
        for tx in 0..20 {
            marked_tile(&mut img, tx, ty);
        }
    }
    let path = dir.join("screen.png");
    img.save(&path).unwrap();
    path
}

#[test]
fn game_boy_screen_plain_and_rle() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let input = game_boy_screen(dir);

    let plain = ImageConverter::new(Config {
        input: input.clone(),
        format: Format::Plain,
        start_id: 5,
        tilemap_output: Some(dir.join("screen.tilemap")),
        palette_output: Some(dir.join("screen.pal")),
        tileset_output: Some(dir.join("tiles.png")),
        ..Config::default()
    })
    .convert()
    .unwrap();
    assert_eq!(plain.tileset.len(), 1);
    assert_eq!(plain.palettes.len(), 1);
    assert_eq!(fs::read(dir.join("screen.tilemap")).unwrap(), vec![0x05; 360]);
    assert!(fs::read_to_string(dir.join("screen.pal"))
        .unwrap()
        .starts_with("JASC-PAL\r\n0100\r\n4\r\n255 255 255\r\n0 0 0\r\n"));
    let tileset = image::open(dir.join("tiles.png")).unwrap().to_rgb8();
    assert_eq!(tileset.dimensions(), (8, 8));

    let rle = ImageConverter::new(Config {
        input,
        format: Format::RleNibble,
        start_id: 5,
        tilemap_output: Some(dir.join("screen.rle")),
        ..Config::default()
    })
    .convert()
    .unwrap();
    assert_eq!(rle.tilemap.width, 20);
    let mut expected = vec![0x5f; 24];
    expected.push(0x00);
    assert_eq!(fs::read(dir.join("screen.rle")).unwrap(), expected);
}

#[test]
fn oversized_color_set_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let mut img = RgbImage::new(16, 8);
    marked_tile(&mut img, 0, 0);
    fill_tile(
        &mut img,
        1,
        0,
        &[[0, 0, 0], [255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]],
    );
    let input = dir.join("five.png");
    img.save(&input).unwrap();

    let result = ImageConverter::new(Config {
        input,
        format: Format::Plain,
        tilemap_output: Some(dir.join("five.tilemap")),
        palette_output: Some(dir.join("five.pal")),
        tileset_output: Some(dir.join("five-tiles.png")),
        ..Config::default()
    })
    .convert();

    match result {
        Err(Error::ColorSetTooLarge {
            tile,
            colors,
            capacity,
        }) => {
            assert_eq!((tile, colors, capacity), (1, 5, 4));
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(files_in(dir), vec!["five.png".to_string()]);
}

#[test]
fn palette_overflow_leaves_only_the_palette_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let mut img = RgbImage::new(16, 8);
    marked_tile(&mut img, 0, 0);
    fill_tile(&mut img, 1, 0, &[[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
    let input = dir.join("two.png");
    img.save(&input).unwrap();

    let result = ImageConverter::new(Config {
        input,
        format: Format::Plain,
        tilemap_output: Some(dir.join("two.tilemap")),
        palette_output: Some(dir.join("two.json")),
        ..Config::default()
    })
    .convert();

    let err = result.unwrap_err();
    assert!(err.is_soft());
    assert_eq!(err.tag(), "too-many-palettes");
    assert_eq!(
        files_in(dir),
        vec!["two.json".to_string(), "two.png".to_string()]
    );

    let json: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.join("two.json")).unwrap()).unwrap();
    assert_eq!(json["palettes"].as_array().map(Vec::len), Some(2));
}

#[test]
fn mirrored_tiles_share_an_entry_on_flipping_formats() {
    let tmp = TempDir::new().unwrap();
    let mut img = RgbImage::new(16, 8);
    marked_tile(&mut img, 0, 0);
    marked_tile(&mut img, 1, 0);
    img.put_pixel(8, 0, Rgb([255, 255, 255]));
    img.put_pixel(15, 0, Rgb([0, 0, 0]));
    let input = tmp.path().join("mirror.png");
    img.save(&input).unwrap();

    let flipping = ImageConverter::new(Config {
        input: input.clone(),
        format: Format::Gba4bpp,
        ..Config::default()
    })
    .convert()
    .unwrap();
    assert_eq!(flipping.tileset.len(), 1);
    assert!(flipping.tilemap.cells[1].x_flip);
    assert!(flipping.written.is_empty());

    let plain = ImageConverter::new(Config {
        input,
        format: Format::Plain,
        ..Config::default()
    })
    .convert()
    .unwrap();
    assert_eq!(plain.tileset.len(), 2);
}

#[test]
fn attrmap_conversion_decodes_back() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let mut img = RgbImage::new(24, 8);
    marked_tile(&mut img, 0, 0);
    fill_tile(&mut img, 1, 0, &[[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
    fill_tile(&mut img, 2, 0, &[[255, 255, 255]]);
    let input = dir.join("color.png");
    img.save(&input).unwrap();

    let tilemap_path = dir.join("color.tilemap");
    let conversion = ImageConverter::new(Config {
        input,
        format: Format::GbcAttrmap,
        blank_tile: Some(BlankTile {
            tile_id: 0x7f,
            color: Color::WHITE,
        }),
        tilemap_output: Some(tilemap_path.clone()),
        palette_output: Some(dir.join("color.gpl")),
        palette_format: Some(PaletteFormat::GimpGpl),
        ..Config::default()
    })
    .convert()
    .unwrap();

    assert_eq!(conversion.palettes.len(), 2);
    assert_eq!(conversion.tileset.len(), 2);
    assert_eq!(conversion.tilemap.cells[2].tile_id, 0x7f);
    assert!(dir.join("color.attrmap").exists());
    assert!(fs::read_to_string(dir.join("color.gpl"))
        .unwrap()
        .starts_with("GIMP Palette"));

    let decoded = decode_file(Format::GbcAttrmap, &tilemap_path, None, 3).unwrap();
    assert_eq!(decoded, conversion.tilemap);
}

#[test]
fn blank_cells_use_a_palette_holding_the_blank_color() {
    let tmp = TempDir::new().unwrap();
    let mut img = RgbImage::new(24, 8);
    fill_tile(&mut img, 0, 0, &[[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
    marked_tile(&mut img, 1, 0);
    fill_tile(&mut img, 2, 0, &[[255, 255, 255]]);
    let input = tmp.path().join("blank.png");
    img.save(&input).unwrap();

    let blank = BlankTile {
        tile_id: 0x7f,
        color: Color::WHITE,
    };
    let conversion = ImageConverter::new(Config {
        input,
        format: Format::GbcAttrmap,
        blank_tile: Some(blank),
        ..Config::default()
    })
    .convert()
    .unwrap();

    let cells = &conversion.tilemap.cells;
    assert_eq!(cells[2].tile_id, 0x7f);
    assert_eq!(cells[2].palette, cells[1].palette);
    let palette = &conversion.palettes[cells[2].palette as usize];
    assert!(palette.used_colors().contains(&Color::WHITE));
    assert!(!conversion.palettes[cells[0].palette as usize]
        .used_colors()
        .contains(&Color::WHITE));
}

#[test]
fn sgb_blank_cells_stay_in_the_border_palette_range() {
    let tmp = TempDir::new().unwrap();
    let mut img = RgbImage::new(16, 8);
    marked_tile(&mut img, 0, 0);
    fill_tile(&mut img, 1, 0, &[[255, 255, 255]]);
    let input = tmp.path().join("border.png");
    img.save(&input).unwrap();

    let conversion = ImageConverter::new(Config {
        input,
        format: Format::SgbBorder,
        blank_tile: Some(BlankTile {
            tile_id: 0x20,
            color: Color::WHITE,
        }),
        ..Config::default()
    })
    .convert()
    .unwrap();

    assert_eq!(conversion.palettes.len(), 1);
    let palettes: Vec<i8> = conversion.tilemap.cells.iter().map(|c| c.palette).collect();
    assert_eq!(palettes, vec![4, 4]);
    assert_eq!(conversion.tilemap.cells[1].tile_id, 0x20);
}

#[test]
fn unreadable_image() {
    let result = ImageConverter::new(Config {
        input: PathBuf::from("/nonexistent/input.png"),
        ..Config::default()
    })
    .convert();
    assert!(matches!(result, Err(Error::UnreadableFile { .. })));
}
