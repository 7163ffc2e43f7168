use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, warn};

use tileconv::convert::{decode_file, reformat, write_tilemap};
use tileconv::{
    guess_format, BlankTile, Color, Config, Format, ImageConverter, PaletteFormat, Result,
};

#[derive(Parser, Debug)]
#[command(
    name = "tileconv",
    version,
    about = "Retro console tilemap, tileset and palette converter"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an image into a tilemap, tileset and palette file
    Convert {
        /// Input image
        image: PathBuf,
        /// Target tilemap format
        #[arg(long)]
        format: Option<Format>,
        /// Offset added to every tile ID
        #[arg(long)]
        start_id: Option<usize>,
        /// Tile ID used for tiles entirely of the blank color
        #[arg(long, requires = "blank_color")]
        blank_id: Option<u16>,
        /// Blank color as RRGGBB
        #[arg(long, requires = "blank_id")]
        blank_color: Option<Color>,
        /// Color pinned to slot 0 of every palette, as RRGGBB
        #[arg(long)]
        color_zero: Option<Color>,
        /// Tilemap width in cells
        #[arg(long)]
        width: Option<usize>,
        #[arg(long)]
        tilemap: Option<PathBuf>,
        #[arg(long)]
        attrmap: Option<PathBuf>,
        #[arg(long)]
        palette: Option<PathBuf>,
        #[arg(long)]
        palette_format: Option<PaletteFormat>,
        /// Tileset PNG
        #[arg(long)]
        tileset: Option<PathBuf>,
        /// JSON configuration, overridden by any flags given
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Decode a tilemap and print its cells as JSON
    Decode {
        file: PathBuf,
        /// Tilemap format, guessed from the file when absent
        #[arg(long)]
        format: Option<Format>,
        #[arg(long)]
        attrmap: Option<PathBuf>,
        #[arg(long, default_value_t = 32)]
        width: usize,
    },
    /// Decode a tilemap and write it in another format
    Reformat {
        file: PathBuf,
        #[arg(long)]
        from: Format,
        #[arg(long)]
        to: Format,
        #[arg(long)]
        attrmap: Option<PathBuf>,
        #[arg(long, default_value_t = 32)]
        width: usize,
        #[arg(long)]
        output: PathBuf,
        /// Attrmap output for attrmap formats
        #[arg(long)]
        output_attrmap: Option<PathBuf>,
    },
    /// Guess a tilemap's format from its name and size
    Guess {
        file: PathBuf,
        #[arg(long, default_value_t = Format::Plain)]
        current: Format,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_soft() {
                warn!("{}", e);
            } else {
                error!("{}", e);
            }
            eprintln!("{}", e.tag());
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Convert {
            image,
            format,
            start_id,
            blank_id,
            blank_color,
            color_zero,
            width,
            tilemap,
            attrmap,
            palette,
            palette_format,
            tileset,
            config,
        } => {
            let mut config = match config {
                Some(path) => Config::from_json_file(&path)?,
                None => Config::default(),
            };
            config.input = image;
            if let Some(format) = format {
                config.format = format;
            }
            if let Some(start_id) = start_id {
                config.start_id = start_id;
            }
            if let (Some(tile_id), Some(color)) = (blank_id, blank_color) {
                config.blank_tile = Some(BlankTile { tile_id, color });
            }
            config.color_zero = color_zero.or(config.color_zero);
            config.width = width.or(config.width);
            config.tilemap_output = tilemap.or(config.tilemap_output);
            config.attrmap_output = attrmap.or(config.attrmap_output);
            config.palette_output = palette.or(config.palette_output);
            config.palette_format = palette_format.or(config.palette_format);
            config.tileset_output = tileset.or(config.tileset_output);

            let conversion = ImageConverter::new(config).convert()?;
            println!(
                "{} cells, {} unique tiles, {} palettes",
                conversion.tilemap.len(),
                conversion.tileset.len(),
                conversion.palettes.len()
            );
            for path in &conversion.written {
                println!("wrote {}", path.display());
            }
        }
        Command::Decode {
            file,
            format,
            attrmap,
            width,
        } => {
            let format = format.unwrap_or_else(|| guess_from_file(&file, Format::Plain));
            let tilemap = decode_file(format, &file, attrmap.as_deref(), width)?;
            println!("{}", serde_json::to_string_pretty(&tilemap)?);
        }
        Command::Reformat {
            file,
            from,
            to,
            attrmap,
            width,
            output,
            output_attrmap,
        } => {
            let tilemap = decode_file(from, &file, attrmap.as_deref(), width)?;
            let reformatted = reformat(&tilemap, to)?;
            for path in write_tilemap(&reformatted, &output, output_attrmap.as_deref())? {
                println!("wrote {}", path.display());
            }
        }
        Command::Guess { file, current } => {
            println!("{}", guess_from_file(&file, current));
        }
    }
    Ok(())
}

fn guess_from_file(path: &Path, current: Format) -> Format {
    let size = fs::metadata(path).map(|m| m.len() as usize).unwrap_or(0);
    guess_format(path, size, current)
}
