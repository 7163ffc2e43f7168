//! Loading tilemap bytes from raw binaries, CSV text and C array literals.
//!
//! Every importer produces the same thing: the unsigned byte sequence that
//! the codec decodes exactly as it would a raw binary file.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Error, Result};

/// Extensions read verbatim as binary tilemaps
const BINARY_EXTENSIONS: [&str; 9] = [
    "bin", "tilemap", "attrmap", "map", "rle", "nscr", "tmap", "raw", "",
];

/// Read a tilemap or attrmap file, converting text formats to bytes
pub fn load_tilemap_bytes(path: &Path) -> Result<Vec<u8>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let bytes = match extension.as_str() {
        "csv" => {
            parse_csv(&read_text(path)?).map_err(|reason| Error::unreadable(path, reason))?
        }
        "c" | "h" => {
            parse_c_array(&read_text(path)?).map_err(|reason| Error::unreadable(path, reason))?
        }
        ext if BINARY_EXTENSIONS.contains(&ext) => {
            fs::read(path).map_err(|e| Error::unreadable(path, e))?
        }
        _ => {
            return Err(Error::UnsupportedExtension {
                path: path.to_path_buf(),
            })
        }
    };

    debug!("Loaded {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::unreadable(path, e))
}

/// Parse one byte value: decimal, `0x` hex or `$` hex
fn parse_byte(token: &str) -> std::result::Result<u8, String> {
    let token = token.trim();
    let lower = token.to_ascii_lowercase();
    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(hex) = lower.strip_prefix('$') {
        (hex, 16)
    } else {
        (lower.as_str(), 10)
    };
    let value =
        u32::from_str_radix(digits, radix).map_err(|_| format!("invalid value {:?}", token))?;
    u8::try_from(value).map_err(|_| format!("value {} does not fit in a byte", token))
}

/// Parse comma and/or whitespace separated byte values
pub fn parse_csv(text: &str) -> std::result::Result<Vec<u8>, String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(parse_byte)
        .collect()
}

/// Remove `//` and `/* */` comments
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let line = rest.find("//");
        let block = rest.find("/*");
        match (line, block) {
            (Some(l), b) if b.map_or(true, |b| l < b) => {
                out.push_str(&rest[..l]);
                match rest[l..].find('\n') {
                    Some(end) => rest = &rest[l + end..],
                    None => break,
                }
            }
            (_, Some(b)) => {
                out.push_str(&rest[..b]);
                match rest[b + 2..].find("*/") {
                    Some(end) => {
                        out.push(' ');
                        rest = &rest[b + 2 + end + 2..];
                    }
                    None => break,
                }
            }
            _ => {
                out.push_str(rest);
                break;
            }
        }
    }
    out
}

/// Parse the byte values between the first `{` and its closing `}`
pub fn parse_c_array(text: &str) -> std::result::Result<Vec<u8>, String> {
    let text = strip_comments(text);
    let start = text.find('{').ok_or("no array initializer found")?;
    let end = text[start..]
        .find('}')
        .map(|end| start + end)
        .ok_or("unterminated array initializer")?;
    parse_csv(&text[start + 1..end])
}
