//! Transparent compression for flat-file input and formatted output.
//!
//! Detection is extension-first (cheap), falling back to magic bytes so a
//! renamed file still opens. Only the codecs the corpus actually stores
//! data in are wired up: gzip and zstd.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

#[derive(Clone, Copy)]
enum Codec {
    Gzip,
    Zstd,
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Peek at the buffered head without consuming it.
fn sniff(reader: &mut BufReader<File>) -> Result<Option<Codec>> {
    let head = reader.fill_buf().context("read file header")?;
    if head.starts_with(&GZIP_MAGIC) {
        return Ok(Some(Codec::Gzip));
    }
    if head.starts_with(&ZSTD_MAGIC) {
        return Ok(Some(Codec::Zstd));
    }
    Ok(None)
}

/// Open `path` for reading, decompressing gzip and zstd transparently.
///
/// # Errors
/// Returns an error if the file cannot be opened or the decoder cannot be
/// initialized.
pub fn open_maybe_compressed(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let codec = match extension_of(path).as_deref() {
        Some("gz") => Some(Codec::Gzip),
        Some("zst") => Some(Codec::Zstd),
        _ => sniff(&mut reader)?,
    };
    Ok(match codec {
        Some(Codec::Gzip) => Box::new(MultiGzDecoder::new(reader)),
        Some(Codec::Zstd) => Box::new(
            zstd::stream::read::Decoder::new(reader).context("initialize zstd decoder")?,
        ),
        None => Box::new(reader),
    })
}

/// Create `path` for writing, compressing by extension (`.gz`, `.zst`).
///
/// Compressed streams are finished when the writer is dropped; callers
/// should still flush before dropping to surface write errors.
///
/// # Errors
/// Returns an error if the file cannot be created or the encoder cannot be
/// initialized.
pub fn create_maybe_compressed(path: &Path) -> Result<Box<dyn Write>> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let writer = BufWriter::new(file);
    Ok(match extension_of(path).as_deref() {
        Some("gz") => Box::new(GzEncoder::new(writer, flate2::Compression::default())),
        Some("zst") => Box::new(
            zstd::stream::write::Encoder::new(writer, 0)
                .context("initialize zstd encoder")?
                .auto_finish(),
        ),
        _ => Box::new(writer),
    })
}
