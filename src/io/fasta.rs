//! FASTA emission for the downstream alignment collaborator.
//!
//! One `>`-prefixed header line holding the identifier, one sequence line
//! holding the row's alignment columns concatenated in canonical column
//! order. The alignment step itself is an external tool; this module only
//! guarantees the contract it reads: a consistently named identifier and
//! sequence lines free of `>` and newline characters.

use crate::frame::Frame;
use crate::io::compression::create_maybe_compressed;
use crate::io::parquet::read_chunk;
use crate::partition::canonical_columns;
use anyhow::{Context, Result, bail, ensure};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write one frame as FASTA, two lines per record.
///
/// Alignment columns are sorted and deduplicated before concatenation, so
/// the emitted sequence does not depend on caller order. A `.gz` or `.zst`
/// extension compresses the output.
///
/// # Returns
/// Number of records written.
///
/// # Errors
/// Fails when a named column is missing, an identifier is null, or an
/// alignment cell contains a FASTA delimiter (`>`, newline).
pub fn write_fasta(
    frame: &Frame,
    id_column: &str,
    align_columns: &[String],
    path: impl AsRef<Path>,
) -> Result<usize> {
    let path = path.as_ref();
    let align = canonical_columns(align_columns);
    ensure!(!align.is_empty(), "no alignment columns given");

    let id_index = frame
        .column_index(id_column)
        .with_context(|| format!("identifier column {id_column} not present"))?;
    let mut align_indices = Vec::with_capacity(align.len());
    for name in &align {
        align_indices.push(
            frame
                .column_index(name)
                .with_context(|| format!("alignment column {name} not present"))?,
        );
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let mut out = create_maybe_compressed(path)?;
    for (row_number, row) in frame.rows().iter().enumerate() {
        let id = &row[id_index];
        ensure!(!id.is_null(), "record #{}: null identifier", row_number + 1);
        let mut sequence = String::new();
        for (name, &index) in align.iter().zip(&align_indices) {
            let cell = row[index].to_string();
            if cell.contains(['>', '\n', '\r']) {
                bail!("record {id}: alignment column {name} contains a FASTA delimiter");
            }
            sequence.push_str(&cell);
        }
        writeln!(out, ">{id}")?;
        writeln!(out, "{sequence}")?;
    }
    out.flush().context("flush fasta output")?;
    Ok(frame.len())
}

/// Re-chunk one stored reference file into FASTA files of `chunk_size`
/// records under `out_dir`, named by starting row index (`0.fasta`,
/// `100000.fasta`, ...).
///
/// # Returns
/// The written paths, in row order.
///
/// # Errors
/// See [`read_chunk`] and [`write_fasta`]; a zero chunk size is rejected.
pub fn format_chunks(
    reference_file: impl AsRef<Path>,
    id_column: &str,
    align_columns: &[String],
    chunk_size: usize,
    out_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    ensure!(chunk_size > 0, "chunk size must be positive");
    let out_dir = out_dir.as_ref();
    let frame = read_chunk(reference_file)?;
    fs::create_dir_all(out_dir).with_context(|| format!("mkdir -p {}", out_dir.display()))?;

    let mut written = Vec::new();
    let mut start = 0;
    while start < frame.len() {
        let end = (start + chunk_size).min(frame.len());
        let path = out_dir.join(format!("{start}.fasta"));
        write_fasta(&frame.slice(start, end), id_column, align_columns, &path)?;
        written.push(path);
        start = end;
    }
    Ok(written)
}
