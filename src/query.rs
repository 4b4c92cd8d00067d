//! Query-side grouping: one FASTA file per query group, plus manifest
//! tables pairing every group with the reference archive it aligns
//! against.
//!
//! This is the inverse companion of the reference converter: the query
//! table is grouped by the same match columns the archive was partitioned
//! by, and each group's records are emitted as FASTA for the external
//! alignment tool. The pairing is by path: a group belongs to the first
//! reference path that mentions its identifier.

use crate::io::fasta::write_fasta;
use crate::source::ReferenceSource;
use crate::source::flat::FlatFileSource;
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// One emitted query group.
#[derive(Clone, Debug, Serialize)]
pub struct QueryGroup {
    /// Group values joined with `.`, in canonical column order.
    pub identifier: String,
    pub fasta_path: PathBuf,
    pub reference_path: PathBuf,
}

#[derive(Serialize)]
struct QueryManifestRow<'a> {
    identifier: &'a str,
    query_fasta_path: &'a Path,
}

#[derive(Serialize)]
struct ReferenceManifestRow<'a> {
    identifier: &'a str,
    reference_path: &'a Path,
}

/// Group a query table by `match_columns` and emit one FASTA per group
/// under `<out_dir>/<dot-joined match columns>/<identifier>.fasta`, along
/// with `query_groups.csv` and `reference_groups.csv` manifests in
/// `out_dir`.
///
/// # Returns
/// The emitted groups in canonical group order.
///
/// # Errors
/// Fails when the query table cannot be read, a group has no matching
/// reference path, or FASTA emission rejects a record.
pub fn group_queries(
    query_table: impl AsRef<Path>,
    id_column: &str,
    match_columns: &[String],
    align_columns: &[String],
    reference_paths: &[PathBuf],
    out_dir: impl AsRef<Path>,
) -> Result<Vec<QueryGroup>> {
    let out_dir = out_dir.as_ref();
    ensure!(!match_columns.is_empty(), "no match columns given");

    let mut source = FlatFileSource::new(query_table.as_ref(), match_columns);
    source.configure()?;
    let fasta_dir = out_dir.join(source.group_by().join("."));
    fs::create_dir_all(&fasta_dir)
        .with_context(|| format!("mkdir -p {}", fasta_dir.display()))?;

    let mut groups = Vec::new();
    {
        let mut cursor = source.groups()?;
        while let Some(chunk) = cursor.next_chunk()? {
            let identifier = chunk
                .key
                .pairs()
                .iter()
                .map(|(_, value)| value.to_string())
                .collect::<Vec<_>>()
                .join(".");
            let fasta_path = fasta_dir.join(format!("{identifier}.fasta"));
            write_fasta(&chunk.frame, id_column, align_columns, &fasta_path)
                .with_context(|| format!("emit group {identifier}"))?;
            let reference_path = reference_for(&identifier, reference_paths)?.clone();
            groups.push(QueryGroup {
                identifier,
                fasta_path,
                reference_path,
            });
        }
    }

    write_manifests(out_dir, &groups)?;
    info!(groups = groups.len(), dir = %fasta_dir.display(), "grouped queries");
    Ok(groups)
}

/// First reference archive whose path mentions the identifier.
fn reference_for<'a>(identifier: &str, paths: &'a [PathBuf]) -> Result<&'a PathBuf> {
    paths
        .iter()
        .find(|p| p.to_string_lossy().contains(identifier))
        .with_context(|| format!("group identifier {identifier} not in any reference path"))
}

fn write_manifests(out_dir: &Path, groups: &[QueryGroup]) -> Result<()> {
    let queries_path = out_dir.join("query_groups.csv");
    let mut queries = csv::Writer::from_path(&queries_path)
        .with_context(|| format!("create {}", queries_path.display()))?;
    for group in groups {
        queries.serialize(QueryManifestRow {
            identifier: &group.identifier,
            query_fasta_path: &group.fasta_path,
        })?;
    }
    queries.flush()?;

    let references_path = out_dir.join("reference_groups.csv");
    let mut references = csv::Writer::from_path(&references_path)
        .with_context(|| format!("create {}", references_path.display()))?;
    for group in groups {
        references.serialize(ReferenceManifestRow {
            identifier: &group.identifier,
            reference_path: &group.reference_path,
        })?;
    }
    references.flush()?;
    Ok(())
}
