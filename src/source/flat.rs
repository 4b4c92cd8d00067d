//! Flat-file reader: whole-dataset in-memory grouping.
//!
//! The entire table is loaded at `configure` time and partitioned by exact
//! value equality over the canonical grouping columns; each group yields a
//! single chunk with index 0, rows in source order. Datasets that do not
//! fit in memory belong in the relational reader instead.

use crate::frame::{Frame, Value};
use crate::io::compression::open_maybe_compressed;
use crate::partition::{GroupKey, canonical_columns};
use crate::source::{GroupChunk, GroupCursor, ReferenceSource};
use anyhow::{Context, Result, ensure};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// CSV-backed reference source. Gzip- and zstd-compressed files are
/// decompressed transparently.
pub struct FlatFileSource {
    path: PathBuf,
    group_by: Vec<String>,
    table: Option<Frame>,
}

impl FlatFileSource {
    /// `group_by` may arrive in any order and with duplicates.
    pub fn new(path: impl Into<PathBuf>, group_by: &[String]) -> Self {
        Self {
            path: path.into(),
            group_by: canonical_columns(group_by),
            table: None,
        }
    }
}

impl ReferenceSource for FlatFileSource {
    fn configure(&mut self) -> Result<()> {
        ensure!(self.table.is_none(), "flat-file source already configured");
        ensure!(!self.group_by.is_empty(), "no grouping columns given");
        let table = read_table(&self.path)?;
        for column in &self.group_by {
            ensure!(
                table.column_index(column).is_some(),
                "grouping column {column} not present in {}",
                self.path.display()
            );
        }
        info!(path = %self.path.display(), rows = table.len(), "loaded flat-file source");
        self.table = Some(table);
        Ok(())
    }

    fn groups(&mut self) -> Result<Box<dyn GroupCursor + Send + '_>> {
        let table = self.table.as_ref().context("flat-file source not configured")?;
        let indices = self
            .group_by
            .iter()
            .map(|column| {
                table
                    .column_index(column)
                    .with_context(|| format!("grouping column {column} missing"))
            })
            .collect::<Result<Vec<_>>>()?;

        // Row indices are appended in increasing order, so source order is
        // stable within each group.
        let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
        for (row_index, row) in table.rows().iter().enumerate() {
            let values: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
            groups
                .entry(GroupKey::new(&self.group_by, values))
                .or_default()
                .push(row_index);
        }

        Ok(Box::new(FlatCursor {
            table,
            order: groups.into_iter().collect(),
            next: 0,
        }))
    }

    fn group_by(&self) -> &[String] {
        &self.group_by
    }
}

struct FlatCursor<'a> {
    table: &'a Frame,
    order: Vec<(GroupKey, Vec<usize>)>,
    next: usize,
}

impl GroupCursor for FlatCursor<'_> {
    fn next_chunk(&mut self) -> Result<Option<GroupChunk>> {
        let Some((key, rows)) = self.order.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let mut frame = Frame::new(self.table.columns().to_vec());
        for &row in rows {
            frame.push_row(self.table.rows()[row].clone())?;
        }
        Ok(Some(GroupChunk {
            key: key.clone(),
            index: 0,
            frame,
        }))
    }
}

/// Load the whole delimited table, inferring per-column types: a column
/// whose non-empty cells all parse as integers becomes Int64, anything
/// else stays text; empty cells are null either way.
fn read_table(path: &Path) -> Result<Frame> {
    let reader = open_maybe_compressed(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .context("read header row")?
        .iter()
        .map(str::to_string)
        .collect();
    ensure!(!headers.is_empty(), "{}: empty header row", path.display());

    let mut raw: Vec<csv::StringRecord> = Vec::new();
    for (number, record) in reader.records().enumerate() {
        raw.push(record.with_context(|| format!("parse record #{}", number + 1))?);
    }

    let numeric: Vec<bool> = (0..headers.len())
        .map(|col| {
            raw.iter()
                .all(|rec| rec[col].is_empty() || rec[col].parse::<i64>().is_ok())
        })
        .collect();

    let mut frame = Frame::new(headers);
    for record in &raw {
        let row = record
            .iter()
            .enumerate()
            .map(|(col, cell)| {
                if cell.is_empty() {
                    Value::Null
                } else if numeric[col] {
                    cell.parse::<i64>()
                        .map(Value::Int)
                        .unwrap_or_else(|_| Value::Text(cell.to_string()))
                } else {
                    Value::Text(cell.to_string())
                }
            })
            .collect();
        frame.push_row(row)?;
    }
    Ok(frame)
}
