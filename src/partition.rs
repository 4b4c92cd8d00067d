//! Canonical grouping keys and the deterministic partition layout.
//!
//! The directory tree is self-describing: every segment under the
//! grouping-tag directory is one `name.value` pair in canonical column
//! order, so any downstream tool can reconstruct a group's key from its
//! path alone, without reading file contents.

use crate::frame::Value;
use anyhow::{Result, bail};
use std::fmt;
use std::path::PathBuf;

/// File extension of stored chunks.
pub const CHUNK_EXTENSION: &str = "parquet";

/// Sort and deduplicate grouping-column names. Canonical order is what makes
/// output paths reproducible across runs with reordered input.
pub fn canonical_columns<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    let mut out: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
    out.sort();
    out.dedup();
    out
}

/// Ordered `(column, value)` pairs identifying one partition.
///
/// Equality, hashing, and ordering cover the full pair sequence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(Vec<(String, Value)>);

impl GroupKey {
    /// Pair canonical columns with the group's values, in the same order.
    pub fn new(columns: &[String], values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        GroupKey(columns.iter().cloned().zip(values).collect())
    }

    pub fn pairs(&self) -> &[(String, Value)] {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{name}.{value}")?;
        }
        Ok(())
    }
}

/// Deterministic output layout for one reference.
///
/// Chunks land at
/// `<out_dir>/<reference>/<col1>.<col2>...<colN>/<col1>.<val1>/.../<idx:03>.parquet`.
#[derive(Clone, Debug)]
pub struct PartitionLayout {
    out_dir: PathBuf,
    reference: String,
    columns: Vec<String>,
}

impl PartitionLayout {
    /// `group_by` may arrive in any order and with duplicates; it is
    /// canonicalized here.
    pub fn new(
        out_dir: impl Into<PathBuf>,
        reference: impl Into<String>,
        group_by: &[String],
    ) -> Self {
        Self {
            out_dir: out_dir.into(),
            reference: reference.into(),
            columns: canonical_columns(group_by),
        }
    }

    /// Canonical grouping columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Directory holding every group of this layout:
    /// `<out_dir>/<reference>/<col1>.<col2>...<colN>`.
    pub fn grouping_root(&self) -> PathBuf {
        self.out_dir
            .join(&self.reference)
            .join(self.columns.join("."))
    }

    /// Full path for one (group, chunk) pair.
    ///
    /// # Errors
    /// Fails when a grouping value renders with a path separator in it;
    /// such a value would silently change the directory layout.
    pub fn chunk_path(&self, key: &GroupKey, chunk_index: usize) -> Result<PathBuf> {
        let mut path = self.grouping_root();
        for (name, value) in key.pairs() {
            let rendered = value.to_string();
            if rendered.contains(['/', '\\']) {
                bail!("grouping value {rendered:?} for column {name} contains a path separator");
            }
            path.push(format!("{name}.{rendered}"));
        }
        path.push(format!("{chunk_index:03}.{CHUNK_EXTENSION}"));
        Ok(path)
    }
}
