//! Hypervariable-region recovery and validation.
//!
//! The relational source stores the region text without its coordinates,
//! so before a record is persisted the exact span of the region inside the
//! parent sequence is recomputed. Records whose region occurs zero or
//! multiple times, or whose recovered length disagrees with the
//! expected-length column, are dropped: logged, counted, never fatal. The
//! check is strictly per-record and never looks across rows.

use crate::config::RegionRoles;
use crate::frame::{Frame, Value};
use anyhow::{Context, Result};
use std::fmt;
use tracing::warn;

/// Per-chunk validation outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    pub kept: u64,
    pub not_found: u64,
    pub ambiguous: u64,
    pub length_mismatch: u64,
    pub malformed: u64,
}

impl RecoveryStats {
    /// Total records dropped from the chunk.
    pub fn rejected(&self) -> u64 {
        self.not_found + self.ambiguous + self.length_mismatch + self.malformed
    }
}

enum Reject {
    NotFound,
    Ambiguous(usize),
    LengthMismatch { recovered: usize, expected: i64 },
    Malformed(&'static str),
}

impl fmt::Display for Reject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reject::NotFound => write!(f, "region not found in parent sequence"),
            Reject::Ambiguous(n) => write!(f, "region occurs {n} times in parent sequence"),
            Reject::LengthMismatch {
                recovered,
                expected,
            } => write!(
                f,
                "recovered region length {recovered} does not match expected {expected}"
            ),
            Reject::Malformed(what) => f.write_str(what),
        }
    }
}

/// Recover every record's region span in place and drop the records that
/// fail validation, preserving input row order.
///
/// The sub-sequence cell of surviving records is replaced with the
/// recovered region (extended one character past the natural match end,
/// inclusive convention); identifiers are never touched.
///
/// # Errors
/// Fails only when a column named by `roles` or `id_column` is missing
/// from the chunk; per-record problems are drops, not errors.
pub fn recover_regions(
    frame: &mut Frame,
    roles: &RegionRoles,
    id_column: &str,
) -> Result<RecoveryStats> {
    let id = frame
        .column_index(id_column)
        .with_context(|| format!("identifier column {id_column} not present"))?;
    let sub = frame
        .column_index(&roles.sub_sequence)
        .with_context(|| format!("sub-sequence column {} not present", roles.sub_sequence))?;
    let parent = frame
        .column_index(&roles.parent_sequence)
        .with_context(|| format!("parent-sequence column {} not present", roles.parent_sequence))?;
    let expected = frame
        .column_index(&roles.expected_length)
        .with_context(|| format!("expected-length column {} not present", roles.expected_length))?;

    let mut stats = RecoveryStats::default();
    frame.retain_rows(|row| match recover_row(row, sub, parent, expected) {
        Ok(recovered) => {
            row[sub] = Value::Text(recovered);
            stats.kept += 1;
            true
        }
        Err(reject) => {
            warn!(id = %row[id], "dropping record: {reject}");
            match reject {
                Reject::NotFound => stats.not_found += 1,
                Reject::Ambiguous(_) => stats.ambiguous += 1,
                Reject::LengthMismatch { .. } => stats.length_mismatch += 1,
                Reject::Malformed(_) => stats.malformed += 1,
            }
            false
        }
    });
    Ok(stats)
}

fn recover_row(
    row: &[Value],
    sub: usize,
    parent: usize,
    expected: usize,
) -> Result<String, Reject> {
    let Some(region) = row[sub].as_str() else {
        return Err(Reject::Malformed("sub-sequence cell is not text"));
    };
    let Some(parent_seq) = row[parent].as_str() else {
        return Err(Reject::Malformed("parent-sequence cell is not text"));
    };
    let Some(expected_len) = row[expected].as_int() else {
        return Err(Reject::Malformed("expected-length cell is not an integer"));
    };

    let offsets = occurrences(parent_seq, region);
    let offset = match offsets.as_slice() {
        [] => return Err(Reject::NotFound),
        [only] => *only,
        many => return Err(Reject::Ambiguous(many.len())),
    };

    // Inclusive convention: the stored region stops one character short of
    // the span the expected length describes.
    let end = (offset + region.len() + 1).min(parent_seq.len());
    let Some(recovered) = parent_seq.get(offset..end) else {
        return Err(Reject::Malformed("recovered span is not a character boundary"));
    };
    if recovered.len() as i64 != expected_len {
        return Err(Reject::LengthMismatch {
            recovered: recovered.len(),
            expected: expected_len,
        });
    }
    Ok(recovered.to_string())
}

/// Starting byte offsets of every occurrence of `needle` in `haystack`;
/// overlapping matches count separately. An empty needle matches nowhere.
fn occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle.as_bytes())
        .map(|(offset, _)| offset)
        .collect()
}
