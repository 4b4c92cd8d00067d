//! Dynamic tabular data: loosely typed cell values and row-major frames.
//!
//! The column set of a chunk is only known at runtime (it comes from a
//! header row or a reference configuration), so chunks are carried as
//! [`Frame`]s of [`Value`] cells rather than serde-typed structs.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell. The sources only ever produce integers, text, and missing
/// values; any other storage type is a read error at the source boundary.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
}

impl Value {
    /// Text content, or `None` for non-text cells.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, or `None` for non-integer cells.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Null renders as the empty string, the same way it left the source cell.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// An ordered batch of rows sharing one column layout.
///
/// Invariant: every row holds exactly `columns.len()` cells, enforced on
/// insertion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append one row.
    ///
    /// # Errors
    /// Fails when the row arity does not match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        ensure!(
            row.len() == self.columns.len(),
            "row arity {} does not match column count {}",
            row.len(),
            self.columns.len()
        );
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of one column, in row order.
    pub fn column<'a>(&'a self, index: usize) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Keep only the rows the predicate accepts, preserving order. The
    /// predicate may rewrite cells of the rows it keeps.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&mut Vec<Value>) -> bool,
    {
        self.rows.retain_mut(|row| keep(row));
    }

    /// Copy of the rows in `[start, end)` under the same columns. Bounds are
    /// clamped to the frame.
    pub fn slice(&self, start: usize, end: usize) -> Frame {
        let end = end.min(self.rows.len());
        let start = start.min(end);
        Frame {
            columns: self.columns.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }
}
