//! Failure taxonomy for conversion runs.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal, stage-tagged failures of a conversion run.
///
/// Per-record validation rejections are not part of this taxonomy: they are
/// logged, counted in the run summary, and the chunk continues without the
/// record.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Missing or inconsistent configuration; raised before any I/O.
    #[error("configuration: {0}")]
    Configuration(String),

    /// Source-side failure (connection, query, malformed page) in either
    /// extraction phase. Not resumable; the run restarts from scratch.
    #[error("reading source for reference {reference}: {source:#}")]
    SourceRead {
        reference: String,
        source: anyhow::Error,
    },

    /// A grouping value that cannot form a path segment.
    #[error("partition layout for group {group}: {source:#}")]
    Layout {
        group: String,
        source: anyhow::Error,
    },

    /// Chunk serialization or filesystem failure. Fatal: silently losing a
    /// group's data is worse than stopping.
    #[error("writing chunk {}: {source:#}", .path.display())]
    Write {
        path: PathBuf,
        source: anyhow::Error,
    },
}
