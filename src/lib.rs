//! # Refpart
//!
//! Convert a bulk biological-sequence dataset (flat file or relational
//! store) into a **deterministically partitioned, chunked, gzip-compressed
//! Parquet archive**, keyed by an arbitrary composite grouping key.
//!
//! ## Key Features
//!
//! - **Canonical partitioning** - grouping columns are sorted and
//!   deduplicated, so reordered input produces the same directory tree
//! - **Self-describing layout** - every path segment is a `name.value`
//!   pair; a group's key can be reconstructed from its path alone
//! - **Bounded memory** - the relational reader streams fixed-size chunks
//!   and never holds more than one chunk per producer
//! - **Two-phase extraction** - group/identifier discovery first, full-row
//!   fetches second, for stores too large to load or `GROUP BY`
//! - **Region recovery** - recompute a hypervariable region's span inside
//!   its parent sequence and drop ambiguous or inconsistent records
//! - **Declarative references** - a new relational reference is a config
//!   record, not code
//!
//! ## Quick Start
//!
//! ```ignore
//! use refpart::{FlatFileSource, ReferenceConverter};
//!
//! # fn main() -> Result<(), refpart::ConvertError> {
//! let group_by = vec!["locus".to_string(), "species".to_string()];
//! let source = FlatFileSource::new("receptors.csv", &group_by);
//! let summary = ReferenceConverter::new("out", "receptors", Box::new(source)).run()?;
//! println!("{} groups, {} rows", summary.groups, summary.rows_written);
//! # Ok(())
//! # }
//! ```
//!
//! Chunks land at
//! `out/receptors/locus.species/locus.<v>/species.<v>/000.parquet`.
//!
//! ## Module Overview
//!
//! - [`frame`] - dynamic tabular chunks ([`Value`], [`Frame`])
//! - [`partition`] - canonical grouping keys and the partition layout
//! - [`config`] - declarative per-reference source configuration
//! - [`source`] - flat-file and two-phase relational readers
//! - [`region`] - sub-sequence recovery and validation
//! - [`io`] - Parquet chunk persistence, compression, FASTA formatting
//! - [`query`] - query-side grouping and reference pairing manifests
//! - [`convert`] - the orchestrator driving configure → iterate → write
//! - [`error`] - the stage-tagged failure taxonomy

pub mod config;
pub mod convert;
pub mod error;
pub mod frame;
pub mod io;
pub mod partition;
pub mod query;
pub mod region;
pub mod source;

// General re-exports
pub use config::{
    ColumnSpec, ReferenceSourceConfig, RegionRoles, SourceKind, find_reference, load_references,
};
pub use convert::{ReferenceConverter, RunSummary, source_for};
pub use error::ConvertError;
pub use frame::{Frame, Value};
pub use io::fasta::{format_chunks, write_fasta};
pub use io::parquet::{read_chunk, write_chunk};
pub use partition::{CHUNK_EXTENSION, GroupKey, PartitionLayout, canonical_columns};
pub use query::{QueryGroup, group_queries};
pub use region::{RecoveryStats, recover_regions};
pub use source::flat::FlatFileSource;
pub use source::relational::SqliteSource;
pub use source::{GroupChunk, GroupCursor, ReferenceSource};
