//! Source reader variants, polymorphic over grouped-chunk streaming.
//!
//! A source is configured exactly once, then drained through a pull-based
//! [`GroupCursor`]: control only returns to the reader when the next chunk
//! is requested, so no more than one chunk per producer is ever
//! materialized.

pub mod flat;
pub mod relational;

use crate::frame::Frame;
use crate::partition::GroupKey;
use anyhow::Result;

/// One tabular chunk of one group.
#[derive(Clone, Debug)]
pub struct GroupChunk {
    pub key: GroupKey,
    /// Zero-based chunk index, unique within the group.
    pub index: usize,
    pub frame: Frame,
}

/// Lazy sequence of grouped chunks.
pub trait GroupCursor {
    /// Next chunk, or `None` once the source is drained.
    ///
    /// # Errors
    /// Source-level failures (connection, query, parse); fatal to the run.
    fn next_chunk(&mut self) -> Result<Option<GroupChunk>>;
}

/// A reference source that can stream grouped chunks.
pub trait ReferenceSource {
    /// Establish everything the reader needs (connection, loaded table).
    /// Called exactly once before [`ReferenceSource::groups`].
    ///
    /// # Errors
    /// Configuration failures: unreadable input, missing grouping columns,
    /// repeated configuration.
    fn configure(&mut self) -> Result<()>;

    /// Stream grouped chunks in canonical group order.
    ///
    /// # Errors
    /// Fails when the source is not configured or group discovery fails.
    fn groups(&mut self) -> Result<Box<dyn GroupCursor + Send + '_>>;

    /// Canonical grouping columns this source partitions by.
    fn group_by(&self) -> &[String];
}
