//! Orchestration: configure a source, stream its grouped chunks, validate
//! where the reference calls for it, and persist every chunk.

use crate::config::{ReferenceSourceConfig, RegionRoles, SourceKind};
use crate::error::ConvertError;
use crate::io::parquet::write_chunk;
use crate::partition::PartitionLayout;
use crate::region::recover_regions;
use crate::source::flat::FlatFileSource;
use crate::source::relational::SqliteSource;
use crate::source::{GroupChunk, GroupCursor, ReferenceSource};
use rayon::iter::{ParallelBridge, ParallelIterator};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// Counters for one conversion run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub groups: u64,
    pub chunks: u64,
    pub rows_written: u64,
    pub rows_rejected: u64,
}

impl RunSummary {
    fn absorb(&mut self, other: RunSummary) {
        self.groups += other.groups;
        self.chunks += other.chunks;
        self.rows_written += other.rows_written;
        self.rows_rejected += other.rows_rejected;
    }
}

/// Drives one reference conversion through
/// `Created → SourceConfigured → Iterating → Done`; the consuming run
/// methods encode the terminal state, a converter cannot be reused.
pub struct ReferenceConverter {
    reference: String,
    layout: PartitionLayout,
    source: Box<dyn ReferenceSource>,
    region: Option<(RegionRoles, String)>,
}

impl ReferenceConverter {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        reference: impl Into<String>,
        source: Box<dyn ReferenceSource>,
    ) -> Self {
        let reference = reference.into();
        let layout = PartitionLayout::new(out_dir, reference.clone(), source.group_by());
        Self {
            reference,
            layout,
            source,
            region: None,
        }
    }

    /// Route every chunk through region recovery before it is written.
    /// `id_column` names the identifier used in rejection logs.
    #[must_use]
    pub fn with_region_recovery(mut self, roles: RegionRoles, id_column: impl Into<String>) -> Self {
        self.region = Some((roles, id_column.into()));
        self
    }

    /// Output layout this converter writes into.
    pub fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    /// Convert sequentially, one chunk at a time.
    ///
    /// # Errors
    /// [`ConvertError`] tagged with the failing stage. Per-record
    /// validation rejections are logged and counted, not returned.
    pub fn run(mut self) -> Result<RunSummary, ConvertError> {
        self.configure()?;
        let reference = self.reference.clone();
        let layout = self.layout.clone();
        let region = self.region.clone();
        let mut cursor = self
            .source
            .groups()
            .map_err(|source| ConvertError::SourceRead {
                reference: reference.clone(),
                source,
            })?;

        let mut summary = RunSummary::default();
        loop {
            let chunk = cursor
                .next_chunk()
                .map_err(|source| ConvertError::SourceRead {
                    reference: reference.clone(),
                    source,
                })?;
            let Some(chunk) = chunk else {
                break;
            };
            summary.absorb(process_chunk(&layout, region.as_ref(), chunk)?);
        }
        log_finished(&reference, &summary);
        Ok(summary)
    }

    /// Convert with a bounded worker pool: the cursor stays the single
    /// producer, workers validate and write concurrently. Output paths are
    /// disjoint, so writers need no coordination; the file set matches a
    /// sequential run.
    ///
    /// `workers == 0` sizes the pool to the machine.
    ///
    /// # Errors
    /// See [`ReferenceConverter::run`].
    pub fn run_parallel(mut self, workers: usize) -> Result<RunSummary, ConvertError> {
        self.configure()?;
        let reference = self.reference.clone();
        let layout = self.layout.clone();
        let region = self.region.clone();

        let threads = if workers == 0 { num_cpus::get() } else { workers };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ConvertError::Configuration(format!("build worker pool: {e}")))?;

        let cursor = self
            .source
            .groups()
            .map_err(|source| ConvertError::SourceRead {
                reference: reference.clone(),
                source,
            })?;

        let summary = Mutex::new(RunSummary::default());
        pool.install(|| {
            ChunkIter {
                cursor,
                reference: &reference,
                done: false,
            }
            .par_bridge()
            .try_for_each(|chunk| {
                let partial = process_chunk(&layout, region.as_ref(), chunk?)?;
                summary.lock().unwrap().absorb(partial);
                Ok::<(), ConvertError>(())
            })
        })?;

        let summary = summary.into_inner().unwrap();
        log_finished(&reference, &summary);
        Ok(summary)
    }

    fn configure(&mut self) -> Result<(), ConvertError> {
        self.source
            .configure()
            .map_err(|e| ConvertError::Configuration(format!("{e:#}")))
    }
}

fn log_finished(reference: &str, summary: &RunSummary) {
    info!(
        reference,
        groups = summary.groups,
        chunks = summary.chunks,
        rows = summary.rows_written,
        rejected = summary.rows_rejected,
        "conversion finished"
    );
}

/// Build the source variant a config calls for. Flat-file references need
/// the table path, which configs do not carry.
///
/// # Errors
/// [`ConvertError::Configuration`] when the config and arguments do not
/// line up.
pub fn source_for(
    cfg: &ReferenceSourceConfig,
    group_by: &[String],
    table_path: Option<&Path>,
) -> Result<Box<dyn ReferenceSource>, ConvertError> {
    match cfg.source {
        SourceKind::Csv => {
            let path = table_path.ok_or_else(|| {
                ConvertError::Configuration(format!(
                    "reference {}: csv sources need a table path",
                    cfg.name
                ))
            })?;
            Ok(Box::new(FlatFileSource::new(path, group_by)))
        }
        SourceKind::Sqlite => SqliteSource::new(cfg.clone(), group_by)
            .map(|source| Box::new(source) as Box<dyn ReferenceSource>)
            .map_err(|e| ConvertError::Configuration(format!("{e:#}"))),
    }
}

/// Validate (when configured) and write one chunk.
fn process_chunk(
    layout: &PartitionLayout,
    region: Option<&(RegionRoles, String)>,
    mut chunk: GroupChunk,
) -> Result<RunSummary, ConvertError> {
    let mut summary = RunSummary {
        groups: u64::from(chunk.index == 0),
        chunks: 1,
        ..RunSummary::default()
    };

    if let Some((roles, id_column)) = region {
        match recover_regions(&mut chunk.frame, roles, id_column) {
            Ok(stats) => summary.rows_rejected = stats.rejected(),
            Err(error) => {
                warn!(
                    group = %chunk.key,
                    chunk = chunk.index,
                    "skipping chunk, region recovery failed: {error:#}"
                );
                return Ok(RunSummary {
                    rows_rejected: chunk.frame.len() as u64,
                    ..RunSummary::default()
                });
            }
        }
    }

    info!(group = %chunk.key, chunk = chunk.index, "storing group chunk");
    let path = layout
        .chunk_path(&chunk.key, chunk.index)
        .map_err(|source| ConvertError::Layout {
            group: chunk.key.to_string(),
            source,
        })?;
    let rows = write_chunk(&chunk.frame, &path).map_err(|source| ConvertError::Write {
        path: path.clone(),
        source,
    })?;
    summary.rows_written = rows as u64;
    info!(path = %path.display(), rows, "stored");
    Ok(summary)
}

/// Adapts a cursor into an iterator for `par_bridge`; fuses after the
/// first error so workers stop pulling from a failed source.
struct ChunkIter<'a> {
    cursor: Box<dyn GroupCursor + Send + 'a>,
    reference: &'a str,
    done: bool,
}

impl Iterator for ChunkIter<'_> {
    type Item = Result<GroupChunk, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.cursor.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(source) => {
                self.done = true;
                Some(Err(ConvertError::SourceRead {
                    reference: self.reference.to_string(),
                    source,
                }))
            }
        }
    }
}
