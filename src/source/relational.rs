//! Two-phase relational reader over SQLite.
//!
//! The source cannot page by group key, so extraction is split in two.
//! Discovery walks the whole identifier space once (identifier plus
//! grouping columns, paged), building an in-memory identifier index per
//! group; fetch then re-queries each group's full rows in bounded chunks
//! over a fresh per-group connection. The index holds identifiers only,
//! never row content, which keeps the memory bound proportional to the row
//! count rather than the data volume.
//!
//! Every query orders by the identifier so that paging and chunk contents
//! are reproducible across runs.

use crate::config::{ColumnSpec, ReferenceSourceConfig, SourceKind};
use crate::frame::{Frame, Value};
use crate::partition::{GroupKey, canonical_columns};
use crate::source::{GroupChunk, GroupCursor, ReferenceSource};
use anyhow::{Context, Result, bail, ensure};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// SQLite-backed reference source using the two-phase strategy.
pub struct SqliteSource {
    cfg: ReferenceSourceConfig,
    table: String,
    group_by: Vec<String>,
    db_path: Option<PathBuf>,
    configured: bool,
    index: Option<Vec<(GroupKey, Vec<i64>)>>,
}

impl SqliteSource {
    /// Build a source from a validated config. The database path is
    /// resolved from the config's connection environment variable at
    /// `configure` time.
    ///
    /// # Errors
    /// Fails when the config does not validate, is not a SQLite reference,
    /// or the grouping columns are not part of its output column list.
    pub fn new(cfg: ReferenceSourceConfig, group_by: &[String]) -> Result<Self> {
        cfg.validate()?;
        ensure!(
            cfg.source == SourceKind::Sqlite,
            "reference {} is not a sqlite source",
            cfg.name
        );
        let group_by = canonical_columns(group_by);
        ensure!(!group_by.is_empty(), "reference {}: no grouping columns given", cfg.name);
        for column in &group_by {
            ensure!(
                cfg.has_column(column),
                "reference {}: grouping column {column} is not in the output column list",
                cfg.name
            );
        }
        let table = cfg
            .table
            .clone()
            .with_context(|| format!("reference {} declares no table", cfg.name))?;
        Ok(Self {
            cfg,
            table,
            group_by,
            db_path: None,
            configured: false,
            index: None,
        })
    }

    /// Bypass the environment and point straight at a database file.
    ///
    /// # Errors
    /// See [`SqliteSource::new`].
    pub fn with_db_path(
        cfg: ReferenceSourceConfig,
        group_by: &[String],
        db_path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let mut source = Self::new(cfg, group_by)?;
        source.db_path = Some(db_path.into());
        Ok(source)
    }

    fn connect(&self) -> Result<Connection> {
        let path = self.db_path.as_ref().context("sqlite source not configured")?;
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Connection::open_with_flags(path, flags)
            .with_context(|| format!("open sqlite database {}", path.display()))
    }

    /// Source expression of the identifier column.
    fn id_expr(&self) -> String {
        self.cfg
            .columns
            .iter()
            .find(|c| c.name == self.cfg.id_column)
            .and_then(|c| c.expr.clone())
            .unwrap_or_else(|| self.cfg.id_column.clone())
    }

    /// Select-list entry for one named output column.
    fn column_select(&self, name: &str) -> String {
        self.cfg
            .columns
            .iter()
            .find(|c| c.name == name)
            .map(ColumnSpec::select_expr)
            .unwrap_or_else(|| name.to_string())
    }

    fn select_list(&self) -> String {
        self.cfg
            .columns
            .iter()
            .map(ColumnSpec::select_expr)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Phase 1: walk the identifier space once, paged, accumulating every
    /// group's identifier list. Runs on its own connection, dropped on
    /// return.
    fn discover_groups(&self) -> Result<Vec<(GroupKey, Vec<i64>)>> {
        let conn = self.connect()?;
        let select: Vec<String> =
            std::iter::once(format!("{} AS {}", self.id_expr(), self.cfg.id_column))
                .chain(self.group_by.iter().map(|c| self.column_select(c)))
                .collect();
        let mut base = format!("SELECT {} FROM {}", select.join(", "), self.table);
        if let Some(filter) = &self.cfg.filter {
            base.push_str(&format!(" WHERE {filter}"));
        }
        // The identifier is the first select item; ordering by it makes
        // LIMIT/OFFSET paging stable across runs.
        base.push_str(" ORDER BY 1");

        let mut groups: BTreeMap<GroupKey, Vec<i64>> = BTreeMap::new();
        let mut offset: usize = 0;
        loop {
            let sql = format!("{base} LIMIT {} OFFSET {offset}", self.cfg.page_size);
            let page_rows = self.read_key_page(&conn, &sql, &mut groups)?;
            offset += page_rows;
            if page_rows < self.cfg.page_size {
                break;
            }
        }
        info!(
            reference = %self.cfg.name,
            groups = groups.len(),
            rows = offset,
            "discovered groups"
        );
        Ok(groups.into_iter().collect())
    }

    fn read_key_page(
        &self,
        conn: &Connection,
        sql: &str,
        groups: &mut BTreeMap<GroupKey, Vec<i64>>,
    ) -> Result<usize> {
        let mut stmt = conn
            .prepare(sql)
            .with_context(|| format!("prepare discovery query: {sql}"))?;
        let mut rows = stmt.query([]).context("run discovery query")?;
        let mut count = 0usize;
        while let Some(row) = rows.next().context("advance discovery cursor")? {
            let id: i64 = row.get(0).context("identifier column must be an integer")?;
            let values = (1..=self.group_by.len())
                .map(|i| decode_value(row.get_ref(i)?))
                .collect::<Result<Vec<_>>>()?;
            groups
                .entry(GroupKey::new(&self.group_by, values))
                .or_default()
                .push(id);
            count += 1;
        }
        Ok(count)
    }

    /// Phase 2: one chunk's rows, selected by explicit identifier list.
    /// Identifiers are integers, so they are formatted straight into the
    /// query.
    fn fetch_rows(&self, conn: &Connection, ids: &[i64]) -> Result<Frame> {
        let id_list = ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IN ({}) ORDER BY {}",
            self.select_list(),
            self.table,
            self.id_expr(),
            id_list,
            self.id_expr(),
        );
        let mut stmt = conn.prepare(&sql).context("prepare fetch query")?;
        let mut rows = stmt.query([]).context("run fetch query")?;
        let mut frame = Frame::new(self.cfg.output_columns());
        while let Some(row) = rows.next().context("advance fetch cursor")? {
            let cells = (0..self.cfg.columns.len())
                .map(|i| decode_value(row.get_ref(i)?))
                .collect::<Result<Vec<_>>>()?;
            frame.push_row(cells)?;
        }
        Ok(frame)
    }
}

impl ReferenceSource for SqliteSource {
    fn configure(&mut self) -> Result<()> {
        ensure!(!self.configured, "sqlite source already configured");
        if self.db_path.is_none() {
            let var = self
                .cfg
                .connection_env
                .as_ref()
                .context("sqlite reference names no connection environment variable")?;
            let path = std::env::var(var)
                .with_context(|| format!("environment variable {var} not set"))?;
            self.db_path = Some(PathBuf::from(path));
        }
        // The read-only open fails fast when the database is absent.
        self.connect()?;
        self.configured = true;
        Ok(())
    }

    fn groups(&mut self) -> Result<Box<dyn GroupCursor + Send + '_>> {
        ensure!(self.configured, "sqlite source not configured");
        if self.index.is_none() {
            self.index = Some(self.discover_groups().context("discover groups")?);
        }
        let index = self.index.as_deref().context("identifier index missing")?;
        Ok(Box::new(SqliteCursor {
            source: self,
            index,
            group: 0,
            chunk: 0,
            conn: None,
        }))
    }

    fn group_by(&self) -> &[String] {
        &self.group_by
    }
}

struct SqliteCursor<'a> {
    source: &'a SqliteSource,
    index: &'a [(GroupKey, Vec<i64>)],
    group: usize,
    chunk: usize,
    conn: Option<Connection>,
}

impl GroupCursor for SqliteCursor<'_> {
    fn next_chunk(&mut self) -> Result<Option<GroupChunk>> {
        loop {
            let Some((key, ids)) = self.index.get(self.group) else {
                return Ok(None);
            };
            let chunk_size = self.source.cfg.chunk_size;
            let start = self.chunk * chunk_size;
            if start >= ids.len() {
                // group drained; its connection goes with it
                self.group += 1;
                self.chunk = 0;
                self.conn = None;
                continue;
            }

            if self.conn.is_none() {
                // Fresh connection per group: a mid-group failure cannot
                // disturb groups already written.
                self.conn = Some(self.source.connect()?);
                debug!(group = %key, ids = ids.len(), "fetching group");
            }
            let Some(conn) = self.conn.as_ref() else {
                bail!("group connection missing");
            };

            let end = (start + chunk_size).min(ids.len());
            let frame = self
                .source
                .fetch_rows(conn, &ids[start..end])
                .with_context(|| format!("fetch group {key} chunk {}", self.chunk))?;
            ensure!(
                frame.len() == end - start,
                "fetch group {key}: expected {} rows, got {} (source changed between phases?)",
                end - start,
                frame.len()
            );

            let chunk_index = self.chunk;
            self.chunk += 1;
            return Ok(Some(GroupChunk {
                key: key.clone(),
                index: chunk_index,
                frame,
            }));
        }
    }
}

/// Map a SQLite cell onto the pipeline's value model.
fn decode_value(cell: ValueRef<'_>) -> Result<Value> {
    match cell {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(n) => Ok(Value::Int(n)),
        ValueRef::Text(bytes) => Ok(Value::Text(
            std::str::from_utf8(bytes)
                .context("non-UTF-8 text cell")?
                .to_string(),
        )),
        other => bail!("unsupported sqlite storage class {:?}", other.data_type()),
    }
}
