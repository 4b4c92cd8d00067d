//! Declarative per-reference source configuration.
//!
//! Adding a relational reference must require configuration, not code: the
//! whole query shape (table, filter, identifier, per-output-column
//! expressions, region role columns) lives in a static record that is
//! validated before any query runs. Records are serde-derived so a config
//! front-end can load them from JSON; the front-end itself is out of scope.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum rows per relational chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;
/// Rows per discovery page.
pub const DEFAULT_PAGE_SIZE: usize = 1_000_000;

/// Where a reference's rows come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Delimited flat file, loaded whole.
    Csv,
    /// SQLite database, extracted with the two-phase strategy.
    Sqlite,
}

/// One output column and the expression deriving it from the source schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// SQL expression producing the column; defaults to the column name.
    #[serde(default)]
    pub expr: Option<String>,
}

impl ColumnSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expr: None,
        }
    }

    pub fn with_expr(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expr: Some(expr.into()),
        }
    }

    /// The column as it appears in a select list.
    pub fn select_expr(&self) -> String {
        match &self.expr {
            Some(expr) => format!("{expr} AS {}", self.name),
            None => self.name.clone(),
        }
    }
}

/// The three column roles of a region-recovery reference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegionRoles {
    /// Column holding the region text whose span is recovered.
    pub sub_sequence: String,
    /// Column holding the full parent sequence.
    pub parent_sequence: String,
    /// Column holding the expected recovered length (region length plus
    /// one, inclusive convention).
    pub expected_length: String,
}

/// A named, declarative description of one reference source.
///
/// Configuration is trusted input: table names and column expressions are
/// interpolated into queries verbatim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceSourceConfig {
    pub name: String,
    pub source: SourceKind,
    /// Environment variable holding the SQLite database path.
    #[serde(default)]
    pub connection_env: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    /// Optional row predicate, for example a category selector.
    #[serde(default)]
    pub filter: Option<String>,
    /// Name of the row-identifier column; identifiers must be integers.
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Full output column list.
    pub columns: Vec<ColumnSpec>,
    /// Present on region-recovery references only.
    #[serde(default)]
    pub region: Option<RegionRoles>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl ReferenceSourceConfig {
    /// Parse one reference from JSON and validate it.
    ///
    /// # Errors
    /// Returns parse failures and everything [`validate`](Self::validate)
    /// rejects.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json).context("parse reference config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Names of the output columns, in declaration order.
    pub fn output_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Static validation, run before any query.
    ///
    /// # Errors
    /// Rejects empty or duplicate output columns, relational references
    /// without a connection environment variable or table, identifier or
    /// region role columns missing from the output column list, and
    /// zero chunk or page sizes.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.name.is_empty(), "reference name must not be empty");
        ensure!(
            !self.columns.is_empty(),
            "reference {}: no output columns declared",
            self.name
        );
        ensure!(
            self.chunk_size > 0,
            "reference {}: chunk size must be positive",
            self.name
        );
        ensure!(
            self.page_size > 0,
            "reference {}: page size must be positive",
            self.name
        );

        let mut seen = HashSet::new();
        for column in &self.columns {
            ensure!(
                seen.insert(column.name.as_str()),
                "reference {}: duplicate output column {}",
                self.name,
                column.name
            );
        }

        if self.source == SourceKind::Sqlite {
            ensure!(
                self.connection_env.is_some(),
                "reference {}: sqlite sources must name a connection environment variable",
                self.name
            );
            ensure!(
                self.table.is_some(),
                "reference {}: sqlite sources must name a table",
                self.name
            );
            ensure!(
                self.has_column(&self.id_column),
                "reference {}: identifier column {} is not in the output column list",
                self.name,
                self.id_column
            );
        }

        if let Some(region) = &self.region {
            for (role, column) in [
                ("sub-sequence", &region.sub_sequence),
                ("parent-sequence", &region.parent_sequence),
                ("expected-length", &region.expected_length),
            ] {
                ensure!(
                    self.has_column(column),
                    "reference {}: {role} column {column} is not in the output column list",
                    self.name
                );
            }
        }

        Ok(())
    }
}

/// Parse a JSON array of reference configs; every entry is validated and
/// names must be unique.
///
/// # Errors
/// See [`ReferenceSourceConfig::validate`].
pub fn load_references(json: &str) -> Result<Vec<ReferenceSourceConfig>> {
    let configs: Vec<ReferenceSourceConfig> =
        serde_json::from_str(json).context("parse reference config list")?;
    let mut names = HashSet::new();
    for cfg in &configs {
        cfg.validate()?;
        ensure!(
            names.insert(cfg.name.as_str()),
            "duplicate reference name {}",
            cfg.name
        );
    }
    Ok(configs)
}

/// Look up one reference by name.
///
/// # Errors
/// Fails when no config carries the name.
pub fn find_reference<'a>(
    configs: &'a [ReferenceSourceConfig],
    name: &str,
) -> Result<&'a ReferenceSourceConfig> {
    configs
        .iter()
        .find(|c| c.name == name)
        .with_context(|| format!("unsupported reference {name}"))
}
