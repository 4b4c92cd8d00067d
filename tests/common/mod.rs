#![allow(dead_code)]

//! Shared helpers for integration tests.

use refpart::config::{ColumnSpec, ReferenceSourceConfig, RegionRoles, SourceKind};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// One receptor row for the synthetic database.
pub struct Receptor {
    pub id: i64,
    pub species: &'static str,
    pub locus: &'static str,
    pub category: &'static str,
    pub sequence: &'static str,
    pub region: &'static str,
    pub region_length: i64,
}

impl Receptor {
    /// A row whose region occurs exactly once and extends cleanly.
    pub fn valid(id: i64, species: &'static str, locus: &'static str) -> Self {
        Receptor {
            id,
            species,
            locus,
            category: "productive",
            sequence: "ACDEFGHIK",
            region: "DEF",
            region_length: 4,
        }
    }
}

pub fn make_receptor_db(path: &Path, rows: &[Receptor]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE receptors (
            id INTEGER PRIMARY KEY,
            species TEXT NOT NULL,
            locus TEXT NOT NULL,
            category TEXT NOT NULL,
            sequence TEXT NOT NULL,
            region TEXT NOT NULL,
            region_length INTEGER NOT NULL
        );",
    )
    .unwrap();
    let mut stmt = conn
        .prepare("INSERT INTO receptors VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)")
        .unwrap();
    for r in rows {
        stmt.execute(rusqlite::params![
            r.id,
            r.species,
            r.locus,
            r.category,
            r.sequence,
            r.region,
            r.region_length
        ])
        .unwrap();
    }
}

/// Region-recovery reference over the synthetic receptors table.
pub fn receptor_config() -> ReferenceSourceConfig {
    ReferenceSourceConfig {
        name: "receptors".to_string(),
        source: SourceKind::Sqlite,
        connection_env: Some("REFPART_RECEPTOR_DB".to_string()),
        table: Some("receptors".to_string()),
        filter: None,
        id_column: "id".to_string(),
        columns: vec![
            ColumnSpec::named("id"),
            ColumnSpec::named("species"),
            ColumnSpec::named("locus"),
            ColumnSpec::named("sequence"),
            ColumnSpec::named("region"),
            ColumnSpec::named("region_length"),
            ColumnSpec::with_expr("sequence_length", "length(sequence)"),
        ],
        region: Some(RegionRoles {
            sub_sequence: "region".to_string(),
            parent_sequence: "sequence".to_string(),
            expected_length: "region_length".to_string(),
        }),
        chunk_size: 100_000,
        page_size: 1_000_000,
    }
}

pub fn receptor_roles() -> RegionRoles {
    receptor_config().region.unwrap()
}
