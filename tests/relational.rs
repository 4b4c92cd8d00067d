mod common;

use anyhow::Result;
use common::{Receptor, make_receptor_db, receptor_config};
use refpart::source::{GroupChunk, ReferenceSource};
use refpart::{SqliteSource, Value};
use std::collections::BTreeSet;

fn group_by(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn drain(source: &mut SqliteSource) -> Vec<GroupChunk> {
    let mut cursor = source.groups().unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = cursor.next_chunk().unwrap() {
        chunks.push(chunk);
    }
    chunks
}

/// Nine rows over three groups: human/TRB x5, human/TRA x3, mouse/TRB x1.
fn three_group_rows() -> Vec<Receptor> {
    let mut rows = Vec::new();
    for id in 1..=5 {
        rows.push(Receptor::valid(id, "human", "TRB"));
    }
    for id in 6..=8 {
        rows.push(Receptor::valid(id, "human", "TRA"));
    }
    rows.push(Receptor::valid(9, "mouse", "TRB"));
    rows
}

#[test]
fn chunk_counts_and_identifier_partition() -> Result<()> {
    common::init_tracing();
    let tmp = tempfile::tempdir()?;
    let db = tmp.path().join("receptors.db");
    make_receptor_db(&db, &three_group_rows());

    let mut cfg = receptor_config();
    cfg.chunk_size = 2;
    // caller order is non-canonical on purpose
    let mut source = SqliteSource::with_db_path(cfg, &group_by(&["species", "locus"]), &db)?;
    source.configure()?;
    let chunks = drain(&mut source);

    // groups arrive in canonical key order, chunks in index order
    let labels: Vec<(String, usize)> = chunks
        .iter()
        .map(|c| (c.key.to_string(), c.index))
        .collect();
    assert_eq!(
        labels,
        vec![
            ("locus.TRA/species.human".to_string(), 0),
            ("locus.TRA/species.human".to_string(), 1),
            ("locus.TRB/species.human".to_string(), 0),
            ("locus.TRB/species.human".to_string(), 1),
            ("locus.TRB/species.human".to_string(), 2),
            ("locus.TRB/species.mouse".to_string(), 0),
        ]
    );

    // ceil(3/2), ceil(5/2), ceil(1/2) chunks with bounded sizes
    for chunk in &chunks {
        assert!(chunk.frame.len() <= 2 && !chunk.frame.is_empty());
    }

    // every identifier appears in exactly one chunk
    let mut seen = BTreeSet::new();
    for chunk in &chunks {
        let id_col = chunk.frame.column_index("id").unwrap();
        for row in chunk.frame.rows() {
            assert!(seen.insert(row[id_col].clone()));
        }
    }
    assert_eq!(seen.len(), 9);
    Ok(())
}

#[test]
fn chunk_contents_are_ordered_by_identifier() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let db = tmp.path().join("receptors.db");
    make_receptor_db(&db, &three_group_rows());

    let mut cfg = receptor_config();
    cfg.chunk_size = 2;
    let mut source = SqliteSource::with_db_path(cfg, &group_by(&["locus", "species"]), &db)?;
    source.configure()?;

    for chunk in drain(&mut source) {
        let id_col = chunk.frame.column_index("id").unwrap();
        let ids: Vec<i64> = chunk
            .frame
            .column(id_col)
            .map(|v| v.as_int().unwrap())
            .collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
    Ok(())
}

#[test]
fn filter_predicate_limits_discovery() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let db = tmp.path().join("receptors.db");
    let mut rows = three_group_rows();
    rows[0].category = "unproductive";
    rows[4].category = "unproductive";
    make_receptor_db(&db, &rows);

    let mut cfg = receptor_config();
    cfg.filter = Some("category = 'productive'".to_string());
    let mut source = SqliteSource::with_db_path(cfg, &group_by(&["locus"]), &db)?;
    source.configure()?;
    let chunks = drain(&mut source);

    let total: usize = chunks.iter().map(|c| c.frame.len()).sum();
    assert_eq!(total, 7);
    for chunk in &chunks {
        let id_col = chunk.frame.column_index("id").unwrap();
        assert!(chunk
            .frame
            .column(id_col)
            .all(|id| id != &Value::Int(1) && id != &Value::Int(5)));
    }
    Ok(())
}

#[test]
fn derived_columns_come_from_their_expressions() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let db = tmp.path().join("receptors.db");
    make_receptor_db(&db, &[Receptor::valid(1, "human", "TRB")]);

    let mut source = SqliteSource::with_db_path(receptor_config(), &group_by(&["locus"]), &db)?;
    source.configure()?;
    let chunks = drain(&mut source);

    let frame = &chunks[0].frame;
    let seq = frame.column_index("sequence").unwrap();
    let derived = frame.column_index("sequence_length").unwrap();
    let row = &frame.rows()[0];
    assert_eq!(
        row[derived],
        Value::Int(row[seq].as_str().unwrap().len() as i64)
    );
    Ok(())
}

#[test]
fn small_discovery_pages_cover_the_source() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let db = tmp.path().join("receptors.db");
    make_receptor_db(&db, &three_group_rows());

    let mut cfg = receptor_config();
    cfg.page_size = 2;
    let mut source = SqliteSource::with_db_path(cfg, &group_by(&["locus"]), &db)?;
    source.configure()?;
    let total: usize = drain(&mut source).iter().map(|c| c.frame.len()).sum();
    assert_eq!(total, 9);
    Ok(())
}

#[test]
fn missing_connection_environment_fails_configure() {
    let mut cfg = receptor_config();
    cfg.connection_env = Some("REFPART_TEST_UNSET_VARIABLE".to_string());
    let mut source = SqliteSource::new(cfg, &group_by(&["locus"])).unwrap();
    let err = source.configure().unwrap_err();
    assert!(err.to_string().contains("REFPART_TEST_UNSET_VARIABLE"), "{err}");
}

#[test]
fn grouping_column_outside_output_list_is_rejected() {
    let err = SqliteSource::new(receptor_config(), &group_by(&["category"])).unwrap_err();
    assert!(err.to_string().contains("grouping column category"), "{err}");
}

#[test]
fn groups_before_configure_fails() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let db = tmp.path().join("receptors.db");
    make_receptor_db(&db, &[Receptor::valid(1, "human", "TRB")]);

    let mut source = SqliteSource::with_db_path(receptor_config(), &group_by(&["locus"]), &db)?;
    assert!(source.groups().is_err());
    Ok(())
}
