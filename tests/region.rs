mod common;

use refpart::{Frame, RecoveryStats, Value, recover_regions};

fn receptor_frame(rows: &[(i64, &str, &str, i64)]) -> Frame {
    let mut frame = Frame::new(vec![
        "id".to_string(),
        "sequence".to_string(),
        "region".to_string(),
        "region_length".to_string(),
    ]);
    for (id, sequence, region, expected) in rows {
        frame
            .push_row(vec![
                Value::Int(*id),
                Value::from(*sequence),
                Value::from(*region),
                Value::Int(*expected),
            ])
            .unwrap();
    }
    frame
}

#[test]
fn unique_occurrence_is_extended_by_one() {
    common::init_tracing();
    let mut frame = receptor_frame(&[(1, "ACDEFGHIK", "DEF", 4)]);
    let stats = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap();

    assert_eq!(
        stats,
        RecoveryStats {
            kept: 1,
            ..RecoveryStats::default()
        }
    );
    assert_eq!(frame.len(), 1);
    assert_eq!(frame.rows()[0][2], Value::from("DEFG"));
    // identifier untouched
    assert_eq!(frame.rows()[0][0], Value::Int(1));
}

#[test]
fn multiple_occurrences_drop_the_record() {
    let mut frame = receptor_frame(&[(1, "DEFXXDEF", "DEF", 4)]);
    let stats = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap();
    assert_eq!(stats.ambiguous, 1);
    assert!(frame.is_empty());
}

#[test]
fn overlapping_occurrences_count_separately() {
    let mut frame = receptor_frame(&[(1, "AAAA", "AA", 3)]);
    let stats = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap();
    assert_eq!(stats.ambiguous, 1);
    assert!(frame.is_empty());
}

#[test]
fn zero_occurrences_drop_the_record() {
    let mut frame = receptor_frame(&[(1, "ACDEFGHIK", "WWW", 4)]);
    let stats = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap();
    assert_eq!(stats.not_found, 1);
    assert!(frame.is_empty());
}

#[test]
fn recovered_length_must_match_expectation() {
    // region sits at the end of the parent, so the extension clamps and
    // the recovered length stays at 3
    let mut frame = receptor_frame(&[(1, "ACDEF", "DEF", 4)]);
    let stats = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap();
    assert_eq!(stats.length_mismatch, 1);
    assert!(frame.is_empty());

    // a wrong expected-length column is rejected even when extension works
    let mut frame = receptor_frame(&[(2, "ACDEFGHIK", "DEF", 7)]);
    let stats = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap();
    assert_eq!(stats.length_mismatch, 1);
}

#[test]
fn survivors_keep_input_order() {
    let mut frame = receptor_frame(&[
        (1, "ACDEFGHIK", "DEF", 4),
        (2, "ACDEFGHIK", "WWW", 4),
        (3, "MKVLAGRR", "VLA", 4),
    ]);
    let stats = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap();

    assert_eq!(stats.kept, 2);
    assert_eq!(stats.not_found, 1);
    let ids: Vec<Value> = frame.column(0).cloned().collect();
    assert_eq!(ids, vec![Value::Int(1), Value::Int(3)]);
    assert_eq!(frame.rows()[1][2], Value::from("VLAG"));
}

#[test]
fn malformed_cells_are_drops_not_errors() {
    let mut frame = Frame::new(vec![
        "id".to_string(),
        "sequence".to_string(),
        "region".to_string(),
        "region_length".to_string(),
    ]);
    frame
        .push_row(vec![
            Value::Int(1),
            Value::from("ACDEFGHIK"),
            Value::Int(42),
            Value::Int(4),
        ])
        .unwrap();
    frame
        .push_row(vec![
            Value::Int(2),
            Value::from("ACDEFGHIK"),
            Value::from("DEF"),
            Value::from("four"),
        ])
        .unwrap();

    let stats = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap();
    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.rejected(), 2);
    assert!(frame.is_empty());
}

#[test]
fn empty_region_never_matches() {
    let mut frame = receptor_frame(&[(1, "ACDEF", "", 1)]);
    let stats = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap();
    assert_eq!(stats.not_found, 1);
}

#[test]
fn missing_role_column_is_an_error() {
    let mut frame = Frame::new(vec!["id".to_string(), "sequence".to_string()]);
    frame
        .push_row(vec![Value::Int(1), Value::from("ACDEF")])
        .unwrap();
    let err = recover_regions(&mut frame, &common::receptor_roles(), "id").unwrap_err();
    assert!(err.to_string().contains("not present"), "{err}");
}
