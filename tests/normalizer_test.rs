use anyhow::Result;
use polars::prelude::DataType;

use snm_mapper::ftm::{normalize_lines, ENTITY_COLUMNS};
use snm_mapper::tables::{entity_frame, relationship_frame};

#[test]
fn malformed_lines_do_not_abort_the_batch() {
    let lines = vec![
        r#"{"id":"a","schema":"Person","caption":"Alpha"}"#,
        r#"{"id":"b","schema":"#,
        "not json at all",
        r#"{"id":"c","schema":"Company","caption":"Gamma"}"#,
    ];
    let (rows, _, stats) = normalize_lines(lines);
    assert_eq!(stats.lines, 4);
    assert_eq!(stats.parsed, 2);
    assert_eq!(stats.errors, 2);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].entity_id, "a");
    assert_eq!(rows[1].entity_id, "c");
}

#[test]
fn entity_table_has_29_string_columns() -> Result<()> {
    let lines = vec![r#"{"id":"a","schema":"Person","caption":"Alpha"}"#];
    let (rows, _, _) = normalize_lines(lines);
    let df = entity_frame(&rows)?;

    assert_eq!(df.width(), 29);
    assert_eq!(df.get_column_names(), ENTITY_COLUMNS.to_vec());
    for column in df.get_columns() {
        assert_eq!(column.dtype(), &DataType::String, "column {}", column.name());
    }
    Ok(())
}

#[test]
fn duplicate_relationship_triples_collapse() {
    let lines = vec![
        r#"{"id":"c1","schema":"Company","properties":{"ownershipOwner":["p1","p1"]}}"#,
        r#"{"id":"c1b","schema":"Ownership","properties":{"ownershipOwner":["p1"]}}"#,
    ];
    let (_, edges, _) = normalize_lines(lines);
    let owned_by_c1: Vec<_> = edges
        .iter()
        .filter(|e| e.source_id == "c1" && e.target_id == "p1")
        .collect();
    assert_eq!(owned_by_c1.len(), 1);
}

#[test]
fn self_loops_are_suppressed() {
    let lines = vec![r#"{"id":"x","schema":"Company","properties":{"ownershipOwner":["x"]}}"#];
    let (_, edges, _) = normalize_lines(lines);
    assert!(edges.is_empty());
}

#[test]
fn dangling_targets_are_kept() {
    let lines =
        vec![r#"{"id":"c1","schema":"Company","properties":{"ownershipOwner":["missing"]}}"#];
    let (rows, edges, _) = normalize_lines(lines);
    assert_eq!(rows.len(), 1);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target_id, "missing");
}

#[test]
fn only_forward_labels_are_materialized() {
    let lines = vec![
        r#"{"id":"d1","schema":"Directorship","properties":{"directorshipDirector":["p1"],"directorshipOrganization":["c1"]}}"#,
    ];
    let (_, edges, _) = normalize_lines(lines);
    assert_eq!(edges.len(), 2);
    let labels: Vec<&str> = edges.iter().map(|e| e.relationship_type.as_str()).collect();
    assert!(labels.contains(&"directed_by"));
    assert!(labels.contains(&"directs"));
    assert!(!labels.contains(&"has_director"));
}

#[test]
fn multi_value_columns_join_and_single_value_columns_take_first() {
    let lines = vec![
        r#"{"id":"p1","schema":"Person","properties":{"name":["A","B"],"alias":["C"],"country":["ru","ir"],"birthDate":["1960-01-01","1961-02-02"]}}"#,
    ];
    let (rows, _, _) = normalize_lines(lines);
    assert_eq!(rows[0].names, "A|B");
    assert_eq!(rows[0].aliases, "C");
    assert_eq!(rows[0].countries, "ru|ir");
    assert_eq!(rows[0].birth_date, "1960-01-01");
}

#[test]
fn two_line_ownership_example_end_to_end() -> Result<()> {
    let lines = vec![
        r#"{"id":"ofac-12345","schema":"Person","caption":"Ivan Petrov","datasets":["us_ofac_sdn"],"properties":{"name":["Ivan Petrov"],"country":["ru"]}}"#,
        r#"{"id":"ofac-11111","schema":"LegalEntity","caption":"Shell Corp","datasets":["us_ofac_sdn"],"properties":{"ownershipOwner":["ofac-12345"]}}"#,
    ];
    let (rows, edges, stats) = normalize_lines(lines);

    assert_eq!(stats.parsed, 2);
    assert_eq!(stats.errors, 0);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].caption, "Ivan Petrov");
    assert_eq!(rows[0].datasets, "us_ofac_sdn");
    assert_eq!(rows[1].schema, "LegalEntity");

    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].source_id, "ofac-11111");
    assert_eq!(edges[0].target_id, "ofac-12345");
    assert_eq!(edges[0].relationship_type, "owned_by");

    let df = relationship_frame(&edges)?;
    assert_eq!(df.height(), 1);
    assert_eq!(
        df.get_column_names(),
        vec!["source_id", "target_id", "relationship_type"]
    );
    Ok(())
}
