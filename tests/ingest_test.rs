use std::fs;

use anyhow::Result;
use polars::prelude::*;
use tempfile::TempDir;

use snm_mapper::ftm::normalize_file;
use snm_mapper::tables::{
    entity_frame, read_parquet, relationship_frame, write_csv, write_parquet, ENTITIES_FILE,
    RELATIONSHIPS_FILE,
};

const SAMPLE: &str = concat!(
    r#"{"id":"p1","schema":"Person","caption":"Ivan Petrov","datasets":["us_ofac_sdn"],"properties":{"name":["Ivan Petrov","I. Petrov"],"country":["ru"],"innCode":["500100732259"]}}"#,
    "\n",
    r#"{"id":"c1","schema":"Company","caption":"Shell Corp","datasets":["us_ofac_sdn","eu_fsf"],"properties":{"jurisdiction":["vg"],"ownershipOwner":["p1"]}}"#,
    "\n",
    "this line is broken\n",
    r#"{"id":"d1","schema":"Directorship","caption":"","properties":{"directorshipDirector":["p1"],"directorshipOrganization":["c1"]}}"#,
    "\n",
);

#[test]
fn file_to_parquet_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let source = dir.path().join("entities.ftm.json");
    fs::write(&source, SAMPLE)?;

    let (rows, edges, stats) = normalize_file(&source)?;
    assert_eq!(stats.lines, 4);
    assert_eq!(stats.parsed, 3);
    assert_eq!(stats.errors, 1);

    let mut entities = entity_frame(&rows)?;
    let mut relationships = relationship_frame(&edges)?;
    assert_eq!(entities.height(), 3);
    assert_eq!(relationships.height(), 3);

    let entities_path = dir.path().join(ENTITIES_FILE);
    let relationships_path = dir.path().join(RELATIONSHIPS_FILE);
    write_parquet(&mut entities, &entities_path)?;
    write_parquet(&mut relationships, &relationships_path)?;

    let entities_back = read_parquet(&entities_path)?;
    assert_eq!(entities_back.height(), 3);
    assert_eq!(entities_back.width(), 29);
    let captions = entities_back.column("caption")?.str()?;
    assert_eq!(captions.get(0), Some("Ivan Petrov"));
    let names = entities_back.column("names")?.str()?;
    assert_eq!(names.get(0), Some("Ivan Petrov|I. Petrov"));

    let relationships_back = read_parquet(&relationships_path)?;
    let types = relationships_back.column("relationship_type")?.str()?;
    let mut labels: Vec<&str> = types.into_iter().flatten().collect();
    labels.sort_unstable();
    assert_eq!(labels, vec!["directed_by", "directs", "owned_by"]);
    Ok(())
}

#[test]
fn csv_export_writes_all_rows() -> Result<()> {
    let dir = TempDir::new()?;
    let source = dir.path().join("entities.ftm.json");
    fs::write(&source, SAMPLE)?;

    let (rows, _, _) = normalize_file(&source)?;
    let mut entities = entity_frame(&rows)?;

    let csv_path = dir.path().join("export.csv");
    write_csv(&mut entities, &csv_path)?;

    let contents = fs::read_to_string(&csv_path)?;
    // header plus one line per entity
    assert_eq!(contents.lines().count(), 4);
    assert!(contents.lines().next().unwrap().starts_with("entity_id,schema,caption"));
    assert!(contents.contains("Shell Corp"));
    Ok(())
}

#[test]
fn empty_file_produces_empty_tables() -> Result<()> {
    let dir = TempDir::new()?;
    let source = dir.path().join("empty.ftm.json");
    fs::write(&source, "")?;

    let (rows, edges, stats) = normalize_file(&source)?;
    assert_eq!(stats.lines, 0);
    assert!(rows.is_empty());
    assert!(edges.is_empty());

    let mut entities = entity_frame(&rows)?;
    assert_eq!(entities.height(), 0);
    assert_eq!(entities.width(), 29);

    let path = dir.path().join(ENTITIES_FILE);
    write_parquet(&mut entities, &path)?;
    let back = read_parquet(&path)?;
    assert_eq!(back.height(), 0);
    Ok(())
}
