use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::ftm::{EntityRow, Relationship};

pub const ENTITIES_FILE: &str = "sanctions_entities.parquet";
pub const RELATIONSHIPS_FILE: &str = "sanctions_relationships.parquet";

fn utf8_column<F>(name: &str, rows: &[EntityRow], get: F) -> Series
where
    F: for<'a> Fn(&'a EntityRow) -> &'a str,
{
    let values: Vec<&str> = rows.iter().map(|row| get(row)).collect();
    Series::new(name, values)
}

/// Materialize the entity table. Every column is built as an explicit
/// string Series: the same logical column can be absent across differently
/// shaped entities, and an inferred all-null column would fail to union
/// with a batch where it holds text.
pub fn entity_frame(rows: &[EntityRow]) -> Result<DataFrame> {
    let columns = vec![
        utf8_column("entity_id", rows, |r| &r.entity_id),
        utf8_column("schema", rows, |r| &r.schema),
        utf8_column("caption", rows, |r| &r.caption),
        utf8_column("datasets", rows, |r| &r.datasets),
        utf8_column("first_seen", rows, |r| &r.first_seen),
        utf8_column("last_seen", rows, |r| &r.last_seen),
        utf8_column("last_change", rows, |r| &r.last_change),
        utf8_column("names", rows, |r| &r.names),
        utf8_column("aliases", rows, |r| &r.aliases),
        utf8_column("countries", rows, |r| &r.countries),
        utf8_column("addresses", rows, |r| &r.addresses),
        utf8_column("topics", rows, |r| &r.topics),
        utf8_column("nationality", rows, |r| &r.nationality),
        utf8_column("program", rows, |r| &r.program),
        utf8_column("position", rows, |r| &r.position),
        utf8_column("birth_date", rows, |r| &r.birth_date),
        utf8_column("death_date", rows, |r| &r.death_date),
        utf8_column("gender", rows, |r| &r.gender),
        utf8_column("incorporation_date", rows, |r| &r.incorporation_date),
        utf8_column("dissolution_date", rows, |r| &r.dissolution_date),
        utf8_column("jurisdiction", rows, |r| &r.jurisdiction),
        utf8_column("registration_number", rows, |r| &r.registration_number),
        utf8_column("status", rows, |r| &r.status),
        utf8_column("summary", rows, |r| &r.summary),
        utf8_column("inn_code", rows, |r| &r.inn_code),
        utf8_column("ogrn_code", rows, |r| &r.ogrn_code),
        utf8_column("lei_code", rows, |r| &r.lei_code),
        utf8_column("swift_bic", rows, |r| &r.swift_bic),
        utf8_column("imo_number", rows, |r| &r.imo_number),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Materialize the relationship table. An empty edge list still yields the
/// three string-typed columns.
pub fn relationship_frame(edges: &[Relationship]) -> Result<DataFrame> {
    let source_id: Vec<&str> = edges.iter().map(|e| e.source_id.as_str()).collect();
    let target_id: Vec<&str> = edges.iter().map(|e| e.target_id.as_str()).collect();
    let relationship_type: Vec<&str> =
        edges.iter().map(|e| e.relationship_type.as_str()).collect();

    let columns = vec![
        Series::new("source_id", source_id),
        Series::new("target_id", target_id),
        Series::new("relationship_type", relationship_type),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Write a table to parquet, replacing any previous file.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(df)?;
    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}

pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(df)?;
    info!("Exported {} rows to {}", df.height(), path.display());
    Ok(())
}
