use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::ftm::record::{field_str, first_value, join_datasets, join_values, properties, RawEntity};
use crate::ftm::relationships::{extract_relationships, Relationship};

/// Parse errors logged verbatim before falling back to a final count.
const MAX_LOGGED_PARSE_ERRORS: usize = 5;

/// Column order of the entity table. Every column is string-typed.
pub const ENTITY_COLUMNS: [&str; 29] = [
    "entity_id",
    "schema",
    "caption",
    "datasets",
    "first_seen",
    "last_seen",
    "last_change",
    "names",
    "aliases",
    "countries",
    "addresses",
    "topics",
    "nationality",
    "program",
    "position",
    "birth_date",
    "death_date",
    "gender",
    "incorporation_date",
    "dissolution_date",
    "jurisdiction",
    "registration_number",
    "status",
    "summary",
    "inn_code",
    "ogrn_code",
    "lei_code",
    "swift_bic",
    "imo_number",
];

/// One flattened entity record. Multi-valued properties are pipe-joined,
/// single-valued ones take the first array element; everything is a string
/// with empty standing in for absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    pub entity_id: String,
    pub schema: String,
    pub caption: String,
    pub datasets: String,
    pub first_seen: String,
    pub last_seen: String,
    pub last_change: String,
    pub names: String,
    pub aliases: String,
    pub countries: String,
    pub addresses: String,
    pub topics: String,
    pub nationality: String,
    pub program: String,
    pub position: String,
    pub birth_date: String,
    pub death_date: String,
    pub gender: String,
    pub incorporation_date: String,
    pub dissolution_date: String,
    pub jurisdiction: String,
    pub registration_number: String,
    pub status: String,
    pub summary: String,
    pub inn_code: String,
    pub ogrn_code: String,
    pub lei_code: String,
    pub swift_bic: String,
    pub imo_number: String,
}

impl EntityRow {
    /// Flatten one raw FtM record. Total over arbitrary JSON objects:
    /// unknown schemas pass through, unknown properties are ignored and
    /// missing ones become empty strings.
    pub fn from_raw(entity: &RawEntity) -> Self {
        let props = properties(entity);
        Self {
            entity_id: field_str(entity, "id"),
            schema: field_str(entity, "schema"),
            caption: field_str(entity, "caption"),
            datasets: join_datasets(entity),
            first_seen: field_str(entity, "first_seen"),
            last_seen: field_str(entity, "last_seen"),
            last_change: field_str(entity, "last_change"),
            names: join_values(props, "name"),
            aliases: join_values(props, "alias"),
            countries: join_values(props, "country"),
            addresses: join_values(props, "address"),
            topics: join_values(props, "topics"),
            nationality: join_values(props, "nationality"),
            program: join_values(props, "program"),
            position: join_values(props, "position"),
            birth_date: first_value(props, "birthDate"),
            death_date: first_value(props, "deathDate"),
            gender: first_value(props, "gender"),
            incorporation_date: first_value(props, "incorporationDate"),
            dissolution_date: first_value(props, "dissolutionDate"),
            jurisdiction: first_value(props, "jurisdiction"),
            registration_number: first_value(props, "registrationNumber"),
            status: first_value(props, "status"),
            summary: first_value(props, "summary"),
            inn_code: first_value(props, "innCode"),
            ogrn_code: first_value(props, "ogrnCode"),
            lei_code: first_value(props, "leiCode"),
            swift_bic: first_value(props, "swiftBic"),
            imo_number: first_value(props, "imoNumber"),
        }
    }
}

/// Counters for one normalization pass.
#[derive(Debug, Clone, Default)]
pub struct ParseStats {
    /// Input lines consumed
    pub lines: usize,
    /// Lines that yielded an entity row
    pub parsed: usize,
    /// Lines skipped because they were not a JSON object
    pub errors: usize,
}

/// Normalize a stream of NDJSON lines into entity rows and deduplicated
/// relationship edges.
///
/// A line that fails to parse as a JSON object is counted and skipped; the
/// run never aborts on bad input. Relationship triples are deduplicated by
/// exact equality after the full pass, keeping first occurrence order.
pub fn normalize_lines<I>(lines: I) -> (Vec<EntityRow>, Vec<Relationship>, ParseStats)
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut rows = Vec::new();
    let mut edges: Vec<Relationship> = Vec::new();
    let mut stats = ParseStats::default();

    for line in lines {
        stats.lines += 1;
        let parsed: Option<Value> = match serde_json::from_str::<Value>(line.as_ref()) {
            Ok(value) if value.is_object() => Some(value),
            Ok(_) => {
                if stats.errors < MAX_LOGGED_PARSE_ERRORS {
                    warn!("Line {} is not a JSON object, skipping", stats.lines);
                }
                None
            }
            Err(err) => {
                if stats.errors < MAX_LOGGED_PARSE_ERRORS {
                    warn!("JSON parse error on line {}: {}", stats.lines, err);
                }
                None
            }
        };

        let entity = match parsed {
            Some(entity) => entity,
            None => {
                stats.errors += 1;
                continue;
            }
        };

        rows.push(EntityRow::from_raw(&entity));
        edges.extend(extract_relationships(&entity));
        stats.parsed += 1;

        if stats.lines % 100_000 == 0 {
            info!("Parsed {} lines...", stats.lines);
        }
    }

    if stats.errors > 0 {
        warn!(
            "Encountered {} parse errors out of {} lines",
            stats.errors, stats.lines
        );
    }

    // The same edge can be declared from both ends across source lines
    let mut seen = HashSet::with_capacity(edges.len());
    edges.retain(|edge| seen.insert(edge.clone()));

    info!(
        "Normalized {} entities and {} relationships from {} lines",
        rows.len(),
        edges.len(),
        stats.lines
    );

    (rows, edges, stats)
}

/// Normalize a downloaded NDJSON file. The whole file is read up front;
/// the pass itself is single-threaded and synchronous.
pub fn normalize_file(path: &Path) -> Result<(Vec<EntityRow>, Vec<Relationship>, ParseStats)> {
    info!("Parsing entities from {}", path.display());
    let content = fs::read_to_string(path)?;
    Ok(normalize_lines(content.lines()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_lines_become_rows() {
        let lines = vec![
            r#"{"id":"a","schema":"Person","properties":{}}"#,
            r#"{"id":"b","schema":"Company"}"#,
        ];
        let (rows, edges, stats) = normalize_lines(lines);
        assert_eq!(rows.len(), 2);
        assert!(edges.is_empty());
        assert_eq!(stats.parsed, 2);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let lines = vec![
            r#"{"id":"a","schema":"Person"}"#,
            "not json at all",
            r#"{"id":"b","schema":"Person"}"#,
            r#"[1,2,3]"#,
        ];
        let (rows, _, stats) = normalize_lines(lines);
        assert_eq!(rows.len(), 2);
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.errors, 2);
    }

    #[test]
    fn multi_value_join_preserves_order() {
        let lines = vec![
            r#"{"id":"a","properties":{"name":["Test Person","Person Test"]}}"#,
        ];
        let (rows, _, _) = normalize_lines(lines);
        assert_eq!(rows[0].names, "Test Person|Person Test");
    }

    #[test]
    fn single_value_columns_take_first_element() {
        let lines = vec![
            r#"{"id":"a","properties":{"birthDate":["1970-01-01","1970-01-02"]}}"#,
            r#"{"id":"b","properties":{"birthDate":[]}}"#,
            r#"{"id":"c","properties":{}}"#,
        ];
        let (rows, _, _) = normalize_lines(lines);
        assert_eq!(rows[0].birth_date, "1970-01-01");
        assert_eq!(rows[1].birth_date, "");
        assert_eq!(rows[2].birth_date, "");
    }

    #[test]
    fn duplicate_edges_collapse_to_one() {
        let lines = vec![
            r#"{"id":"A","properties":{"ownershipAsset":["B"]}}"#,
            r#"{"id":"A","properties":{"ownershipAsset":["B"]}}"#,
        ];
        let (_, edges, _) = normalize_lines(lines);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].relationship_type, "owns");
    }

    #[test]
    fn dangling_targets_are_tolerated() {
        // "Z" has no entity row; still a valid edge
        let lines = vec![r#"{"id":"A","properties":{"memberOf":["Z"]}}"#];
        let (rows, edges, _) = normalize_lines(lines);
        assert_eq!(rows.len(), 1);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_id, "Z");
    }
}
