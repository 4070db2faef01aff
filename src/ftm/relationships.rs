use serde::{Deserialize, Serialize};

use crate::ftm::record::{coerce_str, field_str, properties, RawEntity};

/// A directed edge between two entity ids, derived from a
/// relationship-bearing property on the source entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: String,
}

/// Static mapping from FtM property name to relationship type.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipSpec {
    pub property: &'static str,
    pub forward: &'static str,
    /// Declared for parity with the FtM model; reverse edges are never
    /// materialized as rows.
    pub reverse: &'static str,
}

pub const RELATIONSHIP_PROPERTIES: &[RelationshipSpec] = &[
    RelationshipSpec { property: "ownershipOwner", forward: "owned_by", reverse: "owns" },
    RelationshipSpec { property: "ownershipAsset", forward: "owns", reverse: "owned_by" },
    RelationshipSpec { property: "directorshipDirector", forward: "directed_by", reverse: "directs" },
    RelationshipSpec { property: "directorshipOrganization", forward: "directs", reverse: "directed_by" },
    RelationshipSpec { property: "familyPerson", forward: "family_of", reverse: "family_of" },
    RelationshipSpec { property: "familyRelative", forward: "related_to", reverse: "related_to" },
    RelationshipSpec { property: "associateOf", forward: "associate_of", reverse: "associate_of" },
    RelationshipSpec { property: "memberOf", forward: "member_of", reverse: "has_member" },
    RelationshipSpec { property: "employerOf", forward: "employer_of", reverse: "employed_by" },
    RelationshipSpec { property: "employees", forward: "employed_by", reverse: "employer_of" },
];

/// Scan one entity for relationship-bearing properties and emit one edge
/// per referenced id. Empty targets and self-references are discarded;
/// deduplication across entities happens at the table level.
pub fn extract_relationships(entity: &RawEntity) -> Vec<Relationship> {
    let source_id = field_str(entity, "id");
    let props = match properties(entity) {
        Some(props) => props,
        None => return Vec::new(),
    };

    let mut edges = Vec::new();
    for spec in RELATIONSHIP_PROPERTIES {
        let targets = match props.get(spec.property).and_then(|v| v.as_array()) {
            Some(targets) => targets,
            None => continue,
        };
        for target in targets {
            let target_id = coerce_str(target);
            if target_id.is_empty() || target_id == source_id {
                continue;
            }
            edges.push(Relationship {
                source_id: source_id.clone(),
                target_id,
                relationship_type: spec.forward.to_string(),
            });
        }
    }
    edges
}
