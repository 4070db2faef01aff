//! Follow the Money (FtM) record handling.
//!
//! OpenSanctions publishes entities as newline-delimited JSON in the FtM
//! data model: loosely-typed property-bag records where relationships are
//! encoded as property values referencing other entity ids. This module
//! flattens those records into a fixed-column entity table and an explicit
//! relationship edge table.

pub mod normalize;
pub mod record;
pub mod relationships;

pub use normalize::{normalize_file, normalize_lines, EntityRow, ParseStats, ENTITY_COLUMNS};
pub use relationships::{extract_relationships, Relationship, RELATIONSHIP_PROPERTIES};
