//! # Schema Model Error Types
//!
//! Errors raised while building the immutable [`SchemaModel`](super::SchemaModel)
//! from a schema definition. Every variant is fatal: a model that fails to
//! build is never handed to the translation engine.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaModelError {
    #[error("Duplicate type name `{name}` in schema definition")]
    DuplicateType { name: String },
    #[error("Duplicate field `{field}` on type `{type_name}`")]
    DuplicateField { type_name: String, field: String },
    #[error("Relationship field `{field}` on `{source_type}` targets unknown type `{target}`")]
    UnknownRelationshipTarget {
        source_type: String,
        field: String,
        target: String,
    },
    #[error(
        "Relationship field `{field}` on `{source_type}` references unknown properties type `{properties}`"
    )]
    UnknownRelationshipProperties {
        source_type: String,
        field: String,
        properties: String,
    },
    #[error("`{composite}` lists `{member}` which is not a node type")]
    UnknownMember { composite: String, member: String },
    #[error("Unknown scalar type `{type_name}` for field `{field}`")]
    UnknownScalar { field: String, type_name: String },
    #[error("Node `{node}` declares an empty label set")]
    EmptyLabels { node: String },
    #[error("Failed to read schema definition: {error}")]
    ReadError { error: String },
    #[error("Failed to parse schema definition: {error}")]
    ParseError { error: String },
}

impl SchemaModelError {
    pub fn duplicate_field(type_name: &str, field: &str) -> Self {
        SchemaModelError::DuplicateField {
            type_name: type_name.to_string(),
            field: field.to_string(),
        }
    }
}
