//! Immutable schema model: node types, interfaces, unions, relationship
//! fields and attributes, resolved once from a validated schema definition.

pub mod attribute;
pub mod authorization;
pub mod config;
pub mod entity;
pub mod errors;
pub mod model;

pub use attribute::{Attribute, AttributeKind, PopulatedBy, ScalarKind, WriteOperation};
pub use authorization::{
    AuthenticationRule, Authorization, AuthorizationOperation, AuthorizationWhere, FilterRule,
    ValidateRule, ValidationPhase,
};
pub use config::SchemaDefinition;
pub use entity::{
    CompositeEntity, CompositeKind, FieldSource, Node, QueryLimit, Relationship,
    RelationshipDirection, RelationshipProperties,
};
pub use errors::SchemaModelError;
pub use model::{EntityRef, SchemaModel};
