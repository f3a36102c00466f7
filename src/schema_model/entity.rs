use serde::{Deserialize, Serialize};

use super::attribute::Attribute;
use super::authorization::{AuthenticationRule, Authorization};

/// Traversal direction of a relationship field, seen from the owning type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipDirection {
    In,
    Out,
}

/// A relationship field declared on a node or interface.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub field_name: String,
    pub rel_type: String,
    pub direction: RelationshipDirection,
    /// Entity declaring the field
    pub source: String,
    /// Node, interface or union at the other end
    pub target: String,
    /// Relationship-properties type carried by the edge
    pub properties: Option<String>,
    pub is_list: bool,
}

impl Relationship {
    pub fn aggregate_field_name(&self) -> String {
        format!("{}Aggregate", self.field_name)
    }

    pub fn connection_field_name(&self) -> String {
        format!("{}Connection", self.field_name)
    }
}

/// `@limit(default, max)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimit {
    pub default: Option<u64>,
    pub max: Option<u64>,
}

impl QueryLimit {
    /// Effective limit for a requested one: default when absent, clamped to max.
    pub fn resolve(&self, requested: Option<u64>) -> Option<u64> {
        let limit = requested.or(self.default);
        match (limit, self.max) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, Some(max)) => Some(max),
            (limit, None) => limit,
        }
    }
}

/// Anything that exposes attributes and relationship fields by name.
pub trait FieldSource {
    fn type_name(&self) -> &str;
    fn attributes(&self) -> &[Attribute];
    fn relationships(&self) -> &[Relationship];

    fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes().iter().find(|a| a.name == name)
    }

    fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships().iter().find(|r| r.field_name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    /// Labels used in every pattern, `[name]` unless overridden by `@node(labels:)`
    pub labels: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
    pub authorization: Option<Authorization>,
    pub authentication: Option<AuthenticationRule>,
    pub limit: Option<QueryLimit>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Node {
            labels: vec![name.clone()],
            name,
            attributes: Vec::new(),
            relationships: Vec::new(),
            authorization: None,
            authentication: None,
            limit: None,
        }
    }
}

impl FieldSource for Node {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Interface,
    Union,
}

/// Interface or union over node types.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeEntity {
    pub name: String,
    pub kind: CompositeKind,
    /// Concrete node types in schema-declaration order
    pub members: Vec<String>,
    /// Fields shared by all implementations (interfaces only)
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
}

impl CompositeEntity {
    pub fn is_interface(&self) -> bool {
        self.kind == CompositeKind::Interface
    }
}

impl FieldSource for CompositeEntity {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }
}

/// Property-bearing relationship type.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipProperties {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl FieldSource for RelationshipProperties {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    fn relationships(&self) -> &[Relationship] {
        &[]
    }
}
