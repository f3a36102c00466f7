//! Schema definition loading.
//!
//! Schema models are described in YAML or JSON with the following structure:
//!
//! ```yaml
//! enums:
//!   Genre: [ACTION, DRAMA]
//! nodes:
//!   - name: Movie
//!     labels: [Film]              # optional custom labels
//!     fields:
//!       - { name: title, type: String, required: true }
//!       - { name: rating, type: Float, alias: avg_rating }
//!     relationships:
//!       - { field: actors, type: ACTED_IN, direction: IN, target: Actor, properties: ActedIn }
//!     authorization:
//!       filter:
//!         - where: { node: { ownerId: "$jwt.sub" } }
//! interfaces:
//!   - { name: Production, implementations: [Movie, Series], fields: [...] }
//! unions:
//!   - { name: Search, members: [Movie, Actor] }
//! relationship_properties:
//!   - { name: ActedIn, fields: [{ name: screenTime, type: Int }] }
//! ```
//!
//! The definition is converted into an immutable [`SchemaModel`], which
//! validates every cross-reference.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::attribute::{Attribute, AttributeKind, PopulatedBy, ScalarKind, WriteOperation};
use super::authorization::{AuthenticationRule, Authorization};
use super::entity::{
    CompositeEntity, CompositeKind, Node, QueryLimit, Relationship, RelationshipDirection,
    RelationshipProperties,
};
use super::errors::SchemaModelError;
use super::model::SchemaModel;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub enums: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
    #[serde(default)]
    pub unions: Vec<UnionDefinition>,
    #[serde(default)]
    pub relationship_properties: Vec<PropertiesDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    /// Optional: custom labels replacing the type name in patterns
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
    #[serde(default)]
    pub authorization: Option<Authorization>,
    #[serde(default)]
    pub authentication: Option<AuthenticationRule>,
    #[serde(default)]
    pub limit: Option<QueryLimit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    pub implementations: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDefinition {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertiesDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub required: bool,
    /// Optional: stored property name (`@alias`)
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub populated_by: Option<PopulatedByDefinition>,
    /// `@id(autogenerate: true)`
    #[serde(default)]
    pub id: bool,
    #[serde(default)]
    pub timestamp: Option<Vec<WriteOperation>>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulatedByDefinition {
    pub callback: String,
    #[serde(default = "WriteOperation::all")]
    pub operations: Vec<WriteOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub field: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub direction: RelationshipDirection,
    pub target: String,
    #[serde(default)]
    pub properties: Option<String>,
    #[serde(default = "default_list")]
    pub list: bool,
}

fn default_list() -> bool {
    true
}

impl SchemaDefinition {
    pub fn from_yaml_str(content: &str) -> Result<Self, SchemaModelError> {
        serde_yaml::from_str(content).map_err(|e| SchemaModelError::ParseError {
            error: e.to_string(),
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, SchemaModelError> {
        serde_json::from_str(content).map_err(|e| SchemaModelError::ParseError {
            error: e.to_string(),
        })
    }

    /// Load from a `.yaml`/`.yml` or `.json` file, picked by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaModelError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| SchemaModelError::ReadError {
            error: format!("{}: {}", path.display(), e),
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    pub fn build(&self) -> Result<SchemaModel, SchemaModelError> {
        let nodes = self
            .nodes
            .iter()
            .map(|def| self.build_node(def))
            .collect::<Result<Vec<_>, _>>()?;

        let mut composites = Vec::new();
        for def in &self.interfaces {
            composites.push(CompositeEntity {
                name: def.name.clone(),
                kind: CompositeKind::Interface,
                members: def.implementations.clone(),
                attributes: self.build_attributes(&def.fields)?,
                relationships: build_relationships(&def.name, &def.relationships),
            });
        }
        for def in &self.unions {
            composites.push(CompositeEntity {
                name: def.name.clone(),
                kind: CompositeKind::Union,
                members: def.members.clone(),
                attributes: Vec::new(),
                relationships: Vec::new(),
            });
        }

        let properties = self
            .relationship_properties
            .iter()
            .map(|def| {
                Ok(RelationshipProperties {
                    name: def.name.clone(),
                    attributes: self.build_attributes(&def.fields)?,
                })
            })
            .collect::<Result<Vec<_>, SchemaModelError>>()?;

        SchemaModel::new(nodes, composites, properties)
    }

    fn build_node(&self, def: &NodeDefinition) -> Result<Node, SchemaModelError> {
        Ok(Node {
            name: def.name.clone(),
            labels: def.labels.clone().unwrap_or_else(|| vec![def.name.clone()]),
            attributes: self.build_attributes(&def.fields)?,
            relationships: build_relationships(&def.name, &def.relationships),
            authorization: def.authorization.clone(),
            authentication: def.authentication.clone(),
            limit: def.limit,
        })
    }

    fn build_attributes(
        &self,
        fields: &[FieldDefinition],
    ) -> Result<Vec<Attribute>, SchemaModelError> {
        fields.iter().map(|field| self.build_attribute(field)).collect()
    }

    fn build_attribute(&self, field: &FieldDefinition) -> Result<Attribute, SchemaModelError> {
        let kind = if let Some(scalar) = ScalarKind::from_name(&field.type_name) {
            AttributeKind::Scalar(scalar)
        } else if let Some(values) = self.enums.get(&field.type_name) {
            AttributeKind::Enum {
                name: field.type_name.clone(),
                values: values.clone(),
            }
        } else {
            return Err(SchemaModelError::UnknownScalar {
                field: field.name.clone(),
                type_name: field.type_name.clone(),
            });
        };

        Ok(Attribute {
            name: field.name.clone(),
            kind,
            is_list: field.list,
            nullable: !field.required,
            database_name: field.alias.clone().unwrap_or_else(|| field.name.clone()),
            populated_by: field.populated_by.as_ref().map(|p| PopulatedBy {
                callback: p.callback.clone(),
                operations: p.operations.clone(),
            }),
            id_autogenerate: field.id,
            timestamps: field.timestamp.clone().unwrap_or_default(),
            unique: field.unique || field.id,
        })
    }
}

fn build_relationships(source: &str, defs: &[RelationshipDefinition]) -> Vec<Relationship> {
    defs.iter()
        .map(|def| Relationship {
            field_name: def.field.clone(),
            rel_type: def.rel_type.clone(),
            direction: def.direction,
            source: source.to_string(),
            target: def.target.clone(),
            properties: def.properties.clone(),
            is_list: def.list,
        })
        .collect()
}

impl SchemaModel {
    pub fn from_yaml_str(content: &str) -> Result<Self, SchemaModelError> {
        SchemaDefinition::from_yaml_str(content)?.build()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaModelError> {
        SchemaDefinition::from_file(path)?.build()
    }
}
