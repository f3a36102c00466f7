use std::collections::{HashMap, HashSet};

use super::entity::{CompositeEntity, FieldSource, Node, Relationship, RelationshipProperties};
use super::errors::SchemaModelError;

/// Either side of a relationship: a concrete node or an interface/union.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Node(&'a Node),
    Composite(&'a CompositeEntity),
}

impl<'a> EntityRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            EntityRef::Node(node) => &node.name,
            EntityRef::Composite(composite) => &composite.name,
        }
    }

    pub fn as_node(&self) -> Option<&'a Node> {
        match self {
            EntityRef::Node(node) => Some(node),
            EntityRef::Composite(_) => None,
        }
    }

    pub fn as_field_source(&self) -> &'a dyn FieldSource {
        match self {
            EntityRef::Node(node) => *node,
            EntityRef::Composite(composite) => *composite,
        }
    }
}

/// Immutable description of every type the engine can translate against.
///
/// Built once at startup and shared by reference; nothing in the crate
/// mutates a model after [`SchemaModel::new`] returns.
#[derive(Debug, Clone)]
pub struct SchemaModel {
    nodes: Vec<Node>,
    composites: Vec<CompositeEntity>,
    relationship_properties: Vec<RelationshipProperties>,
    node_index: HashMap<String, usize>,
    composite_index: HashMap<String, usize>,
    properties_index: HashMap<String, usize>,
}

impl SchemaModel {
    pub fn new(
        nodes: Vec<Node>,
        composites: Vec<CompositeEntity>,
        relationship_properties: Vec<RelationshipProperties>,
    ) -> Result<Self, SchemaModelError> {
        let mut seen = HashSet::new();
        let names = nodes
            .iter()
            .map(|n| &n.name)
            .chain(composites.iter().map(|c| &c.name))
            .chain(relationship_properties.iter().map(|p| &p.name));
        for name in names {
            if !seen.insert(name.clone()) {
                return Err(SchemaModelError::DuplicateType { name: name.clone() });
            }
        }

        let model = SchemaModel {
            node_index: index_by_name(nodes.iter().map(|n| n.name.as_str())),
            composite_index: index_by_name(composites.iter().map(|c| c.name.as_str())),
            properties_index: index_by_name(
                relationship_properties.iter().map(|p| p.name.as_str()),
            ),
            nodes,
            composites,
            relationship_properties,
        };
        model.validate()?;

        log::debug!(
            "SchemaModel built: {} nodes, {} composites, {} relationship property types",
            model.nodes.len(),
            model.composites.len(),
            model.relationship_properties.len()
        );
        Ok(model)
    }

    fn validate(&self) -> Result<(), SchemaModelError> {
        for node in &self.nodes {
            if node.labels.is_empty() {
                return Err(SchemaModelError::EmptyLabels {
                    node: node.name.clone(),
                });
            }
            self.validate_fields(node)?;
        }
        for composite in &self.composites {
            for member in &composite.members {
                if self.node(member).is_none() {
                    return Err(SchemaModelError::UnknownMember {
                        composite: composite.name.clone(),
                        member: member.clone(),
                    });
                }
            }
            self.validate_fields(composite)?;
        }
        for properties in &self.relationship_properties {
            self.validate_fields(properties)?;
        }
        Ok(())
    }

    fn validate_fields(&self, source: &dyn FieldSource) -> Result<(), SchemaModelError> {
        let mut fields = HashSet::new();
        let field_names = source
            .attributes()
            .iter()
            .map(|a| &a.name)
            .chain(source.relationships().iter().map(|r| &r.field_name));
        for field in field_names {
            if !fields.insert(field) {
                return Err(SchemaModelError::duplicate_field(source.type_name(), field));
            }
        }

        for rel in source.relationships() {
            if self.entity(&rel.target).is_none() {
                return Err(SchemaModelError::UnknownRelationshipTarget {
                    source_type: source.type_name().to_string(),
                    field: rel.field_name.clone(),
                    target: rel.target.clone(),
                });
            }
            if let Some(properties) = &rel.properties {
                if self.relationship_properties(properties).is_none() {
                    return Err(SchemaModelError::UnknownRelationshipProperties {
                        source_type: source.type_name().to_string(),
                        field: rel.field_name.clone(),
                        properties: properties.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn composites(&self) -> &[CompositeEntity] {
        &self.composites
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn composite(&self, name: &str) -> Option<&CompositeEntity> {
        self.composite_index.get(name).map(|&i| &self.composites[i])
    }

    pub fn relationship_properties(&self, name: &str) -> Option<&RelationshipProperties> {
        self.properties_index
            .get(name)
            .map(|&i| &self.relationship_properties[i])
    }

    pub fn entity(&self, name: &str) -> Option<EntityRef<'_>> {
        self.node(name)
            .map(EntityRef::Node)
            .or_else(|| self.composite(name).map(EntityRef::Composite))
    }

    /// Concrete node types behind `name`, in schema-declaration order.
    pub fn concrete_nodes(&self, name: &str) -> Vec<&Node> {
        match self.entity(name) {
            Some(EntityRef::Node(node)) => vec![node],
            Some(EntityRef::Composite(composite)) => composite
                .members
                .iter()
                .filter_map(|member| self.node(member))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn edge_properties(&self, rel: &Relationship) -> Option<&RelationshipProperties> {
        rel.properties
            .as_deref()
            .and_then(|name| self.relationship_properties(name))
    }
}

fn index_by_name<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    names
        .enumerate()
        .map(|(i, name)| (name.to_string(), i))
        .collect()
}
