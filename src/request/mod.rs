//! Typed request representation handed to the engine by the transport layer.
//!
//! A [`ResolveTree`] mirrors one selected field of the client operation with
//! its parsed arguments and nested selections. Filter objects stay as JSON
//! maps because their keys are only meaningful against the schema model.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Which side of a connection edge a sort key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortTarget {
    Node,
    Edge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub target: SortTarget,
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        SortField {
            target: SortTarget::Node,
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortField {
            target: SortTarget::Node,
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn on_edge(mut self) -> Self {
        self.target = SortTarget::Edge;
        self
    }
}

/// Accepts `[{ title: ASC }, { node: { name: DESC } }, { edge: { since: ASC } }]`.
fn deserialize_sort<'de, D>(deserializer: D) -> Result<Vec<SortField>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<Map<String, Value>> = Vec::deserialize(deserializer)?;
    let mut fields = Vec::new();
    for item in items {
        for (key, value) in item {
            let nested_target = match key.as_str() {
                "node" if value.is_object() => Some(SortTarget::Node),
                "edge" if value.is_object() => Some(SortTarget::Edge),
                _ => None,
            };
            match nested_target {
                Some(target) => {
                    let nested: BTreeMap<String, SortDirection> =
                        serde_json::from_value(value).map_err(serde::de::Error::custom)?;
                    // BTreeMap loses client key order within one object; GraphQL
                    // sort inputs carry one key per object in practice.
                    for (field, direction) in nested {
                        fields.push(SortField {
                            target,
                            field,
                            direction,
                        });
                    }
                }
                None => {
                    let direction: SortDirection =
                        serde_json::from_value(value).map_err(serde::de::Error::custom)?;
                    fields.push(SortField {
                        target: SortTarget::Node,
                        field: key,
                        direction,
                    });
                }
            }
        }
    }
    Ok(fields)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FieldArguments {
    #[serde(rename = "where", default)]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "deserialize_sort")]
    pub sort: Vec<SortField>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl FieldArguments {
    pub fn has_pagination(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }
}

/// One selected field with its arguments and nested selections.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResolveTree {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub args: FieldArguments,
    /// Selections valid for every possible type of this field
    #[serde(default)]
    pub fields: Vec<ResolveTree>,
    /// Inline-fragment selections keyed by concrete type name
    #[serde(default)]
    pub on: BTreeMap<String, Vec<ResolveTree>>,
}

impl ResolveTree {
    pub fn field(name: impl Into<String>) -> Self {
        ResolveTree {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Key under which the field appears in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Same field, arguments and nested selections; aliases are ignored.
    pub fn same_selection(&self, other: &ResolveTree) -> bool {
        self.name == other.name
            && self.args == other.args
            && self.fields == other.fields
            && self.on == other.on
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_fields(mut self, fields: Vec<ResolveTree>) -> Self {
        self.fields = fields;
        self
    }

    pub fn on_type(mut self, type_name: impl Into<String>, fields: Vec<ResolveTree>) -> Self {
        self.on.insert(type_name.into(), fields);
        self
    }

    /// Non-object values are ignored.
    pub fn with_where(mut self, filter: Value) -> Self {
        if let Value::Object(map) = filter {
            self.args.filter = Some(map);
        }
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortField>) -> Self {
        self.args.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.args.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.args.offset = Some(offset);
        self
    }

    /// Selections that apply to `type_name`: shared fields first, then the
    /// type's inline fragment.
    pub fn fields_for(&self, type_name: &str) -> Vec<&ResolveTree> {
        self.fields
            .iter()
            .chain(self.on.get(type_name).into_iter().flatten())
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&ResolveTree> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single client operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    Read {
        target: String,
        selection: ResolveTree,
    },
    Aggregate {
        target: String,
        selection: ResolveTree,
    },
    Create {
        target: String,
        input: Vec<Map<String, Value>>,
        #[serde(default)]
        selection: ResolveTree,
    },
    Update {
        target: String,
        #[serde(rename = "where", default)]
        filter: Option<Map<String, Value>>,
        update: Map<String, Value>,
        #[serde(default)]
        selection: ResolveTree,
    },
    Delete {
        target: String,
        #[serde(rename = "where", default)]
        filter: Option<Map<String, Value>>,
    },
}

impl Operation {
    pub fn target(&self) -> &str {
        match self {
            Operation::Read { target, .. }
            | Operation::Aggregate { target, .. }
            | Operation::Create { target, .. }
            | Operation::Update { target, .. }
            | Operation::Delete { target, .. } => target,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Read { .. } => "read",
            Operation::Aggregate { .. } => "aggregate",
            Operation::Create { .. } => "create",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
        }
    }
}

/// Already-decoded authentication claims plus raw request context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub jwt: Option<Map<String, Value>>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        RequestContext::default()
    }

    /// Claims that are not a JSON object leave the request anonymous.
    pub fn authenticated(claims: Value) -> Self {
        match claims {
            Value::Object(map) => RequestContext {
                jwt: Some(map),
                context: Map::new(),
            },
            _ => RequestContext::default(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.jwt.is_some()
    }
}
