use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in scalar kinds an attribute can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    ID,
    String,
    Int,
    BigInt,
    Float,
    Boolean,
    DateTime,
    LocalDateTime,
    Date,
    Time,
    LocalTime,
    Duration,
    Point,
    CartesianPoint,
}

impl ScalarKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "ID" => ScalarKind::ID,
            "String" => ScalarKind::String,
            "Int" => ScalarKind::Int,
            "BigInt" => ScalarKind::BigInt,
            "Float" => ScalarKind::Float,
            "Boolean" => ScalarKind::Boolean,
            "DateTime" => ScalarKind::DateTime,
            "LocalDateTime" => ScalarKind::LocalDateTime,
            "Date" => ScalarKind::Date,
            "Time" => ScalarKind::Time,
            "LocalTime" => ScalarKind::LocalTime,
            "Duration" => ScalarKind::Duration,
            "Point" => ScalarKind::Point,
            "CartesianPoint" => ScalarKind::CartesianPoint,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::ID => "ID",
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::BigInt => "BigInt",
            ScalarKind::Float => "Float",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::LocalDateTime => "LocalDateTime",
            ScalarKind::Date => "Date",
            ScalarKind::Time => "Time",
            ScalarKind::LocalTime => "LocalTime",
            ScalarKind::Duration => "Duration",
            ScalarKind::Point => "Point",
            ScalarKind::CartesianPoint => "CartesianPoint",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::BigInt | ScalarKind::Float)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ScalarKind::DateTime
                | ScalarKind::LocalDateTime
                | ScalarKind::Date
                | ScalarKind::Time
                | ScalarKind::LocalTime
                | ScalarKind::Duration
        )
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, ScalarKind::Point | ScalarKind::CartesianPoint)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, ScalarKind::String | ScalarKind::ID)
    }

    /// Cypher constructor applied to parameters of this kind, if any.
    pub fn cypher_constructor(&self) -> Option<&'static str> {
        match self {
            ScalarKind::DateTime => Some("datetime"),
            ScalarKind::LocalDateTime => Some("localdatetime"),
            ScalarKind::Date => Some("date"),
            ScalarKind::Time => Some("time"),
            ScalarKind::LocalTime => Some("localtime"),
            ScalarKind::Duration => Some("duration"),
            ScalarKind::Point | ScalarKind::CartesianPoint => Some("point"),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    Scalar(ScalarKind),
    Enum { name: String, values: Vec<String> },
}

impl AttributeKind {
    pub fn type_name(&self) -> &str {
        match self {
            AttributeKind::Scalar(kind) => kind.name(),
            AttributeKind::Enum { name, .. } => name,
        }
    }

    pub fn scalar(&self) -> Option<ScalarKind> {
        match self {
            AttributeKind::Scalar(kind) => Some(*kind),
            AttributeKind::Enum { .. } => None,
        }
    }
}

/// Write operations that fire populated-by callbacks and timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteOperation {
    Create,
    Update,
}

impl WriteOperation {
    pub fn all() -> Vec<WriteOperation> {
        vec![WriteOperation::Create, WriteOperation::Update]
    }
}

/// Binding of an attribute to a user callback evaluated at write time.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulatedBy {
    pub callback: String,
    pub operations: Vec<WriteOperation>,
}

impl PopulatedBy {
    pub fn fires_on(&self, operation: WriteOperation) -> bool {
        self.operations.contains(&operation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Name exposed to clients
    pub name: String,
    pub kind: AttributeKind,
    pub is_list: bool,
    pub nullable: bool,
    /// Stored property name (`@alias`), equal to `name` when not aliased
    pub database_name: String,
    pub populated_by: Option<PopulatedBy>,
    /// `@id(autogenerate: true)`
    pub id_autogenerate: bool,
    /// `@timestamp(operations: [...])`
    pub timestamps: Vec<WriteOperation>,
    pub unique: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        let name = name.into();
        Attribute {
            database_name: name.clone(),
            name,
            kind: AttributeKind::Scalar(kind),
            is_list: false,
            nullable: true,
            populated_by: None,
            id_autogenerate: false,
            timestamps: Vec::new(),
            unique: false,
        }
    }

    pub fn list(mut self) -> Self {
        self.is_list = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn aliased(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = database_name.into();
        self
    }

    pub fn populated_by(
        mut self,
        callback: impl Into<String>,
        operations: Vec<WriteOperation>,
    ) -> Self {
        self.populated_by = Some(PopulatedBy {
            callback: callback.into(),
            operations,
        });
        self
    }

    pub fn scalar(&self) -> Option<ScalarKind> {
        self.kind.scalar()
    }

    /// True when a client value may never be written directly.
    pub fn is_generated(&self) -> bool {
        self.id_autogenerate || !self.timestamps.is_empty() || self.populated_by.is_some()
    }
}
