//! Where-predicate compiler.
//!
//! Filter objects are compiled depth-first against a [`FilterTarget`]. Logical
//! keys recurse, leaf keys are `<field>[_<OPERATOR>]`. Aggregation filters
//! need values computed before the predicate can be evaluated; those are
//! collected per scope and returned as preceding `CALL` clauses.

mod aggregate;
mod property;
mod relationship;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::authorization::{resolve_claim_value, ClaimValue};
use super::errors::TranslateError;
use super::Translation;
use crate::cypher::{Clause, Match, Predicate, Variable};
use crate::schema_model::{
    Attribute, CompositeEntity, FieldSource, Node, Relationship, RelationshipProperties,
};

use aggregate::AggregateScope;

pub use relationship::RelationshipQuantifier;

lazy_static! {
    static ref FILTER_KEY: Regex = Regex::new(
        r"^(?P<field>.+?)(?:_(?P<op>NOT_CONTAINS|NOT_STARTS_WITH|NOT_ENDS_WITH|NOT_IN|NOT_INCLUDES|CONTAINS|STARTS_WITH|ENDS_WITH|MATCHES|IN|INCLUDES|LTE|LT|GTE|GT|DISTANCE|NOT|EQ|SOME|ALL|NONE|SINGLE))?$"
    )
    .expect("filter key pattern is valid");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Not,
    In,
    NotIn,
    Includes,
    NotIncludes,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Matches,
    Distance,
    Some,
    All,
    None,
    Single,
}

impl FilterOperator {
    fn from_suffix(suffix: &str) -> Option<Self> {
        let op = match suffix {
            "EQ" => FilterOperator::Eq,
            "NOT" => FilterOperator::Not,
            "IN" => FilterOperator::In,
            "NOT_IN" => FilterOperator::NotIn,
            "INCLUDES" => FilterOperator::Includes,
            "NOT_INCLUDES" => FilterOperator::NotIncludes,
            "LT" => FilterOperator::Lt,
            "LTE" => FilterOperator::Lte,
            "GT" => FilterOperator::Gt,
            "GTE" => FilterOperator::Gte,
            "CONTAINS" => FilterOperator::Contains,
            "NOT_CONTAINS" => FilterOperator::NotContains,
            "STARTS_WITH" => FilterOperator::StartsWith,
            "NOT_STARTS_WITH" => FilterOperator::NotStartsWith,
            "ENDS_WITH" => FilterOperator::EndsWith,
            "NOT_ENDS_WITH" => FilterOperator::NotEndsWith,
            "MATCHES" => FilterOperator::Matches,
            "DISTANCE" => FilterOperator::Distance,
            "SOME" => FilterOperator::Some,
            "ALL" => FilterOperator::All,
            "NONE" => FilterOperator::None,
            "SINGLE" => FilterOperator::Single,
            _ => return None,
        };
        Some(op)
    }
}

/// Split a filter key into field name and operator.
pub fn parse_filter_key(key: &str) -> (&str, FilterOperator) {
    match FILTER_KEY.captures(key) {
        Some(captures) => {
            let field = captures.name("field").map_or(key, |m| m.as_str());
            let op = captures
                .name("op")
                .and_then(|m| FilterOperator::from_suffix(m.as_str()))
                .unwrap_or(FilterOperator::Eq);
            (field, op)
        }
        None => (key, FilterOperator::Eq),
    }
}

/// What a filter object is compiled against.
#[derive(Debug, Clone, Copy)]
pub enum FilterTarget<'m> {
    Node(&'m Node),
    /// One concrete type inside an interface-typed scope; enables `_on` and
    /// `typename_IN`.
    Implementation {
        interface: &'m CompositeEntity,
        node: &'m Node,
    },
    Edge(&'m RelationshipProperties),
}

impl<'m> FilterTarget<'m> {
    pub fn type_name(&self) -> &'m str {
        match self {
            FilterTarget::Node(node) => &node.name,
            FilterTarget::Implementation { interface, .. } => &interface.name,
            FilterTarget::Edge(properties) => &properties.name,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&'m Attribute> {
        match self {
            FilterTarget::Node(node) => node.attributes.iter().find(|a| a.name == name),
            FilterTarget::Implementation { interface, node } => node
                .attributes
                .iter()
                .chain(interface.attributes.iter())
                .find(|a| a.name == name),
            FilterTarget::Edge(properties) => properties.attributes.iter().find(|a| a.name == name),
        }
    }

    pub fn relationship(&self, name: &str) -> Option<&'m Relationship> {
        match self {
            FilterTarget::Node(node) => node.relationship(name),
            FilterTarget::Implementation { interface, node } => node
                .relationships
                .iter()
                .chain(interface.relationships.iter())
                .find(|r| r.field_name == name),
            FilterTarget::Edge(_) => None,
        }
    }
}

/// A compiled filter: the predicate plus clauses that must run before it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    pub predicate: Option<Predicate>,
    pub preceding: Vec<Clause>,
}

impl CompiledFilter {
    pub fn new(predicate: Option<Predicate>) -> Self {
        CompiledFilter {
            predicate,
            preceding: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_none() && self.preceding.is_empty()
    }

    pub fn has_preceding(&self) -> bool {
        !self.preceding.is_empty()
    }

    /// Conjunction of two filters over the same scope.
    pub fn and(mut self, other: CompiledFilter) -> CompiledFilter {
        self.predicate = Predicate::and_opt([self.predicate, other.predicate]);
        self.preceding.extend(other.preceding);
        self
    }

    /// Attach to a MATCH: inline `WHERE` when nothing precedes the predicate,
    /// otherwise `MATCH`, the preceding clauses, then `WITH * WHERE`.
    pub fn apply(self, matched: Match) -> Vec<Clause> {
        if self.preceding.is_empty() {
            let condition = Predicate::and_opt([matched.condition.clone(), self.predicate]);
            return vec![Clause::Match(matched.filter(condition))];
        }
        let mut clauses = vec![Clause::Match(matched)];
        clauses.extend(self.preceding);
        if let Some(predicate) = self.predicate {
            clauses.push(Clause::with_star_where(predicate));
        }
        clauses
    }

    /// Clauses for a scope that is already bound (no MATCH of its own).
    pub fn into_clauses(self) -> Vec<Clause> {
        let mut clauses = self.preceding;
        if let Some(predicate) = self.predicate {
            clauses.push(Clause::with_star_where(predicate));
        }
        clauses
    }
}

/// Recursive compiler for one filter scope.
pub struct FilterCompiler<'t, 'a> {
    tx: &'t Translation<'a>,
    substitute_claims: bool,
    aggregates: Vec<AggregateScope>,
}

impl<'t, 'a> FilterCompiler<'t, 'a> {
    pub fn new(tx: &'t Translation<'a>) -> Self {
        FilterCompiler {
            tx,
            substitute_claims: false,
            aggregates: Vec::new(),
        }
    }

    /// Compiler for authorization rules: `$jwt.*` / `$context.*` leaf values
    /// are resolved against the request before compilation.
    pub fn with_claims(tx: &'t Translation<'a>) -> Self {
        FilterCompiler {
            tx,
            substitute_claims: true,
            aggregates: Vec::new(),
        }
    }

    /// Fresh scope with the same substitution mode.
    fn nested(&self) -> FilterCompiler<'t, 'a> {
        FilterCompiler {
            tx: self.tx,
            substitute_claims: self.substitute_claims,
            aggregates: Vec::new(),
        }
    }

    pub fn finish(self, predicate: Option<Predicate>) -> CompiledFilter {
        CompiledFilter {
            predicate,
            preceding: self.aggregates.into_iter().map(AggregateScope::into_call).collect(),
        }
    }

    pub fn compile(
        &mut self,
        filter: &Map<String, Value>,
        variable: &Variable,
        target: FilterTarget<'a>,
    ) -> Result<Option<Predicate>, TranslateError> {
        let mut predicates = Vec::new();
        for (key, value) in filter {
            let predicate = match key.as_str() {
                "AND" => Some(Predicate::and(self.compile_list(key, value, variable, target)?)),
                "OR" => Some(Predicate::or(self.compile_list(key, value, variable, target)?)),
                "NOT" => self
                    .compile(expect_object(key, value)?, variable, target)?
                    .map(Predicate::not),
                "_on" => self.compile_on(value, variable, target)?,
                "typename_IN" => Some(compile_typename(value, target)?),
                _ => self.compile_field(key, value, variable, target)?,
            };
            predicates.extend(predicate);
        }
        match Predicate::and(predicates) {
            Predicate::Literal(true) => Ok(None),
            predicate => Ok(Some(predicate)),
        }
    }

    fn compile_list(
        &mut self,
        key: &str,
        value: &Value,
        variable: &Variable,
        target: FilterTarget<'a>,
    ) -> Result<Vec<Predicate>, TranslateError> {
        let items = value
            .as_array()
            .ok_or_else(|| TranslateError::unsupported_filter(format!("{} expects a list", key)))?;
        items
            .iter()
            .map(|item| {
                let predicate = self.compile(expect_object(key, item)?, variable, target)?;
                Ok(predicate.unwrap_or(Predicate::Literal(true)))
            })
            .collect()
    }

    fn compile_on(
        &mut self,
        value: &Value,
        variable: &Variable,
        target: FilterTarget<'a>,
    ) -> Result<Option<Predicate>, TranslateError> {
        let FilterTarget::Implementation { interface, node } = target else {
            return Err(TranslateError::unsupported_filter(format!(
                "_on is only valid on interface filters, not on {}",
                target.type_name()
            )));
        };
        let per_type = expect_object("_on", value)?;
        for type_name in per_type.keys() {
            if !interface.members.contains(type_name) {
                return Err(TranslateError::unknown_field(&interface.name, type_name));
            }
        }
        match per_type.get(&node.name) {
            Some(filter) => self.compile(
                expect_object(&node.name, filter)?,
                variable,
                FilterTarget::Node(node),
            ),
            None => Ok(None),
        }
    }

    fn compile_field(
        &mut self,
        key: &str,
        value: &Value,
        variable: &Variable,
        target: FilterTarget<'a>,
    ) -> Result<Option<Predicate>, TranslateError> {
        let (field, op) = if target.attribute(key).is_some() || target.relationship(key).is_some() {
            (key, FilterOperator::Eq)
        } else {
            parse_filter_key(key)
        };

        if let Some(attribute) = target.attribute(field) {
            let property = variable.property(&attribute.database_name);
            let value = if self.substitute_claims {
                resolve_claim_value(self.tx, value)
            } else {
                ClaimValue::Resolved(value.clone())
            };
            return match value {
                ClaimValue::Resolved(value) => {
                    property::compile_property(attribute, op, &value, property).map(Some)
                }
                ClaimValue::Missing => Ok(Some(property::unmatchable(property))),
            };
        }

        if let Some(rel) = target.relationship(field) {
            let quantifier = RelationshipQuantifier::from_operator(op, key)?;
            return self
                .compile_relationship(rel, quantifier, value, variable, false)
                .map(Some);
        }

        if let Some(base) = field.strip_suffix("Connection") {
            if let Some(rel) = target.relationship(base) {
                let quantifier = RelationshipQuantifier::from_operator(op, key)?;
                return self
                    .compile_relationship(rel, quantifier, value, variable, true)
                    .map(Some);
            }
        }

        if let Some(base) = key.strip_suffix("Aggregate") {
            if let Some(rel) = target.relationship(base) {
                return self.compile_aggregate(rel, value, variable);
            }
        }

        Err(TranslateError::unknown_field(target.type_name(), key))
    }
}

fn compile_typename(value: &Value, target: FilterTarget<'_>) -> Result<Predicate, TranslateError> {
    let concrete = match target {
        FilterTarget::Implementation { node, .. } => node,
        other => {
            return Err(TranslateError::unsupported_filter(format!(
                "typename_IN is only valid on interface filters, not on {}",
                other.type_name()
            )))
        }
    };
    let names = value
        .as_array()
        .ok_or_else(|| TranslateError::unsupported_filter("typename_IN expects a list"))?;
    Ok(Predicate::Literal(
        names.iter().any(|name| name.as_str() == Some(concrete.name.as_str())),
    ))
}

fn expect_object<'v>(
    key: &str,
    value: &'v Value,
) -> Result<&'v Map<String, Value>, TranslateError> {
    value
        .as_object()
        .ok_or_else(|| TranslateError::unsupported_filter(format!("{} expects an object", key)))
}

/// Compile an optional `where` argument for one scope.
pub fn compile_where<'a>(
    tx: &Translation<'a>,
    filter: Option<&Map<String, Value>>,
    variable: &Variable,
    target: FilterTarget<'a>,
) -> Result<CompiledFilter, TranslateError> {
    let Some(filter) = filter else {
        return Ok(CompiledFilter::default());
    };
    let mut compiler = FilterCompiler::new(tx);
    let predicate = compiler.compile(filter, variable, target)?;
    Ok(compiler.finish(predicate))
}

/// Compile a connection `where` (`{ node, edge, AND, OR, NOT }`) against a
/// bound node and relationship.
pub fn compile_connection_where<'a>(
    tx: &Translation<'a>,
    filter: Option<&Map<String, Value>>,
    node_variable: &Variable,
    node_target: FilterTarget<'a>,
    edge_variable: &Variable,
    edge_properties: Option<&'a RelationshipProperties>,
) -> Result<CompiledFilter, TranslateError> {
    let Some(filter) = filter else {
        return Ok(CompiledFilter::default());
    };
    let mut compiler = FilterCompiler::new(tx);
    let predicate = compiler.compile_connection(
        filter,
        node_variable,
        node_target,
        edge_variable,
        edge_properties,
    )?;
    Ok(compiler.finish(predicate))
}
