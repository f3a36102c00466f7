//! Pattern planning: MATCH patterns from relationship metadata and the
//! isolation strategy for nested relationship fields.

use crate::cypher::{
    Expr, NodePattern, Order, OrderItem, Pattern, PatternDirection, Projection, RelationshipPattern,
    Variable,
};
use crate::request::{FieldArguments, SortDirection, SortField, SortTarget};
use crate::schema_model::{FieldSource, Node, QueryLimit, Relationship, RelationshipDirection};
use crate::translate::errors::TranslateError;

pub fn direction(rel: &Relationship) -> PatternDirection {
    match rel.direction {
        RelationshipDirection::Out => PatternDirection::Right,
        RelationshipDirection::In => PatternDirection::Left,
    }
}

/// `(variable:Label1:Label2)` using the node's custom labels.
pub fn node_pattern(variable: &Variable, node: &Node) -> Pattern {
    Pattern::node(NodePattern::new(variable).labels(&node.labels))
}

/// `(parent)-[edge:TYPE]->(target:Labels)`; the parent is already bound and
/// carries no labels.
pub fn relationship_pattern(
    parent: &Variable,
    rel: &Relationship,
    edge: Option<&Variable>,
    target: &Variable,
    target_labels: &[String],
) -> Pattern {
    Pattern::node(NodePattern::new(parent)).related(
        RelationshipPattern::new(edge, &rel.rel_type, direction(rel)),
        NodePattern::new(target).labels(target_labels),
    )
}

/// How a nested relationship field is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// `[pattern WHERE ... | projection]` inline in the parent projection
    Comprehension,
    /// `CALL { WITH parent ... }` so ordering, pagination and aggregation
    /// apply to this field's candidates only
    Subquery,
}

/// Facts about a nested relationship field that decide its isolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldRequirements {
    pub sorted: bool,
    pub paginated: bool,
    pub aggregated: bool,
    pub polymorphic: bool,
    pub precomputed_filter: bool,
    pub validated: bool,
    pub nested_subqueries: bool,
}

pub fn isolation(requirements: &FieldRequirements) -> Isolation {
    let FieldRequirements {
        sorted,
        paginated,
        aggregated,
        polymorphic,
        precomputed_filter,
        validated,
        nested_subqueries,
    } = *requirements;
    if sorted
        || paginated
        || aggregated
        || polymorphic
        || precomputed_filter
        || validated
        || nested_subqueries
    {
        Isolation::Subquery
    } else {
        Isolation::Comprehension
    }
}

fn order(direction: SortDirection) -> Order {
    match direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    }
}

/// ORDER BY items for the sort fields addressing `target`, resolved through
/// `@alias`.
pub fn order_by(
    sort: &[SortField],
    target: SortTarget,
    variable: &Variable,
    source: &dyn FieldSource,
) -> Result<Vec<OrderItem>, TranslateError> {
    sort.iter()
        .filter(|s| s.target == target)
        .map(|s| {
            let attribute = source
                .attribute(&s.field)
                .ok_or_else(|| TranslateError::unknown_field(source.type_name(), &s.field))?;
            Ok(OrderItem {
                expr: variable.property(&attribute.database_name),
                order: order(s.direction),
            })
        })
        .collect()
}

/// ORDER BY over projected maps (merged polymorphic results): keys are the
/// exposed field names.
pub fn order_by_keys(sort: &[SortField], variable: &Variable) -> Vec<OrderItem> {
    sort.iter()
        .filter(|s| s.target == SortTarget::Node)
        .map(|s| OrderItem {
            expr: variable.property(&s.field),
            order: order(s.direction),
        })
        .collect()
}

/// `SKIP`/`LIMIT` for the arguments, with `@limit` applied.
pub fn paginate(
    projection: Projection,
    args: &FieldArguments,
    limit: Option<&QueryLimit>,
) -> Projection {
    let resolved = match limit {
        Some(limit) => limit.resolve(args.limit),
        None => args.limit,
    };
    projection
        .skip(args.offset.map(Expr::param))
        .limit(resolved.map(Expr::param))
}
