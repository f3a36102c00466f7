//! `<rel>Aggregate` and `<rel>Connection` selections.

use super::authorization;
use super::errors::TranslateError;
use super::filter::{compile_connection_where, compile_where, CompiledFilter, FilterTarget};
use super::planner;
use super::projection::{project_attribute, project_node};
use super::Translation;
use crate::cypher::{
    Clause, CompareOp, Expr, Match, Predicate, Projection, Query, ReturnItem, Variable, With,
};
use crate::request::{ResolveTree, SortTarget};
use crate::schema_model::{
    Attribute, AuthorizationOperation, EntityRef, FieldSource, Node, Relationship, ValidationPhase,
};

fn unsupported(message: String) -> TranslateError {
    TranslateError::UnsupportedSelection(message)
}

/// `reduce(acc = head(collect(p)), v IN collect(p) | CASE WHEN size(v) <op> size(acc) THEN v ELSE acc END)`
fn extreme_string(property: Expr, shortest: bool) -> Expr {
    let accumulator = Variable::value();
    let current = Variable::value();
    let op = if shortest { CompareOp::Lt } else { CompareOp::Gt };
    Expr::Reduce {
        init: Box::new(property.clone().collect().head()),
        list: Box::new(property.collect()),
        step: Box::new(Expr::case_when(
            Predicate::compare(op, current.expr().size(), accumulator.expr().size()),
            current.expr(),
            accumulator.expr(),
        )),
        accumulator,
        variable: current,
    }
}

/// `{ min, max, average, sum, shortest, longest }` for one attribute.
fn attribute_aggregate(
    attribute: &Attribute,
    owner: &Variable,
    field: &ResolveTree,
) -> Result<Expr, TranslateError> {
    if attribute.is_list {
        return Err(unsupported(format!("list field '{}' cannot be aggregated", attribute.name)));
    }
    let scalar = attribute.scalar();
    let textual = scalar.is_some_and(|k| k.is_textual());
    let numeric = scalar.is_some_and(|k| k.is_numeric());
    let ordered = numeric || scalar.is_some_and(|k| k.is_temporal());

    let mut entries = Vec::new();
    for selection in &field.fields {
        let property = owner.property(&attribute.database_name);
        let expr = match selection.name.as_str() {
            "min" if ordered => Expr::function("min", vec![property]),
            "max" if ordered => Expr::function("max", vec![property]),
            "average" if numeric => Expr::function("avg", vec![property]),
            "sum" if numeric => Expr::function("sum", vec![property]),
            "shortest" if textual => extreme_string(property, true),
            "longest" if textual => extreme_string(property, false),
            "__typename" => continue,
            other => {
                return Err(unsupported(format!(
                    "'{}' is not an aggregation of {} field '{}'",
                    other,
                    attribute.kind.type_name(),
                    attribute.name
                )))
            }
        };
        entries.push((selection.response_key().to_string(), expr));
    }
    Ok(Expr::map(entries))
}

/// Map entries for an aggregation selection set. `count` is counted over
/// `count_of` when given; every other field must be an attribute of `source`.
pub fn aggregate_entries(
    source: &dyn FieldSource,
    owner: &Variable,
    fields: &[ResolveTree],
    count_of: Option<&Variable>,
) -> Result<Vec<(String, Expr)>, TranslateError> {
    let mut entries = Vec::new();
    for field in fields {
        let key = field.response_key().to_string();
        match (field.name.as_str(), count_of) {
            ("__typename", _) => continue,
            ("count", Some(counted)) => entries.push((key, counted.expr().count())),
            (name, _) => {
                let attribute = source
                    .attribute(name)
                    .ok_or_else(|| TranslateError::unknown_field(source.type_name(), name))?;
                entries.push((key, attribute_aggregate(attribute, owner, field)?));
            }
        }
    }
    Ok(entries)
}

/// `CALL { WITH parent MATCH ... RETURN { count, node, edge } AS var }`
pub fn aggregate_field<'a>(
    tx: &Translation<'a>,
    parent: &Variable,
    rel: &'a Relationship,
    field: &ResolveTree,
) -> Result<(Expr, Vec<Clause>), TranslateError> {
    let _guard = tx.enter()?;
    let node_var = Variable::node();
    let edge_var = Variable::relationship();
    let target = tx.entity(&rel.target)?;

    let (labels, filter, validate) = match target {
        EntityRef::Node(node) => {
            authorization::check_authentication(tx, node, AuthorizationOperation::Aggregate)?;
            let filter = compile_where(
                tx,
                field.args.filter.as_ref(),
                &node_var,
                FilterTarget::Node(node),
            )?
            .and(authorization::filter_rules(
                tx,
                node,
                &node_var,
                AuthorizationOperation::Aggregate,
            )?);
            let validate = authorization::validate_rules(
                tx,
                node,
                &node_var,
                AuthorizationOperation::Aggregate,
                ValidationPhase::Before,
            )?;
            (node.labels.clone(), filter, validate)
        }
        EntityRef::Composite(composite) => {
            if field.args.filter.is_some() {
                return Err(unsupported(format!(
                    "where on '{}' over polymorphic target {}",
                    field.name, composite.name
                )));
            }
            let label_check = Predicate::or(
                tx.model
                    .concrete_nodes(&composite.name)
                    .into_iter()
                    .map(|node| Predicate::HasLabels {
                        variable: node_var.clone(),
                        labels: node.labels.clone(),
                    }),
            );
            (Vec::new(), CompiledFilter::new(Some(label_check)), CompiledFilter::default())
        }
    };

    let mut entries = Vec::new();
    for selection in &field.fields {
        let key = selection.response_key().to_string();
        match selection.name.as_str() {
            "count" => entries.push((key, node_var.expr().count())),
            "node" => {
                let source = target.as_field_source();
                let nested = aggregate_entries(source, &node_var, &selection.fields, None)?;
                entries.push((key, Expr::map(nested)));
            }
            "edge" => {
                let properties = tx
                    .model
                    .edge_properties(rel)
                    .ok_or_else(|| {
                        TranslateError::unknown_field(&rel.aggregate_field_name(), "edge")
                    })?;
                let nested = aggregate_entries(properties, &edge_var, &selection.fields, None)?;
                entries.push((key, Expr::map(nested)));
            }
            "__typename" => {}
            other => return Err(TranslateError::unknown_field(&rel.aggregate_field_name(), other)),
        }
    }

    let output = Variable::value();
    let pattern = planner::relationship_pattern(parent, rel, Some(&edge_var), &node_var, &labels);
    let mut body = filter.apply(Match::new(pattern));
    body.extend(validate.into_clauses());
    body.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
        Expr::map(entries),
        &output,
    )])));

    log::debug!("Aggregation subquery for {}.{}", rel.source, rel.field_name);
    Ok((output.expr(), vec![Clause::call(&[parent], Query::new(body))]))
}

/// `{ edges: [{ node, properties }], totalCount }` for a connection field.
///
/// Matches are collected once so `totalCount` ignores pagination; ordering
/// and the window apply to the unwound edges.
pub fn connection_field<'a>(
    tx: &Translation<'a>,
    parent: &Variable,
    rel: &'a Relationship,
    field: &ResolveTree,
) -> Result<(Expr, Vec<Clause>), TranslateError> {
    let _guard = tx.enter()?;
    let node = match tx.entity(&rel.target)? {
        EntityRef::Node(node) => node,
        EntityRef::Composite(composite) => {
            return Err(unsupported(format!(
                "connection '{}' over polymorphic target {}",
                field.name, composite.name
            )))
        }
    };
    authorization::check_authentication(tx, node, AuthorizationOperation::Read)?;
    let edge_properties = tx.model.edge_properties(rel);

    let matched_node = Variable::node();
    let matched_edge = Variable::relationship();
    let pattern = planner::relationship_pattern(
        parent,
        rel,
        Some(&matched_edge),
        &matched_node,
        &node.labels,
    );
    let filter = compile_connection_where(
        tx,
        field.args.filter.as_ref(),
        &matched_node,
        FilterTarget::Node(node),
        &matched_edge,
        edge_properties,
    )?
    .and(authorization::filter_rules(tx, node, &matched_node, AuthorizationOperation::Read)?);
    let validate = authorization::validate_rules(
        tx,
        node,
        &matched_node,
        AuthorizationOperation::Read,
        ValidationPhase::Before,
    )?;

    let edges = Variable::named("edges");
    let total = Variable::named("totalCount");
    let mut body = filter.apply(Match::new(pattern));
    body.extend(validate.into_clauses());
    body.push(Clause::With(With::new(Projection::items(vec![ReturnItem::aliased(
        Expr::map([("node", matched_node.expr()), ("relationship", matched_edge.expr())]).collect(),
        &edges,
    )]))));
    body.push(Clause::With(With::new(Projection::items(vec![
        ReturnItem::new(edges.expr()),
        ReturnItem::aliased(edges.expr().size(), &total),
    ]))));

    let mut result = Vec::new();
    for selection in &field.fields {
        let key = selection.response_key().to_string();
        match selection.name.as_str() {
            "totalCount" => result.push((key, total.expr())),
            "edges" => {
                let (page, call) = edges_page(tx, rel, node, field, selection, &edges)?;
                body.push(call);
                result.push((key, page.expr()));
            }
            "__typename" => {}
            other => return Err(TranslateError::unknown_field(&rel.connection_field_name(), other)),
        }
    }

    let output = Variable::value();
    body.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
        Expr::map(result),
        &output,
    )])));
    Ok((output.expr(), vec![Clause::call(&[parent], Query::new(body))]))
}

/// Inner `CALL` unwinding the collected edges, sorting and paginating them
/// and projecting each `{ node, properties }` entry.
fn edges_page<'a>(
    tx: &Translation<'a>,
    rel: &'a Relationship,
    node: &'a Node,
    field: &ResolveTree,
    selection: &ResolveTree,
    edges: &Variable,
) -> Result<(Variable, Clause), TranslateError> {
    let edge = Variable::named("edge");
    let node_var = Variable::node();
    let edge_var = Variable::relationship();
    let edge_properties = tx.model.edge_properties(rel);

    let mut entries = Vec::new();
    let mut nested_calls = Vec::new();
    for part in &selection.fields {
        let key = part.response_key().to_string();
        match part.name.as_str() {
            "node" => {
                let plan = project_node(tx, node, None, &node_var, &part.fields_for(&node.name))?;
                let (map, calls) = plan.into_map(&node_var);
                nested_calls.extend(calls);
                entries.push((key, map));
            }
            "properties" => {
                let properties = edge_properties.ok_or_else(|| {
                    TranslateError::unknown_field(&rel.connection_field_name(), "properties")
                })?;
                let mut projected = Vec::new();
                for property in &part.fields {
                    if property.name == "__typename" {
                        continue;
                    }
                    let attribute = properties
                        .attribute(&property.name)
                        .ok_or_else(|| {
                            TranslateError::unknown_field(&properties.name, &property.name)
                        })?;
                    projected.push(project_attribute(
                        attribute,
                        &edge_var,
                        property.response_key(),
                    ));
                }
                entries.push((
                    key,
                    Expr::MapProjection {
                        variable: edge_var.clone(),
                        entries: projected,
                    },
                ));
            }
            "__typename" => {}
            other => return Err(TranslateError::unknown_field(&rel.connection_field_name(), other)),
        }
    }

    let mut order = planner::order_by(&field.args.sort, SortTarget::Node, &node_var, node)?;
    if let Some(properties) = edge_properties {
        order.extend(planner::order_by(&field.args.sort, SortTarget::Edge, &edge_var, properties)?);
    } else if field.args.sort.iter().any(|s| s.target == SortTarget::Edge) {
        return Err(TranslateError::unknown_field(&rel.connection_field_name(), "edge"));
    }
    let window = planner::paginate(
        Projection::items(vec![
            ReturnItem::aliased(edge.property("node"), &node_var),
            ReturnItem::aliased(edge.property("relationship"), &edge_var),
        ])
        .order_by(order),
        &field.args,
        node.limit.as_ref(),
    );

    let page = Variable::value();
    let mut body = vec![
        Clause::Unwind {
            expr: edges.expr(),
            alias: edge.clone(),
        },
        Clause::With(With::new(window)),
    ];
    body.extend(nested_calls);
    body.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
        Expr::map(entries).collect(),
        &page,
    )])));
    Ok((page, Clause::call(&[edges], Query::new(body))))
}
