//! Top-level read and aggregate operations.

use super::aggregation::aggregate_entries;
use super::authorization;
use super::errors::TranslateError;
use super::filter::{compile_where, FilterTarget};
use super::planner;
use super::projection::{polymorphic_branches, project_node, BranchSource};
use super::Translation;
use crate::cypher::{Call, Clause, Expr, Match, Projection, Query, ReturnItem, Variable, With};
use crate::request::{ResolveTree, SortTarget};
use crate::schema_model::{
    AuthorizationOperation, CompositeEntity, EntityRef, Node, ValidationPhase,
};

/// `MATCH (this:Label) ... RETURN this { ... } AS this`, or a `UNION ALL` over
/// the concrete types of an interface or union target.
pub fn translate_read<'a>(
    tx: &Translation<'a>,
    target: &str,
    selection: &ResolveTree,
) -> Result<Query, TranslateError> {
    let _guard = tx.enter()?;
    match tx.entity(target)? {
        EntityRef::Node(node) => read_node(tx, node, selection),
        EntityRef::Composite(composite) => read_composite(tx, composite, selection),
    }
}

fn read_node<'a>(
    tx: &Translation<'a>,
    node: &'a Node,
    selection: &ResolveTree,
) -> Result<Query, TranslateError> {
    authorization::check_authentication(tx, node, AuthorizationOperation::Read)?;

    let this = Variable::named("this");
    let filter = compile_where(tx, selection.args.filter.as_ref(), &this, FilterTarget::Node(node))?
        .and(authorization::filter_rules(tx, node, &this, AuthorizationOperation::Read)?);
    let mut clauses = filter.apply(Match::new(planner::node_pattern(&this, node)));
    clauses.extend(
        authorization::validate_rules(
            tx,
            node,
            &this,
            AuthorizationOperation::Read,
            ValidationPhase::Before,
        )?
        .into_clauses(),
    );

    if !selection.args.sort.is_empty() || selection.args.has_pagination() || node.limit.is_some() {
        let order = planner::order_by(&selection.args.sort, SortTarget::Node, &this, node)?;
        let window = planner::paginate(
            Projection::star().order_by(order),
            &selection.args,
            node.limit.as_ref(),
        );
        clauses.push(Clause::With(With::new(window)));
    }

    let plan = project_node(tx, node, None, &this, &selection.fields_for(&node.name))?;
    let (projection, subqueries) = plan.into_map(&this);
    clauses.extend(subqueries);
    clauses.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
        projection, &this,
    )])));
    Ok(Query::new(clauses))
}

fn read_composite<'a>(
    tx: &Translation<'a>,
    composite: &'a CompositeEntity,
    selection: &ResolveTree,
) -> Result<Query, TranslateError> {
    let this = Variable::named("this");
    let branches = polymorphic_branches(tx, composite, selection, BranchSource::Root, &this)?;
    if branches.is_empty() {
        return Ok(Query::new(vec![
            Clause::Unwind {
                expr: Expr::List(Vec::new()),
                alias: this.clone(),
            },
            Clause::Return(Projection::variables(&[&this])),
        ]));
    }

    let mut clauses = vec![Clause::Call(Call {
        imports: Vec::new(),
        body: Query::new(vec![Clause::Union {
            all: true,
            branches,
        }]),
    })];
    if !selection.args.sort.is_empty() || selection.args.has_pagination() {
        let window = planner::paginate(
            Projection::variables(&[&this])
                .order_by(planner::order_by_keys(&selection.args.sort, &this)),
            &selection.args,
            None,
        );
        clauses.push(Clause::With(With::new(window)));
    }
    clauses.push(Clause::Return(Projection::variables(&[&this])));
    Ok(Query::new(clauses))
}

/// `MATCH (this:Label) ... RETURN { count: count(this), field: { ... } }`
pub fn translate_aggregate<'a>(
    tx: &Translation<'a>,
    target: &str,
    selection: &ResolveTree,
) -> Result<Query, TranslateError> {
    let _guard = tx.enter()?;
    let node = match tx.entity(target)? {
        EntityRef::Node(node) => node,
        EntityRef::Composite(composite) => {
            return Err(TranslateError::UnsupportedSelection(format!(
                "top-level aggregation over polymorphic type {}",
                composite.name
            )))
        }
    };
    authorization::check_authentication(tx, node, AuthorizationOperation::Aggregate)?;

    let this = Variable::named("this");
    let filter = compile_where(tx, selection.args.filter.as_ref(), &this, FilterTarget::Node(node))?
        .and(authorization::filter_rules(tx, node, &this, AuthorizationOperation::Aggregate)?);
    let mut clauses = filter.apply(Match::new(planner::node_pattern(&this, node)));
    clauses.extend(
        authorization::validate_rules(
            tx,
            node,
            &this,
            AuthorizationOperation::Aggregate,
            ValidationPhase::Before,
        )?
        .into_clauses(),
    );

    let entries = aggregate_entries(node, &this, &selection.fields, Some(&this))?;
    clauses.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
        Expr::map(entries),
        &this,
    )])));
    Ok(Query::new(clauses))
}
