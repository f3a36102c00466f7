//! Return-shape construction: map projections for nodes, nested
//! relationship fields and polymorphic branches.

use super::aggregation;
use super::authorization;
use super::errors::TranslateError;
use super::filter::{compile_where, FilterTarget};
use super::planner::{self, FieldRequirements, Isolation};
use super::Translation;
use crate::cypher::{
    Call, Clause, Expr, MapProjectionEntry, Match, Predicate, Projection, Query, ReturnItem,
    Variable, With,
};
use crate::request::{ResolveTree, SortTarget};
use crate::schema_model::{
    Attribute, AuthorizationOperation, CompositeEntity, EntityRef, Node, Relationship, ScalarKind,
    ValidationPhase,
};

const TYPENAME: &str = "__typename";
const RESOLVE_TYPE: &str = "__resolveType";

/// Map-projection entries for one bound variable plus the `CALL` subqueries
/// that must run before the projection is evaluated.
#[derive(Debug, Default)]
pub struct ProjectionPlan {
    pub entries: Vec<MapProjectionEntry>,
    pub subqueries: Vec<Clause>,
}

impl ProjectionPlan {
    fn has_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| match entry {
            MapProjectionEntry::Property(name) => name == key,
            MapProjectionEntry::Entry(name, _) => name == key,
        })
    }

    /// `variable { ... }` and the subqueries it depends on.
    pub fn into_map(self, variable: &Variable) -> (Expr, Vec<Clause>) {
        let map = Expr::MapProjection {
            variable: variable.clone(),
            entries: self.entries,
        };
        (map, self.subqueries)
    }
}

/// Output shaping for temporal and spatial values.
fn shape(kind: Option<ScalarKind>, value: Expr) -> Option<Expr> {
    match kind? {
        ScalarKind::DateTime => Some(Expr::function(
            "apoc.date.convertFormat",
            vec![
                Expr::function("toString", vec![value]),
                Expr::literal("iso_zoned_date_time"),
                Expr::literal("iso_offset_date_time"),
            ],
        )),
        ScalarKind::Point | ScalarKind::CartesianPoint => Some(Expr::map([
            ("point", value.clone()),
            ("crs", value.property("crs")),
        ])),
        _ => None,
    }
}

/// Projection entry for one attribute under the response key `key`.
pub fn project_attribute(attribute: &Attribute, owner: &Variable, key: &str) -> MapProjectionEntry {
    let property = owner.property(&attribute.database_name);
    let kind = attribute.scalar();

    let shaped = if attribute.is_list {
        let element = Variable::value();
        shape(kind, element.expr()).map(|projection| Expr::ListComprehension {
            variable: element,
            list: Box::new(property.clone()),
            condition: None,
            projection: Some(Box::new(projection)),
        })
    } else {
        shape(kind, property.clone()).map(|value| match kind {
            Some(k) if k.is_spatial() => {
                Expr::case_when(Predicate::IsNotNull(property.clone()), value, Expr::null())
            }
            _ => value,
        })
    };

    match shaped {
        Some(expr) => MapProjectionEntry::Entry(key.to_string(), expr),
        None if key == attribute.database_name => MapProjectionEntry::Property(key.to_string()),
        None => MapProjectionEntry::Entry(key.to_string(), property),
    }
}

fn find_attribute<'a>(
    node: &'a Node,
    interface: Option<&'a CompositeEntity>,
    name: &str,
) -> Option<&'a Attribute> {
    node.attributes
        .iter()
        .chain(interface.into_iter().flat_map(|i| i.attributes.iter()))
        .find(|a| a.name == name)
}

fn find_relationship<'a>(
    node: &'a Node,
    interface: Option<&'a CompositeEntity>,
    name: &str,
) -> Option<&'a Relationship> {
    node.relationships
        .iter()
        .chain(interface.into_iter().flat_map(|i| i.relationships.iter()))
        .find(|r| r.field_name == name)
}

/// Project the selected fields of `node` bound to `variable`.
pub fn project_node<'a>(
    tx: &Translation<'a>,
    node: &'a Node,
    interface: Option<&'a CompositeEntity>,
    variable: &Variable,
    fields: &[&ResolveTree],
) -> Result<ProjectionPlan, TranslateError> {
    let mut plan = ProjectionPlan::default();
    // Traversals already planned in this scope, keyed by their selection
    let mut traversals: Vec<(&ResolveTree, Expr)> = Vec::new();
    for field in fields {
        let key = field.response_key();
        if field.name == TYPENAME {
            plan.entries.push(MapProjectionEntry::Entry(
                key.to_string(),
                Expr::literal(node.name.as_str()),
            ));
            continue;
        }
        if let Some(attribute) = find_attribute(node, interface, &field.name) {
            plan.entries.push(project_attribute(attribute, variable, key));
            continue;
        }

        if let Some((_, value)) = traversals.iter().find(|(seen, _)| seen.same_selection(field)) {
            plan.entries.push(MapProjectionEntry::Entry(key.to_string(), value.clone()));
            continue;
        }

        let relationship = find_relationship(node, interface, &field.name);
        let (value, subqueries) = if let Some(rel) = relationship {
            project_relationship(tx, variable, rel, field)?
        } else if let Some(rel) = field
            .name
            .strip_suffix("Aggregate")
            .and_then(|base| find_relationship(node, interface, base))
        {
            aggregation::aggregate_field(tx, variable, rel, field)?
        } else if let Some(rel) = field
            .name
            .strip_suffix("Connection")
            .and_then(|base| find_relationship(node, interface, base))
        {
            aggregation::connection_field(tx, variable, rel, field)?
        } else {
            return Err(TranslateError::unknown_field(&node.name, &field.name));
        };
        plan.entries.push(MapProjectionEntry::Entry(key.to_string(), value.clone()));
        plan.subqueries.extend(subqueries);
        traversals.push((*field, value));
    }
    Ok(plan)
}

/// Value of a nested relationship field and the clauses to run in the
/// parent scope before it is read.
pub fn project_relationship<'a>(
    tx: &Translation<'a>,
    parent: &Variable,
    rel: &'a Relationship,
    field: &ResolveTree,
) -> Result<(Expr, Vec<Clause>), TranslateError> {
    let _guard = tx.enter()?;
    match tx.entity(&rel.target)? {
        EntityRef::Node(node) => project_related_node(tx, parent, rel, node, field),
        EntityRef::Composite(composite) => {
            project_related_composite(tx, parent, rel, composite, field)
        }
    }
}

fn project_related_node<'a>(
    tx: &Translation<'a>,
    parent: &Variable,
    rel: &'a Relationship,
    node: &'a Node,
    field: &ResolveTree,
) -> Result<(Expr, Vec<Clause>), TranslateError> {
    authorization::check_authentication(tx, node, AuthorizationOperation::Read)?;

    let target = Variable::node();
    let pattern = planner::relationship_pattern(parent, rel, None, &target, &node.labels);
    let filter = compile_where(tx, field.args.filter.as_ref(), &target, FilterTarget::Node(node))?
        .and(authorization::filter_rules(tx, node, &target, AuthorizationOperation::Read)?);
    let validate = authorization::validate_rules(
        tx,
        node,
        &target,
        AuthorizationOperation::Read,
        ValidationPhase::Before,
    )?;
    let nested = project_node(tx, node, None, &target, &field.fields_for(&node.name))?;

    let requirements = FieldRequirements {
        sorted: !field.args.sort.is_empty(),
        paginated: field.args.has_pagination() || node.limit.is_some(),
        precomputed_filter: filter.has_preceding(),
        validated: !validate.is_empty(),
        nested_subqueries: !nested.subqueries.is_empty(),
        ..Default::default()
    };
    let (projection, nested_calls) = nested.into_map(&target);

    if planner::isolation(&requirements) == Isolation::Comprehension {
        let list = Expr::pattern_comprehension(pattern, filter.predicate, projection);
        let value = if rel.is_list { list } else { list.head() };
        return Ok((value, Vec::new()));
    }

    log::debug!("Isolating {}.{} in a subquery", rel.source, rel.field_name);
    let output = Variable::value();
    let mut body = filter.apply(Match::new(pattern));
    body.extend(validate.into_clauses());
    if requirements.sorted || requirements.paginated {
        let order = planner::order_by(&field.args.sort, SortTarget::Node, &target, node)?;
        let window =
            planner::paginate(Projection::star().order_by(order), &field.args, node.limit.as_ref());
        body.push(Clause::With(With::new(window)));
    }
    body.extend(nested_calls);
    let collected = if rel.is_list {
        projection.collect()
    } else {
        projection.collect().head()
    };
    body.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
        collected, &output,
    )])));

    Ok((output.expr(), vec![Clause::call(&[parent], Query::new(body))]))
}

fn project_related_composite<'a>(
    tx: &Translation<'a>,
    parent: &Variable,
    rel: &'a Relationship,
    composite: &'a CompositeEntity,
    field: &ResolveTree,
) -> Result<(Expr, Vec<Clause>), TranslateError> {
    let branch_output = Variable::value();
    let branches = polymorphic_branches(
        tx,
        composite,
        field,
        BranchSource::Related { parent, rel },
        &branch_output,
    )?;
    if branches.is_empty() {
        let empty = if rel.is_list { Expr::List(Vec::new()) } else { Expr::null() };
        return Ok((empty, Vec::new()));
    }

    let output = Variable::value();
    let mut body = vec![Clause::Call(Call {
        imports: Vec::new(),
        body: Query::new(vec![Clause::Union {
            all: true,
            branches,
        }]),
    })];
    if !field.args.sort.is_empty() || field.args.has_pagination() {
        let window = planner::paginate(
            Projection::variables(&[&branch_output])
                .order_by(planner::order_by_keys(&field.args.sort, &branch_output)),
            &field.args,
            None,
        );
        body.push(Clause::With(With::new(window)));
    }
    let collected = if rel.is_list {
        branch_output.expr().collect()
    } else {
        branch_output.expr().collect().head()
    };
    body.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
        collected, &output,
    )])));

    Ok((output.expr(), vec![Clause::call(&[parent], Query::new(body))]))
}

/// Where the branches of a polymorphic selection start from.
#[derive(Debug, Clone, Copy)]
pub enum BranchSource<'r> {
    /// Top-level read: each branch matches its own label set
    Root,
    /// Nested field: each branch re-imports the parent and traverses `rel`
    Related {
        parent: &'r Variable,
        rel: &'r Relationship,
    },
}

/// One query per concrete type behind `composite`, in declaration order,
/// each returning `node { __resolveType: "Type", ... } AS output`.
///
/// Union filters are keyed by member; a non-empty union filter selects only
/// the members it names.
pub fn polymorphic_branches<'a>(
    tx: &Translation<'a>,
    composite: &'a CompositeEntity,
    field: &ResolveTree,
    source: BranchSource<'_>,
    output: &Variable,
) -> Result<Vec<Query>, TranslateError> {
    let filter = field.args.filter.as_ref();
    if let (false, Some(filter)) = (composite.is_interface(), filter) {
        if let Some(unknown) = filter.keys().find(|k| !composite.members.contains(k)) {
            return Err(TranslateError::unknown_field(&composite.name, unknown));
        }
    }
    let named_only = !composite.is_interface() && filter.is_some_and(|f| !f.is_empty());

    let mut branches = Vec::new();
    for node in tx.model.concrete_nodes(&composite.name) {
        let (node_filter, target, interface) = if composite.is_interface() {
            let target = FilterTarget::Implementation {
                interface: composite,
                node,
            };
            (filter, target, Some(composite))
        } else {
            let member = match filter.and_then(|f| f.get(&node.name)) {
                Some(value) => Some(value.as_object().ok_or_else(|| {
                    TranslateError::unsupported_filter(format!("{} expects an object", node.name))
                })?),
                None if named_only => continue,
                None => None,
            };
            (member, FilterTarget::Node(node), None)
        };
        authorization::check_authentication(tx, node, AuthorizationOperation::Read)?;

        let variable = Variable::node();
        let mut clauses = Vec::new();
        let pattern = match source {
            BranchSource::Root => planner::node_pattern(&variable, node),
            BranchSource::Related { parent, rel } => {
                clauses.push(Clause::With(With::new(Projection::variables(&[parent]))));
                planner::relationship_pattern(parent, rel, None, &variable, &node.labels)
            }
        };
        let compiled = compile_where(tx, node_filter, &variable, target)?
            .and(authorization::filter_rules(tx, node, &variable, AuthorizationOperation::Read)?);
        clauses.extend(compiled.apply(Match::new(pattern)));
        clauses.extend(
            authorization::validate_rules(
                tx,
                node,
                &variable,
                AuthorizationOperation::Read,
                ValidationPhase::Before,
            )?
            .into_clauses(),
        );

        let mut plan = project_node(tx, node, interface, &variable, &field.fields_for(&node.name))?;
        plan.entries.insert(
            0,
            MapProjectionEntry::Entry(RESOLVE_TYPE.to_string(), Expr::literal(node.name.as_str())),
        );
        // Merged results are sorted by key, so sort fields must be projected
        for sort in field.args.sort.iter().filter(|s| s.target == SortTarget::Node) {
            if plan.has_key(&sort.field) {
                continue;
            }
            let attribute = find_attribute(node, interface, &sort.field)
                .ok_or_else(|| TranslateError::unknown_field(&node.name, &sort.field))?;
            plan.entries.push(project_attribute(attribute, &variable, &sort.field));
        }

        let (projection, nested_calls) = plan.into_map(&variable);
        clauses.extend(nested_calls);
        clauses.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
            projection, output,
        )])));
        branches.push(Query::new(clauses));
    }

    log::debug!(
        "{} branch(es) for polymorphic selection '{}' over {}",
        branches.len(),
        field.name,
        composite.name
    );
    Ok(branches)
}
