//! Create, update and delete operations.
//!
//! Generated values (`@id`, `@timestamp`, `@populatedBy`) are resolved while
//! building the SET list; client input may never write them directly.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::authorization;
use super::callbacks::CallbackValue;
use super::coercion::{
    coerce_attribute_value, coerce_list, coerce_scalar, coerce_value, typed_param,
};
use super::errors::TranslateError;
use super::filter::{compile_where, FilterTarget};
use super::planner;
use super::projection::project_node;
use super::Translation;
use crate::cypher::{
    ArithmeticOp, Call, Clause, Expr, Match, Projection, Query, ReturnItem, Variable, With,
};
use crate::request::ResolveTree;
use crate::schema_model::{
    Attribute, AuthorizationOperation, FieldSource, Node, ScalarKind, ValidationPhase,
    WriteOperation,
};

lazy_static! {
    static ref UPDATE_KEY: Regex = Regex::new(
        r"^(?P<field>.+?)_(?P<op>INCREMENT|DECREMENT|ADD|SUBTRACT|MULTIPLY|DIVIDE|PUSH|POP)$"
    )
    .expect("update key pattern is valid");
}

/// Assignments collected for one written node.
#[derive(Debug, Default)]
struct WritePlan {
    set: Vec<(Expr, Expr)>,
    remove: Vec<Expr>,
}

impl WritePlan {
    fn into_clauses(self) -> Vec<Clause> {
        let mut clauses = Vec::new();
        if !self.set.is_empty() {
            clauses.push(Clause::Set(self.set));
        }
        if !self.remove.is_empty() {
            clauses.push(Clause::Remove(self.remove));
        }
        clauses
    }
}

fn non_null(attribute: &Attribute, value: Value) -> Result<Value, TranslateError> {
    if value.is_null() && !attribute.nullable {
        let list = if attribute.is_list { "]" } else { "" };
        let open = if attribute.is_list { "[" } else { "" };
        return Err(TranslateError::ValueCoercion(format!(
            "Expected non-nullable type \"{}{}{}!\" not to be null.",
            open,
            attribute.kind.type_name(),
            list
        )));
    }
    Ok(value)
}

fn nested_write(node: &Node, field: &str) -> TranslateError {
    TranslateError::UnsupportedSelection(format!(
        "nested relationship write '{}' on {} is not supported",
        field, node.name
    ))
}

/// `@id`, `@timestamp` and fired `@populatedBy` values for `operation`.
fn generated_values(
    tx: &Translation<'_>,
    node: &Node,
    variable: &Variable,
    operation: WriteOperation,
    parent: &Map<String, Value>,
    args: &Value,
    plan: &mut WritePlan,
) -> Result<(), TranslateError> {
    for attribute in &node.attributes {
        let property = variable.property(&attribute.database_name);
        if attribute.id_autogenerate && operation == WriteOperation::Create {
            plan.set.push((property, Expr::function("randomUUID", vec![])));
            continue;
        }
        if attribute.timestamps.contains(&operation) {
            let constructor = attribute
                .scalar()
                .filter(|k| k.is_temporal() && *k != ScalarKind::Duration)
                .and_then(|k| k.cypher_constructor())
                .ok_or_else(|| {
                    TranslateError::UnsupportedSelection(format!(
                        "@timestamp on non-temporal field '{}'",
                        attribute.name
                    ))
                })?;
            plan.set.push((property, Expr::function(constructor, vec![])));
            continue;
        }
        let Some(populated_by) = &attribute.populated_by else {
            continue;
        };
        if !populated_by.fires_on(operation) {
            continue;
        }
        let callback = tx.callbacks.get(&populated_by.callback)?;
        match callback.call(parent, args, tx.request) {
            CallbackValue::Value(value) => {
                let coerced = non_null(attribute, coerce_attribute_value(attribute, &value)?)?;
                plan.set.push((property, typed_param(&attribute.kind, coerced, attribute.is_list)));
            }
            CallbackValue::Null => {
                if operation == WriteOperation::Update {
                    plan.remove.push(property);
                }
            }
            CallbackValue::Undefined => {
                log::debug!(
                    "Callback '{}' left {}.{} untouched",
                    populated_by.callback,
                    node.name,
                    attribute.name
                );
            }
        }
    }
    Ok(())
}

fn client_attribute<'n>(node: &'n Node, field: &str) -> Result<&'n Attribute, TranslateError> {
    match node.attribute(field) {
        Some(attribute) if !attribute.is_generated() => Ok(attribute),
        Some(_) => Err(TranslateError::unknown_field(&node.name, field)),
        None if node.relationship(field).is_some() => Err(nested_write(node, field)),
        None => Err(TranslateError::unknown_field(&node.name, field)),
    }
}

fn create_plan(
    tx: &Translation<'_>,
    node: &Node,
    variable: &Variable,
    input: &Map<String, Value>,
    all_inputs: &Value,
) -> Result<WritePlan, TranslateError> {
    let mut plan = WritePlan::default();
    for (field, value) in input {
        let attribute = client_attribute(node, field)?;
        let coerced = non_null(attribute, coerce_attribute_value(attribute, value)?)?;
        plan.set.push((
            variable.property(&attribute.database_name),
            typed_param(&attribute.kind, coerced, attribute.is_list),
        ));
    }
    let args = json!({ "input": all_inputs });
    generated_values(tx, node, variable, WriteOperation::Create, input, &args, &mut plan)?;
    Ok(plan)
}

/// One SET entry for an update key, possibly carrying a mathematical or
/// list operator suffix.
fn update_assignment(
    node: &Node,
    variable: &Variable,
    key: &str,
    value: &Value,
) -> Result<(Expr, Expr), TranslateError> {
    let exact = node.attribute(key).is_some() || node.relationship(key).is_some();
    let (field, op) = match UPDATE_KEY.captures(key) {
        Some(captures) if !exact => (
            captures.name("field").map_or(key, |m| m.as_str()),
            captures.name("op").map(|m| m.as_str()),
        ),
        _ => (key, None),
    };
    let attribute = client_attribute(node, field)?;
    let property = variable.property(&attribute.database_name);
    let scalar = attribute.scalar();

    let invalid = |op: &str| {
        TranslateError::UnsupportedSelection(format!(
            "{}_{} is not valid for {} field '{}'",
            field,
            op,
            attribute.kind.type_name(),
            attribute.name
        ))
    };

    let expr = match op {
        None => {
            let coerced = non_null(attribute, coerce_attribute_value(attribute, value)?)?;
            typed_param(&attribute.kind, coerced, attribute.is_list)
        }
        Some(op @ ("INCREMENT" | "DECREMENT")) => {
            let kind = scalar
                .filter(|k| matches!(k, ScalarKind::Int | ScalarKind::BigInt) && !attribute.is_list)
                .ok_or_else(|| invalid(op))?;
            let arithmetic = if op == "INCREMENT" { ArithmeticOp::Add } else { ArithmeticOp::Sub };
            Expr::arithmetic(arithmetic, property.clone(), Expr::param(coerce_scalar(kind, value)?))
        }
        Some(op @ ("ADD" | "SUBTRACT" | "MULTIPLY" | "DIVIDE")) => {
            if scalar != Some(ScalarKind::Float) || attribute.is_list {
                return Err(invalid(op));
            }
            let arithmetic = match op {
                "ADD" => ArithmeticOp::Add,
                "SUBTRACT" => ArithmeticOp::Sub,
                "MULTIPLY" => ArithmeticOp::Mul,
                _ => ArithmeticOp::Div,
            };
            let operand = coerce_scalar(ScalarKind::Float, value)?;
            Expr::arithmetic(arithmetic, property.clone(), Expr::param(operand))
        }
        Some("PUSH") => {
            if !attribute.is_list {
                return Err(invalid("PUSH"));
            }
            let items = match value {
                Value::Array(_) => coerce_list(&attribute.kind, value)?,
                single => Value::Array(vec![coerce_value(&attribute.kind, single)?]),
            };
            Expr::arithmetic(
                ArithmeticOp::Add,
                property.clone(),
                typed_param(&attribute.kind, items, true),
            )
        }
        Some(other) => {
            if !attribute.is_list {
                return Err(invalid(other));
            }
            let count = coerce_scalar(ScalarKind::Int, value)?;
            Expr::Slice {
                list: Box::new(property.clone()),
                from: None,
                to: Some(Box::new(Expr::arithmetic(
                    ArithmeticOp::Sub,
                    property.clone().size(),
                    Expr::param(count),
                ))),
            }
        }
    };
    Ok((property, expr))
}

/// `{ event, typename, id, timestamp }` for one affected node.
fn event_map(event: &str, node: &Node, variable: &Variable) -> Expr {
    Expr::map([
        ("event", Expr::literal(event)),
        ("typename", Expr::literal(node.name.as_str())),
        ("id", Expr::function("elementId", vec![variable.expr()])),
        ("timestamp", Expr::function("timestamp", vec![])),
    ])
}

/// `RETURN collect(DISTINCT this { ... }) AS data` plus the event list when
/// subscriptions are enabled.
fn mutation_response<'a>(
    tx: &Translation<'a>,
    node: &'a Node,
    this: &Variable,
    selection: &ResolveTree,
    event: &str,
) -> Result<Vec<Clause>, TranslateError> {
    let plan = project_node(tx, node, None, this, &selection.fields_for(&node.name))?;
    let (projection, subqueries) = plan.into_map(this);
    let mut clauses = subqueries;

    let mut collected = Expr::function("collect", vec![projection]);
    if let Expr::Function(call) = &mut collected {
        call.distinct = true;
    }
    let mut items = vec![ReturnItem::aliased(collected, &Variable::named("data"))];
    if tx.config.subscriptions_enabled {
        items.push(ReturnItem::aliased(
            event_map(event, node, this).collect(),
            &Variable::named("events"),
        ));
    }
    clauses.push(Clause::Return(Projection::items(items)));
    Ok(clauses)
}

/// One `CREATE` branch per input inside a `UNION ALL`, each returning the
/// created node as `this`.
pub fn translate_create<'a>(
    tx: &Translation<'a>,
    target: &str,
    input: &[Map<String, Value>],
    selection: &ResolveTree,
) -> Result<Query, TranslateError> {
    let _guard = tx.enter()?;
    let node = tx.node(target)?;
    authorization::check_authentication(tx, node, AuthorizationOperation::Create)?;

    let this = Variable::named("this");
    let all_inputs = Value::Array(input.iter().cloned().map(Value::Object).collect());
    let mut branches = Vec::with_capacity(input.len());
    for record in input {
        let created = Variable::node();
        let mut clauses = vec![Clause::Create(planner::node_pattern(&created, node))];
        clauses.extend(create_plan(tx, node, &created, record, &all_inputs)?.into_clauses());
        clauses.extend(
            authorization::validate_rules(
                tx,
                node,
                &created,
                AuthorizationOperation::Create,
                ValidationPhase::After,
            )?
            .into_clauses(),
        );
        clauses.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
            created.expr(),
            &this,
        )])));
        branches.push(Query::new(clauses));
    }
    log::debug!("Creating {} {} node(s)", branches.len(), node.name);

    let mut clauses = Vec::new();
    if !branches.is_empty() {
        clauses.push(Clause::Call(Call {
            imports: Vec::new(),
            body: Query::new(vec![Clause::Union { all: true, branches }]),
        }));
    } else {
        clauses.push(Clause::Unwind {
            expr: Expr::List(Vec::new()),
            alias: this.clone(),
        });
    }
    clauses.extend(mutation_response(tx, node, &this, selection, "create")?);
    Ok(Query::new(clauses))
}

/// `MATCH` with filter and authorization, `SET`/`REMOVE`, then the response.
pub fn translate_update<'a>(
    tx: &Translation<'a>,
    target: &str,
    filter: Option<&Map<String, Value>>,
    update: &Map<String, Value>,
    selection: &ResolveTree,
) -> Result<Query, TranslateError> {
    let _guard = tx.enter()?;
    let node = tx.node(target)?;
    authorization::check_authentication(tx, node, AuthorizationOperation::Update)?;

    let this = Variable::named("this");
    let compiled = compile_where(tx, filter, &this, FilterTarget::Node(node))?
        .and(authorization::filter_rules(tx, node, &this, AuthorizationOperation::Update)?);
    let mut clauses = compiled.apply(Match::new(planner::node_pattern(&this, node)));
    clauses.extend(
        authorization::validate_rules(
            tx,
            node,
            &this,
            AuthorizationOperation::Update,
            ValidationPhase::Before,
        )?
        .into_clauses(),
    );

    let mut plan = WritePlan::default();
    for (key, value) in update {
        plan.set.push(update_assignment(node, &this, key, value)?);
    }
    let args = json!({
        "where": filter.cloned().map(Value::Object).unwrap_or(Value::Null),
        "update": Value::Object(update.clone()),
    });
    generated_values(tx, node, &this, WriteOperation::Update, update, &args, &mut plan)?;
    clauses.extend(plan.into_clauses());

    clauses.extend(
        authorization::validate_rules(
            tx,
            node,
            &this,
            AuthorizationOperation::Update,
            ValidationPhase::After,
        )?
        .into_clauses(),
    );
    clauses.extend(mutation_response(tx, node, &this, selection, "update")?);
    Ok(Query::new(clauses))
}

/// `MATCH ... DETACH DELETE this`, collecting delete events first when
/// subscriptions are enabled.
pub fn translate_delete<'a>(
    tx: &Translation<'a>,
    target: &str,
    filter: Option<&Map<String, Value>>,
) -> Result<Query, TranslateError> {
    let _guard = tx.enter()?;
    let node = tx.node(target)?;
    authorization::check_authentication(tx, node, AuthorizationOperation::Delete)?;

    let this = Variable::named("this");
    let compiled = compile_where(tx, filter, &this, FilterTarget::Node(node))?
        .and(authorization::filter_rules(tx, node, &this, AuthorizationOperation::Delete)?);
    let mut clauses = compiled.apply(Match::new(planner::node_pattern(&this, node)));
    clauses.extend(
        authorization::validate_rules(
            tx,
            node,
            &this,
            AuthorizationOperation::Delete,
            ValidationPhase::Before,
        )?
        .into_clauses(),
    );

    let event = Variable::named("event");
    if tx.config.subscriptions_enabled {
        clauses.push(Clause::With(With::new(Projection::items(vec![
            ReturnItem::new(this.expr()),
            ReturnItem::aliased(event_map("delete", node, &this), &event),
        ]))));
    }
    clauses.push(Clause::Delete {
        detach: true,
        variables: vec![this.clone()],
    });
    if tx.config.subscriptions_enabled {
        clauses.push(Clause::Return(Projection::items(vec![ReturnItem::aliased(
            event.expr().collect(),
            &Variable::named("events"),
        )])));
    }
    Ok(Query::new(clauses))
}
