//! `<rel>Aggregate` filters.
//!
//! Each relationship field gets one `CALL` per filter scope; identical
//! aggregate expressions share a result variable, so every aggregate is
//! computed once however often the predicate tree references it.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::{expect_object, FilterCompiler};
use crate::cypher::{
    Clause, CompareOp, Expr, Match, Pattern, Predicate, Projection, Query, ReturnItem, Variable,
};
use crate::schema_model::{Attribute, EntityRef, FieldSource, Relationship, ScalarKind};
use crate::translate::coercion::{coerce_scalar, coerce_value, typed_param};
use crate::translate::errors::TranslateError;
use crate::translate::planner;

lazy_static! {
    static ref COUNT_KEY: Regex =
        Regex::new(r"^count(?:_(?P<cmp>EQ|LT|LTE|GT|GTE))?$").expect("count pattern is valid");
    static ref FIELD_AGGREGATE_KEY: Regex = Regex::new(
        r"^(?P<field>.+?)_(?P<agg>MIN|MAX|SUM|AVERAGE|SHORTEST_LENGTH|LONGEST_LENGTH|AVERAGE_LENGTH)_(?P<cmp>EQUAL|GT|GTE|LT|LTE)$"
    )
    .expect("aggregate pattern is valid");
}

/// Aggregates over one relationship field for one parent variable.
#[derive(Debug)]
pub(super) struct AggregateScope {
    parent: Variable,
    field: String,
    pattern: Pattern,
    label_check: Option<Predicate>,
    target: Variable,
    edge: Variable,
    items: Vec<(Expr, Variable)>,
}

impl AggregateScope {
    fn variable_for(&mut self, expr: Expr) -> Variable {
        if let Some((_, variable)) = self.items.iter().find(|(existing, _)| *existing == expr) {
            return variable.clone();
        }
        let variable = Variable::value();
        self.items.push((expr, variable.clone()));
        variable
    }

    /// `CALL { WITH parent MATCH ... RETURN agg AS varN, ... }`
    pub(super) fn into_call(self) -> Clause {
        let returns = self
            .items
            .into_iter()
            .map(|(expr, variable)| ReturnItem::aliased(expr, &variable))
            .collect();
        let body = Query::new(vec![
            Clause::Match(Match::new(self.pattern).filter(self.label_check)),
            Clause::Return(Projection::items(returns)),
        ]);
        Clause::call(&[&self.parent], body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggregateSide {
    Node,
    Edge,
}

fn comparison(cmp: Option<&str>) -> CompareOp {
    match cmp {
        Some("LT") => CompareOp::Lt,
        Some("LTE") => CompareOp::Lte,
        Some("GT") => CompareOp::Gt,
        Some("GTE") => CompareOp::Gte,
        _ => CompareOp::Eq,
    }
}

impl<'t, 'a> FilterCompiler<'t, 'a> {
    pub(super) fn compile_aggregate(
        &mut self,
        rel: &'a Relationship,
        value: &Value,
        parent: &Variable,
    ) -> Result<Option<Predicate>, TranslateError> {
        let filter = expect_object(&rel.aggregate_field_name(), value)?;
        let scope = self.aggregate_scope(rel, parent)?;
        self.compile_aggregate_object(rel, scope, filter)
    }

    fn aggregate_scope(
        &mut self,
        rel: &Relationship,
        parent: &Variable,
    ) -> Result<usize, TranslateError> {
        if let Some(index) = self
            .aggregates
            .iter()
            .position(|s| s.parent == *parent && s.field == rel.field_name)
        {
            return Ok(index);
        }

        let target_var = Variable::node();
        let edge_var = Variable::relationship();
        let (labels, label_check) = match self.tx.entity(&rel.target)? {
            EntityRef::Node(node) => (node.labels.clone(), None),
            EntityRef::Composite(composite) => {
                let checks = self
                    .tx
                    .model
                    .concrete_nodes(&composite.name)
                    .into_iter()
                    .map(|node| Predicate::HasLabels {
                        variable: target_var.clone(),
                        labels: node.labels.clone(),
                    });
                (Vec::new(), Some(Predicate::or(checks)))
            }
        };
        let pattern =
            planner::relationship_pattern(parent, rel, Some(&edge_var), &target_var, &labels);
        self.aggregates.push(AggregateScope {
            parent: parent.clone(),
            field: rel.field_name.clone(),
            pattern,
            label_check,
            target: target_var,
            edge: edge_var,
            items: Vec::new(),
        });
        Ok(self.aggregates.len() - 1)
    }

    fn compile_aggregate_object(
        &mut self,
        rel: &'a Relationship,
        scope: usize,
        filter: &Map<String, Value>,
    ) -> Result<Option<Predicate>, TranslateError> {
        let mut predicates = Vec::new();
        for (key, value) in filter {
            let predicate = match key.as_str() {
                "AND" | "OR" => {
                    let items = value.as_array().ok_or_else(|| {
                        TranslateError::unsupported_filter(format!("{} expects a list", key))
                    })?;
                    let mut operands = Vec::new();
                    for item in items {
                        let operand =
                            self.compile_aggregate_object(rel, scope, expect_object(key, item)?)?;
                        operands.push(operand.unwrap_or(Predicate::Literal(true)));
                    }
                    if key == "AND" {
                        Predicate::and(operands)
                    } else {
                        Predicate::or(operands)
                    }
                }
                "NOT" => match self.compile_aggregate_object(rel, scope, expect_object(key, value)?)? {
                    Some(inner) => Predicate::not(inner),
                    None => continue,
                },
                "node" => self.compile_field_aggregates(rel, scope, AggregateSide::Node, expect_object(key, value)?)?,
                "edge" => self.compile_field_aggregates(rel, scope, AggregateSide::Edge, expect_object(key, value)?)?,
                other => {
                    let captures = COUNT_KEY
                        .captures(other)
                        .ok_or_else(|| {
                            TranslateError::unknown_field(&rel.aggregate_field_name(), other)
                        })?;
                    let cmp = comparison(captures.name("cmp").map(|m| m.as_str()));
                    let count = coerce_scalar(ScalarKind::Int, value)?;
                    let target = self.aggregates[scope].target.expr().count();
                    let variable = self.aggregates[scope].variable_for(target);
                    Predicate::compare(cmp, variable.expr(), Expr::param(count))
                }
            };
            predicates.push(predicate);
        }
        Ok(Predicate::and_opt(predicates.into_iter().map(Some)))
    }

    fn compile_field_aggregates(
        &mut self,
        rel: &'a Relationship,
        scope: usize,
        side: AggregateSide,
        filter: &Map<String, Value>,
    ) -> Result<Predicate, TranslateError> {
        let source: &dyn FieldSource = match side {
            AggregateSide::Node => self.tx.entity(&rel.target)?.as_field_source(),
            AggregateSide::Edge => self
                .tx
                .model
                .edge_properties(rel)
                .map(|p| p as &dyn FieldSource)
                .ok_or_else(|| TranslateError::unknown_field(&rel.aggregate_field_name(), "edge"))?,
        };

        let mut predicates = Vec::new();
        for (key, value) in filter {
            let captures = FIELD_AGGREGATE_KEY
                .captures(key)
                .ok_or_else(|| TranslateError::unknown_field(source.type_name(), key))?;
            let field = captures.name("field").map_or("", |m| m.as_str());
            let aggregation = captures.name("agg").map_or("", |m| m.as_str());
            let attribute = source
                .attribute(field)
                .ok_or_else(|| TranslateError::unknown_field(source.type_name(), field))?;

            let owner = match side {
                AggregateSide::Node => &self.aggregates[scope].target,
                AggregateSide::Edge => &self.aggregates[scope].edge,
            };
            let property = owner.property(&attribute.database_name);
            let (expr, rhs) = aggregate_comparison(attribute, aggregation, property, value)?;
            let variable = self.aggregates[scope].variable_for(expr);
            let cmp = match captures.name("cmp").map(|m| m.as_str()) {
                Some("EQUAL") | None => CompareOp::Eq,
                other => comparison(other),
            };
            predicates.push(Predicate::compare(cmp, variable.expr(), rhs));
        }
        Ok(Predicate::and(predicates))
    }
}

/// Aggregate expression over `property` and the coerced right-hand side.
fn aggregate_comparison(
    attribute: &Attribute,
    aggregation: &str,
    property: Expr,
    value: &Value,
) -> Result<(Expr, Expr), TranslateError> {
    let scalar = attribute.scalar();
    let textual = scalar.is_some_and(|k| k.is_textual());
    let ordered = scalar.is_some_and(|k| k.is_numeric() || k.is_temporal());
    let numeric = scalar.is_some_and(|k| k.is_numeric());

    let unsupported = || {
        TranslateError::unsupported_filter(format!(
            "{} aggregation is not supported on {} field '{}'",
            aggregation,
            attribute.kind.type_name(),
            attribute.name
        ))
    };

    let (function, argument, rhs) = match aggregation {
        "SHORTEST_LENGTH" | "LONGEST_LENGTH" | "AVERAGE_LENGTH" if textual => {
            let function = match aggregation {
                "SHORTEST_LENGTH" => "min",
                "LONGEST_LENGTH" => "max",
                _ => "avg",
            };
            let kind = if function == "avg" { ScalarKind::Float } else { ScalarKind::Int };
            (function, property.size(), Expr::param(coerce_scalar(kind, value)?))
        }
        "MIN" | "MAX" if ordered => {
            let function = if aggregation == "MIN" { "min" } else { "max" };
            let coerced = coerce_value(&attribute.kind, value)?;
            (function, property, typed_param(&attribute.kind, coerced, false))
        }
        "SUM" if numeric => {
            let coerced = coerce_value(&attribute.kind, value)?;
            ("sum", property, Expr::param(coerced))
        }
        "AVERAGE" if numeric => ("avg", property, Expr::param(coerce_scalar(ScalarKind::Float, value)?)),
        _ => return Err(unsupported()),
    };
    Ok((Expr::function(function, vec![argument]), rhs))
}
