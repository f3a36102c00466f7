//! Authorization-predicate injection.
//!
//! `filter` rules narrow the match silently and are OR-ed together; `validate`
//! rules are AND-ed and asserted with `apoc.util.validatePredicate`. Claim
//! tokens (`$jwt.<path>`, `$context.<path>`) are substituted at compile time
//! and `jwt` conditions are evaluated here against the decoded claims, so
//! JWT-only conditions fold to constants.

use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::errors::TranslateError;
use super::filter::{parse_filter_key, CompiledFilter, FilterCompiler, FilterOperator, FilterTarget};
use super::Translation;
use crate::cypher::{Expr, Predicate, Variable};
use crate::schema_model::{AuthorizationOperation, AuthorizationWhere, Node, ValidationPhase};

const JWT_PREFIX: &str = "$jwt.";
const CONTEXT_PREFIX: &str = "$context.";

/// Outcome of claim substitution for one value.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Resolved(Value),
    /// The referenced claim or context path does not exist
    Missing,
}

fn lookup_path<'v>(root: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Value of a decoded claim, honouring configured claim aliases.
pub fn claim(tx: &Translation<'_>, path: &str) -> Option<Value> {
    let jwt = tx.request.jwt.as_ref()?;
    lookup_path(jwt, tx.config.claim_path(path)).cloned()
}

/// Substitute claim tokens in a rule value. Tokens inside lists resolve
/// element-wise, missing elements becoming null.
pub fn resolve_claim_value(tx: &Translation<'_>, value: &Value) -> ClaimValue {
    match value {
        Value::String(token) => {
            if let Some(path) = token.strip_prefix(JWT_PREFIX) {
                claim(tx, path).map_or(ClaimValue::Missing, ClaimValue::Resolved)
            } else if let Some(path) = token.strip_prefix(CONTEXT_PREFIX) {
                lookup_path(&tx.request.context, path)
                    .cloned()
                    .map_or(ClaimValue::Missing, ClaimValue::Resolved)
            } else {
                ClaimValue::Resolved(value.clone())
            }
        }
        Value::Array(items) => ClaimValue::Resolved(Value::Array(
            items
                .iter()
                .map(|item| match resolve_claim_value(tx, item) {
                    ClaimValue::Resolved(v) => v,
                    ClaimValue::Missing => Value::Null,
                })
                .collect(),
        )),
        other => ClaimValue::Resolved(other.clone()),
    }
}

/// Evaluate a `jwt` condition against the decoded claims.
pub fn evaluate_jwt(tx: &Translation<'_>, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| match key.as_str() {
        "AND" => expected.as_array().is_some_and(|items| {
            items
                .iter()
                .all(|i| i.as_object().is_some_and(|m| evaluate_jwt(tx, m)))
        }),
        "OR" => expected
            .as_array()
            .is_some_and(|items| {
                items
                    .iter()
                    .any(|i| i.as_object().is_some_and(|m| evaluate_jwt(tx, m)))
            }),
        "NOT" => expected.as_object().is_some_and(|m| !evaluate_jwt(tx, m)),
        _ => {
            let (field, op) = parse_filter_key(key);
            match resolve_claim_value(tx, expected) {
                ClaimValue::Resolved(expected) => {
                    evaluate_claim(op, claim(tx, field).as_ref(), &expected)
                }
                ClaimValue::Missing => false,
            }
        }
    })
}

fn compare_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn evaluate_claim(op: FilterOperator, actual: Option<&Value>, expected: &Value) -> bool {
    use FilterOperator as Op;

    let Some(actual) = actual.filter(|v| !v.is_null()) else {
        return match op {
            Op::Eq => expected.is_null(),
            Op::Not => !expected.is_null(),
            _ => false,
        };
    };
    let text = |f: fn(&str, &str) -> bool| match (actual.as_str(), expected.as_str()) {
        (Some(a), Some(e)) => f(a, e),
        _ => false,
    };

    match op {
        Op::Eq => actual == expected,
        Op::Not => actual != expected,
        Op::In => expected.as_array().is_some_and(|list| list.contains(actual)),
        Op::NotIn => expected.as_array().is_some_and(|list| !list.contains(actual)),
        Op::Includes => actual.as_array().is_some_and(|list| list.contains(expected)),
        Op::NotIncludes => actual.as_array().is_some_and(|list| !list.contains(expected)),
        Op::Lt => compare_values(actual, expected) == Some(Ordering::Less),
        Op::Lte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Op::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
        Op::Gte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Op::Contains => text(|a, e| a.contains(e)),
        Op::NotContains => text(|a, e| !a.contains(e)),
        Op::StartsWith => text(|a, e| a.starts_with(e)),
        Op::NotStartsWith => text(|a, e| !a.starts_with(e)),
        Op::EndsWith => text(|a, e| a.ends_with(e)),
        Op::NotEndsWith => text(|a, e| !a.ends_with(e)),
        Op::Matches => text(|a, e| Regex::new(e).is_ok_and(|re| re.is_match(a))),
        Op::Distance | Op::Some | Op::All | Op::None | Op::Single => false,
    }
}

fn compile_condition<'a>(
    compiler: &mut FilterCompiler<'_, 'a>,
    tx: &Translation<'a>,
    condition: &AuthorizationWhere,
    variable: &Variable,
    node: &'a Node,
) -> Result<Option<Predicate>, TranslateError> {
    let mut parts = Vec::new();
    if let Some(filter) = &condition.node {
        parts.extend(compiler.compile(filter, variable, FilterTarget::Node(node))?);
    }
    if let Some(jwt) = &condition.jwt {
        parts.push(Predicate::Literal(evaluate_jwt(tx, jwt)));
    }
    if let Some(all) = &condition.and {
        let mut operands = Vec::new();
        for nested in all {
            operands.push(
                compile_condition(compiler, tx, nested, variable, node)?
                    .unwrap_or(Predicate::Literal(true)),
            );
        }
        parts.push(Predicate::and(operands));
    }
    if let Some(any) = &condition.or {
        let mut operands = Vec::new();
        for nested in any {
            operands.push(
                compile_condition(compiler, tx, nested, variable, node)?
                    .unwrap_or(Predicate::Literal(true)),
            );
        }
        parts.push(Predicate::or(operands));
    }
    if let Some(negated) = &condition.not {
        parts.extend(compile_condition(compiler, tx, negated, variable, node)?.map(Predicate::not));
    }
    Ok(Predicate::and_opt(parts.into_iter().map(Some)))
}

/// `@authentication`: fail with `Unauthenticated` unless the request carries
/// claims satisfying the rule.
pub fn check_authentication(
    tx: &Translation<'_>,
    node: &Node,
    operation: AuthorizationOperation,
) -> Result<(), TranslateError> {
    if !tx.config.authorization_enabled {
        return Ok(());
    }
    let Some(rule) = &node.authentication else {
        return Ok(());
    };
    if !rule.operations.contains(&operation) {
        return Ok(());
    }
    if !tx.request.is_authenticated() {
        log::debug!("{:?} on {} requires authentication", operation, node.name);
        return Err(TranslateError::Unauthenticated);
    }
    match &rule.jwt {
        Some(jwt) if !evaluate_jwt(tx, jwt) => Err(TranslateError::Unauthenticated),
        _ => Ok(()),
    }
}

/// Filter rules for `operation`, OR-ed. Rules requiring authentication on an
/// anonymous request contribute nothing; if no rule can match the result
/// is `false`.
pub fn filter_rules<'a>(
    tx: &Translation<'a>,
    node: &'a Node,
    variable: &Variable,
    operation: AuthorizationOperation,
) -> Result<CompiledFilter, TranslateError> {
    if !tx.config.authorization_enabled {
        return Ok(CompiledFilter::default());
    }
    let Some(authorization) = &node.authorization else {
        return Ok(CompiledFilter::default());
    };
    let rules = authorization.filter_rules(operation);
    if rules.is_empty() {
        return Ok(CompiledFilter::default());
    }

    let mut compiler = FilterCompiler::with_claims(tx);
    let mut allowed = Vec::new();
    for rule in rules {
        if rule.require_authentication && !tx.request.is_authenticated() {
            allowed.push(Predicate::Literal(false));
            continue;
        }
        let predicate = compile_condition(&mut compiler, tx, &rule.condition, variable, node)?;
        allowed.push(predicate.unwrap_or(Predicate::Literal(true)));
    }

    let predicate = match Predicate::or(allowed) {
        Predicate::Literal(true) => None,
        other => Some(other),
    };
    log::debug!(
        "Authorization filter for {:?} on {}: {}",
        operation,
        node.name,
        if predicate.is_some() { "applied" } else { "unrestricted" }
    );
    Ok(compiler.finish(predicate))
}

/// Validate rules for `operation` in `phase`, AND-ed and wrapped as
/// `apoc.util.validatePredicate(NOT (p), "Forbidden", [0])`. A rule that
/// fails on claims alone becomes `validatePredicate(true, ...)`.
pub fn validate_rules<'a>(
    tx: &Translation<'a>,
    node: &'a Node,
    variable: &Variable,
    operation: AuthorizationOperation,
    phase: ValidationPhase,
) -> Result<CompiledFilter, TranslateError> {
    if !tx.config.authorization_enabled {
        return Ok(CompiledFilter::default());
    }
    let Some(authorization) = &node.authorization else {
        return Ok(CompiledFilter::default());
    };

    let mut compiler = FilterCompiler::with_claims(tx);
    let mut required = Vec::new();
    for rule in authorization.validate_rules(operation, phase) {
        if rule.require_authentication && !tx.request.is_authenticated() {
            return Err(TranslateError::Unauthenticated);
        }
        match compile_condition(&mut compiler, tx, &rule.condition, variable, node)? {
            None | Some(Predicate::Literal(true)) => {}
            Some(predicate) => {
                if predicate == Predicate::Literal(false) {
                    // Still asserted per row: no matched row, no failure
                    log::debug!("Validate rule on {} fails on claims alone", node.name);
                }
                required.push(predicate);
            }
        }
    }

    if required.is_empty() {
        return Ok(compiler.finish(None));
    }
    Ok(compiler.finish(Some(assert_predicate(Predicate::and(required)))))
}

/// `apoc.util.validatePredicate(NOT (p), "Forbidden", [0])`
pub fn assert_predicate(predicate: Predicate) -> Predicate {
    Predicate::Expr(Expr::function(
        "apoc.util.validatePredicate",
        vec![
            Expr::predicate(Predicate::not(predicate)),
            Expr::literal("Forbidden"),
            Expr::List(vec![Expr::literal(0)]),
        ],
    ))
}
