use serde_json::{json, Value};

use super::FilterOperator;
use crate::cypher::{CompareOp, Expr, Param, Predicate};
use crate::schema_model::{Attribute, ScalarKind};
use crate::translate::coercion::{
    coerce_attribute_value, coerce_list, coerce_scalar, coerce_value, typed_param,
};
use crate::translate::errors::TranslateError;

/// Predicate for a claim that resolved to nothing: compared with `=` against
/// a null parameter, which never holds.
pub(super) fn unmatchable(property: Expr) -> Predicate {
    Predicate::eq(property, Expr::param(Value::Null))
}

fn negate_if(negated: bool, predicate: Predicate) -> Predicate {
    if negated {
        Predicate::not(predicate)
    } else {
        predicate
    }
}

fn unsupported(attribute: &Attribute, op: FilterOperator) -> TranslateError {
    TranslateError::unsupported_filter(format!(
        "{:?} is not supported on {} field '{}'",
        op,
        attribute.kind.type_name(),
        attribute.name
    ))
}

pub(super) fn compile_property(
    attribute: &Attribute,
    op: FilterOperator,
    value: &Value,
    property: Expr,
) -> Result<Predicate, TranslateError> {
    use FilterOperator as Op;

    if value.is_null() {
        return match op {
            Op::Eq => Ok(Predicate::IsNull(property)),
            Op::Not => Ok(Predicate::IsNotNull(property)),
            other => Err(unsupported(attribute, other)),
        };
    }

    let kind = &attribute.kind;
    let scalar = attribute.scalar();
    let textual = scalar.is_some_and(|k| k.is_textual());
    let spatial = scalar.filter(|k| k.is_spatial());

    match op {
        Op::Eq | Op::Not => {
            let value = coerce_attribute_value(attribute, value)?;
            let predicate = Predicate::eq(property, typed_param(kind, value, attribute.is_list));
            Ok(negate_if(op == Op::Not, predicate))
        }
        Op::In | Op::NotIn => {
            let value = coerce_list(kind, value)?;
            let predicate =
                Predicate::compare(CompareOp::In, property, typed_param(kind, value, true));
            Ok(negate_if(op == Op::NotIn, predicate))
        }
        Op::Includes | Op::NotIncludes => {
            if !attribute.is_list {
                return Err(unsupported(attribute, op));
            }
            let value = coerce_value(kind, value)?;
            let predicate =
                Predicate::compare(CompareOp::In, typed_param(kind, value, false), property);
            Ok(negate_if(op == Op::NotIncludes, predicate))
        }
        Op::Lt | Op::Lte | Op::Gt | Op::Gte => {
            let cmp = match op {
                Op::Lt => CompareOp::Lt,
                Op::Lte => CompareOp::Lte,
                Op::Gt => CompareOp::Gt,
                _ => CompareOp::Gte,
            };
            if let Some(spatial) = spatial {
                return compile_distance(spatial, cmp, value, property);
            }
            match scalar {
                Some(ScalarKind::Boolean) | None => Err(unsupported(attribute, op)),
                Some(_) => {
                    let value = coerce_value(kind, value)?;
                    Ok(Predicate::compare(cmp, property, typed_param(kind, value, false)))
                }
            }
        }
        Op::Distance => match spatial {
            Some(spatial) => compile_distance(spatial, CompareOp::Eq, value, property),
            None => Err(unsupported(attribute, op)),
        },
        Op::Contains
        | Op::NotContains
        | Op::StartsWith
        | Op::NotStartsWith
        | Op::EndsWith
        | Op::NotEndsWith => {
            if !textual || attribute.is_list {
                return Err(unsupported(attribute, op));
            }
            let cmp = match op {
                Op::Contains | Op::NotContains => CompareOp::Contains,
                Op::StartsWith | Op::NotStartsWith => CompareOp::StartsWith,
                _ => CompareOp::EndsWith,
            };
            let value = coerce_value(kind, value)?;
            let predicate = Predicate::compare(cmp, property, Expr::param(value));
            let negated = matches!(op, Op::NotContains | Op::NotStartsWith | Op::NotEndsWith);
            Ok(negate_if(negated, predicate))
        }
        Op::Matches => {
            if !textual || attribute.is_list {
                return Err(unsupported(attribute, op));
            }
            // Patterns use the database's (Java) regex dialect and are checked there
            let pattern = coerce_value(kind, value)?;
            Ok(Predicate::compare(CompareOp::Matches, property, Expr::param(pattern)))
        }
        Op::Some | Op::All | Op::None | Op::Single => Err(unsupported(attribute, op)),
    }
}

/// `point.distance(property, point($p.point)) <op> $p.distance`
fn compile_distance(
    kind: ScalarKind,
    cmp: CompareOp,
    value: &Value,
    property: Expr,
) -> Result<Predicate, TranslateError> {
    let object = value.as_object().ok_or_else(|| {
        TranslateError::ValueCoercion(format!("{}Distance cannot represent value: {}", kind, value))
    })?;
    let point = object.get("point").cloned().unwrap_or(Value::Null);
    let point = coerce_scalar(kind, &point)?;
    let distance = match object.get("distance") {
        Some(Value::Number(n)) => n.clone(),
        other => {
            return Err(TranslateError::ValueCoercion(format!(
                "Float cannot represent non numeric value: {}",
                other.cloned().unwrap_or(Value::Null)
            )))
        }
    };

    let param = Param::new(json!({ "point": point, "distance": distance }));
    let distance_fn = Expr::function(
        "point.distance",
        vec![
            property,
            Expr::function("point", vec![param.expr().property("point")]),
        ],
    );
    Ok(Predicate::compare(cmp, distance_fn, param.expr().property("distance")))
}
