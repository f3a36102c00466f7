//! Compile-time coercion of client and callback literals against the declared
//! attribute kind. Failure messages match graphql-js scalar coercion.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Number, Value};

use super::errors::TranslateError;
use crate::cypher::{Expr, Variable};
use crate::schema_model::{Attribute, AttributeKind, ScalarKind};

lazy_static! {
    static ref DURATION: Regex = Regex::new(
        r"^-?P(\d+(\.\d+)?Y)?(\d+(\.\d+)?M)?(\d+(\.\d+)?W)?(\d+(\.\d+)?D)?(T(\d+(\.\d+)?H)?(\d+(\.\d+)?M)?(\d+(\.\d+)?S)?)?$"
    )
    .expect("duration pattern is valid");
    static ref TIME_OFFSET: Regex =
        Regex::new(r"(Z|[+-]\d{2}:?\d{2})$").expect("offset pattern is valid");
}

fn coercion_error(message: String) -> TranslateError {
    TranslateError::ValueCoercion(message)
}

/// Coerce a value for an attribute, element-wise when the attribute is a list.
pub fn coerce_attribute_value(
    attribute: &Attribute,
    value: &Value,
) -> Result<Value, TranslateError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Array(items) if attribute.is_list => items
            .iter()
            .map(|item| coerce_value(&attribute.kind, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => coerce_value(&attribute.kind, other),
    }
}

/// Coerce a list of values, each against the element kind.
pub fn coerce_list(kind: &AttributeKind, value: &Value) -> Result<Value, TranslateError> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| coerce_value(kind, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(coercion_error(format!(
            "[{}] cannot represent non-list value: {}",
            kind.type_name(),
            other
        ))),
    }
}

pub fn coerce_value(kind: &AttributeKind, value: &Value) -> Result<Value, TranslateError> {
    match kind {
        AttributeKind::Scalar(scalar) => coerce_scalar(*scalar, value),
        AttributeKind::Enum { name, values } => match value {
            Value::String(s) if values.iter().any(|v| v == s) => Ok(value.clone()),
            Value::String(s) => Err(coercion_error(format!(
                "Value \"{}\" does not exist in \"{}\" enum.",
                s, name
            ))),
            other => Err(coercion_error(format!(
                "Enum \"{}\" cannot represent non-string value: {}.",
                name, other
            ))),
        },
    }
}

pub fn coerce_scalar(kind: ScalarKind, value: &Value) -> Result<Value, TranslateError> {
    match kind {
        ScalarKind::Int => coerce_int(value),
        ScalarKind::BigInt => coerce_big_int(value),
        ScalarKind::Float => match value {
            Value::Number(_) => Ok(value.clone()),
            other => Err(coercion_error(format!(
                "Float cannot represent non numeric value: {}",
                other
            ))),
        },
        ScalarKind::String => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(coercion_error(format!(
                "String cannot represent a non string value: {}",
                other
            ))),
        },
        ScalarKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(coercion_error(format!(
                "Boolean cannot represent a non boolean value: {}",
                other
            ))),
        },
        ScalarKind::ID => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            other => Err(coercion_error(format!("ID cannot represent value: {}", other))),
        },
        ScalarKind::Point => coerce_point(kind, value, &["longitude", "latitude"], "height"),
        ScalarKind::CartesianPoint => coerce_point(kind, value, &["x", "y"], "z"),
        temporal => coerce_temporal(temporal, value),
    }
}

fn coerce_int(value: &Value) -> Result<Value, TranslateError> {
    let integer = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64),
        },
        _ => None,
    };
    match integer {
        Some(i) if i >= i32::MIN as i64 && i <= i32::MAX as i64 => {
            Ok(Value::Number(Number::from(i)))
        }
        Some(_) => Err(coercion_error(format!(
            "Int cannot represent non 32-bit signed integer value: {}",
            value
        ))),
        None => Err(coercion_error(format!(
            "Int cannot represent non-integer value: {}",
            value
        ))),
    }
}

fn coerce_big_int(value: &Value) -> Result<Value, TranslateError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    };
    parsed.map(|i| Value::Number(Number::from(i))).ok_or_else(|| {
        coercion_error(format!("BigInt cannot represent non-integer value: {}", value))
    })
}

fn coerce_point(
    kind: ScalarKind,
    value: &Value,
    required: &[&str],
    optional: &str,
) -> Result<Value, TranslateError> {
    let valid = match value {
        Value::Object(map) => {
            required.iter().all(|key| map.get(*key).is_some_and(Value::is_number))
                && map.get(optional).is_none_or(|v| v.is_number() || v.is_null())
                && map
                    .keys()
                    .all(|key| required.contains(&key.as_str()) || key == optional || key == "crs")
        }
        _ => false,
    };
    if valid {
        Ok(value.clone())
    } else {
        Err(coercion_error(format!("{} cannot represent value: {}", kind, value)))
    }
}

fn parse_time(s: &str) -> bool {
    let local = TIME_OFFSET.replace(s, "");
    parse_local_time(&local)
}

fn parse_local_time(s: &str) -> bool {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
        || NaiveTime::parse_from_str(s, "%H:%M").is_ok()
}

fn coerce_temporal(kind: ScalarKind, value: &Value) -> Result<Value, TranslateError> {
    let valid = match value {
        Value::String(s) => match kind {
            ScalarKind::DateTime => DateTime::parse_from_rfc3339(s).is_ok(),
            ScalarKind::LocalDateTime => {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
            }
            ScalarKind::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
            ScalarKind::Time => parse_time(s),
            ScalarKind::LocalTime => parse_local_time(s),
            ScalarKind::Duration => DURATION.is_match(s) && !s.ends_with('P') && !s.ends_with('T'),
            _ => false,
        },
        _ => false,
    };
    if valid {
        Ok(value.clone())
    } else {
        Err(coercion_error(format!("{} cannot represent value: {}", kind, value)))
    }
}

/// Parameter expression for an already coerced value, wrapped in the kind's
/// Cypher constructor (`datetime($param0)`, `[v IN $param0 | date(v)]`).
pub fn typed_param(kind: &AttributeKind, value: Value, is_list: bool) -> Expr {
    let param = Expr::param(value);
    match kind.scalar().and_then(|k| k.cypher_constructor()) {
        Some(constructor) if is_list => {
            let element = Variable::named("v");
            Expr::ListComprehension {
                list: Box::new(param),
                condition: None,
                projection: Some(Box::new(Expr::function(constructor, vec![element.expr()]))),
                variable: element,
            }
        }
        Some(constructor) => Expr::function(constructor, vec![param]),
        None => param,
    }
}
