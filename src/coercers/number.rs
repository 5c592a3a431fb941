//! Numeric and boolean coercion

use serde_json::Value;

use crate::errors::{json_type_name, CoercionError};

/// 64-bit float. Strings may carry thousands commas (`"1,250.5"`).
pub fn coerce_number(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) => n
            .as_f64()
            .map(Value::from)
            .ok_or_else(|| CoercionError::InvalidNumber(n.to_string())),
        Value::String(s) => {
            let cleaned = s.trim().replace(',', "");
            if cleaned.is_empty() {
                return Ok(Value::Null);
            }
            if cleaned.matches('.').count() > 1 {
                return Err(CoercionError::InvalidNumber(s.clone()));
            }
            match cleaned.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::from(f)),
                _ => Err(CoercionError::InvalidNumber(s.clone())),
            }
        }
        other => Err(CoercionError::UnexpectedType {
            expected: "number",
            actual: json_type_name(other),
        }),
    }
}

/// Integers pass through; whole floats and digit strings are converted.
pub fn coerce_integer(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                Ok(Value::from(f as i64))
            }
            _ => Err(CoercionError::InvalidNumber(n.to_string())),
        },
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(Value::Null);
            }
            let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
            digits
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| CoercionError::InvalidNumber(s.clone()))
        }
        other => Err(CoercionError::UnexpectedType {
            expected: "integer",
            actual: json_type_name(other),
        }),
    }
}

/// Booleans pass through; common truthy/falsy spellings are accepted.
pub fn coerce_boolean(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Null | Value::Bool(_) => Ok(value.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(CoercionError::InvalidBoolean(n.to_string())),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Value::Null),
            "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(CoercionError::InvalidBoolean(s.clone())),
        },
        other => Err(CoercionError::UnexpectedType {
            expected: "boolean",
            actual: json_type_name(other),
        }),
    }
}
