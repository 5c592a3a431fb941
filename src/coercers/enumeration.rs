//! Enum coercion against a declared set of variants

use serde_json::Value;

use crate::errors::{json_type_name, CoercionError};

/// Match case-insensitively after trimming; emit the declared casing.
pub fn coerce_enum(value: &Value, variants: &[String]) -> Result<Value, CoercionError> {
    let raw = match value {
        Value::Null => return Ok(Value::Null),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(CoercionError::UnexpectedType {
                expected: "enum",
                actual: json_type_name(other),
            })
        }
    };

    let needle = raw.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Value::Null);
    }

    variants
        .iter()
        .find(|v| v.trim().to_lowercase() == needle)
        .map(|v| Value::String(v.clone()))
        .ok_or_else(|| CoercionError::UnknownEnumVariant {
            value: raw.trim().to_string(),
            variants: variants.to_vec(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variants() -> Vec<String> {
        vec!["active".into(), "Inactive".into(), "pending".into()]
    }

    #[test]
    fn test_case_insensitive_match_uses_declared_casing() {
        assert_eq!(coerce_enum(&json!("PENDING"), &variants()).unwrap(), json!("pending"));
        assert_eq!(coerce_enum(&json!(" inactive "), &variants()).unwrap(), json!("Inactive"));
    }

    #[test]
    fn test_unknown_variant() {
        let err = coerce_enum(&json!("archived"), &variants()).unwrap_err();
        assert!(err.to_string().contains("archived"));
        assert!(err.to_string().contains("active, Inactive, pending"));
    }

    #[test]
    fn test_numeric_variants() {
        let sizes = vec!["1".to_string(), "2".to_string()];
        assert_eq!(coerce_enum(&json!(2), &sizes).unwrap(), json!("2"));
    }
}
