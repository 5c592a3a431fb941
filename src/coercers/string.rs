//! Plain string coercion

use serde_json::Value;

use super::expect_str;
use crate::errors::CoercionError;

/// Trimmed string, or null when nothing is left after trimming
pub fn coerce_string(value: &Value) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let trimmed = expect_str(value, "string")?.trim();
    if trimmed.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::String(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trims_and_nulls_empty() {
        assert_eq!(coerce_string(&json!("  Conf  ")).unwrap(), json!("Conf"));
        assert_eq!(coerce_string(&json!("   ")).unwrap(), Value::Null);
        assert_eq!(coerce_string(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_rejects_non_strings() {
        assert!(matches!(
            coerce_string(&json!(12)),
            Err(CoercionError::UnexpectedType { expected: "string", actual: "integer" })
        ));
    }
}
