//! URL coercion

use serde_json::Value;

use super::expect_str;
use crate::errors::{CoercionError, UrlError};
use crate::url_normalizer::{has_tld, normalize_url, scheme_of};

/// Normalize against the record's base URL; the result must be absolute
/// and carry a TLD.
pub fn coerce_url(value: &Value, base_url: Option<&str>) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let raw = expect_str(value, "url")?.trim();
    if raw.is_empty() {
        return Ok(Value::Null);
    }

    let normalized = normalize_url(raw, base_url)?;
    if scheme_of(&normalized).is_none() {
        return Err(UrlError::NotAbsolute(normalized).into());
    }
    if !has_tld(&normalized) {
        return Err(UrlError::MissingTld(normalized).into());
    }
    Ok(Value::String(normalized))
}
