//! Email address coercion

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::expect_str;
use crate::errors::CoercionError;

static DISPLAY_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>]+)>").expect("display name regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[^\s@<>()\[\],;:"]+@[^\s@<>()\[\],;:".]+(\.[^\s@<>()\[\],;:".]+)+$"#)
        .expect("email regex")
});

/// Lowercased bare address. Accepts `mailto:` links and `Name <addr>`.
pub fn coerce_email(value: &Value) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let raw = expect_str(value, "email")?;
    let mut email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Ok(Value::Null);
    }

    if let Some(rest) = email.strip_prefix("mailto:") {
        // mailto links may carry ?subject=... parameters
        email = rest.split('?').next().unwrap_or_default().to_string();
    }
    if let Some(addr) = DISPLAY_NAME_RE.captures(&email).and_then(|c| c.get(1)) {
        email = addr.as_str().to_string();
    }
    let email = email.trim().trim_end_matches('.');

    if EMAIL_RE.is_match(email) {
        Ok(Value::String(email.to_string()))
    } else {
        Err(CoercionError::InvalidEmail(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_and_mailto() {
        assert_eq!(coerce_email(&json!("Info@Example.COM")).unwrap(), json!("info@example.com"));
        assert_eq!(
            coerce_email(&json!("mailto:jobs@example.com?subject=Hi")).unwrap(),
            json!("jobs@example.com")
        );
    }

    #[test]
    fn test_display_name_and_trailing_dots() {
        assert_eq!(
            coerce_email(&json!("Jane Doe <Jane.Doe@example.co.uk>")).unwrap(),
            json!("jane.doe@example.co.uk")
        );
        assert_eq!(coerce_email(&json!("sales@example.com..")).unwrap(), json!("sales@example.com"));
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            coerce_email(&json!("user@localhost")),
            Err(CoercionError::InvalidEmail(_))
        ));
        assert!(coerce_email(&json!("not an email")).is_err());
        assert!(coerce_email(&json!("a@b@c.com")).is_err());
    }
}
