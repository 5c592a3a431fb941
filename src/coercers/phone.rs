//! Phone number coercion
//!
//! Numbers that parse as valid international numbers (default region: North
//! America) are emitted in international format. Anything else must match
//! one of the domestic/extension patterns and is kept as scraped.

use once_cell::sync::Lazy;
use phonenumber::country::Id;
use phonenumber::Mode;
use regex::Regex;
use serde_json::Value;

use crate::errors::{json_type_name, CoercionError};

const DEFAULT_REGION: Id = Id::US;

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:fax|tel|phone|number)\b\s*[:.]?\s*)+").expect("label regex")
});
static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?\d)\s*(?:ext\.?|extension|x|#)\s*(\d{1,6})$").expect("extension regex")
});
static DIALABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[\d\s().\-/]+$").expect("dialable regex"));

/// Domestic, short-code and extension shapes accepted verbatim
static DOMESTIC_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^\d{3,4}[-. ]?\d{4}$",
        r"(?i)^\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}(\s*(x|ext\.?|extension)\s*\d{1,6})?$",
        r"^\d{1,4}([-. ]\d{2,5}){1,5}$",
        r"^\(\d{1,5}\)\s?\d{2,5}([-. ]\d{2,5}){0,4}$",
        r"(?i)^(x|ext\.?|extension)\s*\d{1,6}$",
        r"^\d{3,6}$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("domestic phone regex"))
    .collect()
});

/// International format when valid, otherwise the scraped value if it has a
/// recognized domestic shape.
pub fn coerce_phone(value: &Value) -> Result<Value, CoercionError> {
    let raw = match value {
        Value::Null => return Ok(Value::Null),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(CoercionError::UnexpectedType {
                expected: "phone_number",
                actual: json_type_name(other),
            })
        }
    };

    let cleaned = LABEL_RE.replace(raw.trim(), "").trim().to_string();
    if cleaned.is_empty() {
        return Ok(Value::Null);
    }

    if let Some(formatted) = format_international(&cleaned) {
        return Ok(Value::String(formatted));
    }

    let domestic = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if DOMESTIC_PATTERNS.iter().any(|re| re.is_match(domestic)) {
        return Ok(Value::String(cleaned));
    }

    Err(CoercionError::InvalidPhone(raw))
}

/// International format (`+1 650-253-0000`, `+44 20 7946 0958`), with any
/// extension appended as ` ext. N`. Returns `None` unless the number is valid
/// for its country.
pub fn format_international(number: &str) -> Option<String> {
    let (main, extension) = match EXTENSION_RE.captures(number) {
        Some(caps) => (caps.get(1)?.as_str().trim(), caps.get(2).map(|m| m.as_str())),
        None => (number, None),
    };
    if !DIALABLE_RE.is_match(main) {
        return None;
    }

    // `00` is the international prefix outside North America
    let main = match main.strip_prefix("00") {
        Some(rest) => format!("+{}", rest),
        None => main.to_string(),
    };
    let parsed = phonenumber::parse(Some(DEFAULT_REGION), &main).ok()?;
    if !phonenumber::is_valid(&parsed) {
        return None;
    }
    let formatted = parsed.format().mode(Mode::International).to_string();

    Some(match extension {
        Some(ext) => format!("{} ext. {}", formatted, ext),
        None => formatted,
    })
}
