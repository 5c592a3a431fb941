//! Built-in expression functions
//!
//! The table is built once on first use and never mutated afterwards, so
//! every evaluator shares it.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use super::{Function, FunctionResult};
use crate::errors::ExpressionError;

pub(crate) static BUILTINS: Lazy<HashMap<&'static str, Function>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Function> = HashMap::new();
    table.insert("NOOP", Arc::new(noop));
    table.insert("CONCAT", Arc::new(concat));
    table.insert("CONCAT_WS", Arc::new(concat_ws));
    table.insert("COALESCE", Arc::new(coalesce));
    table.insert("SLUGIFY", Arc::new(slugify));
    table.insert("UPPER", Arc::new(upper));
    table.insert("LOWER", Arc::new(lower));
    table.insert("SUBSTRING_AFTER", Arc::new(substring_after));
    table
});

/// Names of all built-in functions, sorted
pub fn builtin_names() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTINS.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Identity; several arguments come back as a list
fn noop(args: &[Value]) -> FunctionResult {
    Ok(match args {
        [] => Value::Null,
        [single] => single.clone(),
        many => Value::Array(many.to_vec()),
    })
}

fn concat(args: &[Value]) -> FunctionResult {
    Ok(Value::String(flatten(args).iter().map(|v| to_text(v)).collect()))
}

fn concat_ws(args: &[Value]) -> FunctionResult {
    let (separator, rest) = args
        .split_first()
        .ok_or_else(|| ExpressionError::argument("CONCAT_WS", "missing separator"))?;
    let separator = match separator {
        Value::String(s) => s.as_str(),
        _ => return Err(ExpressionError::argument("CONCAT_WS", "separator must be a string")),
    };
    let parts: Vec<String> = flatten(rest).iter().map(|v| to_text(v)).collect();
    Ok(Value::String(parts.join(separator)))
}

fn coalesce(args: &[Value]) -> FunctionResult {
    Ok(args.iter().find(|v| is_truthy(v)).cloned().unwrap_or(Value::Null))
}

fn slugify(args: &[Value]) -> FunctionResult {
    let text: Vec<String> = flatten(args).iter().map(|v| to_text(v)).collect();
    let ascii: String = text
        .join(" ")
        .nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_ascii_lowercase();

    let mut slug = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    Ok(Value::String(slug.trim_end_matches('-').to_string()))
}

fn upper(args: &[Value]) -> FunctionResult {
    map_text("UPPER", args, |s| s.to_uppercase())
}

fn lower(args: &[Value]) -> FunctionResult {
    map_text("LOWER", args, |s| s.to_lowercase())
}

fn substring_after(args: &[Value]) -> FunctionResult {
    let [text, delimiter] = args else {
        return Err(ExpressionError::argument(
            "SUBSTRING_AFTER",
            format!("expected 2 arguments, got {}", args.len()),
        ));
    };
    if text.is_null() {
        return Ok(Value::Null);
    }
    let delimiter = to_text(delimiter);
    if delimiter.is_empty() {
        return Err(ExpressionError::argument("SUBSTRING_AFTER", "empty delimiter"));
    }
    let text = to_text(text);
    Ok(text
        .find(&delimiter)
        .map(|i| Value::String(text[i + delimiter.len()..].to_string()))
        .unwrap_or(Value::Null))
}

fn map_text(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> FunctionResult {
    match args {
        [Value::Null] => Ok(Value::Null),
        [value] => Ok(Value::String(f(&to_text(value)))),
        _ => Err(ExpressionError::argument(
            name,
            format!("expected 1 argument, got {}", args.len()),
        )),
    }
}

/// Nested lists flattened, nulls dropped
fn flatten(args: &[Value]) -> Vec<&Value> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Null => {}
            Value::Array(items) => out.extend(flatten(items)),
            other => out.push(other),
        }
    }
    out
}

pub(crate) fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_noop() {
        assert_eq!(noop(&[]).unwrap(), Value::Null);
        assert_eq!(noop(&[json!(1)]).unwrap(), json!(1));
        assert_eq!(noop(&[json!(1), json!("a")]).unwrap(), json!([1, "a"]));
    }

    #[test]
    fn test_concat_skips_nulls_and_flattens() {
        let out = concat(&[json!("a"), Value::Null, json!(["b", null, ["c"]]), json!(1)]).unwrap();
        assert_eq!(out, json!("abc1"));
    }

    #[test]
    fn test_concat_ws() {
        assert_eq!(
            concat_ws(&[json!(", "), json!("a"), Value::Null, json!("b")]).unwrap(),
            json!("a, b")
        );
        assert!(concat_ws(&[]).is_err());
        assert!(concat_ws(&[json!(1), json!("a")]).is_err());
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(coalesce(&[Value::Null, json!(""), json!("x")]).unwrap(), json!("x"));
        assert_eq!(coalesce(&[Value::Null, json!([])]).unwrap(), Value::Null);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify(&[json!("Crème Brûlée: Recipe #1!")]).unwrap(), json!("creme-brulee-recipe-1"));
        assert_eq!(slugify(&[json!("Acme"), json!("Widget 3000")]).unwrap(), json!("acme-widget-3000"));
    }

    #[test]
    fn test_upper_lower() {
        assert_eq!(upper(&[json!("abc")]).unwrap(), json!("ABC"));
        assert_eq!(lower(&[json!("ÀB")]).unwrap(), json!("àb"));
        assert_eq!(upper(&[Value::Null]).unwrap(), Value::Null);
        assert!(upper(&[json!("a"), json!("b")]).is_err());
    }

    #[test]
    fn test_substring_after() {
        assert_eq!(
            substring_after(&[json!("sku: 123-45"), json!(": ")]).unwrap(),
            json!("123-45")
        );
        assert_eq!(substring_after(&[json!("abc"), json!("z")]).unwrap(), Value::Null);
        assert!(matches!(
            substring_after(&[json!("abc"), json!("")]),
            Err(ExpressionError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_builtin_names() {
        assert!(builtin_names().contains(&"CONCAT_WS"));
        assert_eq!(builtin_names().len(), 8);
    }
}
