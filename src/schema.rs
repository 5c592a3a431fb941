//! Schema documents and the compiled validator tree
//!
//! A schema is a map of field name to field definition:
//!
//! ```json
//! {
//!   "$pk": "CONCAT(sku, '-', region)",
//!   "__config__": {"extra": "ignore"},
//!   "title": {"type": "string", "required": true},
//!   "offers": {"type": "array", "items": {"type": "object", "properties": {
//!       "price": {"type": "price"}
//!   }}}
//! }
//! ```
//!
//! `compile_schema` turns it into a tree of `FieldValidator`s once; records
//! are then validated by walking that tree.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::SchemaError;
use crate::expression::Expression;
use crate::reserved::NameTable;

/// Key of the per-scope configuration object
pub const CONFIG_KEY: &str = "__config__";
/// Key of the primary key expression
pub const PRIMARY_KEY: &str = "$pk";
/// Older spelling of `$pk`, accepted on input
pub const LEGACY_PRIMARY_KEY: &str = "$primary_key";
/// Schema identifier, ignored
pub const SCHEMA_ID_KEY: &str = "$schema";

/// What to do with record keys the schema does not declare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraPolicy {
    #[default]
    Forbid,
    Allow,
    Ignore,
}

/// Effective configuration of one object scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeConfig {
    pub extra: ExtraPolicy,
    pub strip_whitespace: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            extra: ExtraPolicy::Forbid,
            strip_whitespace: true,
        }
    }
}

/// A `__config__` object; unset options inherit from the enclosing scope
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverride {
    #[serde(default)]
    extra: Option<ExtraPolicy>,
    #[serde(default)]
    strip_whitespace: Option<bool>,
}

impl ScopeConfig {
    fn with_override(self, raw: Option<&Value>, path: &str) -> Result<Self, SchemaError> {
        let Some(raw) = raw else {
            return Ok(self);
        };
        let o: ConfigOverride =
            serde_json::from_value(raw.clone()).map_err(|e| SchemaError::InvalidConfig {
                path: crate::errors::display_path(path),
                reason: e.to_string(),
            })?;
        Ok(Self {
            extra: o.extra.unwrap_or(self.extra),
            strip_whitespace: o.strip_whitespace.unwrap_or(self.strip_whitespace),
        })
    }
}

/// Semantic type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Integer,
    Email,
    Url,
    Datetime,
    Phone,
    Price,
    /// Legacy amount-only price
    Currency,
    Enum { variants: Vec<String> },
    Array { items: Box<FieldValidator> },
    Object(ObjectValidator),
}

impl FieldType {
    /// Canonical schema name of the type
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Datetime => "datetime",
            FieldType::Phone => "phone_number",
            FieldType::Price => "price",
            FieldType::Currency => "currency",
            FieldType::Enum { .. } => "enum",
            FieldType::Array { .. } => "array",
            FieldType::Object(_) => "object",
        }
    }
}

/// An expression kept alongside its source text
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedExpression {
    pub source: String,
    pub parsed: Expression,
}

impl ComputedExpression {
    fn compile(source: &str, path: &str) -> Result<Self, SchemaError> {
        let parsed = Expression::parse(source).map_err(|e| SchemaError::Expression {
            path: path.to_string(),
            source: e,
        })?;
        Ok(Self {
            source: source.to_string(),
            parsed,
        })
    }
}

/// One compiled field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValidator {
    /// Name as declared in the schema and emitted in records
    pub name: String,
    /// Key used while the record is being processed
    pub key: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: Option<String>,
    pub expression: Option<ComputedExpression>,
}

impl FieldValidator {
    pub fn is_computed(&self) -> bool {
        self.expression.is_some()
    }

    /// The object scope of this field, or of its array items
    pub fn nested_object(&self) -> Option<&ObjectValidator> {
        match &self.field_type {
            FieldType::Object(obj) => Some(obj),
            FieldType::Array { items } => items.nested_object(),
            _ => None,
        }
    }
}

/// A compiled object scope: its fields in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValidator {
    pub fields: Vec<FieldValidator>,
    pub config: ScopeConfig,
    pub names: NameTable,
}

impl ObjectValidator {
    /// Field by internal key
    pub fn field(&self, key: &str) -> Option<&FieldValidator> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Required paths below this scope, dotted, using declared names
    pub fn required_paths(&self, prefix: &str) -> Vec<String> {
        let mut paths = Vec::new();
        for field in &self.fields {
            let path = join_path(prefix, &field.name);
            if field.required {
                paths.push(path.clone());
            }
            if let Some(nested) = field.nested_object() {
                paths.extend(nested.required_paths(&path));
            }
        }
        paths
    }
}

/// A compiled schema
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    pub root: ObjectValidator,
    pub primary_key: Option<ComputedExpression>,
}

/// Compile a schema document.
pub fn compile_schema(schema: &Value) -> Result<CompiledSchema, SchemaError> {
    let doc = schema
        .as_object()
        .ok_or_else(|| SchemaError::invalid("", "schema must be an object"))?;

    let primary_key = match doc.get(PRIMARY_KEY).or_else(|| doc.get(LEGACY_PRIMARY_KEY)) {
        None | Some(Value::Null) => None,
        Some(Value::String(source)) => Some(ComputedExpression::compile(source, PRIMARY_KEY)?),
        Some(_) => return Err(SchemaError::invalid(PRIMARY_KEY, "must be an expression string")),
    };

    let config = ScopeConfig::default().with_override(doc.get(CONFIG_KEY), "")?;

    // `{type: object, properties: {...}}` at the top level
    let root = match (doc.get("type").and_then(Value::as_str), doc.get("properties")) {
        (Some(t), Some(Value::Object(properties))) if t.eq_ignore_ascii_case("object") => {
            compile_object(properties, config, "")?
        }
        _ => compile_object(doc, config, "")?,
    };

    debug!(
        fields = root.fields.len(),
        required = root.required_paths("").len(),
        primary_key = primary_key.is_some(),
        "compiled schema"
    );
    Ok(CompiledSchema { root, primary_key })
}

fn compile_object(
    properties: &Map<String, Value>,
    inherited: ScopeConfig,
    path: &str,
) -> Result<ObjectValidator, SchemaError> {
    let config = inherited.with_override(properties.get(CONFIG_KEY), path)?;

    let mut fields = Vec::new();
    for (name, node) in properties {
        if is_schema_key(name) {
            continue;
        }
        let field_path = join_path(path, name);
        fields.push(compile_field(name, node, config, &field_path)?);
    }

    let names = NameTable::new(fields.iter().map(|f| f.name.as_str()));
    for field in &mut fields {
        field.key = names.internal(&field.name).to_string();
    }

    Ok(ObjectValidator {
        fields,
        config,
        names,
    })
}

fn compile_field(
    name: &str,
    node: &Value,
    config: ScopeConfig,
    path: &str,
) -> Result<FieldValidator, SchemaError> {
    // Shorthand: "title": "string"
    if let Value::String(type_name) = node {
        let field_type = simple_type(type_name, path)?;
        return Ok(FieldValidator {
            name: name.to_string(),
            key: name.to_string(),
            field_type,
            required: false,
            description: None,
            expression: None,
        });
    }

    let node = node
        .as_object()
        .ok_or_else(|| SchemaError::invalid(path, "field definition must be an object or a type name"))?;

    let type_name = match node.get("type") {
        Some(Value::String(t)) => t.as_str(),
        Some(_) => return Err(SchemaError::invalid(path, "'type' must be a string")),
        None => return Err(SchemaError::invalid(path, "missing 'type'")),
    };

    let required = match node.get("required") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(SchemaError::invalid(path, "'required' must be a boolean")),
    };

    let description = node
        .get("description")
        .and_then(Value::as_str)
        .map(String::from);

    let expression = match node.get("expression") {
        None | Some(Value::Null) => None,
        Some(Value::String(source)) => Some(ComputedExpression::compile(source, path)?),
        Some(_) => return Err(SchemaError::invalid(path, "'expression' must be a string")),
    };

    let scope = config.with_override(node.get(CONFIG_KEY), path)?;

    let field_type = match canonical_type(type_name) {
        Some("enum") => FieldType::Enum {
            variants: parse_variants(node.get("variants"), path)?,
        },
        Some("array") => {
            let items = node
                .get("items")
                .ok_or_else(|| SchemaError::invalid(path, "array requires 'items'"))?;
            FieldType::Array {
                items: Box::new(compile_field("items", items, scope, path)?),
            }
        }
        Some("object") => match node.get("properties") {
            Some(Value::Object(properties)) => FieldType::Object(compile_object(properties, scope, path)?),
            _ => return Err(SchemaError::invalid(path, "object requires 'properties'")),
        },
        _ => simple_type(type_name, path)?,
    };

    // Computed fields are always populated by evaluation
    let required = required && expression.is_none();

    Ok(FieldValidator {
        name: name.to_string(),
        key: name.to_string(),
        field_type,
        required,
        description,
        expression,
    })
}

/// Canonical type name, resolving aliases. `None` for unknown types.
pub fn canonical_type(type_name: &str) -> Option<&'static str> {
    Some(match type_name.trim().to_ascii_lowercase().as_str() {
        "string" | "str" => "string",
        "boolean" | "bool" => "boolean",
        "integer" | "int" => "integer",
        "number" | "float" | "double" => "number",
        "currency" => "currency",
        "price" => "price",
        "email" => "email",
        "enum" => "enum",
        "array" => "array",
        "object" => "object",
        "datetime" => "datetime",
        "phone_number" => "phone_number",
        "url" => "url",
        _ => return None,
    })
}

fn simple_type(type_name: &str, path: &str) -> Result<FieldType, SchemaError> {
    let field_type = match canonical_type(type_name) {
        Some("string") => FieldType::String,
        Some("boolean") => FieldType::Boolean,
        Some("integer") => FieldType::Integer,
        Some("number") => FieldType::Number,
        Some("currency") => FieldType::Currency,
        Some("price") => FieldType::Price,
        Some("email") => FieldType::Email,
        Some("datetime") => FieldType::Datetime,
        Some("phone_number") => FieldType::Phone,
        Some("url") => FieldType::Url,
        Some(other) => {
            return Err(SchemaError::invalid(
                path,
                format!("type '{}' needs a full field definition", other),
            ))
        }
        None => {
            return Err(SchemaError::UnsupportedType {
                path: path.to_string(),
                type_name: type_name.to_string(),
            })
        }
    };
    Ok(field_type)
}

fn parse_variants(raw: Option<&Value>, path: &str) -> Result<Vec<String>, SchemaError> {
    let items = match raw {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(SchemaError::invalid(path, "enum requires non-empty 'variants'")),
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or_else(|| SchemaError::invalid(path, "enum variants must be strings"))
        })
        .collect()
}

fn is_schema_key(key: &str) -> bool {
    matches!(key, CONFIG_KEY | PRIMARY_KEY | LEGACY_PRIMARY_KEY | SCHEMA_ID_KEY)
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compiles_fields_in_order() {
        let schema = compile_schema(&json!({
            "$schema": "scraper/v1",
            "title": {"type": "str", "required": true},
            "price": {"type": "price"},
            "count": {"type": "int"},
            "rating": "float"
        }))
        .unwrap();

        let names: Vec<_> = schema.root.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["title", "price", "count", "rating"]);
        assert_eq!(schema.root.fields[0].field_type, FieldType::String);
        assert!(schema.root.fields[0].required);
        assert_eq!(schema.root.fields[3].field_type, FieldType::Number);
        assert!(schema.primary_key.is_none());
    }

    #[test]
    fn test_nested_required_paths() {
        let schema = compile_schema(&json!({
            "event": {"type": "object", "required": true, "properties": {
                "name": {"type": "string", "required": true},
                "venue": {"type": "object", "properties": {
                    "city": {"type": "string", "required": true}
                }}
            }},
            "offers": {"type": "array", "items": {"type": "object", "properties": {
                "price": {"type": "price", "required": true}
            }}}
        }))
        .unwrap();

        assert_eq!(
            schema.root.required_paths(""),
            ["event", "event.name", "event.venue.city", "offers.price"]
        );
    }

    #[test]
    fn test_expression_fields_not_required() {
        let schema = compile_schema(&json!({
            "full": {"type": "string", "required": true, "expression": "CONCAT(a, b)"},
            "$pk": "NOOP(full)"
        }))
        .unwrap();
        assert!(!schema.root.fields[0].required);
        assert!(schema.root.fields[0].is_computed());
        assert_eq!(schema.primary_key.unwrap().source, "NOOP(full)");
    }

    #[test]
    fn test_legacy_primary_key_spelling() {
        let schema = compile_schema(&json!({"$primary_key": "sku", "sku": "string"})).unwrap();
        assert!(schema.primary_key.is_some());
        assert_eq!(schema.root.fields.len(), 1);
    }

    #[test]
    fn test_config_inheritance() {
        let schema = compile_schema(&json!({
            "__config__": {"extra": "allow", "strip_whitespace": false},
            "inner": {"type": "object", "__config__": {"extra": "ignore"}, "properties": {
                "a": "string"
            }}
        }))
        .unwrap();

        assert_eq!(schema.root.config.extra, ExtraPolicy::Allow);
        let FieldType::Object(inner) = &schema.root.fields[0].field_type else {
            panic!("expected object");
        };
        assert_eq!(inner.config.extra, ExtraPolicy::Ignore);
        assert!(!inner.config.strip_whitespace);
    }

    #[test]
    fn test_object_form_root() {
        let schema = compile_schema(&json!({
            "type": "object",
            "properties": {"name": {"type": "string"}}
        }))
        .unwrap();
        assert_eq!(schema.root.fields.len(), 1);
        assert_eq!(schema.root.fields[0].name, "name");
    }

    #[test]
    fn test_reserved_names_get_internal_keys() {
        let schema = compile_schema(&json!({"type": {"type": "string"}, "model_id": "int"})).unwrap();
        assert_eq!(schema.root.fields[0].name, "type");
        assert_eq!(schema.root.fields[0].key, "__rsv_type");
        assert_eq!(schema.root.fields[1].key, "__rsv_model_id");
    }

    #[test]
    fn test_invalid_schemas() {
        let cases = [
            json!({"a": {"type": "array"}}),
            json!({"a": {"type": "object"}}),
            json!({"a": {"type": "enum", "variants": []}}),
            json!({"a": {"type": "enum", "variants": [1]}}),
            json!({"a": {"required": true}}),
            json!({"a": {"type": "string", "required": "yes"}}),
            json!({"a": {"type": "string", "expression": "CONCAT(a"}}),
            json!({"__config__": {"extra": "sometimes"}}),
            json!({"__config__": {"colour": "red"}}),
            json!(["not", "a", "map"]),
        ];
        for schema in cases {
            assert!(compile_schema(&schema).is_err(), "{}", schema);
        }
    }

    #[test]
    fn test_unsupported_type() {
        let err = compile_schema(&json!({"a": {"type": "geo_point"}})).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedType {
                path: "a".into(),
                type_name: "geo_point".into()
            }
        );
    }
}
