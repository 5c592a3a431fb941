//! Record validation
//!
//! A `Validator` is compiled once from a schema document and then applied to
//! any number of scraped records. Each record goes through the same stages:
//!
//! 1. keys trimmed, reserved names mapped to internal keys, strings stripped
//! 2. required fields checked
//! 3. records with nothing but empty values rejected
//! 4. every declared field coerced to its semantic type, extra keys handled
//!    per the scope's `extra` policy
//! 5. computed fields evaluated in declaration order
//! 6. the primary key evaluated into `$pk`
//!
//! The first failing stage aborts the record.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::coercers::{
    coerce_boolean, coerce_currency, coerce_datetime, coerce_email, coerce_enum, coerce_integer,
    coerce_number, coerce_phone, coerce_price, coerce_string, coerce_url,
};
use crate::errors::{json_type_name, CoercionError, Error, SchemaError, ValidationError};
use crate::expression::{to_text, Evaluator};
use crate::schema::{
    compile_schema, join_path, CompiledSchema, ExtraPolicy, FieldType, FieldValidator,
    ObjectValidator, PRIMARY_KEY,
};

/// A compiled schema ready to validate records
#[derive(Debug, Clone)]
pub struct Validator {
    schema: CompiledSchema,
    evaluator: Evaluator,
}

impl Validator {
    /// Compile `schema` with the built-in expression functions.
    pub fn new(schema: &Value) -> Result<Self, SchemaError> {
        Self::with_evaluator(schema, Evaluator::new())
    }

    /// Compile `schema`; computed fields and `$pk` use `evaluator`.
    pub fn with_evaluator(schema: &Value, evaluator: Evaluator) -> Result<Self, SchemaError> {
        Ok(Self {
            schema: compile_schema(schema)?,
            evaluator,
        })
    }

    /// Compile a schema given as JSON text.
    pub fn from_json(schema: &str) -> Result<Self, Error> {
        let doc: Value = serde_json::from_str(schema)
            .map_err(|e| SchemaError::invalid("", format!("invalid JSON: {}", e)))?;
        Ok(Self::new(&doc)?)
    }

    /// Dotted paths of every required field, nested ones included
    pub fn required_fields(&self) -> Vec<String> {
        self.schema.root.required_paths("")
    }

    /// Top-level fields in declaration order
    pub fn fields(&self) -> &[FieldValidator] {
        &self.schema.root.fields
    }

    /// Source text of the primary key expression
    pub fn primary_key(&self) -> Option<&str> {
        self.schema.primary_key.as_ref().map(|pk| pk.source.as_str())
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Validate one record. `base_url` resolves relative URLs.
    ///
    /// Returns the canonical record, or the first error encountered. Error
    /// paths always use the field names from the schema.
    pub fn validate(&self, record: &Value, base_url: Option<&str>) -> Result<Value, ValidationError> {
        self.run(record, base_url).map_err(|err| {
            debug!(error = %err, "record rejected");
            err
        })
    }

    fn run(&self, record: &Value, base_url: Option<&str>) -> Result<Value, ValidationError> {
        let input = record
            .as_object()
            .ok_or_else(|| ValidationError::NotAnObject(json_type_name(record)))?;
        let root = &self.schema.root;

        let normalized = normalize_object(input, root, true);
        trace!(keys = normalized.len(), "normalized record");

        let mut missing = Vec::new();
        check_required(&normalized, root, "", &mut missing);
        if !missing.is_empty() {
            return Err(ValidationError::MissingRequired {
                missing,
                required: root.required_paths(""),
            });
        }

        if normalized.values().all(is_blank) {
            return Err(ValidationError::EmptyRecord);
        }

        let mut output = self.coerce_object(&normalized, root, "", base_url)?;
        trace!("coerced record");

        self.apply_computed(&mut output, root, "", base_url)?;

        if let Some(pk) = &self.schema.primary_key {
            let context = Value::Object(output.clone());
            let value = self
                .evaluator
                .evaluate_parsed(&pk.parsed, &context)
                .map_err(|source| ValidationError::Expression {
                    path: PRIMARY_KEY.to_string(),
                    source,
                })?;
            trace!(pk = %value, "evaluated primary key");
            output.insert(PRIMARY_KEY.to_string(), value);
        }

        Ok(Value::Object(output))
    }

    /// Coerce one object scope. Returns the map under its declared names.
    fn coerce_object(
        &self,
        input: &Map<String, Value>,
        scope: &ObjectValidator,
        prefix: &str,
        base_url: Option<&str>,
    ) -> Result<Map<String, Value>, ValidationError> {
        let mut out = Map::new();

        for field in &scope.fields {
            // Filled in by the computed pass; reserved here to keep field order
            if field.is_computed() {
                out.insert(field.key.clone(), Value::Null);
                continue;
            }
            let path = join_path(prefix, &field.name);
            let raw = input.get(&field.key).unwrap_or(&Value::Null);
            out.insert(field.key.clone(), self.coerce_field(raw, field, &path, base_url)?);
        }

        for (key, value) in input {
            if scope.field(key).is_some() {
                continue;
            }
            match scope.config.extra {
                ExtraPolicy::Forbid => {
                    return Err(ValidationError::ExtraField {
                        path: join_path(prefix, &scope.names.decode_key(key)),
                    })
                }
                ExtraPolicy::Allow => {
                    out.insert(key.clone(), value.clone());
                }
                ExtraPolicy::Ignore => {}
            }
        }

        Ok(scope.names.decode_map(out))
    }

    /// Descend through any depth of arrays to the objects of `scope`.
    fn apply_computed_nested(
        &self,
        value: &mut Value,
        scope: &ObjectValidator,
        path: &str,
        base_url: Option<&str>,
    ) -> Result<(), ValidationError> {
        match value {
            Value::Object(inner) => self.apply_computed(inner, scope, path, base_url),
            Value::Array(items) => items
                .iter_mut()
                .try_for_each(|item| self.apply_computed_nested(item, scope, path, base_url)),
            _ => Ok(()),
        }
    }

    fn coerce_field(
        &self,
        raw: &Value,
        field: &FieldValidator,
        path: &str,
        base_url: Option<&str>,
    ) -> Result<Value, ValidationError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let coerced = match &field.field_type {
            FieldType::String => coerce_string(raw),
            FieldType::Number => coerce_number(raw),
            FieldType::Integer => coerce_integer(raw),
            FieldType::Boolean => coerce_boolean(raw),
            FieldType::Email => coerce_email(raw),
            FieldType::Url => coerce_url(raw, base_url),
            FieldType::Datetime => coerce_datetime(raw),
            FieldType::Phone => coerce_phone(raw),
            FieldType::Price => coerce_price(raw),
            FieldType::Currency => coerce_currency(raw),
            FieldType::Enum { variants } => coerce_enum(raw, variants),
            FieldType::Array { items } => {
                let Value::Array(list) = raw else {
                    return Err(type_mismatch(path, "array", raw));
                };
                let coerced = list
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.coerce_field(item, items, &format!("{}[{}]", path, i), base_url))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Value::Array(coerced));
            }
            FieldType::Object(scope) => {
                let Value::Object(map) = raw else {
                    return Err(type_mismatch(path, "object", raw));
                };
                return Ok(Value::Object(self.coerce_object(map, scope, path, base_url)?));
            }
        };
        coerced.map_err(|source| ValidationError::Coercion {
            path: path.to_string(),
            source,
        })
    }

    /// Evaluate computed fields, innermost scopes first. `map` is keyed by
    /// declared names.
    fn apply_computed(
        &self,
        map: &mut Map<String, Value>,
        scope: &ObjectValidator,
        prefix: &str,
        base_url: Option<&str>,
    ) -> Result<(), ValidationError> {
        for field in &scope.fields {
            let Some(nested) = field.nested_object() else {
                continue;
            };
            let path = join_path(prefix, &field.name);
            if let Some(value) = map.get_mut(&field.name) {
                self.apply_computed_nested(value, nested, &path, base_url)?;
            }
        }

        let computed = scope
            .fields
            .iter()
            .filter_map(|f| f.expression.as_ref().map(|e| (f, e)));
        for (field, expression) in computed {
            let path = join_path(prefix, &field.name);
            let context = Value::Object(map.clone());
            let result = self
                .evaluator
                .evaluate_parsed(&expression.parsed, &context)
                .map_err(|source| ValidationError::Expression {
                    path: path.clone(),
                    source,
                })?;
            trace!(field = %path, "evaluated computed field");

            let value = if is_blank(&result) {
                Value::Null
            } else {
                let result = match (&field.field_type, &result) {
                    (FieldType::String, Value::Number(_) | Value::Bool(_)) => {
                        Value::String(to_text(&result))
                    }
                    _ => result,
                };
                self.coerce_field(&result, field, &path, base_url)?
            };
            map.insert(field.name.clone(), value);
        }
        Ok(())
    }
}

fn type_mismatch(path: &str, expected: &'static str, actual: &Value) -> ValidationError {
    ValidationError::Coercion {
        path: path.to_string(),
        source: CoercionError::UnexpectedType {
            expected,
            actual: json_type_name(actual),
        },
    }
}

/// Trim keys, map reserved names and strip string values within one scope.
fn normalize_object(
    input: &Map<String, Value>,
    scope: &ObjectValidator,
    top_level: bool,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in input {
        let key = key.trim();
        // Output-only key; recomputed from the schema
        if top_level && key == PRIMARY_KEY {
            continue;
        }
        let key = scope.names.encode_key(key);
        let value = normalize_value(value, scope.field(&key), scope.config.strip_whitespace);
        out.insert(key, value);
    }
    out
}

fn normalize_value(value: &Value, field: Option<&FieldValidator>, strip: bool) -> Value {
    let field_type = field.map(|f| &f.field_type);
    match (value, field_type) {
        (Value::Object(map), Some(FieldType::Object(scope))) => {
            Value::Object(normalize_object(map, scope, false))
        }
        (Value::Array(items), Some(FieldType::Array { items: item })) => Value::Array(
            items
                .iter()
                .map(|v| normalize_value(v, Some(item.as_ref()), strip))
                .collect(),
        ),
        (Value::Object(map), _) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.trim().to_string(), normalize_value(v, None, strip)))
                .collect(),
        ),
        (Value::Array(items), _) => {
            Value::Array(items.iter().map(|v| normalize_value(v, None, strip)).collect())
        }
        (Value::String(s), _) if strip => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::String(trimmed.to_string())
            }
        }
        (other, _) => other.clone(),
    }
}

/// Record missing required paths. A required path below an absent or
/// empty parent is missing too; arrays are checked per element, at any depth.
fn check_required(
    map: &Map<String, Value>,
    scope: &ObjectValidator,
    prefix: &str,
    missing: &mut Vec<String>,
) {
    for field in &scope.fields {
        let path = join_path(prefix, &field.name);
        let value = map.get(&field.key);

        if field.required && value.map_or(true, is_empty) {
            push_missing(missing, &path);
        }
        if let Some(nested) = field.nested_object() {
            check_required_nested(value, nested, &path, missing);
        }
    }
}

fn check_required_nested(
    value: Option<&Value>,
    scope: &ObjectValidator,
    path: &str,
    missing: &mut Vec<String>,
) {
    match value {
        Some(Value::Object(inner)) => check_required(inner, scope, path, missing),
        Some(Value::Array(items)) if !items.is_empty() => {
            for item in items {
                check_required_nested(Some(item), scope, path, missing);
            }
        }
        // A scalar here is a type mismatch, reported by coercion
        Some(other) if !is_empty(other) => {}
        _ => check_required(&Map::new(), scope, path, missing),
    }
}

fn push_missing(missing: &mut Vec<String>, path: &str) {
    if !missing.iter().any(|p| p == path) {
        missing.push(path.to_string());
    }
}

/// Null, blank string, or empty collection
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Empty, or a collection of nothing but empty values
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(is_blank),
        Value::Object(map) => map.values().all(is_blank),
        other => is_empty(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator(schema: Value) -> Validator {
        Validator::new(&schema).unwrap()
    }

    #[test]
    fn test_strips_and_coerces() {
        let v = validator(json!({
            "title": {"type": "string", "required": true},
            "count": {"type": "integer"},
            "in_stock": {"type": "boolean"}
        }));
        let out = v
            .validate(&json!({" title ": "  Widget ", "count": "12", "in_stock": "yes"}), None)
            .unwrap();
        assert_eq!(out, json!({"title": "Widget", "count": 12, "in_stock": true}));
    }

    #[test]
    fn test_missing_fields_are_null_in_output() {
        let v = validator(json!({"a": "string", "b": "number"}));
        let out = v.validate(&json!({"a": "x"}), None).unwrap();
        assert_eq!(out, json!({"a": "x", "b": null}));
    }

    #[test]
    fn test_output_follows_declaration_order() {
        let v = validator(json!({"a": "string", "b": "string", "c": "string"}));
        let out = v.validate(&json!({"c": "3", "a": "1", "b": "2"}), None).unwrap();
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn test_missing_required_lists_everything() {
        let v = validator(json!({
            "title": {"type": "string", "required": true},
            "url": {"type": "url", "required": true},
            "note": "string"
        }));
        let err = v.validate(&json!({"title": "   ", "note": "x"}), None).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequired {
                missing: vec!["title".into(), "url".into()],
                required: vec!["title".into(), "url".into()],
            }
        );
    }

    #[test]
    fn test_nested_required_enforced_when_parent_absent() {
        let v = validator(json!({
            "name": "string",
            "venue": {"type": "object", "properties": {
                "city": {"type": "string", "required": true}
            }}
        }));
        for record in [
            json!({"name": "Gig"}),
            json!({"name": "Gig", "venue": null}),
            json!({"name": "Gig", "venue": {"city": ""}}),
        ] {
            let err = v.validate(&record, None).unwrap_err();
            assert!(
                matches!(err, ValidationError::MissingRequired { ref missing, .. } if missing == &["venue.city"]),
                "{}",
                record
            );
        }
        assert!(v.validate(&json!({"name": "Gig", "venue": {"city": "Oslo"}}), None).is_ok());
    }

    #[test]
    fn test_missing_required_parent_lists_children() {
        let v = validator(json!({
            "venue": {"type": "object", "required": true, "properties": {
                "city": {"type": "string", "required": true}
            }},
            "note": "string"
        }));
        let err = v.validate(&json!({"note": "x"}), None).unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequired { ref missing, .. } if missing == &["venue", "venue.city"]));
    }

    #[test]
    fn test_required_inside_array_items() {
        let v = validator(json!({
            "offers": {"type": "array", "items": {"type": "object", "properties": {
                "price": {"type": "price", "required": true}
            }}}
        }));
        let err = v
            .validate(&json!({"offers": [{"price": "$1"}, {"price": null}]}), None)
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequired { ref missing, .. } if missing == &["offers.price"]));
    }

    #[test]
    fn test_arrays_of_arrays() {
        let v = validator(json!({
            "grid": {"type": "array", "items": {"type": "array", "items": {"type": "object", "properties": {
                "x": {"type": "string", "required": true},
                "y": {"type": "string", "expression": "UPPER(x)"}
            }}}}
        }));
        assert_eq!(v.required_fields(), ["grid.x"]);

        let err = v
            .validate(&json!({"grid": [[{"x": null}], [{"x": "q"}]]}), None)
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingRequired { ref missing, .. } if missing == &["grid.x"]));

        let out = v
            .validate(&json!({"grid": [[{"x": "p"}], [{"x": "q"}, {"x": "r"}]]}), None)
            .unwrap();
        assert_eq!(
            out,
            json!({"grid": [[{"x": "p", "y": "P"}], [{"x": "q", "y": "Q"}, {"x": "r", "y": "R"}]]})
        );
    }

    #[test]
    fn test_all_empty_record() {
        let v = validator(json!({"a": "string", "b": {"type": "array", "items": "string"}}));
        for record in [json!({}), json!({"a": " ", "b": [null, ""]})] {
            assert_eq!(v.validate(&record, None), Err(ValidationError::EmptyRecord));
        }
    }

    #[test]
    fn test_not_an_object() {
        let v = validator(json!({"a": "string"}));
        assert_eq!(v.validate(&json!([1]), None), Err(ValidationError::NotAnObject("array")));
    }

    #[test]
    fn test_extra_policies() {
        let record = json!({"a": "x", "b": "y"});

        let forbid = validator(json!({"a": "string"}));
        assert_eq!(
            forbid.validate(&record, None),
            Err(ValidationError::ExtraField { path: "b".into() })
        );

        let allow = validator(json!({"__config__": {"extra": "allow"}, "a": "string"}));
        assert_eq!(allow.validate(&record, None).unwrap(), json!({"a": "x", "b": "y"}));

        let ignore = validator(json!({"__config__": {"extra": "ignore"}, "a": "string"}));
        assert_eq!(ignore.validate(&record, None).unwrap(), json!({"a": "x"}));
    }

    #[test]
    fn test_nested_extra_path() {
        let v = validator(json!({"venue": {"type": "object", "properties": {"city": "string"}}}));
        let err = v
            .validate(&json!({"venue": {"city": "Oslo", "zip": "0150"}}), None)
            .unwrap_err();
        assert_eq!(err.path(), Some("venue.zip"));
    }

    #[test]
    fn test_strip_whitespace_disabled() {
        let record = json!({"a": " x ", "note": "  kept  "});

        let v = validator(json!({"__config__": {"extra": "allow", "strip_whitespace": false}, "a": "string"}));
        assert_eq!(v.validate(&record, None).unwrap(), json!({"a": "x", "note": "  kept  "}));

        let v = validator(json!({"__config__": {"extra": "allow"}, "a": "string"}));
        assert_eq!(v.validate(&record, None).unwrap(), json!({"a": "x", "note": "kept"}));
    }

    #[test]
    fn test_coercion_error_path_in_array() {
        let v = validator(json!({"ratings": {"type": "array", "items": "number"}}));
        let err = v.validate(&json!({"ratings": ["1.5", "abc"]}), None).unwrap_err();
        assert_eq!(err.path(), Some("ratings[1]"));
    }

    #[test]
    fn test_type_mismatch_for_object_field() {
        let v = validator(json!({"venue": {"type": "object", "properties": {"city": "string"}}}));
        let err = v.validate(&json!({"venue": "Oslo"}), None).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Coercion {
                path: "venue".into(),
                source: CoercionError::UnexpectedType {
                    expected: "object",
                    actual: "string"
                },
            }
        );
    }

    #[test]
    fn test_computed_fields_and_pk() {
        let v = validator(json!({
            "$pk": "CONCAT_WS('-', sku, slug)",
            "sku": {"type": "string", "required": true},
            "name": "string",
            "slug": {"type": "string", "expression": "SLUGIFY(name)"},
            "stock": {"type": "string", "expression": "NOOP(count)"},
            "count": "integer"
        }));
        let out = v
            .validate(&json!({"sku": "A1", "name": "Blue Widget", "count": "4", "$pk": "stale"}), None)
            .unwrap();
        assert_eq!(
            out,
            json!({
                "sku": "A1",
                "name": "Blue Widget",
                "slug": "blue-widget",
                "stock": "4",
                "count": 4,
                "$pk": "A1-blue-widget"
            })
        );
    }

    #[test]
    fn test_computed_ignores_input_value() {
        let v = validator(json!({
            "name": "string",
            "upper": {"type": "string", "expression": "UPPER(name)"}
        }));
        let out = v.validate(&json!({"name": "a", "upper": "zzz"}), None).unwrap();
        assert_eq!(out["upper"], json!("A"));
    }

    #[test]
    fn test_nested_computed_uses_enclosing_object() {
        let v = validator(json!({
            "brand": {"type": "object", "properties": {
                "name": "string",
                "slug": {"type": "string", "expression": "SLUGIFY(name)"}
            }},
            "label": {"type": "string", "expression": "UPPER(brand.slug)"}
        }));
        let out = v.validate(&json!({"brand": {"name": "Acme Co"}}), None).unwrap();
        assert_eq!(out["brand"]["slug"], json!("acme-co"));
        assert_eq!(out["label"], json!("ACME-CO"));
    }

    #[test]
    fn test_expression_error_path() {
        let v = validator(json!({"a": "string", "b": {"type": "string", "expression": "FROB(a)"}}));
        let err = v.validate(&json!({"a": "x"}), None).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Expression {
                path: "b".into(),
                source: crate::errors::ExpressionError::UnknownFunction("FROB".into()),
            }
        );
    }

    #[test]
    fn test_reserved_names_round_trip() {
        let v = validator(json!({
            "type": {"type": "string", "required": true},
            "model_year": "integer"
        }));
        let out = v.validate(&json!({"type": "suv", "model_year": "2021"}), None).unwrap();
        assert_eq!(out, json!({"type": "suv", "model_year": 2021}));

        let err = v.validate(&json!({"model_year": "x"}), None).unwrap_err();
        assert!(!err.to_string().contains("__rsv_"));
        assert!(err.to_string().starts_with("missing required fields: type"));

        let err = v.validate(&json!({"type": "a", "model_year": "x"}), None).unwrap_err();
        assert_eq!(err.path(), Some("model_year"));
    }

    #[test]
    fn test_prefixed_declared_name_kept_in_errors() {
        let v = validator(json!({
            "__rsv_count": {"type": "integer", "required": true},
            "type": "string",
            "venue": {"type": "object", "properties": {"type": {"type": "string", "required": true}}}
        }));

        let err = v.validate(&json!({"__rsv_count": "x"}), None).unwrap_err();
        assert_eq!(err.path(), Some("__rsv_count"));

        let err = v.validate(&json!({"type": "a"}), None).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingRequired {
                missing: vec!["__rsv_count".into(), "venue.type".into()],
                required: vec!["__rsv_count".into(), "venue.type".into()],
            }
        );

        let out = v
            .validate(&json!({"__rsv_count": "3", "venue": {"type": "hall"}}), None)
            .unwrap();
        assert_eq!(out, json!({"__rsv_count": 3, "type": null, "venue": {"type": "hall"}}));
    }

    #[test]
    fn test_introspection() {
        let v = validator(json!({
            "$pk": "sku",
            "sku": {"type": "string", "required": true},
            "venue": {"type": "object", "properties": {"city": {"type": "string", "required": true}}}
        }));
        assert_eq!(v.required_fields(), ["sku", "venue.city"]);
        assert_eq!(v.fields().len(), 2);
        assert_eq!(v.primary_key(), Some("sku"));
    }

    #[test]
    fn test_custom_evaluator() {
        let mut evaluator = Evaluator::new();
        evaluator
            .define_function("DOUBLE", |args: &[Value]| {
                Ok(args.first().and_then(Value::as_f64).map_or(Value::Null, |n| json!(n * 2.0)))
            })
            .unwrap();
        let v = Validator::with_evaluator(
            &json!({"n": "number", "twice": {"type": "number", "expression": "DOUBLE(n)"}}),
            evaluator,
        )
        .unwrap();
        assert_eq!(v.validate(&json!({"n": 2}), None).unwrap()["twice"], json!(4.0));
        assert!(v.evaluator().has_function("double"));
    }

    #[test]
    fn test_from_json_rejects_bad_text() {
        assert!(matches!(Validator::from_json("{not json"), Err(Error::Schema(_))));
        assert!(Validator::from_json(r#"{"a": "string"}"#).is_ok());
    }
}
