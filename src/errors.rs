//! Error types for schema compilation, coercion, expressions and validation
//!
//! Every subsystem has its own enum. `Error` wraps them all for callers that
//! only want a single error type.

use thiserror::Error;

/// URL normalization failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UrlError {
    #[error("scheme '{0}' is not allowed (expected http, https, s3 or file)")]
    DisallowedScheme(String),
    #[error("base url '{0}' has no scheme")]
    MissingBaseScheme(String),
    #[error("url '{0}' is not absolute")]
    NotAbsolute(String),
    #[error("url '{0}' has no top-level domain")]
    MissingTld(String),
    #[error("cannot parse url '{url}': {reason}")]
    Parse { url: String, reason: String },
}

/// Per-type coercion failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("expected {expected}, got {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("invalid boolean '{0}'")]
    InvalidBoolean(String),
    #[error("invalid date '{0}'")]
    InvalidDate(String),
    #[error("invalid phone number '{0}'")]
    InvalidPhone(String),
    #[error("invalid email '{0}'")]
    InvalidEmail(String),
    #[error("ambiguous price '{0}'")]
    AmbiguousPrice(String),
    #[error("multiple amounts in price '{0}'")]
    MultiplePriceAmounts(String),
    #[error("'{value}' is not one of: {}", variants.join(", "))]
    UnknownEnumVariant {
        value: String,
        variants: Vec<String>,
    },
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),
}

/// Expression parsing and evaluation failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("empty expression")]
    Empty,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("syntax error in '{expression}': {reason}")]
    Syntax { expression: String, reason: String },
    #[error("{function}: {reason}")]
    InvalidArgument { function: String, reason: String },
}

impl ExpressionError {
    pub(crate) fn syntax(expression: &str, reason: impl Into<String>) -> Self {
        ExpressionError::Syntax {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn argument(function: &str, reason: impl Into<String>) -> Self {
        ExpressionError::InvalidArgument {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

/// Schema document failures, raised while compiling a validator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("{path}: unsupported type '{type_name}'")]
    UnsupportedType { path: String, type_name: String },
    #[error("{path}: {reason}")]
    Invalid { path: String, reason: String },
    #[error("{path}: invalid __config__: {reason}")]
    InvalidConfig { path: String, reason: String },
    #[error("{path}: {source}")]
    Expression {
        path: String,
        #[source]
        source: ExpressionError,
    },
}

impl SchemaError {
    pub(crate) fn invalid(path: &str, reason: impl Into<String>) -> Self {
        SchemaError::Invalid {
            path: display_path(path),
            reason: reason.into(),
        }
    }
}

/// A record that does not satisfy its schema
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("record must be an object, got {0}")]
    NotAnObject(&'static str),
    #[error(
        "missing required fields: {}; required fields: {}",
        missing.join(", "),
        required.join(", ")
    )]
    MissingRequired {
        missing: Vec<String>,
        required: Vec<String>,
    },
    #[error("all fields null")]
    EmptyRecord,
    #[error("{path}: extra fields not permitted")]
    ExtraField { path: String },
    #[error("{path}: {source}")]
    Coercion {
        path: String,
        #[source]
        source: CoercionError,
    },
    #[error("{path}: {source}")]
    Expression {
        path: String,
        #[source]
        source: ExpressionError,
    },
}

impl ValidationError {
    /// Dotted path of the offending field, if the error concerns one field.
    pub fn path(&self) -> Option<&str> {
        match self {
            ValidationError::ExtraField { path }
            | ValidationError::Coercion { path, .. }
            | ValidationError::Expression { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Umbrella error for the public API
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error(transparent)]
    Url(#[from] UrlError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$root".to_string()
    } else {
        path.to_string()
    }
}

/// Name of a JSON value's kind, for type mismatch messages
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_f64() => "number",
        serde_json::Value::Number(_) => "integer",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
