//! Expression language for computed fields and primary keys
//!
//! Expressions are function calls over literals and record paths, e.g.
//! `CONCAT_WS('-', SLUGIFY(brand), sku)`. Function names are
//! case-insensitive. Each `Evaluator` carries its own user functions and
//! falls back to the shared built-ins.

mod builtins;
mod parser;

pub use builtins::builtin_names;
pub(crate) use builtins::to_text;
pub use parser::{Expression, FieldPath, PathSegment};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::errors::ExpressionError;
use builtins::BUILTINS;

pub type FunctionResult = Result<Value, ExpressionError>;

/// A callable registered under a function name
pub type Function = Arc<dyn Fn(&[Value]) -> FunctionResult + Send + Sync>;

/// Evaluates expressions against a record
#[derive(Clone, Default)]
pub struct Evaluator {
    functions: HashMap<String, Function>,
}

impl Evaluator {
    /// Evaluator with only the built-in functions
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user function. It shadows a built-in of the same name.
    pub fn define_function<F>(&mut self, name: &str, function: F) -> Result<(), ExpressionError>
    where
        F: Fn(&[Value]) -> FunctionResult + Send + Sync + 'static,
    {
        let call = format!("{}()", name.trim());
        match Expression::parse(&call)? {
            Expression::Call { name, .. } => {
                self.functions.insert(name, Arc::new(function));
                Ok(())
            }
            _ => Err(ExpressionError::syntax(&call, "invalid function name")),
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.lookup(&name.to_ascii_uppercase()).is_some()
    }

    /// Parse and evaluate `expression` against `value`.
    pub fn evaluate(&self, expression: &str, value: &Value) -> Result<Value, ExpressionError> {
        let parsed = Expression::parse(expression)?;
        self.evaluate_parsed(&parsed, value)
    }

    /// Evaluate an already parsed expression.
    pub fn evaluate_parsed(&self, expression: &Expression, value: &Value) -> Result<Value, ExpressionError> {
        match expression {
            Expression::Literal(s) => Ok(Value::String(s.clone())),
            Expression::Path(path) => Ok(resolve_path(value, path)),
            Expression::Call { name, args } => {
                let function = self
                    .lookup(name)
                    .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| self.evaluate_parsed(arg, value))
                    .collect::<Result<Vec<_>, _>>()?;
                trace!(function = %name, argc = args.len(), "calling expression function");
                function(args.as_slice())
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<&Function> {
        self.functions.get(name).or_else(|| BUILTINS.get(name))
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("Evaluator").field("functions", &names).finish()
    }
}

/// Follow `path` through `value`; anything unresolvable is null.
pub fn resolve_path(value: &Value, path: &FieldPath) -> Value {
    let mut current = value;
    for segment in &path.segments {
        let next = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Index(index), Value::Array(items)) => {
                let len = items.len() as i64;
                let index = if *index < 0 { len + index } else { *index };
                usize::try_from(index).ok().and_then(|i| items.get(i))
            }
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}
