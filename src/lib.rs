//! Record validation for scraped data
//!
//! Compiles a JSON schema of semantic field types into a validator that turns
//! raw scraped records into canonical ones:
//! - URLs resolved and normalized against the page URL
//! - prices, dates, phone numbers and emails coerced to canonical forms
//! - computed fields and a `$pk` primary key from a small expression language
//!
//! Also exposes a C ABI (see `ffi`) for embedding in non-Rust hosts.

pub mod coercers;
pub mod errors;
pub mod expression;
pub mod ffi;
pub mod reserved;
pub mod schema;
pub mod url_normalizer;
pub mod validator;

pub use errors::{CoercionError, Error, ExpressionError, Result, SchemaError, UrlError, ValidationError};
pub use expression::{Evaluator, Expression, Function, FunctionResult};
pub use schema::{ExtraPolicy, FieldType, FieldValidator};
pub use url_normalizer::normalize_url;
pub use validator::Validator;
