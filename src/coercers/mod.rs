//! Semantic type coercers
//!
//! Each coercer takes a raw scraped value and returns its canonical form,
//! `Value::Null` where a value legitimately means "nothing", or an error.

mod datetime;
mod email;
mod enumeration;
mod number;
mod phone;
mod price;
mod string;
mod url;

pub use datetime::*;
pub use email::*;
pub use enumeration::*;
pub use number::*;
pub use phone::*;
pub use price::*;
pub use string::*;
pub use self::url::*;

use serde_json::Value;

use crate::errors::{json_type_name, CoercionError};

/// Borrow the string inside `value`, or report a type mismatch.
pub(crate) fn expect_str<'a>(value: &'a Value, expected: &'static str) -> Result<&'a str, CoercionError> {
    value.as_str().ok_or_else(|| CoercionError::UnexpectedType {
        expected,
        actual: json_type_name(value),
    })
}
