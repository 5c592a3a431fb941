//! FFI interface for C/C++ hosts
//!
//! A host compiles a schema once into an opaque handle and validates records
//! against it. Schemas, records and results cross the boundary as JSON text.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use serde_json::Value;

use crate::expression::Evaluator;
use crate::url_normalizer::normalize_url;
use crate::validator::Validator;

/// Result struct returned to the host
/// Both pointers are owned by Rust and must be freed via free_validation_result
#[repr(C)]
pub struct ValidationResultFFI {
    /// JSON-serialized result (null-terminated), or null on failure
    pub json_ptr: *mut c_char,
    /// Error message (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Outcome of compiling a schema
#[repr(C)]
pub struct ValidatorHandleFFI {
    /// Compiled validator, or null on failure; freed via record_validator_free
    pub handle: *mut Validator,
    /// Error message (null-terminated), or null on success; freed via
    /// free_validation_result or record_validator_free
    pub error_ptr: *mut c_char,
}

/// Compile a schema into a validator handle.
///
/// # Safety
/// - `schema_json` must be a valid null-terminated C string
/// - Caller must free the handle via `record_validator_free`
#[no_mangle]
pub unsafe extern "C" fn record_validator_new(schema_json: *const c_char) -> ValidatorHandleFFI {
    let failed = |msg: String| ValidatorHandleFFI {
        handle: ptr::null_mut(),
        error_ptr: into_c_string(&msg),
    };

    let schema = match read_str(schema_json, "schema JSON") {
        Ok(s) => s,
        Err(msg) => return failed(msg),
    };
    match Validator::from_json(schema) {
        Ok(validator) => ValidatorHandleFFI {
            handle: Box::into_raw(Box::new(validator)),
            error_ptr: ptr::null_mut(),
        },
        Err(e) => failed(e.to_string()),
    }
}

/// Validate one record.
///
/// # Arguments
/// * `handle` - Validator returned by `record_validator_new`
/// * `record_json` - JSON object (null-terminated)
/// * `base_url` - Base for relative URLs (null-terminated), or null
///
/// # Returns
/// ValidationResultFFI with json_ptr set to the canonical record, or
/// error_ptr set to the validation error message
///
/// # Safety
/// - `handle` must be a live handle from `record_validator_new`
/// - `record_json` and `base_url` (when not null) must be valid C strings
/// - Caller must free the result via `free_validation_result`
#[no_mangle]
pub unsafe extern "C" fn record_validator_validate(
    handle: *const Validator,
    record_json: *const c_char,
    base_url: *const c_char,
) -> ValidationResultFFI {
    let Some(validator) = handle.as_ref() else {
        return make_error_result("Validator handle is null");
    };
    let record = match read_json(record_json, "record JSON") {
        Ok(v) => v,
        Err(msg) => return make_error_result(&msg),
    };
    let base_url = if base_url.is_null() {
        None
    } else {
        match read_str(base_url, "base URL") {
            Ok(s) => Some(s),
            Err(msg) => return make_error_result(&msg),
        }
    };

    match validator.validate(&record, base_url) {
        Ok(output) => make_json_result(&output),
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// Free a validator handle, and the error message of a failed compile.
///
/// # Safety
/// - `result` must have been returned by `record_validator_new`
/// - Must only be called once per handle
#[no_mangle]
pub unsafe extern "C" fn record_validator_free(result: ValidatorHandleFFI) {
    if !result.handle.is_null() {
        drop(Box::from_raw(result.handle));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

/// Evaluate an expression against a JSON record with the built-in functions.
///
/// # Safety
/// - `expression` and `record_json` must be valid null-terminated C strings
/// - Caller must free the result via `free_validation_result`
#[no_mangle]
pub unsafe extern "C" fn evaluate_expression(
    expression: *const c_char,
    record_json: *const c_char,
) -> ValidationResultFFI {
    let expression = match read_str(expression, "expression") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };
    let record = match read_json(record_json, "record JSON") {
        Ok(v) => v,
        Err(msg) => return make_error_result(&msg),
    };

    match Evaluator::new().evaluate(expression, &record) {
        Ok(value) => make_json_result(&value),
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// Normalize a URL; the result is a JSON string.
///
/// # Safety
/// - `path` must be a valid null-terminated C string
/// - `base` must be a valid C string or null
/// - Caller must free the result via `free_validation_result`
#[no_mangle]
pub unsafe extern "C" fn normalize_url_ffi(
    path: *const c_char,
    base: *const c_char,
) -> ValidationResultFFI {
    let path = match read_str(path, "URL") {
        Ok(s) => s,
        Err(msg) => return make_error_result(&msg),
    };
    let base = if base.is_null() {
        None
    } else {
        match read_str(base, "base URL") {
            Ok(s) => Some(s),
            Err(msg) => return make_error_result(&msg),
        }
    };

    match normalize_url(path, base) {
        Ok(url) => make_json_result(&Value::String(url)),
        Err(e) => make_error_result(&e.to_string()),
    }
}

/// Free a ValidationResultFFI
///
/// # Safety
/// - `result` must have been returned by one of the functions above
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_validation_result(result: ValidationResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} is null", what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("Invalid UTF-8 in {}", what))
}

unsafe fn read_json(ptr: *const c_char, what: &str) -> Result<Value, String> {
    let text = read_str(ptr, what)?;
    serde_json::from_str(text).map_err(|e| format!("Failed to parse {}: {}", what, e))
}

fn make_json_result(value: &Value) -> ValidationResultFFI {
    match serde_json::to_string(value) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => ValidationResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> ValidationResultFFI {
    ValidationResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: into_c_string(msg),
    }
}

fn into_c_string(msg: &str) -> *mut c_char {
    CString::new(msg.replace('\0', " "))
        .unwrap_or_default()
        .into_raw()
}
