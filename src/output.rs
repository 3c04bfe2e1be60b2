//! JSON rendering of query results.
//!
//! Object keys are written in insertion order, bytes are rendered as
//! (lossily decoded) strings, and non-finite floats become `null`.
//!
//! # Examples
//!
//! ```
//! use mapq_lang::Value;
//! use mapq_lang::output::{to_json, to_json_pretty};
//!
//! let value = Value::Int(42);
//!
//! assert_eq!(to_json(&value), "42");
//! assert_eq!(to_json_pretty(&value), "42");
//! ```

use crate::{convert::value_to_json, value::Value};

/// Converts a Value to compact JSON.
///
/// # Examples
///
/// ```
/// use mapq_lang::Value;
/// use mapq_lang::output::to_json;
/// use indexmap::IndexMap;
///
/// let mut obj = IndexMap::new();
/// obj.insert("name".to_string(), Value::String("Alice".to_string()));
/// obj.insert("age".to_string(), Value::Int(30));
///
/// assert_eq!(to_json(&Value::Object(obj)), r#"{"name":"Alice","age":30}"#);
/// ```
pub fn to_json(value: &Value) -> String {
    value_to_json(value.clone()).to_string()
}

/// Converts a Value to JSON with 2-space indentation, one member per line.
pub fn to_json_pretty(value: &Value) -> String {
    format!("{:#}", value_to_json(value.clone()))
}
