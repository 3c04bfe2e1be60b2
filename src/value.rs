use indexmap::IndexMap;
use std::fmt;

use crate::{evaluator::EvalError, output::to_json};

/// Longest value description embedded in an error message.
const DESCRIBE_LIMIT: usize = 128;

/// A dynamically typed value flowing through literal construction and evaluation.
///
/// Integers and floats are kept apart so that literals round-trip exactly,
/// while arithmetic always produces [`Value::Float`].
///
/// Objects preserve insertion order. Inserting an existing key replaces its
/// value in place, so the last write for a key wins.
///
/// # Examples
///
/// ```
/// use mapq_lang::Value;
/// use indexmap::IndexMap;
///
/// let null = Value::Null;
/// let number = Value::Int(42);
/// let text = Value::String("hello".to_string());
///
/// let mut obj = IndexMap::new();
/// obj.insert("key".to_string(), Value::Float(1.5));
/// let object = Value::Object(obj);
///
/// assert_eq!(number.kind(), "int64");
/// assert_eq!(object.kind(), "object");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON null, also the result of selecting an absent field
    Null,

    /// Boolean
    Bool(bool),

    /// Signed 64-bit integer
    Int(i64),

    /// 64-bit floating point number
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Raw bytes, typically message content
    Bytes(Vec<u8>),

    /// Ordered sequence of values
    Array(Vec<Value>),

    /// String keyed mapping in insertion order
    Object(IndexMap<String, Value>),
}

impl Value {
    /// The kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int64",
            Value::Float(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Get as float, if numeric
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Textual representation used inside error messages.
    ///
    /// Strings are shown raw, everything else as compact JSON, and the result
    /// is truncated so that a large document cannot flood a log line.
    pub fn describe(&self) -> String {
        let text = match self {
            Value::String(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            other => to_json(other),
        };
        if text.chars().count() > DESCRIBE_LIMIT {
            let mut cut: String = text.chars().take(DESCRIBE_LIMIT - 3).collect();
            cut.push_str("...");
            cut
        } else {
            text
        }
    }

    /// Coerce to a number, failing with a consistently worded type error.
    pub fn expect_number(&self) -> Result<f64, EvalError> {
        self.as_float()
            .ok_or_else(|| EvalError::mismatch("number", self))
    }

    /// Coerce to a string slice. Bytes are not implicitly decoded.
    pub fn expect_string(&self) -> Result<&str, EvalError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(EvalError::mismatch("string", other)),
        }
    }

    pub fn expect_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::mismatch("boolean", other)),
        }
    }

    /// Coerce to an integer. Floats with no fractional part are accepted.
    pub fn expect_int(&self) -> Result<i64, EvalError> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i64),
            other => Err(EvalError::mismatch("int", other)),
        }
    }

    pub fn expect_array(&self) -> Result<&[Value], EvalError> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(EvalError::mismatch("array", other)),
        }
    }

    pub fn expect_object(&self) -> Result<&IndexMap<String, Value>, EvalError> {
        match self {
            Value::Object(map) => Ok(map),
            other => Err(EvalError::mismatch("object", other)),
        }
    }

    /// Structural equality where integers and floats compare numerically.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.loose_eq(w)))
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            other => f.write_str(&to_json(other)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
