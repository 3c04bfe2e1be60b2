use std::{borrow::Cow, cmp::Ordering, fmt};

use indexmap::IndexMap;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use thiserror::Error;

use crate::{
    ast::{BinOp, MatchCase, Node, PathRoot, Pattern},
    message::MessageBatch,
    registry::Args,
    value::Value,
};

/// Runtime environment for a single evaluation.
///
/// A context is cheap to copy and carries no mutable state: each call to
/// [`Exec::exec`] receives its own, so concurrent evaluations of one tree
/// never observe each other.
#[derive(Clone, Copy)]
pub struct FunctionContext<'a> {
    /// Index of the message being processed within `batch`
    pub index: usize,
    /// The batch the message belongs to
    pub batch: &'a dyn MessageBatch,
    /// Value that `this` refers to inside method chains, scoped queries and
    /// match blocks. When unset, `this` is the message document.
    pub value: Option<&'a Value>,
}

impl<'a> FunctionContext<'a> {
    pub fn new(index: usize, batch: &'a dyn MessageBatch) -> Self {
        FunctionContext {
            index,
            batch,
            value: None,
        }
    }

    /// Create a context where `this` refers to `value`
    pub fn with_value<'b>(&self, value: &'b Value) -> FunctionContext<'b>
    where
        'a: 'b,
    {
        FunctionContext {
            index: self.index,
            batch: self.batch,
            value: Some(value),
        }
    }

    /// Create a context pointing at another message of the same batch
    pub fn with_index(&self, index: usize) -> Self {
        FunctionContext { index, ..*self }
    }

    /// The current message's content as a JSON document
    pub fn document(&self) -> Result<Cow<'a, Value>, EvalError> {
        self.batch.document(self.index)
    }

    /// The value `this` currently refers to
    pub fn this(&self) -> Result<Cow<'a, Value>, EvalError> {
        match self.value {
            Some(value) => Ok(Cow::Borrowed(value)),
            None => self.document(),
        }
    }
}

impl fmt::Debug for FunctionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionContext")
            .field("index", &self.index)
            .field("batch_len", &self.batch.len())
            .field("value", &self.value)
            .finish()
    }
}

/// Errors that can occur while evaluating a query against a message.
///
/// These are per-message failures: they carry no source position, since the
/// tree was already validated when it was parsed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// A value had the wrong type for the operation applied to it
    #[error("expected {expected} value, found {found}: {value}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        value: String,
    },

    /// Evaluating the value of an object literal entry failed
    #[error("failed to resolve '{key}' value: {source}")]
    Field {
        key: String,
        source: Box<EvalError>,
    },

    /// A dynamic object key did not evaluate to a string
    #[error("object keys must be strings, received: {found}")]
    KeyType { found: &'static str },

    /// A field was selected from a value that has no fields
    #[error("cannot select field '{field}' from {found} value")]
    Select { field: String, found: &'static str },

    /// No case of a match block accepted the target
    #[error("no match case found for value: {value}")]
    NoMatch { value: String },

    #[error("attempted to divide by zero")]
    DivideByZero,

    #[error("message index {index} is out of bounds for a batch of {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("failed to parse message as JSON: {0}")]
    Json(String),

    /// Failure raised by a function or method implementation
    #[error("{0}")]
    Function(String),
}

impl EvalError {
    /// Type error for `value` where a value of kind `expected` was required
    pub fn mismatch(expected: &'static str, value: &Value) -> Self {
        EvalError::TypeMismatch {
            expected,
            found: value.kind(),
            value: value.describe(),
        }
    }
}

/// The executable-node contract.
pub trait Exec {
    /// Evaluate against a context, producing a fresh value.
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value, EvalError>;
}

impl Exec for Node {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
        match self {
            Node::Literal(value) => Ok(value.clone()),
            Node::DynamicArray(items) => {
                // Element errors carry no positional context
                let mut arr = Vec::with_capacity(items.len());
                for item in items {
                    arr.push(item.exec(ctx)?);
                }
                Ok(Value::Array(arr))
            }
            Node::DynamicObject(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key_node, value_node) in entries {
                    let key = match key_node.exec(ctx)? {
                        Value::String(s) => s,
                        other => return Err(EvalError::KeyType { found: other.kind() }),
                    };
                    let value = value_node.exec(ctx).map_err(|e| EvalError::Field {
                        key: key.clone(),
                        source: Box::new(e),
                    })?;
                    map.insert(key, value);
                }
                Ok(Value::Object(map))
            }
            Node::FunctionCall { function, args, .. } => {
                let args = Args::resolve(function.signature(), args, ctx)?;
                function.call(&args, ctx)
            }
            Node::MethodCall {
                target,
                method,
                args,
                ..
            } => {
                let args = Args::resolve(method.signature(), args, ctx)?;
                method.call(target, &args, ctx)
            }
            Node::BinaryOp { op, left, right } => eval_binary(*op, left, right, ctx),
            Node::PathAccess { root, segments } => eval_path(root, segments, ctx),
            Node::Scoped { target, query } => {
                let value = target.exec(ctx)?;
                query.exec(&ctx.with_value(&value))
            }
            Node::Match { target, cases } => eval_match(target, cases, ctx),
        }
    }
}

fn eval_path(
    root: &PathRoot,
    segments: &[String],
    ctx: &FunctionContext<'_>,
) -> Result<Value, EvalError> {
    let base = match root {
        PathRoot::Context => ctx.this()?,
        PathRoot::Target(node) => Cow::Owned(node.exec(ctx)?),
    };
    let selected = select_path(&base, segments.iter().map(String::as_str))?;
    Ok(selected.cloned().unwrap_or(Value::Null))
}

/// Walk `segments` down from `value`.
///
/// Absent fields, and fields of absent values, resolve to `None` rather than
/// an error. Selecting a field from a scalar is an error. Numeric segments
/// index into arrays.
pub fn select_path<'v, 's>(
    value: &'v Value,
    segments: impl IntoIterator<Item = &'s str>,
) -> Result<Option<&'v Value>, EvalError> {
    let mut current = Some(value);
    for segment in segments {
        current = match current {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Object(map)) => map.get(segment),
            Some(Value::Array(items)) => match segment.parse::<usize>() {
                Ok(index) => items.get(index),
                Err(_) => {
                    return Err(EvalError::Select {
                        field: segment.to_string(),
                        found: "array",
                    });
                }
            },
            Some(other) => {
                return Err(EvalError::Select {
                    field: segment.to_string(),
                    found: other.kind(),
                });
            }
        };
    }
    Ok(current)
}

fn eval_binary(
    op: BinOp,
    left: &Node,
    right: &Node,
    ctx: &FunctionContext<'_>,
) -> Result<Value, EvalError> {
    if op == BinOp::Coalesce {
        return match left.exec(ctx) {
            Ok(value) => Ok(value),
            Err(err) => {
                log::trace!("fallback operator recovered from: {}", err);
                right.exec(ctx)
            }
        };
    }
    let left_val = left.exec(ctx)?;
    let right_val = right.exec(ctx)?;
    apply_binop(op, &left_val, &right_val)
}

fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            _ => arithmetic(op, left, right),
        },
        BinOp::Subtract | BinOp::Multiply | BinOp::Divide => arithmetic(op, left, right),
        BinOp::Equal => Ok(Value::Bool(left.loose_eq(right))),
        BinOp::NotEqual => Ok(Value::Bool(!left.loose_eq(right))),
        BinOp::LessThan => compare(left, right).map(|o| Value::Bool(o == Ordering::Less)),
        BinOp::GreaterThan => compare(left, right).map(|o| Value::Bool(o == Ordering::Greater)),
        BinOp::LessEqual => compare(left, right).map(|o| Value::Bool(o != Ordering::Greater)),
        BinOp::GreaterEqual => compare(left, right).map(|o| Value::Bool(o != Ordering::Less)),
        BinOp::And => Ok(Value::Bool(left.expect_bool()? && right.expect_bool()?)),
        BinOp::Or => Ok(Value::Bool(left.expect_bool()? || right.expect_bool()?)),
        BinOp::Coalesce => unreachable!("Coalesce handled in eval_binary"),
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(n) => Some(Decimal::from(*n)),
        Value::Float(n) => Decimal::from_f64(*n),
        _ => None,
    }
}

/// Numeric arithmetic. The result is always a float, computed in decimal
/// where both operands are representable.
fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let a = left.expect_number()?;
    let b = right.expect_number()?;

    if op == BinOp::Divide && b == 0.0 {
        return Err(EvalError::DivideByZero);
    }

    if let Some(ad) = to_decimal(left)
        && let Some(bd) = to_decimal(right)
    {
        let rd = match op {
            BinOp::Add => ad.checked_add(bd),
            BinOp::Subtract => ad.checked_sub(bd),
            BinOp::Multiply => ad.checked_mul(bd),
            BinOp::Divide => ad.checked_div(bd),
            _ => None,
        };
        if let Some(r) = rd.and_then(|d| d.to_f64()) {
            return Ok(Value::Float(r));
        }
    }

    let res = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => a / b,
        _ => unreachable!("arithmetic called with non-arithmetic operator {}", op),
    };
    Ok(Value::Float(res))
}

/// Order two values. Numbers compare with numbers and strings with strings.
fn compare(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    match left {
        Value::Int(_) | Value::Float(_) => {
            let a = left.expect_number()?;
            let b = right.expect_number()?;
            Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
        }
        Value::String(a) => {
            let b = right.expect_string()?;
            Ok(a.as_str().cmp(b))
        }
        other => Err(EvalError::mismatch("number", other)),
    }
}

fn eval_match(
    target: &Node,
    cases: &[MatchCase],
    ctx: &FunctionContext<'_>,
) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    let scoped = ctx.with_value(&value);

    for case in cases {
        let matched = match &case.pattern {
            Pattern::Wildcard => true,
            Pattern::Query(Node::Literal(expected)) => expected.loose_eq(&value),
            Pattern::Query(query) => match query.exec(&scoped)? {
                Value::Bool(b) => b,
                other => other.loose_eq(&value),
            },
        };
        if matched {
            return case.result.exec(&scoped);
        }
    }

    Err(EvalError::NoMatch {
        value: value.describe(),
    })
}
