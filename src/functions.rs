//! Built-in functions.
//!
//! Functions read from the message being processed rather than from a prior
//! value: its JSON document, raw content and metadata, or its position in
//! the batch.

use indexmap::IndexMap;

use crate::{
    evaluator::{EvalError, FunctionContext, select_path},
    registry::{Args, ParamKind, Registry, RegistryError, Signature},
    value::Value,
};

/// Register every built-in function.
pub fn register_all(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register_function(
        "json",
        Signature::new(0, 1, vec![ParamKind::String]),
        json,
    )?;
    registry.register_function(
        "meta",
        Signature::new(0, 1, vec![ParamKind::String]),
        meta,
    )?;
    registry.register_function("content", Signature::none(), content)?;
    registry.register_function("batch_index", Signature::none(), batch_index)?;
    registry.register_function("batch_size", Signature::none(), batch_size)?;
    registry.register_function("env", Signature::exact(vec![ParamKind::String]), env)?;
    Ok(())
}

/// Split a dotted path into segments; the empty path selects the root.
pub(crate) fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

// ========================================
// Message Functions
// ========================================

/// json([path]) - the message document, or a field of it
fn json(args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let doc = ctx.document()?;
    let Some(path) = args.opt_string(0)? else {
        return Ok(doc.into_owned());
    };
    Ok(select_path(&doc, path_segments(path))?
        .cloned()
        .unwrap_or(Value::Null))
}

/// meta([key]) - a metadata value, or all metadata as an object
fn meta(args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    match args.opt_string(0)? {
        Some(key) => Ok(ctx
            .batch
            .metadata(ctx.index, key)
            .map(Value::from)
            .unwrap_or(Value::Null)),
        None => {
            let map: IndexMap<String, Value> = ctx
                .batch
                .metadata_pairs(ctx.index)
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::from(v)))
                .collect();
            Ok(Value::Object(map))
        }
    }
}

/// content() - the raw message content
fn content(_: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    ctx.batch
        .content(ctx.index)
        .map(|c| Value::Bytes(c.to_vec()))
        .ok_or(EvalError::IndexOutOfBounds {
            index: ctx.index,
            len: ctx.batch.len(),
        })
}

// ========================================
// Batch Functions
// ========================================

fn batch_index(_: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::Int(ctx.index as i64))
}

fn batch_size(_: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::Int(ctx.batch.len() as i64))
}

// ========================================
// Environment
// ========================================

/// env(name) - an environment variable, null when unset
fn env(args: &Args<'_>, _: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let name = args.string(0)?;
    Ok(std::env::var(name).map(Value::from).unwrap_or(Value::Null))
}
