//! Built-in methods.
//!
//! A method receives its target unevaluated. Most execute it straight away
//! and transform the result; `from`, `from_all`, `catch` and `or` control how
//! and whether the target is evaluated.

use std::borrow::Cow;

use regex::Regex;

use crate::{
    ast::Node,
    evaluator::{EvalError, Exec, FunctionContext, select_path},
    functions::path_segments,
    registry::{Args, MethodImpl, ParamKind, Registry, RegistryError, Signature, method_impl},
    value::Value,
};

/// Register every built-in method.
pub fn register_all(registry: &mut Registry) -> Result<(), RegistryError> {
    use ParamKind::{Any, Int, Query};
    const STR: ParamKind = ParamKind::String;

    // Strings
    registry.register_method("uppercase", Signature::none(), uppercase)?;
    registry.register_method("lowercase", Signature::none(), lowercase)?;
    registry.register_method("trim", Signature::none(), trim)?;
    registry.register_method("split", Signature::exact(vec![STR]), split)?;
    registry.register_method_with_binder(
        "re_match",
        Signature::exact(vec![STR]),
        re_match,
        bind_re_match,
    )?;
    registry.register_method_with_binder(
        "re_replace",
        Signature::exact(vec![STR, STR]),
        re_replace,
        bind_re_replace,
    )?;

    // Coercion and inspection
    registry.register_method("length", Signature::none(), length)?;
    registry.register_method("type", Signature::none(), type_of)?;
    registry.register_method("number", Signature::none(), number)?;
    registry.register_method("string", Signature::none(), string)?;
    registry.register_method("not_null", Signature::none(), not_null)?;

    // Collections
    registry.register_method("contains", Signature::exact(vec![Any]), contains)?;
    registry.register_method("join", Signature::exact(vec![STR]), join)?;
    registry.register_method("keys", Signature::none(), keys)?;
    registry.register_method("sum", Signature::none(), sum)?;
    registry.register_method("exists", Signature::exact(vec![STR]), exists)?;
    registry.register_method("get", Signature::exact(vec![STR]), get)?;

    // Control
    registry.register_method("from", Signature::exact(vec![Int]), from)?;
    registry.register_method("from_all", Signature::none(), from_all)?;
    registry.register_method("map", Signature::exact(vec![Query]), map)?;
    registry.register_method("catch", Signature::exact(vec![Query]), catch)?;
    registry.register_method("or", Signature::exact(vec![Query]), or)?;
    Ok(())
}

/// Text of a string or bytes value
fn text(value: &Value) -> Result<Cow<'_, str>, EvalError> {
    match value {
        Value::String(s) => Ok(Cow::Borrowed(s)),
        Value::Bytes(b) => Ok(String::from_utf8_lossy(b)),
        other => Err(EvalError::mismatch("string", other)),
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern)
        .map_err(|e| EvalError::Function(format!("invalid regular expression: {}", e)))
}

/// A pattern given as a string literal, compiled while parsing.
fn literal_regex(args: &[Node]) -> Result<Option<Regex>, String> {
    match args.first() {
        Some(Node::Literal(Value::String(pattern))) => compile_regex(pattern)
            .map(Some)
            .map_err(|e| e.to_string()),
        _ => Ok(None),
    }
}

// ========================================
// String Methods
// ========================================

/// .uppercase() - converts string to uppercase
fn uppercase(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    Ok(Value::String(text(&value)?.to_uppercase()))
}

/// .lowercase() - converts string to lowercase
fn lowercase(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    Ok(Value::String(text(&value)?.to_lowercase()))
}

fn trim(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    Ok(Value::String(text(&value)?.trim().to_string()))
}

/// .split(delimiter) - splits string into array; an empty delimiter splits
/// into characters
fn split(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    let s = text(&value)?;
    let delim = args.string(0)?;
    let parts = if delim.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(delim).map(Value::from).collect()
    };
    Ok(Value::Array(parts))
}

/// .re_match(pattern) - whether the string matches a regular expression
fn re_match(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let re = compile_regex(args.string(0)?)?;
    let value = target.exec(ctx)?;
    Ok(Value::Bool(re.is_match(&text(&value)?)))
}

fn bind_re_match(args: &[Node]) -> Result<Option<Box<MethodImpl>>, String> {
    Ok(literal_regex(args)?.map(|re| {
        method_impl(move |target, _, ctx| {
            let value = target.exec(ctx)?;
            Ok(Value::Bool(re.is_match(&text(&value)?)))
        })
    }))
}

/// .re_replace(pattern, replacement) - replaces all matches; `$1` style
/// references in the replacement expand to capture groups
fn re_replace(
    target: &Node,
    args: &Args<'_>,
    ctx: &FunctionContext<'_>,
) -> Result<Value, EvalError> {
    let re = compile_regex(args.string(0)?)?;
    let replacement = args.string(1)?;
    let value = target.exec(ctx)?;
    Ok(Value::String(
        re.replace_all(&text(&value)?, replacement).into_owned(),
    ))
}

fn bind_re_replace(args: &[Node]) -> Result<Option<Box<MethodImpl>>, String> {
    Ok(literal_regex(args)?.map(|re| {
        method_impl(move |target, args, ctx| {
            let replacement = args.string(1)?;
            let value = target.exec(ctx)?;
            Ok(Value::String(
                re.replace_all(&text(&value)?, replacement).into_owned(),
            ))
        })
    }))
}

// ========================================
// Coercion Methods
// ========================================

/// .length() - characters of a string, bytes of content, or entries of an
/// array or object
fn length(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let len = match target.exec(ctx)? {
        Value::String(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(EvalError::mismatch("string or array", &other)),
    };
    Ok(Value::Int(len as i64))
}

/// .type() - the type name as a string
fn type_of(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    let name = if value.is_number() { "number" } else { value.kind() };
    Ok(Value::from(name))
}

/// .number() - parses strings, passes numbers through as floats
fn number(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    if let Some(n) = value.as_float() {
        return Ok(Value::Float(n));
    }
    text(&value)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map(Value::Float)
        .ok_or_else(|| EvalError::mismatch("number", &value))
}

/// .string() - strings as-is, everything else as JSON text
fn string(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    Ok(Value::String(target.exec(ctx)?.to_string()))
}

fn not_null(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    match target.exec(ctx)? {
        Value::Null => Err(EvalError::Function("value is null".to_string())),
        value => Ok(value),
    }
}

// ========================================
// Collection Methods
// ========================================

/// .contains(value) - substring of a string, element of an array, or value
/// of an object
fn contains(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let needle = args.value(0).unwrap_or(&Value::Null);
    let found = match target.exec(ctx)? {
        Value::Array(items) => items.iter().any(|v| v.loose_eq(needle)),
        Value::Object(map) => map.values().any(|v| v.loose_eq(needle)),
        value => text(&value)?.contains(needle.expect_string()?),
    };
    Ok(Value::Bool(found))
}

/// .join(delimiter) - joins an array of strings
fn join(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    let delim = args.string(0)?;
    let parts = value
        .expect_array()?
        .iter()
        .map(text)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::String(parts.join(delim)))
}

/// .keys() - object keys in insertion order
fn keys(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    let keys = value
        .expect_object()?
        .keys()
        .map(|k| Value::String(k.clone()))
        .collect();
    Ok(Value::Array(keys))
}

/// .sum() - sum of an array of numbers, always a float
fn sum(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    let mut total = 0.0;
    for item in value.expect_array()? {
        total += item.expect_number()?;
    }
    Ok(Value::Float(total))
}

/// .exists(path) - whether a dotted path is present, even if null
fn exists(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    let path = args.string(0)?;
    Ok(Value::Bool(matches!(
        select_path(&value, path_segments(path)),
        Ok(Some(_))
    )))
}

/// .get(path) - the value at a dotted path, null when absent
fn get(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let value = target.exec(ctx)?;
    let path = args.string(0)?;
    Ok(select_path(&value, path_segments(path))?
        .cloned()
        .unwrap_or(Value::Null))
}

// ========================================
// Control Methods
// ========================================

/// .from(index) - evaluates the target against another message of the batch
fn from(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let index = args.int(0)?;
    let len = ctx.batch.len();
    let index = usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| {
            EvalError::Function(format!(
                "message index {} is out of bounds for a batch of {}",
                index, len
            ))
        })?;
    target.exec(&FunctionContext::new(index, ctx.batch))
}

/// .from_all() - evaluates the target against every message of the batch
fn from_all(target: &Node, _: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let results = (0..ctx.batch.len())
        .map(|i| target.exec(&FunctionContext::new(i, ctx.batch)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(results))
}

/// .map(query) - evaluates the query with the target as `this`
fn map(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    let query = args.query(0)?;
    let value = target.exec(ctx)?;
    query.exec(&ctx.with_value(&value))
}

/// .catch(query) - evaluates the query if the target fails
fn catch(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    match target.exec(ctx) {
        Ok(value) => Ok(value),
        Err(_) => args.query(0)?.exec(ctx),
    }
}

/// .or(query) - evaluates the query if the target fails or is null
fn or(target: &Node, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
    match target.exec(ctx) {
        Ok(value) if !value.is_null() => Ok(value),
        _ => args.query(0)?.exec(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Batch, Message};

    fn lit(value: impl Into<Value>) -> Node {
        Node::Literal(value.into())
    }

    fn call(
        f: fn(&Node, &Args<'_>, &FunctionContext<'_>) -> Result<Value, EvalError>,
        target: Node,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let batch = Batch::single(Message::new("{}"));
        let ctx = FunctionContext::new(0, &batch);
        f(&target, &Args::from_values(args), &ctx)
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(call(uppercase, lit("abc"), vec![]).unwrap(), Value::from("ABC"));
        assert_eq!(call(trim, lit("  a "), vec![]).unwrap(), Value::from("a"));
        assert_eq!(
            call(split, lit("a,b"), vec![Value::from(",")]).unwrap(),
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );
        let err = call(uppercase, lit(5i64), vec![]).unwrap_err();
        assert_eq!(err.to_string(), "expected string value, found int64: 5");
    }

    #[test]
    fn test_regex_methods() {
        assert_eq!(
            call(re_match, lit("abc123"), vec![Value::from("[0-9]+$")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                re_replace,
                lit("a1b22"),
                vec![Value::from("[0-9]+"), Value::from("#")]
            )
            .unwrap(),
            Value::from("a#b#")
        );
        let err = call(re_match, lit("x"), vec![Value::from("(")]).unwrap_err();
        assert!(err.to_string().starts_with("invalid regular expression"));
    }

    #[test]
    fn test_regex_binders_compile_literal_patterns() {
        assert!(bind_re_match(&[Node::this()]).unwrap().is_none());
        assert!(bind_re_replace(&[Node::this(), lit("#")]).unwrap().is_none());

        let err = bind_re_match(&[lit("(")]).err().unwrap();
        assert!(err.starts_with("invalid regular expression"), "{}", err);

        let bound = bind_re_replace(&[lit("[0-9]+"), lit("#")]).unwrap().unwrap();
        let batch = Batch::single(Message::new("{}"));
        let ctx = FunctionContext::new(0, &batch);
        let args = Args::from_values(vec![Value::from("[0-9]+"), Value::from("#")]);
        assert_eq!(bound(&lit("a1b22"), &args, &ctx).unwrap(), Value::from("a#b#"));
    }

    #[test]
    fn test_number_and_string() {
        assert_eq!(call(number, lit("2.5"), vec![]).unwrap(), Value::Float(2.5));
        assert_eq!(call(number, lit(3i64), vec![]).unwrap(), Value::Float(3.0));
        let err = call(number, lit("abc"), vec![]).unwrap_err();
        assert_eq!(err.to_string(), "expected number value, found string: abc");
        assert_eq!(call(string, lit(true), vec![]).unwrap(), Value::from("true"));
    }

    #[test]
    fn test_collection_methods() {
        let arr = lit(Value::Array(vec![Value::from("a"), Value::from("b")]));
        assert_eq!(
            call(join, arr.clone(), vec![Value::from("-")]).unwrap(),
            Value::from("a-b")
        );
        assert_eq!(
            call(contains, arr, vec![Value::from("b")]).unwrap(),
            Value::Bool(true)
        );
        let nums = lit(Value::Array(vec![Value::Int(1), Value::Float(2.5)]));
        assert_eq!(call(sum, nums, vec![]).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn test_not_null() {
        let err = call(not_null, lit(Value::Null), vec![]).unwrap_err();
        assert_eq!(err.to_string(), "value is null");
    }
}
