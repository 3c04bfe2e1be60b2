//! Function and method registry.
//!
//! The registry maps names to implementations together with a [`Signature`]
//! describing how many arguments they take and of which kinds. It is
//! populated once during bootstrap and only read afterwards: the parser
//! resolves every call site against it, checks argument counts, and checks
//! the kinds of literal arguments. Dynamic arguments are checked when they
//! are evaluated.

use std::{collections::HashMap, fmt, sync::Arc};

use thiserror::Error;

use crate::{
    ast::Node,
    evaluator::{EvalError, Exec, FunctionContext},
    value::Value,
};

/// Implementation of a function: receives its evaluated arguments.
pub type FunctionImpl =
    dyn Fn(&Args<'_>, &FunctionContext<'_>) -> Result<Value, EvalError> + Send + Sync;

/// Implementation of a method: receives the (unevaluated) target node and its
/// arguments. Most methods simply execute the target first, but some need to
/// evaluate it under a different context, e.g. against another message.
pub type MethodImpl =
    dyn Fn(&Node, &Args<'_>, &FunctionContext<'_>) -> Result<Value, EvalError> + Send + Sync;

/// Specialises a method to the argument nodes of one call site, once, when
/// the call is parsed. `Ok(None)` keeps the general implementation; an
/// error rejects the query.
pub type MethodBinder = dyn Fn(&[Node]) -> Result<Option<Box<MethodImpl>>, String> + Send + Sync;

/// Box a closure as a method implementation.
pub fn method_impl<F>(imp: F) -> Box<MethodImpl>
where
    F: Fn(&Node, &Args<'_>, &FunctionContext<'_>) -> Result<Value, EvalError>
        + Send
        + Sync
        + 'static,
{
    Box::new(imp)
}

/// Errors raised while populating a registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("function '{0}' is already registered")]
    DuplicateFunction(String),

    #[error("method '{0}' is already registered")]
    DuplicateMethod(String),

    #[error("invalid signature for '{name}': {reason}")]
    InvalidSignature { name: String, reason: String },
}

/// Kind of value a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Any,
    Bool,
    Int,
    Number,
    String,
    /// Passed to the implementation unevaluated, to be executed under a
    /// context of its choosing
    Query,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Any => "any",
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Number => "number",
            ParamKind::String => "string",
            ParamKind::Query => "query",
        }
    }

    /// Whether a value of this kind is acceptable as an argument. Whole
    /// floats are acceptable ints, since arithmetic always yields floats.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::Any | ParamKind::Query => true,
            ParamKind::Bool => matches!(value, Value::Bool(_)),
            ParamKind::Int => whole_number(value).is_some(),
            ParamKind::Number => value.is_number(),
            ParamKind::String => matches!(value, Value::String(_)),
        }
    }
}

/// The integer a finite, fractionless number holds
fn whole_number(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f)
            if f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            Some(*f as i64)
        }
        _ => None,
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared arity and parameter kinds of a function or method.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    min: usize,
    max: usize,
    kinds: Vec<ParamKind>,
}

impl Signature {
    /// Parameters beyond the end of `kinds` accept any value.
    pub fn new(min: usize, max: usize, kinds: Vec<ParamKind>) -> Self {
        Signature { min, max, kinds }
    }

    /// No arguments
    pub fn none() -> Self {
        Signature::new(0, 0, Vec::new())
    }

    /// Exactly the given parameters, all required
    pub fn exact(kinds: Vec<ParamKind>) -> Self {
        Signature::new(kinds.len(), kinds.len(), kinds)
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn kind(&self, index: usize) -> ParamKind {
        self.kinds.get(index).copied().unwrap_or(ParamKind::Any)
    }

    fn validate(&self, name: &str) -> Result<(), RegistryError> {
        if self.min > self.max {
            return Err(RegistryError::InvalidSignature {
                name: name.to_string(),
                reason: format!("minimum of {} exceeds maximum of {}", self.min, self.max),
            });
        }
        if self.kinds.len() > self.max {
            return Err(RegistryError::InvalidSignature {
                name: name.to_string(),
                reason: format!("{} parameter kinds for at most {} arguments", self.kinds.len(), self.max),
            });
        }
        Ok(())
    }

    /// Parse-time check of a call site: argument count always, argument kind
    /// only where the argument is a literal.
    pub fn check(&self, args: &[Node]) -> Result<(), String> {
        let received = args.len();
        if self.min == self.max && received != self.min {
            return Err(format!("expected {} arguments, received: {}", self.min, received));
        }
        if received < self.min {
            return Err(format!("expected at least {} arguments, received: {}", self.min, received));
        }
        if received > self.max {
            return Err(format!("expected at most {} arguments, received: {}", self.max, received));
        }
        for (i, arg) in args.iter().enumerate() {
            let kind = self.kind(i);
            if let Node::Literal(value) = arg
                && !kind.accepts(value)
            {
                return Err(format!("expected {} argument, received {}", kind, value.kind()));
            }
        }
        Ok(())
    }

    /// Human readable parameter list, e.g. `string, [int]`
    pub fn describe(&self) -> String {
        (0..self.max)
            .map(|i| {
                if i < self.min {
                    self.kind(i).to_string()
                } else {
                    format!("[{}]", self.kind(i))
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A single argument as seen by an implementation.
#[derive(Debug)]
pub enum Arg<'n> {
    Value(Value),
    Query(&'n Node),
}

/// Arguments of a call, evaluated left to right except for
/// [`ParamKind::Query`] parameters.
#[derive(Debug)]
pub struct Args<'n> {
    args: Vec<Arg<'n>>,
}

impl<'n> Args<'n> {
    /// Evaluate the argument nodes of a call site.
    pub fn resolve(
        signature: &Signature,
        nodes: &'n [Node],
        ctx: &FunctionContext<'_>,
    ) -> Result<Self, EvalError> {
        let mut args = Vec::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            let kind = signature.kind(i);
            if kind == ParamKind::Query {
                args.push(Arg::Query(node));
                continue;
            }
            let value = node.exec(ctx)?;
            if !kind.accepts(&value) {
                return Err(EvalError::mismatch(kind.name(), &value));
            }
            let value = match (kind, whole_number(&value)) {
                (ParamKind::Int, Some(i)) => Value::Int(i),
                _ => value,
            };
            args.push(Arg::Value(value));
        }
        Ok(Args { args })
    }

    /// Arguments that are already values
    pub fn from_values(values: Vec<Value>) -> Self {
        Args {
            args: values.into_iter().map(Arg::Value).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.args.get(index) {
            Some(Arg::Value(v)) => Some(v),
            _ => None,
        }
    }

    fn required(&self, index: usize) -> Result<&Value, EvalError> {
        self.value(index)
            .ok_or_else(|| EvalError::Function(format!("missing argument {}", index)))
    }

    pub fn string(&self, index: usize) -> Result<&str, EvalError> {
        self.required(index)?.expect_string()
    }

    pub fn opt_string(&self, index: usize) -> Result<Option<&str>, EvalError> {
        self.value(index).map(Value::expect_string).transpose()
    }

    pub fn int(&self, index: usize) -> Result<i64, EvalError> {
        self.required(index)?.expect_int()
    }

    pub fn query(&self, index: usize) -> Result<&'n Node, EvalError> {
        match self.args.get(index) {
            Some(Arg::Query(node)) => Ok(node),
            _ => Err(EvalError::Function(format!("missing query argument {}", index))),
        }
    }
}

/// A registered function.
pub struct Function {
    name: String,
    signature: Signature,
    imp: Box<FunctionImpl>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, args: &Args<'_>, ctx: &FunctionContext<'_>) -> Result<Value, EvalError> {
        (self.imp)(args, ctx)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// A registered method.
pub struct Method {
    name: String,
    signature: Signature,
    imp: Box<MethodImpl>,
    binder: Option<Box<MethodBinder>>,
}

impl Method {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(
        &self,
        target: &Node,
        args: &Args<'_>,
        ctx: &FunctionContext<'_>,
    ) -> Result<Value, EvalError> {
        (self.imp)(target, args, ctx)
    }

    /// The method specialised to the arguments of one call, if it has a
    /// binder that chose to specialise them.
    pub fn bind(&self, args: &[Node]) -> Result<Option<Method>, String> {
        let Some(binder) = &self.binder else {
            return Ok(None);
        };
        Ok(binder(args)?.map(|imp| Method {
            name: self.name.clone(),
            signature: self.signature.clone(),
            imp,
            binder: None,
        }))
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("binds", &self.binder.is_some())
            .finish()
    }
}

/// Name to implementation table for functions and methods.
///
/// Functions and methods live in separate namespaces. Methods are looked up
/// by name only, independent of the type of their target.
#[derive(Debug, Default)]
pub struct Registry {
    functions: HashMap<String, Arc<Function>>,
    methods: HashMap<String, Arc<Method>>,
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in functions and methods
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut registry = Registry::new();
        crate::functions::register_all(&mut registry)?;
        crate::methods::register_all(&mut registry)?;
        Ok(registry)
    }

    pub fn register_function<F>(
        &mut self,
        name: &str,
        signature: Signature,
        imp: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Args<'_>, &FunctionContext<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        signature.validate(name)?;
        if self.functions.contains_key(name) {
            return Err(RegistryError::DuplicateFunction(name.to_string()));
        }
        self.functions.insert(
            name.to_string(),
            Arc::new(Function {
                name: name.to_string(),
                signature,
                imp: Box::new(imp),
            }),
        );
        Ok(())
    }

    pub fn register_method<F>(
        &mut self,
        name: &str,
        signature: Signature,
        imp: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Node, &Args<'_>, &FunctionContext<'_>) -> Result<Value, EvalError>
            + Send
            + Sync
            + 'static,
    {
        self.insert_method(name, signature, method_impl(imp), None)
    }

    /// Register a method whose call sites are specialised by `binder` when
    /// parsed, e.g. to compile a literal argument once.
    pub fn register_method_with_binder<F, B>(
        &mut self,
        name: &str,
        signature: Signature,
        imp: F,
        binder: B,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Node, &Args<'_>, &FunctionContext<'_>) -> Result<Value, EvalError>
            + Send
            + Sync
            + 'static,
        B: Fn(&[Node]) -> Result<Option<Box<MethodImpl>>, String> + Send + Sync + 'static,
    {
        self.insert_method(name, signature, method_impl(imp), Some(Box::new(binder)))
    }

    fn insert_method(
        &mut self,
        name: &str,
        signature: Signature,
        imp: Box<MethodImpl>,
        binder: Option<Box<MethodBinder>>,
    ) -> Result<(), RegistryError> {
        signature.validate(name)?;
        if self.methods.contains_key(name) {
            return Err(RegistryError::DuplicateMethod(name.to_string()));
        }
        self.methods.insert(
            name.to_string(),
            Arc::new(Method {
                name: name.to_string(),
                signature,
                imp,
                binder,
            }),
        );
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&Arc<Function>> {
        self.functions.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&Arc<Method>> {
        self.methods.get(name)
    }

    /// Registered functions, sorted by name
    pub fn functions(&self) -> Vec<&Function> {
        let mut all: Vec<&Function> = self.functions.values().map(Arc::as_ref).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Registered methods, sorted by name
    pub fn methods(&self) -> Vec<&Method> {
        let mut all: Vec<&Method> = self.methods.values().map(Arc::as_ref).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Batch, Message};

    fn constant(_: &Args<'_>, _: &FunctionContext<'_>) -> Result<Value, EvalError> {
        Ok(Value::Int(1))
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = Registry::new();
        registry.register_function("one", Signature::none(), constant).unwrap();
        let err = registry
            .register_function("one", Signature::none(), constant)
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateFunction("one".into()));
        assert_eq!(err.to_string(), "function 'one' is already registered");
    }

    #[test]
    fn test_functions_and_methods_are_separate_namespaces() {
        let mut registry = Registry::new();
        registry.register_function("one", Signature::none(), constant).unwrap();
        registry
            .register_method("one", Signature::none(), |target, _, ctx| target.exec(ctx))
            .unwrap();
        assert!(registry.function("one").is_some());
        assert!(registry.method("one").is_some());
    }

    #[test]
    fn test_binder_specialises_literal_arguments() {
        let mut registry = Registry::new();
        registry
            .register_method_with_binder(
                "pick",
                Signature::exact(vec![ParamKind::Any]),
                |_, args, _| Ok(args.value(0).cloned().unwrap_or(Value::Null)),
                |args| match args.first() {
                    Some(Node::Literal(Value::Int(n))) if *n < 0 => {
                        Err("index must not be negative".to_string())
                    }
                    Some(Node::Literal(Value::Int(_))) => {
                        Ok(Some(method_impl(|_, _, _| Ok(Value::from("bound")))))
                    }
                    _ => Ok(None),
                },
            )
            .unwrap();
        let method = registry.method("pick").unwrap();

        assert!(method.bind(&[Node::this()]).unwrap().is_none());
        assert_eq!(
            method.bind(&[Node::Literal(Value::Int(-1))]).unwrap_err(),
            "index must not be negative"
        );

        let bound = method.bind(&[Node::Literal(Value::Int(1))]).unwrap().unwrap();
        assert_eq!(bound.name(), "pick");
        let batch = Batch::single(Message::new("{}"));
        let ctx = FunctionContext::new(0, &batch);
        assert_eq!(
            bound.call(&Node::this(), &Args::from_values(vec![Value::Int(1)]), &ctx).unwrap(),
            Value::from("bound")
        );
        assert!(bound.bind(&[Node::Literal(Value::Int(1))]).unwrap().is_none());
    }

    #[test]
    fn test_invalid_signature() {
        let mut registry = Registry::new();
        let err = registry
            .register_function("bad", Signature::new(2, 1, vec![]), constant)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSignature { .. }));
    }

    #[test]
    fn test_builtins_register_cleanly() {
        let registry = Registry::with_builtins().unwrap();
        assert!(registry.function("json").is_some());
        assert!(registry.method("uppercase").is_some());
    }

    #[test]
    fn test_signature_check() {
        let sig = Signature::new(1, 2, vec![ParamKind::String, ParamKind::Int]);
        assert_eq!(
            sig.check(&[]).unwrap_err(),
            "expected at least 1 arguments, received: 0"
        );
        assert_eq!(
            sig.check(&[Node::Literal(Value::Int(5))]).unwrap_err(),
            "expected string argument, received int64"
        );
        assert!(sig.check(&[Node::this()]).is_ok());
        assert_eq!(
            sig.check(&[
                Node::Literal("a".into()),
                Node::Literal(Value::Float(1.5)),
            ])
            .unwrap_err(),
            "expected int argument, received float64"
        );
        assert_eq!(sig.describe(), "string, [int]");

        let exact = Signature::exact(vec![ParamKind::Int]);
        assert_eq!(exact.check(&[]).unwrap_err(), "expected 1 arguments, received: 0");
    }

    #[test]
    fn test_whole_floats_resolve_as_ints() {
        let batch = Batch::single(Message::new("{}"));
        let ctx = FunctionContext::new(0, &batch);
        let sig = Signature::exact(vec![ParamKind::Int]);

        let nodes = [Node::Literal(Value::Float(3.0))];
        let args = Args::resolve(&sig, &nodes, &ctx).unwrap();
        assert_eq!(args.value(0), Some(&Value::Int(3)));

        let cases = [
            ("fraction", Value::Float(1.5)),
            ("infinite", Value::Float(f64::INFINITY)),
            ("not a number", Value::Float(f64::NAN)),
            ("string", Value::String("3".into())),
        ];
        for (name, value) in cases {
            assert!(!ParamKind::Int.accepts(&value), "case: {}", name);
        }
        assert!(ParamKind::Int.accepts(&Value::Float(-2.0)));
    }
}
