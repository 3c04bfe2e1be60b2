//! Function and method call syntax.
//!
//! Calls are resolved against the registry as soon as their arguments have
//! been parsed, so unknown names and bad arity fail at parse time, reported
//! at the offset of the name.

use std::sync::Arc;

use crate::{ast::Node, registry::Signature};

use super::{
    Syntax,
    combinators::{ListSyntax, delimited_list, identifier, peek},
    error::{PResult, ParseError},
    query::QueryParser,
};

const ARGUMENTS: ListSyntax<'static> = ListSyntax {
    open: '(',
    close: ')',
    unterminated: "expected comma or closing bracket",
    item: Some("expected boolean, number, quoted string, or query"),
};

impl QueryParser<'_> {
    /// `name(args)`, or in the deprecated grammar also `name:arg`.
    pub(super) fn function_call(&self, pos: usize) -> PResult<Node> {
        let (name, after_name) = identifier(self.input, pos)?;

        let (args, end) = if peek(self.input, after_name, '(') {
            self.arguments(after_name)?
        } else if self.syntax == Syntax::Deprecated && peek(self.input, after_name, ':') {
            log::warn!(
                "function '{}' uses the deprecated colon argument syntax, use {}(...) instead",
                name,
                name
            );
            self.colon_argument(after_name + 1)
        } else {
            return Err(ParseError::recoverable(after_name, "expected function arguments"));
        };

        let function = self
            .registry
            .function(&name)
            .ok_or_else(|| ParseError::fatal(pos, format!("unrecognised function '{}'", name)))?;
        check_arguments(function.signature(), &args, pos)?;

        let node = Node::FunctionCall {
            name,
            args,
            function: Arc::clone(function),
        };
        Ok((node, end))
    }

    /// `.name(args)` on `target`; `name_pos` is the offset of the name and
    /// `pos` the offset of its opening bracket.
    pub(super) fn method_call(
        &self,
        target: Node,
        name: String,
        name_pos: usize,
        pos: usize,
    ) -> PResult<Node> {
        let (args, end) = self.arguments(pos)?;

        let method = self.registry.method(&name).ok_or_else(|| {
            ParseError::fatal(name_pos, format!("unrecognised method '{}'", name))
        })?;
        check_arguments(method.signature(), &args, name_pos)?;
        let method = match method
            .bind(&args)
            .map_err(|message| ParseError::fatal(name_pos, message))?
        {
            Some(bound) => Arc::new(bound),
            None => Arc::clone(method),
        };

        let node = Node::MethodCall {
            target: Box::new(target),
            name,
            args,
            method,
        };
        Ok((node, end))
    }

    fn arguments(&self, pos: usize) -> PResult<Vec<Node>> {
        delimited_list(self.input, pos, &ARGUMENTS, |p| self.query(p))
    }

    /// The raw text after `name:` up to whitespace or a closing bracket,
    /// taken as a single string argument.
    fn colon_argument(&self, pos: usize) -> (Vec<Node>, usize) {
        let end = self.input[pos..]
            .iter()
            .position(|c| c.is_whitespace() || *c == ')' || *c == '}')
            .map_or(self.input.len(), |n| pos + n);
        if end == pos {
            return (Vec::new(), end);
        }
        let raw: String = self.input[pos..end].iter().collect();
        (vec![Node::Literal(raw.into())], end)
    }
}

fn check_arguments(signature: &Signature, args: &[Node], pos: usize) -> Result<(), ParseError> {
    signature
        .check(args)
        .map_err(|message| ParseError::fatal(pos, message))
}
