//! Literal values: keywords, numbers, strings, arrays and objects.
//!
//! Array elements and object values are full queries. Object keys are
//! quoted strings or bracketed queries. A container whose members are all
//! literal folds into a single [`Node::Literal`]; otherwise it is built per
//! evaluation.

use indexmap::IndexMap;

use crate::{ast::Node, value::Value};

use super::{
    combinators::{ListSyntax, alternative, delimited_list, keyword, number, peek, quoted_string},
    error::{PResult, ParseError},
    query::QueryParser,
};

const ARRAY: ListSyntax<'static> = ListSyntax {
    open: '[',
    close: ']',
    unterminated: "expected comma or closing bracket",
    item: None,
};

const OBJECT: ListSyntax<'static> = ListSyntax {
    open: '{',
    close: '}',
    unterminated: "expected comma or closing brace",
    item: None,
};

impl QueryParser<'_> {
    pub(super) fn literal(&self, pos: usize) -> PResult<Node> {
        let input = self.input;
        alternative(
            pos,
            &[
                &|p: usize| reserved_word(input, p),
                &|p: usize| number(input, p).map(|(v, end)| (Node::Literal(v), end)),
                &|p: usize| quoted_string(input, p).map(|(s, end)| (Node::Literal(s.into()), end)),
                &|p: usize| self.array(p),
                &|p: usize| self.object(p),
            ],
        )
    }

    fn array(&self, pos: usize) -> PResult<Node> {
        let (items, end) = delimited_list(self.input, pos, &ARRAY, |p| self.query(p))?;

        if !items.iter().all(Node::is_literal) {
            return Ok((Node::DynamicArray(items), end));
        }
        let values = items.into_iter().filter_map(Node::into_literal).collect();
        Ok((Node::Literal(Value::Array(values)), end))
    }

    fn object(&self, pos: usize) -> PResult<Node> {
        let (entries, end) = delimited_list(self.input, pos, &OBJECT, |p| self.object_entry(p))?;

        for (key, _) in &entries {
            if let Node::Literal(value) = key
                && !matches!(value, Value::String(_))
            {
                return Err(ParseError::fatal(
                    pos,
                    format!("object keys must be strings, received: {}", value.kind()),
                ));
            }
        }

        if !entries.iter().all(|(k, v)| k.is_literal() && v.is_literal()) {
            return Ok((Node::DynamicObject(entries), end));
        }
        let mut map = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            if let (Node::Literal(Value::String(key)), Node::Literal(value)) = (key, value) {
                map.insert(key, value);
            }
        }
        Ok((Node::Literal(Value::Object(map)), end))
    }

    /// `key : value`
    fn object_entry(&self, pos: usize) -> PResult<(Node, Node)> {
        let (key, end) = alternative(
            pos,
            &[&|p: usize| self.literal(p), &|p: usize| self.bracketed(p)],
        )
        .map_err(|err| {
            if err.is_recoverable() {
                ParseError::required(pos, "expected quoted string or bracketed query")
            } else {
                err
            }
        })?;
        let pos = self.ws(end);
        if !peek(self.input, pos, ':') {
            return Err(ParseError::required(pos, "expected colon"));
        }
        let (value, end) = self
            .query(pos + 1)
            .map_err(ParseError::into_required)?;
        Ok(((key, value), end))
    }
}

/// `null`, `true` or `false`
fn reserved_word(input: &[char], pos: usize) -> PResult<Node> {
    [
        ("null", Value::Null),
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
    ]
    .into_iter()
    .find_map(|(word, value)| keyword(input, pos, word).map(|end| (Node::Literal(value), end)))
    .ok_or_else(|| ParseError::recoverable(pos, "expected literal"))
}
