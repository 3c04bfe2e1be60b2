//! Query parser.
//!
//! [`Parser`] turns query text into an executable [`Node`]. It is built from
//! a populated [`Registry`], which it consults to resolve every function and
//! method name while parsing.
//!
//! Two grammars share one set of node types: the current grammar, and a
//! deprecated one kept for migrating older queries. The deprecated grammar
//! has no bare path literals and additionally accepts `name:arg` calls.
//!
//! # Examples
//!
//! ```
//! use mapq_lang::{Batch, Exec, FunctionContext, Message, Parser, Registry, Value};
//!
//! let registry = Registry::with_builtins().unwrap();
//! let parser = Parser::new(&registry);
//!
//! let parsed = parser.parse(r#"json("name").uppercase() and more"#).unwrap();
//! assert_eq!(parsed.remaining, " and more");
//!
//! let batch = Batch::single(Message::new(r#"{"name":"ada"}"#));
//! let value = parsed.node.exec(&FunctionContext::new(0, &batch)).unwrap();
//! assert_eq!(value, Value::from("ADA"));
//! ```

use std::fmt;

use serde::Deserialize;

use crate::{ast::Node, error::Error, registry::Registry};

pub mod combinators;
mod error;
mod function;
mod literal;
mod query;

pub use error::{PResult, ParseError, Position, Severity};

use combinators::discard_whitespace_and_comments;
use query::QueryParser;

/// Grammar variant used to parse a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    #[default]
    Current,
    Deprecated,
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Syntax::Current => f.write_str("current"),
            Syntax::Deprecated => f.write_str("deprecated"),
        }
    }
}

/// Default limit on how deeply a query may nest.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// A parsed query and the input that followed it.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub node: Node,
    pub remaining: String,
}

/// Parses queries against a registry.
#[derive(Debug, Clone, Copy)]
pub struct Parser<'r> {
    registry: &'r Registry,
    syntax: Syntax,
    allow_trailing: bool,
    max_depth: usize,
}

impl<'r> Parser<'r> {
    /// A parser for the current grammar
    pub fn new(registry: &'r Registry) -> Self {
        Parser {
            registry,
            syntax: Syntax::Current,
            allow_trailing: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// A parser for the deprecated grammar
    pub fn deprecated(registry: &'r Registry) -> Self {
        Parser::new(registry).with_syntax(Syntax::Deprecated)
    }

    pub fn with_syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = syntax;
        self
    }

    /// Let [`Parser::compile`] ignore input left after the query.
    pub fn allow_trailing(mut self, allow: bool) -> Self {
        self.allow_trailing = allow;
        self
    }

    /// Reject queries nesting deeper than `depth` levels. Parsing and
    /// evaluation both recurse once per level.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Parse one query from the start of `input`, returning the offset just
    /// past it. Trailing whitespace and comments are not consumed.
    pub fn parse_chars(&self, input: &[char]) -> PResult<Node> {
        let (node, end) =
            QueryParser::new(input, self.registry, self.syntax, self.max_depth).query(0)?;
        // Chains are parsed iteratively, so only the finished tree shows how
        // deep evaluation will recurse
        if node.depth() > self.max_depth {
            return Err(ParseError::required(
                discard_whitespace_and_comments(input, 0),
                format!("maximum nesting depth of {} exceeded", self.max_depth),
            ));
        }
        Ok((node, end))
    }

    /// Parse one query from the start of `input`. Whatever follows the query
    /// is returned as [`Parsed::remaining`] for the caller to deal with.
    pub fn parse(&self, input: &str) -> Result<Parsed, Error> {
        let chars: Vec<char> = input.chars().collect();
        let (node, end) = self
            .parse_chars(&chars)
            .map_err(|err| Error::parse(&err, &chars))?;
        Ok(Parsed {
            node,
            remaining: chars[end..].iter().collect(),
        })
    }

    /// Parse a query that makes up the whole of `input`; only whitespace and
    /// comments may follow it.
    pub fn compile(&self, input: &str) -> Result<Node, Error> {
        let chars: Vec<char> = input.chars().collect();
        let (node, end) = self
            .parse_chars(&chars)
            .map_err(|err| Error::parse(&err, &chars))?;

        let rest = discard_whitespace_and_comments(&chars, end);
        if rest < chars.len() && !self.allow_trailing {
            let err = ParseError::recoverable(rest, "expected end of input");
            return Err(Error::parse(&err, &chars));
        }

        log::debug!(
            "compiled {} query of {} characters, {} consumed",
            self.syntax,
            chars.len(),
            end
        );
        Ok(node)
    }
}
