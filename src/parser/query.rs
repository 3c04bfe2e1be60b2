use std::cell::Cell;

use crate::{
    ast::{BinOp, MatchCase, Node, Pattern},
    registry::Registry,
};

use super::{
    Syntax,
    combinators::{
        alternative, char_lit, discard_whitespace_and_comments, identifier, keyword, path_segment,
        peek, tag,
    },
    error::{PResult, ParseError},
};

const OR: &[(&str, BinOp)] = &[("||", BinOp::Or)];
const AND: &[(&str, BinOp)] = &[("&&", BinOp::And)];
const COMPARISON: &[(&str, BinOp)] = &[
    ("==", BinOp::Equal),
    ("!=", BinOp::NotEqual),
    ("<=", BinOp::LessEqual),
    (">=", BinOp::GreaterEqual),
    ("<", BinOp::LessThan),
    (">", BinOp::GreaterThan),
];
const ADDITIVE: &[(&str, BinOp)] = &[("+", BinOp::Add), ("-", BinOp::Subtract)];
const MULTIPLICATIVE: &[(&str, BinOp)] = &[("*", BinOp::Multiply), ("/", BinOp::Divide)];
const COALESCE: &[(&str, BinOp)] = &[("|", BinOp::Coalesce)];

/// Recursive descent over one input, in one grammar mode.
///
/// `depth` counts the nesting of the tree built so far: one per nested
/// query, chained operator and chained method or scoped query. Both parsing
/// and evaluation recurse once per level, so the tree never grows past
/// `max_depth`.
pub(crate) struct QueryParser<'a> {
    pub(super) input: &'a [char],
    pub(super) registry: &'a Registry,
    pub(super) syntax: Syntax,
    max_depth: usize,
    depth: Cell<usize>,
}

impl<'a> QueryParser<'a> {
    pub fn new(
        input: &'a [char],
        registry: &'a Registry,
        syntax: Syntax,
        max_depth: usize,
    ) -> Self {
        QueryParser {
            input,
            registry,
            syntax,
            max_depth,
            depth: Cell::new(0),
        }
    }

    /// Run `f`, restoring the nesting depth afterwards whether it succeeds
    /// or not, so that failed alternatives do not leak depth.
    fn nested<T>(&self, f: impl FnOnce() -> PResult<T>) -> PResult<T> {
        let saved = self.depth.get();
        let res = f();
        self.depth.set(saved);
        res
    }

    /// Enter one more level of nesting.
    fn descend(&self, pos: usize) -> Result<(), ParseError> {
        let depth = self.depth.get() + 1;
        if depth > self.max_depth {
            return Err(ParseError::required(
                pos,
                format!("maximum nesting depth of {} exceeded", self.max_depth),
            ));
        }
        self.depth.set(depth);
        Ok(())
    }

    pub(super) fn ws(&self, pos: usize) -> usize {
        discard_whitespace_and_comments(self.input, pos)
    }

    /// Parse a full query starting at `pos`, skipping leading whitespace.
    /// Trailing whitespace is left unconsumed.
    pub fn query(&self, pos: usize) -> PResult<Node> {
        let pos = self.ws(pos);
        self.nested(|| {
            self.descend(pos)?;
            self.parse_or(pos)
        })
    }

    // ========================================
    // Binary Operators
    // ========================================

    fn parse_or(&self, pos: usize) -> PResult<Node> {
        self.binary_chain(pos, OR, Self::parse_and)
    }

    fn parse_and(&self, pos: usize) -> PResult<Node> {
        self.binary_chain(pos, AND, Self::parse_comparison)
    }

    /// Comparisons do not chain: `a < b < c` stops after `a < b`
    fn parse_comparison(&self, pos: usize) -> PResult<Node> {
        let (left, end) = self.parse_additive(pos)?;
        match self.operator(end, COMPARISON) {
            Some((op, after)) => self.nested(|| {
                self.descend(after)?;
                let (right, end) = self.parse_additive(self.ws(after))?;
                Ok((binary(op, left, right), end))
            }),
            None => Ok((left, end)),
        }
    }

    fn parse_additive(&self, pos: usize) -> PResult<Node> {
        self.binary_chain(pos, ADDITIVE, Self::parse_multiplicative)
    }

    fn parse_multiplicative(&self, pos: usize) -> PResult<Node> {
        self.binary_chain(pos, MULTIPLICATIVE, Self::parse_coalesce)
    }

    fn parse_coalesce(&self, pos: usize) -> PResult<Node> {
        self.binary_chain(pos, COALESCE, Self::parse_postfix)
    }

    /// Left associative chain of `next (op next)*`.
    fn binary_chain(
        &self,
        pos: usize,
        ops: &[(&str, BinOp)],
        next: fn(&Self, usize) -> PResult<Node>,
    ) -> PResult<Node> {
        self.nested(|| {
            let (mut left, mut pos) = next(self, pos)?;
            while let Some((op, after)) = self.operator(pos, ops) {
                self.descend(after)?;
                let (right, end) = next(self, self.ws(after))?;
                left = binary(op, left, right);
                pos = end;
            }
            Ok((left, pos))
        })
    }

    /// Look past whitespace for one of `ops`. Nothing is consumed unless an
    /// operator is found.
    fn operator(&self, pos: usize, ops: &[(&str, BinOp)]) -> Option<(BinOp, usize)> {
        let pos = self.ws(pos);
        ops.iter().find_map(|(symbol, op)| {
            let end = tag(self.input, pos, symbol)?;
            // `|` is not the start of `||`
            if *op == BinOp::Coalesce && peek(self.input, end, '|') {
                return None;
            }
            Some((*op, end))
        })
    }

    // ========================================
    // Terms
    // ========================================

    fn parse_postfix(&self, pos: usize) -> PResult<Node> {
        let (node, end) = self.term(pos)?;
        self.nested(|| self.postfix_chain(node, end))
    }

    fn term(&self, pos: usize) -> PResult<Node> {
        let res = alternative(
            pos,
            &[
                &|p: usize| self.match_expression(p),
                &|p: usize| self.bracketed(p),
                &|p: usize| self.literal(p),
                &|p: usize| self.function_call(p),
                &|p: usize| self.path(p),
            ],
        );
        match res {
            Err(err) if err.is_recoverable() && err.offset == pos => {
                Err(ParseError::recoverable(pos, "expected query"))
            }
            other => other,
        }
    }

    /// `( query )`
    pub(super) fn bracketed(&self, pos: usize) -> PResult<Node> {
        let ((), pos) = char_lit(self.input, pos, '(')?;
        let (inner, end) = self.query(pos)?;
        let end = self.close_bracket(end)?;
        Ok((inner, end))
    }

    fn close_bracket(&self, pos: usize) -> Result<usize, ParseError> {
        let pos = self.ws(pos);
        if peek(self.input, pos, ')') {
            Ok(pos + 1)
        } else {
            Err(ParseError::required(pos, "expected closing bracket"))
        }
    }

    /// `this` or a bare field name, rooted at the context. The deprecated
    /// grammar has no bare paths.
    fn path(&self, pos: usize) -> PResult<Node> {
        if self.syntax == Syntax::Deprecated {
            return Err(ParseError::recoverable(pos, "expected query"));
        }
        if let Some(end) = keyword(self.input, pos, "this") {
            return Ok((Node::this(), end));
        }
        let (name, end) = identifier(self.input, pos)?;
        Ok((Node::this().select(name), end))
    }

    /// `.field`, `.method(args)` and `.(query)` following a term. The dot
    /// must directly follow the term; a dot followed by anything else is
    /// left unconsumed.
    fn postfix_chain(&self, mut node: Node, mut pos: usize) -> PResult<Node> {
        while peek(self.input, pos, '.') {
            let start = pos + 1;

            if peek(self.input, start, '(') {
                self.descend(start)?;
                let (query, end) = self
                    .query(start + 1)
                    .map_err(|err| err.expecting("expected query"))?;
                pos = self.close_bracket(end)?;
                node = Node::Scoped {
                    target: Box::new(node),
                    query: Box::new(query),
                };
                continue;
            }

            if let Ok((name, after_name)) = identifier(self.input, start)
                && peek(self.input, after_name, '(')
            {
                self.descend(start)?;
                (node, pos) = self.method_call(node, name, start, after_name)?;
                continue;
            }

            match path_segment(self.input, start) {
                Ok((segment, end)) => {
                    node = node.select(segment);
                    pos = end;
                }
                Err(err) if err.is_recoverable() => break,
                Err(err) => return Err(err),
            }
        }
        Ok((node, pos))
    }

    // ========================================
    // Match
    // ========================================

    /// `match [target] { pattern => result ... }`
    fn match_expression(&self, pos: usize) -> PResult<Node> {
        let Some(after) = keyword(self.input, pos, "match") else {
            return Err(ParseError::recoverable(pos, "expected match"));
        };
        let mut pos = self.ws(after);

        let target = if peek(self.input, pos, '{') {
            Node::this()
        } else {
            let (target, end) = self.query(pos).map_err(ParseError::into_required)?;
            pos = self.ws(end);
            target
        };

        if !peek(self.input, pos, '{') {
            return Err(ParseError::required(pos, "expected {"));
        }
        pos = self.ws(pos + 1);

        let mut cases = Vec::new();
        loop {
            match self.input.get(pos) {
                None => return Err(ParseError::required(pos, "expected }")),
                Some('}') => break,
                Some(_) => {}
            }
            let (case, end) = self.match_case(pos)?;
            cases.push(case);
            pos = self.ws(end);
            if peek(self.input, pos, ',') {
                pos = self.ws(pos + 1);
            }
        }

        let node = Node::Match {
            target: Box::new(target),
            cases,
        };
        Ok((node, pos + 1))
    }

    fn match_case(&self, pos: usize) -> PResult<MatchCase> {
        let (pattern, end) = match keyword(self.input, pos, "_") {
            Some(end) => (Pattern::Wildcard, end),
            None => {
                let (query, end) = self.query(pos).map_err(ParseError::into_required)?;
                (Pattern::Query(query), end)
            }
        };

        let pos = self.ws(end);
        let Some(after_arrow) = tag(self.input, pos, "=>") else {
            return Err(ParseError::required(pos, "expected =>"));
        };

        let (result, end) = self
            .query(after_arrow)
            .map_err(ParseError::into_required)?;
        Ok((MatchCase { pattern, result }, end))
    }
}

fn binary(op: BinOp, left: Node, right: Node) -> Node {
    Node::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
