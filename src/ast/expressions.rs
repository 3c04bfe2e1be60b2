use std::sync::Arc;

use crate::{
    ast::BinOp,
    registry::{Function, Method},
    value::Value,
};

/// Executable node of a parsed query.
///
/// Nodes are immutable once built. Function and method calls hold the
/// registry entry they were resolved against at parse time, so evaluation
/// never consults the registry.
#[derive(Debug, Clone)]
pub enum Node {
    /// Constant value, including arrays and objects whose members are all
    /// literal
    ///
    /// # Example
    /// ```text
    /// {"foo": [1, 2.5, null]}
    /// ```
    Literal(Value),

    /// Array literal with at least one dynamic element
    ///
    /// # Example
    /// ```text
    /// ["foo", (5 + 5), this.bar]
    /// ```
    DynamicArray(Vec<Node>),

    /// Object literal with at least one dynamic key or value.
    ///
    /// Keys are nodes that must evaluate to strings.
    ///
    /// # Example
    /// ```text
    /// {("foobar".uppercase()): this.value}
    /// ```
    DynamicObject(Vec<(Node, Node)>),

    /// Function call resolved against the registry
    ///
    /// # Example
    /// ```text
    /// json("foo.bar")
    /// ```
    FunctionCall {
        name: String,
        args: Vec<Node>,
        function: Arc<Function>,
    },

    /// Method call on the result of `target`
    ///
    /// # Example
    /// ```text
    /// this.name.uppercase()
    /// ```
    MethodCall {
        target: Box<Node>,
        name: String,
        args: Vec<Node>,
        method: Arc<Method>,
    },

    /// Binary operation
    BinaryOp {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// Field selection
    ///
    /// # Examples
    /// ```text
    /// this.foo.bar      // Context root, ["foo", "bar"]
    /// foo.bar           // same
    /// json().foo        // Target(json()), ["foo"]
    /// ```
    PathAccess {
        root: PathRoot,
        segments: Vec<String>,
    },

    /// Query evaluated with the value of `target` as its context
    ///
    /// # Example
    /// ```text
    /// this.user.(name | nickname)
    /// ```
    Scoped {
        target: Box<Node>,
        query: Box<Node>,
    },

    /// `match` block; the first matching case wins
    Match {
        target: Box<Node>,
        cases: Vec<MatchCase>,
    },
}

/// Where a path starts resolving from.
#[derive(Debug, Clone)]
pub enum PathRoot {
    /// The context's current value, or the message document when no current
    /// value is set
    Context,

    /// The result of another expression
    Target(Box<Node>),
}

/// A single `pattern => result` arm of a match block.
#[derive(Debug, Clone)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub result: Node,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    /// `_`
    Wildcard,

    /// Literal patterns match by equality; anything else is evaluated against
    /// the match target
    Query(Node),
}

impl Node {
    /// A path rooted at the context with no segments, i.e. `this`
    pub fn this() -> Self {
        Node::PathAccess {
            root: PathRoot::Context,
            segments: Vec::new(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal(_))
    }

    pub fn into_literal(self) -> Option<Value> {
        match self {
            Node::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Number of levels in the tree rooted at this node. Walks the tree
    /// without recursion, so it is safe on trees of any depth.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            node.for_each_child(|child| stack.push((child, depth + 1)));
        }
        deepest
    }

    fn for_each_child<'n>(&'n self, mut f: impl FnMut(&'n Node)) {
        match self {
            Node::Literal(_) => {}
            Node::DynamicArray(items) => items.iter().for_each(f),
            Node::DynamicObject(entries) => {
                for (key, value) in entries {
                    f(key);
                    f(value);
                }
            }
            Node::FunctionCall { args, .. } => args.iter().for_each(f),
            Node::MethodCall { target, args, .. } => {
                f(target.as_ref());
                args.iter().for_each(f);
            }
            Node::BinaryOp { left, right, .. } => {
                f(left.as_ref());
                f(right.as_ref());
            }
            Node::PathAccess { root, .. } => {
                if let PathRoot::Target(target) = root {
                    f(target.as_ref());
                }
            }
            Node::Scoped { target, query } => {
                f(target.as_ref());
                f(query.as_ref());
            }
            Node::Match { target, cases } => {
                f(target.as_ref());
                for case in cases {
                    if let Pattern::Query(pattern) = &case.pattern {
                        f(pattern);
                    }
                    f(&case.result);
                }
            }
        }
    }

    /// Select a further field from this node, extending an existing path
    /// where possible.
    pub fn select(self, segment: String) -> Node {
        match self {
            Node::PathAccess { root, mut segments } => {
                segments.push(segment);
                Node::PathAccess { root, segments }
            }
            other => Node::PathAccess {
                root: PathRoot::Target(Box::new(other)),
                segments: vec![segment],
            },
        }
    }
}
