//! # Query Language - Abstract Syntax Tree
//!
//! A parsed query is a tree of [`Node`]s. The tree is built once, is never
//! mutated afterwards, and can be executed any number of times (from any
//! number of threads) through [`crate::Exec`].
//!
//! ## Architecture Overview
//!
//! - **[expressions]** - Node kinds: literals, dynamic containers, calls,
//!   paths, scoped queries and `match` blocks
//! - **[operators]** - Binary operators and their precedence
//!
//! ## Quick Start
//!
//! ```text
//! this.user.name.uppercase() | "anonymous"
//! ```
//!
//! Selects `user.name` from the message document, upper-cases it, and falls
//! back to `"anonymous"` if any step fails.
//!
//! ## Core Concepts
//!
//! ### Literals
//!
//! JSON literals are queries too. Array elements, object values and object
//! keys may embed any query, which is evaluated per message:
//!
//! ```text
//! {"id": this.id, (meta("kind")): [content(), batch_index()]}
//! ```
//!
//! ### Method Chains
//!
//! Any expression can be followed by `.method(args)`, `.field` or a scoped
//! query `.(query)` whose `this` is the value on the left:
//!
//! ```text
//! this.items.(first | "none").from_all()
//! ```
//!
//! ### Match
//!
//! ```text
//! match this.kind {
//!   "a" => "first"
//!   this.score > 10 => "high"
//!   _ => "other"
//! }
//! ```
pub mod expressions;
pub mod operators;

pub use expressions::{MatchCase, Node, PathRoot, Pattern};
pub use operators::BinOp;
