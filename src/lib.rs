pub mod ast;
pub mod config;
pub mod convert;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod message;
pub mod methods;
pub mod output;
pub mod parser;
pub mod registry;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, MatchCase, Node, PathRoot, Pattern};
pub use config::{Config, ConfigError, LogConfig, ParserConfig};
pub use error::Error;
pub use evaluator::{EvalError, Exec, FunctionContext};
pub use message::{Batch, DocumentCache, Message, MessageBatch};
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parsed, Parser, Position, Severity, Syntax};
pub use registry::{Args, ParamKind, Registry, RegistryError, Signature};
pub use value::Value;
