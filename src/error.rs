use thiserror::Error;

use crate::{
    config::ConfigError,
    evaluator::EvalError,
    parser::ParseError,
    registry::RegistryError,
};

/// Any failure surfaced by the public API.
#[derive(Debug, Error)]
pub enum Error {
    /// A query failed to parse. `message` already carries the `required: `
    /// prefix where it applies.
    #[error("line {line} char {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Attach the line and column of `err` within `input`
    pub fn parse(err: &ParseError, input: &[char]) -> Self {
        let position = err.position(input);
        Error::Parse {
            line: position.line,
            column: position.column,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
