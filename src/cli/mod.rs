//! CLI support for mapq
//!
//! Provides programmatic access to the `mapq` commands so they can be
//! embedded in other tools.

mod check;
mod docs;

pub use check::{CheckOptions, CheckResult, execute_check, parse_metadata};
pub use docs::functions_listing;

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Query failed to parse
    Parse(crate::Error),
    /// Evaluation error
    Eval(crate::EvalError),
    /// Config file error
    Config(crate::ConfigError),
    /// Built-in registration error
    Registry(crate::RegistryError),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
    /// A `--meta` argument without `=`
    InvalidMetadata(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Parse(e) => write!(f, "Parse error: {}", e),
            CliError::Eval(e) => write!(f, "Evaluation error: {}", e),
            CliError::Config(e) => write!(f, "Config error: {}", e),
            CliError::Registry(e) => write!(f, "Registry error: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => write!(f, "No input provided. Use --input or pipe a message to stdin."),
            CliError::InvalidMetadata(m) => {
                write!(f, "Invalid metadata '{}', expected key=value", m)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Parse(e) => Some(e),
            CliError::Eval(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Registry(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<crate::Error> for CliError {
    fn from(e: crate::Error) -> Self {
        match e {
            crate::Error::Eval(e) => CliError::Eval(e),
            crate::Error::Config(e) => CliError::Config(e),
            crate::Error::Registry(e) => CliError::Registry(e),
            parse => CliError::Parse(parse),
        }
    }
}

impl From<crate::EvalError> for CliError {
    fn from(e: crate::EvalError) -> Self {
        CliError::Eval(e)
    }
}

impl From<crate::ConfigError> for CliError {
    fn from(e: crate::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<crate::RegistryError> for CliError {
    fn from(e: crate::RegistryError) -> Self {
        CliError::Registry(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
