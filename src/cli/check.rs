//! Execute mapq queries against a single message

use crate::{Batch, Exec, FunctionContext, Message, ParserConfig, Registry, Syntax, Value};

use super::CliError;

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The query to execute
    pub query: String,
    /// Message content
    pub input: Option<String>,
    /// Message metadata
    pub metadata: Vec<(String, String)>,
    /// Grammar to parse the query with
    pub syntax: Syntax,
    /// Ignore input left after the query
    pub allow_trailing: bool,
    /// Nesting limit, the parser default when unset
    pub max_depth: Option<usize>,
    /// Only validate syntax, don't execute
    pub syntax_only: bool,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Syntax validation passed
    SyntaxValid,
    /// Query executed successfully
    Success(Value),
}

/// Split a `key=value` metadata argument
pub fn parse_metadata(arg: &str) -> Result<(String, String), CliError> {
    arg.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| CliError::InvalidMetadata(arg.to_string()))
}

/// Execute a mapq check operation
pub fn execute_check(registry: &Registry, options: &CheckOptions) -> Result<CheckResult, CliError> {
    let defaults = ParserConfig::default();
    let parser = ParserConfig {
        syntax: options.syntax,
        allow_trailing: options.allow_trailing,
        max_depth: options.max_depth.unwrap_or(defaults.max_depth),
    }
    .parser(registry);
    let node = parser.compile(&options.query)?;

    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid);
    }

    let content = options.input.as_ref().ok_or(CliError::NoInput)?;
    let message = options
        .metadata
        .iter()
        .fold(Message::new(content.as_bytes()), |msg, (k, v)| {
            msg.with_metadata(k.as_str(), v.as_str())
        });
    let batch = Batch::single(message);

    let result = node.exec(&FunctionContext::new(0, &batch))?;
    Ok(CheckResult::Success(result))
}
