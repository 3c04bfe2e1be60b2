use std::fmt;

use thiserror::Error;

/// Result of a parser step: the parsed value and the offset just past it.
pub type PResult<T> = Result<(T, usize), ParseError>;

/// How a failure affects the alternation it happens inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The input did not match; an enclosing alternation may try another
    /// branch
    Recoverable,
    /// The input started to match but is malformed; alternation stops
    Required,
    /// The input is well formed but rejected, e.g. an unknown function;
    /// alternation stops
    Fatal,
}

/// A parse failure at a character offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", .severity.prefix(), .message)]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
    pub severity: Severity,
}

impl Severity {
    fn prefix(self) -> &'static str {
        match self {
            Severity::Required => "required: ",
            Severity::Recoverable | Severity::Fatal => "",
        }
    }
}

impl ParseError {
    pub fn recoverable(offset: usize, message: impl Into<String>) -> Self {
        ParseError {
            offset,
            message: message.into(),
            severity: Severity::Recoverable,
        }
    }

    pub fn required(offset: usize, message: impl Into<String>) -> Self {
        ParseError {
            offset,
            message: message.into(),
            severity: Severity::Required,
        }
    }

    pub fn fatal(offset: usize, message: impl Into<String>) -> Self {
        ParseError {
            offset,
            message: message.into(),
            severity: Severity::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.severity == Severity::Recoverable
    }

    /// Promote a recoverable failure to a required one, keeping its offset
    /// and message. Required and fatal failures are returned unchanged.
    pub fn into_required(self) -> Self {
        match self.severity {
            Severity::Recoverable => ParseError {
                severity: Severity::Required,
                ..self
            },
            _ => self,
        }
    }

    /// Replace a recoverable failure with a required one carrying `message`.
    pub fn expecting(self, message: &str) -> Self {
        match self.severity {
            Severity::Recoverable => ParseError::required(self.offset, message),
            _ => self,
        }
    }

    /// Line and column of the failure within `input`
    pub fn position(&self, input: &[char]) -> Position {
        Position::locate(input, self.offset)
    }

    /// Render as `line L char C: message`.
    pub fn error_at_position(&self, input: &[char]) -> String {
        format!("{}: {}", self.position(input), self)
    }
}

/// A 1-based line and character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Convert a character offset into a position. Offsets past the end of
    /// the input count from its last line.
    pub fn locate(input: &[char], offset: usize) -> Self {
        let end = offset.min(input.len());
        let mut line = 1;
        let mut line_start = 0;
        for (i, c) in input[..end].iter().enumerate() {
            if *c == '\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        Position {
            line,
            column: offset - line_start + 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} char {}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_locate() {
        let input = chars("ab\ncd\n");
        assert_eq!(Position::locate(&input, 0), Position { line: 1, column: 1 });
        assert_eq!(Position::locate(&input, 2), Position { line: 1, column: 3 });
        assert_eq!(Position::locate(&input, 3), Position { line: 2, column: 1 });
        assert_eq!(Position::locate(&input, 6), Position { line: 3, column: 1 });
    }

    #[test]
    fn test_rendering() {
        let input = chars("json(");
        let err = ParseError::required(5, "expected query");
        assert_eq!(err.error_at_position(&input), "line 1 char 6: required: expected query");

        let err = ParseError::fatal(0, "unrecognised function 'x'");
        assert_eq!(err.error_at_position(&input), "line 1 char 1: unrecognised function 'x'");
    }

    #[test]
    fn test_promotion_keeps_fatal() {
        let err = ParseError::fatal(3, "nope").expecting("expected query");
        assert_eq!(err.severity, Severity::Fatal);
        assert_eq!(err.message, "nope");

        let err = ParseError::recoverable(3, "expected query").into_required();
        assert_eq!(err.to_string(), "required: expected query");
    }
}
