//! Lex/parse error types

use crate::span::Span;
use thiserror::Error;

/// Lex or parse error.
///
/// Both lexing and parsing share one error type (as the lexer's own errors
/// are surfaced through the same `Result` chain the parser consumes), but the
/// `LexError`/`UnterminatedString`/`UnterminatedBlock` variants are the ones
/// the lexer itself produces; everything else is raised by the parser.
#[derive(Error, Debug, Clone)]
pub enum ParseError {
    /// Unexpected token
    #[error("unexpected token '{found}' at {span:?}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        span: Span,
    },

    /// Unexpected end of input
    #[error("unexpected end of input at {span:?}, expected {expected}")]
    UnexpectedEof { expected: String, span: Span },

    /// Invalid escape sequence inside a string literal
    #[error("invalid escape sequence '{sequence}' at {span:?}")]
    InvalidEscape { sequence: String, span: Span },

    /// Unterminated string literal
    #[error("unterminated string literal starting at {span:?}")]
    UnterminatedString { span: Span },

    /// Unterminated `{# ... #}` comment
    #[error("unterminated comment starting at {span:?}")]
    UnterminatedComment { span: Span },

    /// `{% raw %}` without a matching `{% endraw %}`
    #[error("unterminated raw block starting at {span:?}")]
    UnterminatedRawBlock { span: Span },

    /// Invalid number literal
    #[error("invalid number literal '{literal}' at {span:?}")]
    InvalidNumber { literal: String, span: Span },

    /// A dict literal used a non-string, non-symbol key
    #[error("dict keys must be string literals or bare names at {span:?}")]
    NonStringDictKey { span: Span },

    /// Invalid syntax (catch-all for parser productions with a specific message)
    #[error("{message} at {span:?}")]
    InvalidSyntax { message: String, span: Span },

    /// Unrecognized token from the lexer
    #[error("unrecognized token at {span:?}")]
    LexError { span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::InvalidEscape { span, .. }
            | ParseError::UnterminatedString { span }
            | ParseError::UnterminatedComment { span }
            | ParseError::UnterminatedRawBlock { span }
            | ParseError::InvalidNumber { span, .. }
            | ParseError::NonStringDictKey { span }
            | ParseError::InvalidSyntax { span, .. }
            | ParseError::LexError { span } => *span,
        }
    }

    pub fn unexpected_token(
        found: impl Into<String>,
        expected: impl Into<String>,
        span: Span,
    ) -> Self {
        ParseError::UnexpectedToken {
            found: found.into(),
            expected: expected.into(),
            span,
        }
    }

    pub fn unexpected_eof(expected: impl Into<String>, span: Span) -> Self {
        ParseError::UnexpectedEof {
            expected: expected.into(),
            span,
        }
    }

    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> Self {
        ParseError::InvalidSyntax {
            message: message.into(),
            span,
        }
    }

    /// Format the error with a source-line excerpt and a caret marker,
    /// matching the `line | code` / `  | ^^^` shape used by the CLI
    /// precompiler's diagnostics.
    pub fn format_with_context(&self, source: &str) -> String {
        let span = self.span();
        let lines: Vec<&str> = source.lines().collect();
        let line_idx = span.start_line.saturating_sub(1);

        if line_idx >= lines.len() {
            return String::new();
        }

        let line = lines[line_idx];
        let col = span.start_column.saturating_sub(1);
        let len = if span.start_line == span.end_line {
            span.end_column.saturating_sub(span.start_column).max(1)
        } else {
            1
        };

        let spaces = " ".repeat(col);
        let marker = "^".repeat(len.min(line.len().saturating_sub(col)).max(1));

        format!(
            "  {} | {}\n  {} | {}{}",
            span.start_line,
            line,
            " ".repeat(span.start_line.to_string().len()),
            spaces,
            marker
        )
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_token() {
        let span = Span::new(0, 5, 1, 1, 1, 6);
        let err = ParseError::unexpected_token("foo", "bar", span);

        assert!(err.to_string().contains("foo"));
        assert!(err.to_string().contains("bar"));
    }

    #[test]
    fn test_format_with_context() {
        let source = "hello {{ \nworld";
        let span = Span::new(9, 9, 1, 1, 10, 10);
        let err = ParseError::unexpected_eof("expression", span);

        let context = err.format_with_context(source);
        assert!(context.contains("hello {{"));
        assert!(context.contains('^'));
    }
}
