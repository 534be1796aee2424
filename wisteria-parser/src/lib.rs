//! Lexer and recursive-descent parser for the Wisteria template language.
//!
//! Produces a typed [`ast::Node`] tree from template source; downstream
//! crates (the compiler, the CLI precompiler) consume that tree and never
//! see tokens directly.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use ast::Node;
pub use error::{ParseError, ParseResult};
pub use parser::Parser;
pub use span::{SourceMap, Span};
pub use token::Token;

/// Parse a complete template source string into its root [`Node`].
pub fn parse(source: &str) -> ParseResult<Node> {
    Parser::parse(source)
}
