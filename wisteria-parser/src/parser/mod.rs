//! Recursive-descent parser driving the token stream into a [`Node`] tree.
//!
//! Mirrors the shape of `subset_julia_vm_parser::parser`: one file per
//! expression precedence tier under `expressions/`, one file per statement
//! family under `statements/`, and a thin [`Parser`] core here holding the
//! token cursor and shared helpers (`bump`, `expect`, `unexpected`).

pub mod expressions;
pub mod statements;

use crate::ast::Node;
use crate::error::{ParseError, ParseResult};
use crate::lexer::{Lexer, SpannedToken};
use crate::span::Span;
use crate::token::Token;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Option<SpannedToken<'a>>,
    source: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(source);
        let current = Self::pull(&mut lexer)?;
        Ok(Self {
            lexer,
            current,
            source,
        })
    }

    fn pull(lexer: &mut Lexer<'a>) -> ParseResult<Option<SpannedToken<'a>>> {
        match lexer.next_token() {
            None => Ok(None),
            Some(Ok(tok)) => Ok(Some(tok)),
            Some(Err(e)) => Err(e),
        }
    }

    fn eof_span(&self) -> Span {
        let map = self.lexer.source_map();
        map.span(self.source.len(), self.source.len())
    }

    pub(crate) fn current_span(&self) -> Span {
        self.current.as_ref().map(|t| t.span).unwrap_or_else(|| self.eof_span())
    }

    pub(crate) fn peek_token(&self) -> Option<Token> {
        self.current.as_ref().map(|t| t.token)
    }

    pub(crate) fn peek_text(&self) -> Option<&str> {
        self.current.as_ref().map(|t| t.text)
    }

    /// Peek the token after `current` without consuming either. Used for the
    /// `not in` two-token lookahead in the comparison grammar.
    pub(crate) fn peek_second_token(&mut self) -> Option<Token> {
        match self.lexer.peek() {
            Some(Ok(t)) => Some(t.token),
            _ => None,
        }
    }

    pub(crate) fn check(&self, t: Token) -> bool {
        self.peek_token() == Some(t)
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.current.is_none()
    }

    /// True if the current token opens a `{{ }}` expression region.
    pub(crate) fn at_var_start(&self) -> bool {
        matches!(self.peek_token(), Some(Token::VarStart) | Some(Token::VarStartTrim))
    }

    /// True if the current token opens a `{% %}` block region.
    pub(crate) fn at_block_start(&self) -> bool {
        matches!(self.peek_token(), Some(Token::BlockStart) | Some(Token::BlockStartTrim))
    }

    fn at_var_end(&self) -> bool {
        matches!(self.peek_token(), Some(Token::VarEnd) | Some(Token::VarEndTrim))
    }

    fn at_block_end(&self) -> bool {
        matches!(self.peek_token(), Some(Token::BlockEnd) | Some(Token::BlockEndTrim))
    }

    pub(crate) fn bump(&mut self) -> ParseResult<SpannedToken<'a>> {
        let cur = self
            .current
            .take()
            .ok_or_else(|| ParseError::unexpected_eof("a token", self.eof_span()))?;
        self.current = Self::pull(&mut self.lexer)?;
        Ok(cur)
    }

    pub(crate) fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        match &self.current {
            Some(tok) => ParseError::unexpected_token(format!("{:?}", tok.token), expected, tok.span),
            None => ParseError::unexpected_eof(expected, self.eof_span()),
        }
    }

    pub(crate) fn expect(&mut self, t: Token, expected: &str) -> ParseResult<SpannedToken<'a>> {
        if self.check(t) {
            self.bump()
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub(crate) fn expect_var_start(&mut self) -> ParseResult<Span> {
        if self.at_var_start() {
            Ok(self.bump()?.span)
        } else {
            Err(self.unexpected("'{{'"))
        }
    }

    pub(crate) fn expect_var_end(&mut self) -> ParseResult<Span> {
        if self.at_var_end() {
            Ok(self.bump()?.span)
        } else {
            Err(self.unexpected("'}}'"))
        }
    }

    pub(crate) fn expect_block_start(&mut self) -> ParseResult<Span> {
        if self.at_block_start() {
            Ok(self.bump()?.span)
        } else {
            Err(self.unexpected("'{%'"))
        }
    }

    pub(crate) fn expect_block_end(&mut self) -> ParseResult<Span> {
        if self.at_block_end() {
            Ok(self.bump()?.span)
        } else {
            Err(self.unexpected("'%}'"))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> ParseResult<(String, Span)> {
        if self.check(Token::Identifier) {
            let tok = self.bump()?;
            Ok((tok.text.to_string(), tok.span))
        } else {
            Err(self.unexpected("an identifier"))
        }
    }

    /// Parse a whole template into a `Root` node.
    pub fn parse(source: &'a str) -> ParseResult<Node> {
        let mut parser = Parser::new(source)?;
        parser.parse_root()
    }

    fn parse_root(&mut self) -> ParseResult<Node> {
        let start = self.current_span();
        let children = statements::parse_node_list(self, &[])?;
        if !self.at_eof() {
            return Err(self.unexpected("end of template"));
        }
        let end = self.current_span();
        Ok(Node::Root {
            children,
            span: start.merge(&end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text() {
        let ast = Parser::parse("hello world").unwrap();
        match ast {
            Node::Root { children, .. } => {
                assert_eq!(children.len(), 1);
                assert!(matches!(children[0], Node::TemplateData { .. }));
            }
            _ => panic!("expected Root"),
        }
    }

    #[test]
    fn parses_variable_output() {
        let ast = Parser::parse("Hello {{ name }}!").unwrap();
        let Node::Root { children, .. } = ast else { panic!() };
        assert_eq!(children.len(), 3);
        assert!(matches!(children[1], Node::Output { .. }));
    }
}
