//! Token kinds for Wisteria template source.
//!
//! `Token` drives a `logos`-generated lexer that only ever runs *inside* a
//! `{{ ... }}` or `{% ... %}` region; the outer [`crate::lexer::Lexer`]
//! handles raw-text scanning, delimiter recognition, and trim markers itself
//! (delimiters cannot be expressed as fixed-length logos patterns once
//! `-` trim markers and `{% raw %}` verbatim collapsing are in play).

mod precedence;

#[cfg(test)]
mod tests;

pub use precedence::Precedence;

use logos::Logos;
use serde::{Deserialize, Serialize};

/// A structured token recognized inside an expression (`{{ }}`) or block
/// (`{% %}`) region.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // ---- literals ----
    #[regex(r#""(\\.|[^"\\])*""#)]
    #[regex(r#"'(\\.|[^'\\])*'"#)]
    StringLiteral,

    #[regex(r"[0-9]+\.[0-9]+")]
    Float,

    #[regex(r"[0-9]+")]
    Integer,

    // ---- value keywords (usable in both expression and block context) ----
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("none")]
    #[token("null")]
    None_,

    // ---- logical/comparison keywords ----
    #[token("and")]
    KwAnd,
    #[token("or")]
    KwOr,
    #[token("not")]
    KwNot,
    #[token("in")]
    KwIn,
    #[token("is")]
    KwIs,

    // ---- tag keywords (block mode) ----
    #[token("for")]
    KwFor,
    #[token("endfor")]
    KwEndFor,
    #[token("if")]
    KwIf,
    #[token("elif")]
    KwElif,
    #[token("else")]
    KwElse,
    #[token("endif")]
    KwEndIf,
    #[token("block")]
    KwBlock,
    #[token("endblock")]
    KwEndBlock,
    #[token("extends")]
    KwExtends,
    #[token("include")]
    KwInclude,
    #[token("import")]
    KwImport,
    #[token("from")]
    KwFrom,
    #[token("as")]
    KwAs,
    #[token("macro")]
    KwMacro,
    #[token("endmacro")]
    KwEndMacro,
    #[token("call")]
    KwCall,
    #[token("endcall")]
    KwEndCall,
    #[token("set")]
    KwSet,
    #[token("endset")]
    KwEndSet,
    #[token("switch")]
    KwSwitch,
    #[token("case")]
    KwCase,
    #[token("default")]
    KwDefault,
    #[token("endswitch")]
    KwEndSwitch,
    #[token("raw")]
    KwRaw,
    #[token("endraw")]
    KwEndRaw,
    #[token("ignore")]
    KwIgnore,
    #[token("missing")]
    KwMissing,
    #[token("with")]
    KwWith,
    #[token("without")]
    KwWithout,
    #[token("context")]
    KwContext,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    // ---- operators (longest match declared first so logos' priority picks
    // the multi-char form over its single-char prefix) ----
    #[token("//")]
    SlashSlash,
    #[token("**")]
    StarStar,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("~")]
    Tilde,
    #[token("|")]
    Pipe,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // ---- delimiters that close an expression/block region; recognized by
    // the inner logos lexer so the outer Lexer knows where to switch back
    // to text mode ----
    #[token("-}}")]
    VarEndTrim,
    #[token("}}")]
    VarEnd,
    #[token("-%}")]
    BlockEndTrim,
    #[token("%}")]
    BlockEnd,

    // ---- synthesized, never produced by `logos::lex`: used by the outer
    // Lexer for text chunks, delimiter openers, and comments ----
    Text,
    VarStart,
    VarStartTrim,
    BlockStart,
    BlockStartTrim,
    Comment,
    Eof,
}

impl Token {
    /// True for tokens that only make sense introducing a block tag, used by
    /// the parser to decide whether an identifier-like token is actually a
    /// reserved word.
    pub fn is_tag_keyword(self) -> bool {
        matches!(
            self,
            Token::KwFor
                | Token::KwEndFor
                | Token::KwIf
                | Token::KwElif
                | Token::KwElse
                | Token::KwEndIf
                | Token::KwBlock
                | Token::KwEndBlock
                | Token::KwExtends
                | Token::KwInclude
                | Token::KwImport
                | Token::KwFrom
                | Token::KwAs
                | Token::KwMacro
                | Token::KwEndMacro
                | Token::KwCall
                | Token::KwEndCall
                | Token::KwSet
                | Token::KwEndSet
                | Token::KwSwitch
                | Token::KwCase
                | Token::KwDefault
                | Token::KwEndSwitch
                | Token::KwRaw
                | Token::KwEndRaw
                | Token::KwIgnore
                | Token::KwMissing
                | Token::KwWith
                | Token::KwWithout
                | Token::KwContext
        )
    }
}
