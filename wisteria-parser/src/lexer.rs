//! Mode-aware lexer for template source.
//!
//! Wraps a `logos`-generated [`Token`] lexer with the outer state machine
//! spec.md §4.1 describes: raw text is scanned manually (delimiter search,
//! trim-marker whitespace consumption, `{% raw %}` verbatim collapsing, and
//! `{# ... #}` comment skipping all happen here, outside logos' regex
//! grammar), and everything between a `{{`/`{%` opener and its matching
//! closer is handed to the inner `logos::Lexer<Token>`.

use std::collections::VecDeque;

use logos::Logos;

use crate::error::{ParseError, ParseResult};
use crate::span::{SourceMap, Span};
use crate::token::Token;

/// A token together with its span and the verbatim source text it covers.
#[derive(Debug, Clone)]
pub struct SpannedToken<'a> {
    pub token: Token,
    pub span: Span,
    pub text: &'a str,
}

impl<'a> SpannedToken<'a> {
    pub fn new(token: Token, span: Span, text: &'a str) -> Self {
        Self { token, span, text }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Expr,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelimKind {
    Var,
    Block,
    Comment,
}

fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

fn trim_end_ws(bytes: &[u8], mut end: usize, start: usize) -> usize {
    while end > start && is_ws(bytes[end - 1]) {
        end -= 1;
    }
    end
}

fn trim_start_ws(bytes: &[u8], mut start: usize, end: usize) -> usize {
    while start < end && is_ws(bytes[start]) {
        start += 1;
    }
    start
}

fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && is_ws(bytes[pos]) {
        pos += 1;
    }
    pos
}

/// Find the next `{{`, `{%` or `{#` starting at or after `from`. Returns
/// `(delim_start, kind, has_trim_marker, after_opener)`.
fn find_delimiter(bytes: &[u8], from: usize) -> Option<(usize, DelimKind, bool, usize)> {
    let mut pos = from;
    loop {
        let rel = memchr::memchr(b'{', &bytes[pos..])?;
        let start = pos + rel;
        if start + 1 >= bytes.len() {
            return None;
        }
        let kind = match bytes[start + 1] {
            b'{' => Some(DelimKind::Var),
            b'%' => Some(DelimKind::Block),
            b'#' => Some(DelimKind::Comment),
            _ => None,
        };
        if let Some(kind) = kind {
            let has_trim = bytes.get(start + 2) == Some(&b'-');
            let after = start + 2 + if has_trim { 1 } else { 0 };
            return Some((start, kind, has_trim, after));
        }
        pos = start + 1;
    }
}

/// If `bytes[pos..]` begins `raw` (optional surrounding whitespace already
/// skipped by the caller) followed by an optional `-` and the block closer
/// `%}`, returns the position just past that closer and whether it carried a
/// right-trim marker.
fn match_raw_open_tail(bytes: &[u8], pos: usize) -> Option<(usize, bool)> {
    if !bytes[pos..].starts_with(b"raw") {
        return None;
    }
    let mut p = skip_ws(bytes, pos + 3);
    let trim = bytes.get(p) == Some(&b'-');
    if trim {
        p += 1;
    }
    if bytes[p..].starts_with(b"%}") {
        Some((p + 2, trim))
    } else {
        None
    }
}

/// Scans forward from `from` looking for a `{%[-]? endraw [-]?%}` tag.
/// Returns `(tag_start, content_end_before_trim, left_trim, after_tag, right_trim)`.
fn find_endraw(bytes: &[u8], from: usize) -> Option<(usize, bool, usize, bool)> {
    let mut pos = from;
    loop {
        let rel = memchr::memmem::find(&bytes[pos..], b"{%")?;
        let tag_start = pos + rel;
        let mut p = tag_start + 2;
        let left_trim = bytes.get(p) == Some(&b'-');
        if left_trim {
            p += 1;
        }
        p = skip_ws(bytes, p);
        if bytes[p..].starts_with(b"endraw") {
            p = skip_ws(bytes, p + 6);
            let right_trim = bytes.get(p) == Some(&b'-');
            if right_trim {
                p += 1;
            }
            if bytes[p..].starts_with(b"%}") {
                return Some((tag_start, left_trim, p + 2, right_trim));
            }
        }
        pos = tag_start + 2;
    }
}

/// Wisteria's mode-aware lexer.
pub struct Lexer<'a> {
    source: &'a str,
    source_map: SourceMap,
    mode: Mode,
    /// Absolute byte position text-mode scanning resumes from.
    pos: usize,
    /// Active inner logos lexer, valid only while `mode != Text`.
    inner: Option<logos::Lexer<'a, Token>>,
    /// Absolute offset the inner lexer's slice starts at.
    offset: usize,
    /// Set when the previous closer (`-}}`/`-%}`/`-#}`) requested that the
    /// next text chunk's leading whitespace be trimmed.
    pending_left_trim: bool,
    queue: VecDeque<ParseResult<SpannedToken<'a>>>,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            source_map: SourceMap::new(source),
            mode: Mode::Text,
            pos: 0,
            inner: None,
            offset: 0,
            pending_left_trim: false,
            queue: VecDeque::new(),
            done: false,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    fn make_span(&self, start: usize, end: usize) -> Span {
        self.source_map.span(start, end)
    }

    pub fn peek(&mut self) -> Option<&ParseResult<SpannedToken<'a>>> {
        if self.queue.is_empty() && !self.done {
            self.fill_queue();
        }
        self.queue.front()
    }

    pub fn next_token(&mut self) -> Option<ParseResult<SpannedToken<'a>>> {
        if self.queue.is_empty() && !self.done {
            self.fill_queue();
        }
        self.queue.pop_front()
    }

    fn push_text(&mut self, mut start: usize, mut end: usize, trim_left: bool, trim_right: bool) {
        let bytes = self.source.as_bytes();
        if trim_left {
            start = trim_start_ws(bytes, start, end);
        }
        if trim_right {
            end = trim_end_ws(bytes, end, start);
        }
        if start >= end {
            return;
        }
        let span = self.make_span(start, end);
        self.queue
            .push_back(Ok(SpannedToken::new(Token::Text, span, &self.source[start..end])));
    }

    fn enter_structured_mode(&mut self, after_opener: usize, mode: Mode) {
        self.mode = mode;
        self.offset = after_opener;
        self.inner = Some(Token::lexer(&self.source[after_opener..]));
    }

    /// Perform one unit of scanning work, pushing zero or more tokens onto
    /// the queue. Called repeatedly by `fill_queue` until something lands in
    /// the queue or input is exhausted.
    fn advance(&mut self) {
        match self.mode {
            Mode::Text => self.advance_text(),
            Mode::Expr | Mode::Block => self.advance_structured(),
        }
    }

    fn fill_queue(&mut self) {
        while self.queue.is_empty() && !self.done {
            self.advance();
        }
    }

    fn advance_text(&mut self) {
        let bytes = self.source.as_bytes();
        let len = bytes.len();
        if self.pos >= len {
            self.done = true;
            return;
        }

        let pending_left_trim = std::mem::take(&mut self.pending_left_trim);

        match find_delimiter(bytes, self.pos) {
            None => {
                self.push_text(self.pos, len, pending_left_trim, false);
                self.pos = len;
            }
            Some((delim_start, kind, has_trim, after_opener)) => {
                match kind {
                    DelimKind::Comment => {
                        self.push_text(self.pos, delim_start, pending_left_trim, has_trim);
                        self.scan_comment(after_opener);
                    }
                    DelimKind::Block => {
                        // Peek for a `raw` tag before committing to normal
                        // block-token emission, per spec.md §4.1 "Raw
                        // block ... collapses to a single TEXT token".
                        let skip_start = skip_ws(bytes, after_opener);
                        if let Some((raw_body_start, open_trim_right)) =
                            match_raw_open_tail(bytes, skip_start)
                        {
                            self.push_text(self.pos, delim_start, pending_left_trim, has_trim);
                            self.scan_raw_block(raw_body_start, open_trim_right);
                            return;
                        }
                        self.push_text(self.pos, delim_start, pending_left_trim, has_trim);
                        let opener = if has_trim {
                            Token::BlockStartTrim
                        } else {
                            Token::BlockStart
                        };
                        let span = self.make_span(delim_start, after_opener);
                        self.queue.push_back(Ok(SpannedToken::new(
                            opener,
                            span,
                            &self.source[delim_start..after_opener],
                        )));
                        self.pos = after_opener;
                        self.enter_structured_mode(after_opener, Mode::Block);
                    }
                    DelimKind::Var => {
                        self.push_text(self.pos, delim_start, pending_left_trim, has_trim);
                        let opener = if has_trim {
                            Token::VarStartTrim
                        } else {
                            Token::VarStart
                        };
                        let span = self.make_span(delim_start, after_opener);
                        self.queue.push_back(Ok(SpannedToken::new(
                            opener,
                            span,
                            &self.source[delim_start..after_opener],
                        )));
                        self.pos = after_opener;
                        self.enter_structured_mode(after_opener, Mode::Expr);
                    }
                }
            }
        }
    }

    fn scan_comment(&mut self, from: usize) {
        let bytes = self.source.as_bytes();
        let rel = match memchr::memmem::find(&bytes[from..], b"#}") {
            Some(r) => r,
            None => {
                self.queue.push_back(Err(ParseError::UnterminatedComment {
                    span: self.make_span(from, bytes.len()),
                }));
                self.pos = bytes.len();
                self.done = true;
                return;
            }
        };
        let hash_brace = from + rel;
        let right_trim = hash_brace > from && bytes[hash_brace - 1] == b'-';
        self.pending_left_trim = right_trim;
        self.pos = hash_brace + 2;
    }

    fn scan_raw_block(&mut self, content_start: usize, open_trim_right: bool) {
        let bytes = self.source.as_bytes();
        match find_endraw(bytes, content_start) {
            None => {
                self.queue.push_back(Err(ParseError::UnterminatedRawBlock {
                    span: self.make_span(content_start, bytes.len()),
                }));
                self.pos = bytes.len();
                self.done = true;
            }
            Some((tag_start, close_trim_left, after_tag, close_trim_right)) => {
                self.push_text(content_start, tag_start, open_trim_right, close_trim_left);
                self.pending_left_trim = close_trim_right;
                self.pos = after_tag;
            }
        }
    }

    fn advance_structured(&mut self) {
        let inner = self.inner.as_mut().expect("structured mode without inner lexer");
        let Some(result) = inner.next() else {
            // Ran off the end of the source without seeing a closer.
            let eof = self.source.len();
            self.queue.push_back(Err(ParseError::UnexpectedEof {
                expected: "`}}` or `%}`".to_string(),
                span: self.make_span(eof, eof),
            }));
            self.done = true;
            return;
        };
        let rel_span = inner.span();
        let start = self.offset + rel_span.start;
        let end = self.offset + rel_span.end;
        let text = &self.source[start..end];
        let span = self.make_span(start, end);

        match result {
            Err(()) => {
                self.queue.push_back(Err(ParseError::LexError { span }));
            }
            Ok(tok @ (Token::VarEnd | Token::VarEndTrim)) => {
                self.queue.push_back(Ok(SpannedToken::new(tok, span, text)));
                self.pending_left_trim = matches!(tok, Token::VarEndTrim);
                self.pos = end;
                self.mode = Mode::Text;
                self.inner = None;
            }
            Ok(tok @ (Token::BlockEnd | Token::BlockEndTrim)) => {
                self.queue.push_back(Ok(SpannedToken::new(tok, span, text)));
                self.pending_left_trim = matches!(tok, Token::BlockEndTrim);
                self.pos = end;
                self.mode = Mode::Text;
                self.inner = None;
            }
            Ok(tok) => {
                self.queue.push_back(Ok(SpannedToken::new(tok, span, text)));
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = ParseResult<SpannedToken<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Tokenize source into a vector of spanned tokens (intended for tests/tools,
/// not the hot parser path).
pub fn tokenize(source: &str) -> Vec<ParseResult<SpannedToken<'_>>> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).into_iter().filter_map(|r| r.ok()).map(|t| t.token).collect()
    }

    fn texts(src: &str) -> Vec<String> {
        tokenize(src)
            .into_iter()
            .filter_map(|r| r.ok())
            .filter(|t| t.token == Token::Text)
            .map(|t| t.text.to_string())
            .collect()
    }

    #[test]
    fn plain_text_only() {
        assert_eq!(kinds("hello world"), vec![Token::Text]);
    }

    #[test]
    fn variable_expression() {
        assert_eq!(
            kinds("Hello {{ name }}!"),
            vec![
                Token::Text,
                Token::VarStart,
                Token::Identifier,
                Token::VarEnd,
                Token::Text,
            ]
        );
    }

    #[test]
    fn block_tag() {
        assert_eq!(
            kinds("{% if x %}y{% endif %}"),
            vec![
                Token::BlockStart,
                Token::KwIf,
                Token::Identifier,
                Token::BlockEnd,
                Token::Text,
                Token::BlockStart,
                Token::KwEndIf,
                Token::BlockEnd,
            ]
        );
    }

    #[test]
    fn trim_markers_strip_adjacent_whitespace() {
        assert_eq!(texts("a \n  {%- if x %}b{% endif -%}  \n c"), vec!["a", "  \n c"]);
    }

    #[test]
    fn raw_block_collapses_to_single_text_token() {
        let toks = tokenize("before{% raw %}{{ not an expr }}{% endraw %}after")
            .into_iter()
            .filter_map(|r| r.ok())
            .collect::<Vec<_>>();
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[0].text, "before");
        assert_eq!(toks[1].token, Token::Text);
        assert_eq!(toks[1].text, "{{ not an expr }}");
        assert_eq!(toks[2].text, "after");
    }

    #[test]
    fn comment_is_skipped() {
        assert_eq!(kinds("a{# comment #}b"), vec![Token::Text, Token::Text]);
        assert_eq!(texts("a{# comment #}b"), vec!["a", "b"]);
    }

    #[test]
    fn unterminated_raw_block_errors() {
        let toks = tokenize("{% raw %}oops");
        assert!(toks.iter().any(|t| t.is_err()));
    }
}
