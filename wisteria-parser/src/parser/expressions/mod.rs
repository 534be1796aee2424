//! Expression grammar: `inlineIf -> or -> and -> not -> comparison ->
//! concat(~) -> add/sub -> mul/div/floordiv/mod -> pow -> unary ->
//! postfix(filter|call|lookup) -> primary`, per spec.md §4.2.

use crate::ast::{BinOp, CompareOp, CompareOpKind, ForTarget, Literal, Node, UnaryOp};
use crate::error::{ParseError, ParseResult};
use crate::parser::Parser;
use crate::span::Span;
use crate::token::Token;

pub fn parse_expr(p: &mut Parser<'_>) -> ParseResult<Node> {
    parse_inline_if(p)
}

fn parse_inline_if(p: &mut Parser<'_>) -> ParseResult<Node> {
    let start = p.current_span();
    let body = parse_or(p)?;
    if p.check(Token::KwIf) {
        p.bump()?;
        let cond = parse_or(p)?;
        let else_ = if p.check(Token::KwElse) {
            p.bump()?;
            Some(Box::new(parse_inline_if(p)?))
        } else {
            None
        };
        let mut span = start.merge(&body.span()).merge(&cond.span());
        if let Some(e) = &else_ {
            span = span.merge(&e.span());
        }
        return Ok(Node::InlineIf {
            cond: Box::new(cond),
            body: Box::new(body),
            else_,
            span,
        });
    }
    Ok(body)
}

fn parse_or(p: &mut Parser<'_>) -> ParseResult<Node> {
    let mut left = parse_and(p)?;
    while p.check(Token::KwOr) {
        p.bump()?;
        let right = parse_and(p)?;
        let span = left.span().merge(&right.span());
        left = Node::BinOp {
            op: BinOp::Or,
            left: Box::new(left),
            right: Box::new(right),
            span,
        };
    }
    Ok(left)
}

fn parse_and(p: &mut Parser<'_>) -> ParseResult<Node> {
    let mut left = parse_not(p)?;
    while p.check(Token::KwAnd) {
        p.bump()?;
        let right = parse_not(p)?;
        let span = left.span().merge(&right.span());
        left = Node::BinOp {
            op: BinOp::And,
            left: Box::new(left),
            right: Box::new(right),
            span,
        };
    }
    Ok(left)
}

fn parse_not(p: &mut Parser<'_>) -> ParseResult<Node> {
    if p.check(Token::KwNot) {
        let start = p.bump()?.span;
        let operand = parse_not(p)?;
        let span = start.merge(&operand.span());
        return Ok(Node::UnaryOp {
            op: UnaryOp::Not,
            operand: Box::new(operand),
            span,
        });
    }
    parse_comparison(p)
}

fn parse_comparison(p: &mut Parser<'_>) -> ParseResult<Node> {
    let left = parse_concat(p)?;

    // `is` / `in` (and their negated forms) are single, non-chaining
    // operators that desugar directly to `Is`/`In` nodes, per spec.md §4.2.
    if p.check(Token::KwIs) {
        let start = p.bump()?.span;
        let negated = if p.check(Token::KwNot) {
            p.bump()?;
            true
        } else {
            false
        };
        let (name, name_span) = p.expect_identifier()?;
        let args = if p.check(Token::LParen) {
            p.bump()?;
            parse_call_args_until_rparen(p)?
        } else {
            Vec::new()
        };
        let span = left.span().merge(&start).merge(&name_span);
        return Ok(Node::Is {
            negated,
            left: Box::new(left),
            name,
            args,
            span,
        });
    }

    let is_not_in = p.check(Token::KwNot) && p.peek_second_token() == Some(Token::KwIn);
    if p.check(Token::KwIn) || is_not_in {
        let negated = is_not_in;
        if negated {
            p.bump()?; // 'not'
        }
        let start = p.bump()?.span; // 'in'
        let right = parse_concat(p)?;
        let span = left.span().merge(&start).merge(&right.span());
        return Ok(Node::In {
            negated,
            left: Box::new(left),
            right: Box::new(right),
            span,
        });
    }

    finish_compare_chain(p, left)
}

fn finish_compare_chain(p: &mut Parser<'_>, left: Node) -> ParseResult<Node> {
    let mut ops = Vec::new();
    while let Some(kind) = compare_op_kind(p.peek_token()) {
        p.bump()?;
        let expr = parse_concat(p)?;
        ops.push(CompareOp {
            op: kind,
            span: expr.span(),
            expr,
        });
    }
    if ops.is_empty() {
        return Ok(left);
    }
    let span = left.span().merge(&ops.last().unwrap().expr.span());
    Ok(Node::Compare {
        expr: Box::new(left),
        ops,
        span,
    })
}

fn compare_op_kind(tok: Option<Token>) -> Option<CompareOpKind> {
    Some(match tok? {
        Token::EqEq => CompareOpKind::Eq,
        Token::NotEq => CompareOpKind::NotEq,
        Token::Lt => CompareOpKind::Lt,
        Token::Gt => CompareOpKind::Gt,
        Token::Le => CompareOpKind::Le,
        Token::Ge => CompareOpKind::Ge,
        _ => return None,
    })
}

fn parse_concat(p: &mut Parser<'_>) -> ParseResult<Node> {
    let mut left = parse_add(p)?;
    while p.check(Token::Tilde) {
        p.bump()?;
        let right = parse_add(p)?;
        let span = left.span().merge(&right.span());
        left = Node::BinOp {
            op: BinOp::Concat,
            left: Box::new(left),
            right: Box::new(right),
            span,
        };
    }
    Ok(left)
}

fn parse_add(p: &mut Parser<'_>) -> ParseResult<Node> {
    let mut left = parse_mul(p)?;
    loop {
        let op = match p.peek_token() {
            Some(Token::Plus) => BinOp::Add,
            Some(Token::Minus) => BinOp::Sub,
            _ => break,
        };
        p.bump()?;
        let right = parse_mul(p)?;
        let span = left.span().merge(&right.span());
        left = Node::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span,
        };
    }
    Ok(left)
}

fn parse_mul(p: &mut Parser<'_>) -> ParseResult<Node> {
    let mut left = parse_pow(p)?;
    loop {
        let op = match p.peek_token() {
            Some(Token::Star) => BinOp::Mul,
            Some(Token::Slash) => BinOp::Div,
            Some(Token::SlashSlash) => BinOp::FloorDiv,
            Some(Token::Percent) => BinOp::Mod,
            _ => break,
        };
        p.bump()?;
        let right = parse_pow(p)?;
        let span = left.span().merge(&right.span());
        left = Node::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span,
        };
    }
    Ok(left)
}

fn parse_pow(p: &mut Parser<'_>) -> ParseResult<Node> {
    let base = parse_unary(p)?;
    if p.check(Token::StarStar) {
        p.bump()?;
        let exp = parse_pow(p)?; // right-associative
        let span = base.span().merge(&exp.span());
        return Ok(Node::BinOp {
            op: BinOp::Pow,
            left: Box::new(base),
            right: Box::new(exp),
            span,
        });
    }
    Ok(base)
}

fn parse_unary(p: &mut Parser<'_>) -> ParseResult<Node> {
    match p.peek_token() {
        Some(Token::Plus) => {
            let start = p.bump()?.span;
            let operand = parse_unary(p)?;
            let span = start.merge(&operand.span());
            Ok(Node::UnaryOp {
                op: UnaryOp::Pos,
                operand: Box::new(operand),
                span,
            })
        }
        Some(Token::Minus) => {
            let start = p.bump()?.span;
            let operand = parse_unary(p)?;
            let span = start.merge(&operand.span());
            Ok(Node::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
                span,
            })
        }
        _ => parse_postfix(p),
    }
}

fn parse_postfix(p: &mut Parser<'_>) -> ParseResult<Node> {
    let mut expr = parse_primary(p)?;
    loop {
        match p.peek_token() {
            Some(Token::Dot) => {
                p.bump()?;
                let (name, name_span) = p.expect_identifier()?;
                let span = expr.span().merge(&name_span);
                expr = Node::LookupVal {
                    target: Box::new(expr),
                    value: Box::new(Node::Literal {
                        value: Literal::Str(name),
                        span: name_span,
                    }),
                    span,
                };
            }
            Some(Token::LBracket) => {
                p.bump()?;
                let key = parse_expr(p)?;
                let end = p.expect(Token::RBracket, "']'")?.span;
                let span = expr.span().merge(&end);
                expr = Node::LookupVal {
                    target: Box::new(expr),
                    value: Box::new(key),
                    span,
                };
            }
            Some(Token::LParen) => {
                p.bump()?;
                let args = parse_call_args_until_rparen(p)?;
                let end = p.expect(Token::RParen, "')'")?.span;
                let span = expr.span().merge(&end);
                expr = Node::FunCall {
                    callee: Box::new(expr),
                    args,
                    span,
                };
            }
            Some(Token::Pipe) => {
                p.bump()?;
                let (name, name_span) = p.expect_identifier()?;
                let mut args = vec![expr];
                let mut end = name_span;
                if p.check(Token::LParen) {
                    p.bump()?;
                    let extra = parse_call_args_until_rparen(p)?;
                    end = p.expect(Token::RParen, "')'")?.span;
                    args.extend(extra);
                }
                let span = args[0].span().merge(&end);
                expr = Node::Filter { name, args, span };
            }
            _ => break,
        }
    }
    Ok(expr)
}

/// Parses a comma-separated argument list up to (but not consuming) the
/// closing `)`. Trailing `name = expr` arguments collapse into a single
/// `KeywordArgs` node appended to the positional list, per spec.md §3's
/// keyword-args invariant.
pub(crate) fn parse_call_args_until_rparen(p: &mut Parser<'_>) -> ParseResult<Vec<Node>> {
    let mut positional = Vec::new();
    let mut kwargs: Vec<(String, Node)> = Vec::new();
    if !p.check(Token::RParen) {
        loop {
            let expr = parse_expr(p)?;
            if p.check(Token::Assign) {
                match expr {
                    Node::Symbol { name, .. } => {
                        p.bump()?;
                        let value = parse_expr(p)?;
                        kwargs.push((name, value));
                    }
                    other => {
                        return Err(ParseError::invalid_syntax(
                            "'=' is only valid after a plain name in keyword arguments",
                            other.span(),
                        ));
                    }
                }
            } else {
                positional.push(expr);
            }
            if p.check(Token::Comma) {
                p.bump()?;
                continue;
            }
            break;
        }
    }
    if !kwargs.is_empty() {
        let span = kwargs.first().unwrap().1.span();
        positional.push(Node::KeywordArgs { pairs: kwargs, span });
    }
    Ok(positional)
}

fn parse_primary(p: &mut Parser<'_>) -> ParseResult<Node> {
    let span = p.current_span();
    match p.peek_token() {
        Some(Token::Integer) => {
            let tok = p.bump()?;
            let value = tok.text.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
                literal: tok.text.to_string(),
                span: tok.span,
            })?;
            Ok(Node::Literal {
                value: Literal::Int(value),
                span: tok.span,
            })
        }
        Some(Token::Float) => {
            let tok = p.bump()?;
            let value = tok.text.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
                literal: tok.text.to_string(),
                span: tok.span,
            })?;
            Ok(Node::Literal {
                value: Literal::Float(value),
                span: tok.span,
            })
        }
        Some(Token::StringLiteral) => {
            let tok = p.bump()?;
            let value = unescape_string(tok.text, tok.span)?;
            Ok(Node::Literal {
                value: Literal::Str(value),
                span: tok.span,
            })
        }
        Some(Token::True) => {
            let tok = p.bump()?;
            Ok(Node::Literal {
                value: Literal::Bool(true),
                span: tok.span,
            })
        }
        Some(Token::False) => {
            let tok = p.bump()?;
            Ok(Node::Literal {
                value: Literal::Bool(false),
                span: tok.span,
            })
        }
        Some(Token::None_) => {
            let tok = p.bump()?;
            Ok(Node::Literal {
                value: Literal::None,
                span: tok.span,
            })
        }
        Some(Token::Identifier) => {
            let tok = p.bump()?;
            Ok(Node::Symbol {
                name: tok.text.to_string(),
                span: tok.span,
            })
        }
        Some(Token::LParen) => {
            p.bump()?;
            let inner = parse_expr(p)?;
            let end = p.expect(Token::RParen, "')'")?.span;
            Ok(Node::Group {
                span: span.merge(&end),
                expr: Box::new(inner),
            })
        }
        Some(Token::LBracket) => parse_array(p, span),
        Some(Token::LBrace) => parse_dict(p, span),
        _ => Err(p.unexpected("an expression")),
    }
}

fn parse_array(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // '['
    let mut items = Vec::new();
    if !p.check(Token::RBracket) {
        loop {
            items.push(parse_expr(p)?);
            if p.check(Token::Comma) {
                p.bump()?;
                continue;
            }
            break;
        }
    }
    let end = p.expect(Token::RBracket, "']'")?.span;
    Ok(Node::ArrayNode {
        items,
        span: start.merge(&end),
    })
}

fn parse_dict(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // '{'
    let mut pairs = Vec::new();
    if !p.check(Token::RBrace) {
        loop {
            let key = parse_dict_key(p)?;
            p.expect(Token::Colon, "':'")?;
            let value = parse_expr(p)?;
            pairs.push((key, value));
            if p.check(Token::Comma) {
                p.bump()?;
                continue;
            }
            break;
        }
    }
    let end = p.expect(Token::RBrace, "'}'")?.span;
    Ok(Node::Dict {
        pairs,
        span: start.merge(&end),
    })
}

fn parse_dict_key(p: &mut Parser<'_>) -> ParseResult<Node> {
    match p.peek_token() {
        Some(Token::StringLiteral) => {
            let tok = p.bump()?;
            let value = unescape_string(tok.text, tok.span)?;
            Ok(Node::Literal {
                value: Literal::Str(value),
                span: tok.span,
            })
        }
        Some(Token::Identifier) => {
            let tok = p.bump()?;
            Ok(Node::Literal {
                value: Literal::Str(tok.text.to_string()),
                span: tok.span,
            })
        }
        _ => Err(ParseError::NonStringDictKey {
            span: p.current_span(),
        }),
    }
}

/// Process backslash escapes inside a quoted string token's raw text
/// (`tok.text` still includes the surrounding quote characters).
pub(crate) fn unescape_string(raw: &str, span: Span) -> ParseResult<String> {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('u') => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                if hex.len() != 4 {
                    return Err(ParseError::InvalidEscape {
                        sequence: format!("\\u{hex}"),
                        span,
                    });
                }
                let code = u32::from_str_radix(&hex, 16).map_err(|_| ParseError::InvalidEscape {
                    sequence: format!("\\u{hex}"),
                    span,
                })?;
                let ch = char::from_u32(code).ok_or_else(|| ParseError::InvalidEscape {
                    sequence: format!("\\u{hex}"),
                    span,
                })?;
                out.push(ch);
            }
            Some(other) => {
                return Err(ParseError::InvalidEscape {
                    sequence: format!("\\{other}"),
                    span,
                });
            }
            None => {
                return Err(ParseError::UnterminatedString { span });
            }
        }
    }
    Ok(out)
}

/// Parses a `{% for %}` binding target: `name`, `(a, b)`, or `k, v`.
pub(crate) fn parse_for_target(p: &mut Parser<'_>) -> ParseResult<ForTarget> {
    if p.check(Token::LParen) {
        p.bump()?;
        let mut names = Vec::new();
        loop {
            names.push(p.expect_identifier()?.0);
            if p.check(Token::Comma) {
                p.bump()?;
                continue;
            }
            break;
        }
        p.expect(Token::RParen, "')'")?;
        return Ok(ForTarget::Tuple(names));
    }
    let (first, _) = p.expect_identifier()?;
    if p.check(Token::Comma) {
        p.bump()?;
        let (second, _) = p.expect_identifier()?;
        return Ok(ForTarget::KeyValue(first, second));
    }
    Ok(ForTarget::Single(first))
}
