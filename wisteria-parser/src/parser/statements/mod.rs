//! Statement / block-tag grammar: `{% ... %}` dispatch and the top-level
//! node-list loop text/output/block tags share.

use crate::ast::{ForMode, ImportName, MacroArg, Node, SwitchCase};
use crate::error::ParseResult;
use crate::parser::expressions::{parse_expr, parse_for_target};
use crate::parser::Parser;
use crate::span::Span;
use crate::token::Token;

/// Parses a run of template data / output / block-tag nodes, stopping (without
/// consuming the opening `{%`) as soon as the upcoming tag keyword is one of
/// `end_keywords` — the caller's own closing/continuation tag.
pub fn parse_node_list(p: &mut Parser<'_>, end_keywords: &[Token]) -> ParseResult<Vec<Node>> {
    let mut out = Vec::new();
    loop {
        if p.at_eof() {
            break;
        }
        if p.check(Token::Text) {
            let tok = p.bump()?;
            out.push(Node::TemplateData {
                text: tok.text.to_string(),
                span: tok.span,
            });
            continue;
        }
        if p.at_var_start() {
            let start = p.expect_var_start()?;
            let expr = parse_expr(p)?;
            let end = p.expect_var_end()?;
            out.push(Node::Output {
                children: vec![expr],
                span: start.merge(&end),
            });
            continue;
        }
        if p.at_block_start() {
            if let Some(tag) = p.peek_second_token() {
                if end_keywords.contains(&tag) {
                    break;
                }
            }
            out.push(parse_statement(p)?);
            continue;
        }
        return Err(p.unexpected("template text, '{{', or '{%'"));
    }
    Ok(out)
}

fn node_list_node(children: Vec<Node>, start: Span, end: Span) -> Node {
    let span = start.merge(&end);
    Node::NodeList { children, span }
}

/// Consumes a bare `{% keyword %}` closing tag (e.g. `{% endif %}`) and
/// returns its span.
fn consume_bare_tag(p: &mut Parser<'_>, keyword: Token) -> ParseResult<Span> {
    let start = p.expect_block_start()?;
    p.expect(keyword, "a closing tag")?;
    let end = p.expect_block_end()?;
    Ok(start.merge(&end))
}

fn parse_statement(p: &mut Parser<'_>) -> ParseResult<Node> {
    let block_start = p.expect_block_start()?;
    match p.peek_token() {
        Some(Token::KwIf) => parse_if(p, block_start),
        Some(Token::KwFor) => parse_for(p, block_start),
        Some(Token::KwSwitch) => parse_switch(p, block_start),
        Some(Token::KwSet) => parse_set(p, block_start),
        Some(Token::KwBlock) => parse_block(p, block_start),
        Some(Token::KwExtends) => parse_extends(p, block_start),
        Some(Token::KwInclude) => parse_include(p, block_start),
        Some(Token::KwImport) => parse_import(p, block_start),
        Some(Token::KwFrom) => parse_from_import(p, block_start),
        Some(Token::KwMacro) => parse_macro(p, block_start),
        Some(Token::KwCall) => parse_call_block(p, block_start),
        _ => Err(p.unexpected("a block tag")),
    }
}

fn parse_if(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'if'
    let cond = parse_expr(p)?;
    p.expect_block_end()?;
    let children = parse_node_list(p, &[Token::KwElif, Token::KwElse, Token::KwEndIf])?;
    let body_span = children.last().map(|n| n.span()).unwrap_or(cond.span());
    let body = node_list_node(children, cond.span(), body_span);
    let else_ = parse_if_tail(p)?;
    let span = start.merge(&body.span());
    Ok(Node::If {
        cond: Box::new(cond),
        body: Box::new(body),
        else_,
        span,
    })
}

fn parse_if_tail(p: &mut Parser<'_>) -> ParseResult<Option<Box<Node>>> {
    let tag = p
        .peek_second_token()
        .ok_or_else(|| p.unexpected("'elif', 'else', or 'endif'"))?;
    match tag {
        Token::KwElif => {
            let start = p.expect_block_start()?;
            p.bump()?; // 'elif'
            let cond = parse_expr(p)?;
            p.expect_block_end()?;
            let children = parse_node_list(p, &[Token::KwElif, Token::KwElse, Token::KwEndIf])?;
            let body_span = children.last().map(|n| n.span()).unwrap_or(cond.span());
            let body = node_list_node(children, cond.span(), body_span);
            let else_ = parse_if_tail(p)?;
            let span = start.merge(&body.span());
            Ok(Some(Box::new(Node::If {
                cond: Box::new(cond),
                body: Box::new(body),
                else_,
                span,
            })))
        }
        Token::KwElse => {
            let start = p.expect_block_start()?;
            p.bump()?; // 'else'
            let end = p.expect_block_end()?;
            let children = parse_node_list(p, &[Token::KwEndIf])?;
            let body = node_list_node(children, start, end);
            consume_bare_tag(p, Token::KwEndIf)?;
            Ok(Some(Box::new(body)))
        }
        Token::KwEndIf => {
            consume_bare_tag(p, Token::KwEndIf)?;
            Ok(None)
        }
        _ => Err(p.unexpected("'elif', 'else', or 'endif'")),
    }
}

fn parse_for(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'for'
    let target = parse_for_target(p)?;
    p.expect(Token::KwIn, "'in'")?;
    let arr = parse_expr(p)?;
    let header_end = p.expect_block_end()?;
    let children = parse_node_list(p, &[Token::KwElse, Token::KwEndFor])?;
    let body_span = children.last().map(|n| n.span()).unwrap_or(header_end);
    let body = node_list_node(children, header_end, body_span);

    let tag = p
        .peek_second_token()
        .ok_or_else(|| p.unexpected("'else' or 'endfor'"))?;
    let else_ = if tag == Token::KwElse {
        let estart = p.expect_block_start()?;
        p.bump()?; // 'else'
        let eend = p.expect_block_end()?;
        let echildren = parse_node_list(p, &[Token::KwEndFor])?;
        let ebody = node_list_node(echildren, estart, eend);
        consume_bare_tag(p, Token::KwEndFor)?;
        Some(Box::new(ebody))
    } else {
        consume_bare_tag(p, Token::KwEndFor)?;
        None
    };

    let span = start.merge(&body.span());
    Ok(Node::For {
        // The parser always emits `Sync`; the async-filter transform pass
        // promotes this to `AsyncEach`/`AsyncAll` once it knows whether the
        // loop body needs sequencing around an await point.
        mode: ForMode::Sync,
        arr: Box::new(arr),
        target,
        body: Box::new(body),
        else_,
        span,
    })
}

fn parse_switch(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'switch'
    let expr = parse_expr(p)?;
    p.expect_block_end()?;

    let mut cases = Vec::new();
    let mut default = None;
    loop {
        while p.check(Token::Text) {
            p.bump()?;
        }
        let tag = p
            .peek_second_token()
            .ok_or_else(|| p.unexpected("'case', 'default', or 'endswitch'"))?;
        match tag {
            Token::KwCase => {
                p.expect_block_start()?;
                p.bump()?; // 'case'
                let value = parse_expr(p)?;
                let hend = p.expect_block_end()?;
                let children = parse_node_list(p, &[Token::KwCase, Token::KwDefault, Token::KwEndSwitch])?;
                let bspan = children.last().map(|n| n.span()).unwrap_or(hend);
                let body = node_list_node(children, hend, bspan);
                cases.push(SwitchCase { value, body });
            }
            Token::KwDefault => {
                p.expect_block_start()?;
                p.bump()?; // 'default'
                let hend = p.expect_block_end()?;
                let children = parse_node_list(p, &[Token::KwEndSwitch])?;
                let bspan = children.last().map(|n| n.span()).unwrap_or(hend);
                default = Some(Box::new(node_list_node(children, hend, bspan)));
            }
            Token::KwEndSwitch => {
                consume_bare_tag(p, Token::KwEndSwitch)?;
                break;
            }
            _ => return Err(p.unexpected("'case', 'default', or 'endswitch'")),
        }
    }

    Ok(Node::Switch {
        expr: Box::new(expr),
        cases,
        default,
        span: start,
    })
}

fn parse_set(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'set'
    let mut targets = vec![p.expect_identifier()?.0];
    while p.check(Token::Comma) {
        p.bump()?;
        targets.push(p.expect_identifier()?.0);
    }
    if p.check(Token::Assign) {
        p.bump()?;
        let value = parse_expr(p)?;
        let end = p.expect_block_end()?;
        return Ok(Node::Set {
            targets,
            value: Box::new(value),
            span: start.merge(&end),
        });
    }
    let hend = p.expect_block_end()?;
    let children = parse_node_list(p, &[Token::KwEndSet])?;
    let bspan = children.last().map(|n| n.span()).unwrap_or(hend);
    let body = node_list_node(children, hend, bspan);
    let end = consume_bare_tag(p, Token::KwEndSet)?;
    let capture = Node::Capture {
        span: body.span(),
        body: Box::new(body),
    };
    Ok(Node::Set {
        targets,
        value: Box::new(capture),
        span: start.merge(&end),
    })
}

fn parse_block(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'block'
    let (name, _) = p.expect_identifier()?;
    let hend = p.expect_block_end()?;
    let children = parse_node_list(p, &[Token::KwEndBlock])?;
    let bspan = children.last().map(|n| n.span()).unwrap_or(hend);
    let body = node_list_node(children, hend, bspan);
    p.expect_block_start()?;
    p.expect(Token::KwEndBlock, "'endblock'")?;
    // `{% endblock %}` and `{% endblock name %}` are both accepted; the
    // trailing name, if present, is purely documentation.
    if p.check(Token::Identifier) {
        p.bump()?;
    }
    let end = p.expect_block_end()?;
    Ok(Node::Block {
        name,
        body: Box::new(body),
        span: start.merge(&end),
    })
}

fn parse_extends(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'extends'
    let template = parse_expr(p)?;
    let end = p.expect_block_end()?;
    Ok(Node::Extends {
        template: Box::new(template),
        span: start.merge(&end),
    })
}

fn parse_include(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'include'
    let template = parse_expr(p)?;
    let mut ignore_missing = false;
    if p.check(Token::KwIgnore) {
        p.bump()?;
        p.expect(Token::KwMissing, "'missing'")?;
        ignore_missing = true;
    }
    let end = p.expect_block_end()?;
    Ok(Node::Include {
        template: Box::new(template),
        ignore_missing,
        span: start.merge(&end),
    })
}

fn parse_with_context_suffix(p: &mut Parser<'_>) -> ParseResult<bool> {
    // Default is "with context" for `import`/`include`-family tags, per
    // spec.md §3's `Import`/`FromImport` note; `without context` opts out.
    if p.check(Token::KwWith) {
        p.bump()?;
        p.expect(Token::KwContext, "'context'")?;
        Ok(true)
    } else if p.check(Token::KwWithout) {
        p.bump()?;
        p.expect(Token::KwContext, "'context'")?;
        Ok(false)
    } else {
        Ok(true)
    }
}

fn parse_import(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'import'
    let template = parse_expr(p)?;
    p.expect(Token::KwAs, "'as'")?;
    let (target, _) = p.expect_identifier()?;
    let with_context = parse_with_context_suffix(p)?;
    let end = p.expect_block_end()?;
    Ok(Node::Import {
        template: Box::new(template),
        target,
        with_context,
        span: start.merge(&end),
    })
}

fn parse_from_import(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'from'
    let template = parse_expr(p)?;
    p.expect(Token::KwImport, "'import'")?;
    let mut names = Vec::new();
    loop {
        let (name, _) = p.expect_identifier()?;
        let alias = if p.check(Token::KwAs) {
            p.bump()?;
            Some(p.expect_identifier()?.0)
        } else {
            None
        };
        names.push(ImportName { name, alias });
        if p.check(Token::Comma) {
            p.bump()?;
            continue;
        }
        break;
    }
    let with_context = parse_with_context_suffix(p)?;
    let end = p.expect_block_end()?;
    Ok(Node::FromImport {
        template: Box::new(template),
        names,
        with_context,
        span: start.merge(&end),
    })
}

fn parse_macro_args(p: &mut Parser<'_>) -> ParseResult<Vec<MacroArg>> {
    p.expect(Token::LParen, "'('")?;
    let mut args = Vec::new();
    if !p.check(Token::RParen) {
        loop {
            let (name, _) = p.expect_identifier()?;
            let default = if p.check(Token::Assign) {
                p.bump()?;
                Some(parse_expr(p)?)
            } else {
                None
            };
            args.push(MacroArg { name, default });
            if p.check(Token::Comma) {
                p.bump()?;
                continue;
            }
            break;
        }
    }
    p.expect(Token::RParen, "')'")?;
    Ok(args)
}

fn parse_macro(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'macro'
    let (name, _) = p.expect_identifier()?;
    let args = parse_macro_args(p)?;
    let hend = p.expect_block_end()?;
    let children = parse_node_list(p, &[Token::KwEndMacro])?;
    let bspan = children.last().map(|n| n.span()).unwrap_or(hend);
    let body = node_list_node(children, hend, bspan);
    let end = consume_bare_tag(p, Token::KwEndMacro)?;
    Ok(Node::Macro {
        name,
        args,
        body: Box::new(body),
        span: start.merge(&end),
    })
}

fn parse_call_block(p: &mut Parser<'_>, start: Span) -> ParseResult<Node> {
    p.bump()?; // 'call'
    let call_args = if p.check(Token::LParen) {
        parse_macro_args(p)?
    } else {
        Vec::new()
    };
    let callee = parse_expr(p)?;
    let hend = p.expect_block_end()?;
    let children = parse_node_list(p, &[Token::KwEndCall])?;
    let bspan = children.last().map(|n| n.span()).unwrap_or(hend);
    let body = node_list_node(children, hend, bspan);
    let end = consume_bare_tag(p, Token::KwEndCall)?;
    Ok(Node::CallBlock {
        call_args,
        callee: Box::new(callee),
        body: Box::new(body),
        span: start.merge(&end),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn parses_if_else() {
        let ast = Parser::parse("{% if x %}a{% else %}b{% endif %}").unwrap();
        let Node::Root { children, .. } = ast else { panic!() };
        assert_eq!(children.len(), 1);
        assert!(matches!(children[0], Node::If { .. }));
    }

    #[test]
    fn parses_for_else() {
        let ast = Parser::parse("{% for x in items %}{{ x }}{% else %}empty{% endfor %}").unwrap();
        let Node::Root { children, .. } = ast else { panic!() };
        let Node::For { else_, .. } = &children[0] else { panic!("expected For") };
        assert!(else_.is_some());
    }

    #[test]
    fn parses_macro_and_call() {
        let ast = Parser::parse(
            "{% macro greet(name) %}hi {{ name }}{% endmacro %}{{ greet(\"a\") }}",
        )
        .unwrap();
        let Node::Root { children, .. } = ast else { panic!() };
        assert!(matches!(children[0], Node::Macro { .. }));
    }

    #[test]
    fn parses_switch_with_fallthrough() {
        let ast = Parser::parse(
            "{% switch x %}{% case 1 %}{% case 2 %}two{% default %}other{% endswitch %}",
        )
        .unwrap();
        let Node::Root { children, .. } = ast else { panic!() };
        let Node::Switch { cases, default, .. } = &children[0] else { panic!("expected Switch") };
        assert_eq!(cases.len(), 2);
        assert!(matches!(&cases[0].body, Node::NodeList { children, .. } if children.is_empty()));
        assert!(default.is_some());
    }
}
