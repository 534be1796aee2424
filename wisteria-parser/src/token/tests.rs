use super::Token;
use logos::Logos;

fn lex(src: &str) -> Vec<Token> {
    Token::lexer(src).filter_map(|r| r.ok()).collect()
}

#[test]
fn operators_longest_match_first() {
    assert_eq!(lex("//"), vec![Token::SlashSlash]);
    assert_eq!(lex("**"), vec![Token::StarStar]);
    assert_eq!(lex("=="), vec![Token::EqEq]);
    assert_eq!(lex("!="), vec![Token::NotEq]);
    assert_eq!(lex("<="), vec![Token::Le]);
    assert_eq!(lex(">="), vec![Token::Ge]);
    assert_eq!(lex("<"), vec![Token::Lt]);
    assert_eq!(lex(">"), vec![Token::Gt]);
    assert_eq!(lex("="), vec![Token::Assign]);
}

#[test]
fn keywords_vs_identifiers() {
    assert_eq!(lex("for"), vec![Token::KwFor]);
    assert_eq!(lex("forest"), vec![Token::Identifier]);
    assert_eq!(lex("is"), vec![Token::KwIs]);
    assert_eq!(lex("island"), vec![Token::Identifier]);
}

#[test]
fn string_literal_with_escapes() {
    let toks = lex(r#""a\"b""#);
    assert_eq!(toks, vec![Token::StringLiteral]);
}

#[test]
fn numbers() {
    assert_eq!(lex("42"), vec![Token::Integer]);
    assert_eq!(lex("3.14"), vec![Token::Float]);
}
