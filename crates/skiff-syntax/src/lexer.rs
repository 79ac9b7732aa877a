use logos::Logos;
use skiff_common::error::{Error, ErrorS, ScanError};
use skiff_common::types::Spanned;

use std::num::ParseFloatError;

pub struct Lexer<'a> {
    inner: logos::Lexer<'a, Token>,
    pending: Option<Spanned<Token>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { inner: Token::lexer(source), pending: None }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Spanned<Token>, ErrorS>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.pending.take() {
            return Some(Ok(token));
        }

        match self.inner.next()? {
            Token::Error => {
                let mut span = self.inner.span();

                // Unterminated strings and block comments swallow the rest
                // of the match; classify them by their opening characters.
                if self.inner.slice().starts_with('"') {
                    return Some(Err((
                        Error::Scan(ScanError::UnterminatedString),
                        span,
                    )));
                }
                if self.inner.slice().starts_with("/*") {
                    return Some(Err((
                        Error::Scan(ScanError::UnterminatedComment),
                        span,
                    )));
                }

                // Fold an adjacent run of garbage into one diagnostic.
                while let Some(token) = self.inner.next() {
                    let span_new = self.inner.span();
                    if span.end == span_new.start {
                        span.end = span_new.end;
                    } else {
                        self.pending = Some((token, span_new));
                        break;
                    }
                }

                Some(Err((
                    Error::Scan(ScanError::UnexpectedCharacter(
                        self.inner.source()[span.clone()].to_string(),
                    )),
                    span,
                )))
            }
            token => {
                let span = self.inner.span();
                Some(Ok((token, span)))
            }
        }
    }
}

#[derive(Clone, Debug, Logos, PartialEq)]
pub enum Token {
    // Single-character tokens.
    #[token("(")]
    LtParen,
    #[token(")")]
    RtParen,
    #[token("{")]
    LtBrace,
    #[token("}")]
    RtBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,
    #[token("/")]
    Slash,
    #[token("*")]
    Asterisk,

    // One or two character tokens.
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,

    // Literals.
    #[regex("[a-zA-Z_][a-zA-Z0-9_]*", lex_identifier)]
    Identifier(String),
    #[regex(r#""[^"]*""#, lex_string)]
    String(String),
    #[regex(r"[0-9]+(\.[0-9]+)?", lex_number)]
    Number(f64),

    // Keywords.
    #[token("and")]
    And,
    #[token("break")]
    Break,
    #[token("class")]
    Class,
    #[token("continue")]
    Continue,
    #[token("else")]
    Else,
    #[token("false")]
    False,
    #[token("for")]
    For,
    #[token("fun")]
    Fun,
    #[token("if")]
    If,
    #[token("null")]
    Null,
    #[token("or")]
    Or,
    #[token("print")]
    Print,
    #[token("return")]
    Return,
    #[token("super")]
    Super,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    // An unterminated block comment would otherwise lex as `/` `*`; the
    // explicit pattern makes the whole tail one error match instead.
    #[regex(r"/\*([^*]|\*+[^*/])*\**")]
    #[regex(r"//[^\n]*", logos::skip)]
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
    #[regex(r"[ \r\n\t\f]+", logos::skip)]
    #[error]
    Error,
}

fn lex_number(lexer: &mut logos::Lexer<Token>) -> Result<f64, ParseFloatError> {
    let slice = lexer.slice();
    slice.parse::<f64>()
}

fn lex_string(lexer: &mut logos::Lexer<Token>) -> String {
    let slice = lexer.slice();
    slice[1..slice.len() - 1].to_string()
}

fn lex_identifier(lexer: &mut logos::Lexer<Token>) -> String {
    let slice = lexer.slice();
    slice.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn lex(source: &str) -> Vec<Result<Spanned<Token>, ErrorS>> {
        Lexer::new(source).collect()
    }

    #[test]
    fn lex_punctuation() {
        let exp = vec![
            Ok((Token::Number(1.0), 0..1)),
            Ok((Token::Plus, 2..3)),
            Ok((Token::Number(2.0), 4..5)),
            Ok((Token::Semicolon, 5..6)),
        ];
        assert_eq!(exp, lex("1 + 2;"));
    }

    #[test]
    fn lex_invalid_token() {
        let exp = vec![
            Err((
                Error::Scan(ScanError::UnexpectedCharacter("@foo".to_string())),
                0..4,
            )),
            Ok((Token::Identifier("bar".to_string()), 5..8)),
        ];
        assert_eq!(exp, lex("@foo bar"));
    }

    #[test]
    fn lex_unterminated_string() {
        let exp = vec![Err((Error::Scan(ScanError::UnterminatedString), 0..5))];
        assert_eq!(exp, lex("\"\nfoo"));
    }

    #[test]
    fn lex_string_spans_lines() {
        let exp = vec![Ok((Token::String("a\nb".to_string()), 0..5))];
        assert_eq!(exp, lex("\"a\nb\""));
    }

    #[test]
    fn lex_unterminated_block_comment() {
        let exp = vec![
            Ok((Token::Number(1.0), 0..1)),
            Err((Error::Scan(ScanError::UnterminatedComment), 2..7)),
        ];
        assert_eq!(exp, lex("1 /* op"));
    }

    #[test]
    fn lex_block_comment() {
        let exp = vec![
            Ok((Token::Number(1.0), 0..1)),
            Ok((Token::Number(2.0), 12..13)),
        ];
        assert_eq!(exp, lex("1 /* x\ny */ 2"));
    }

    #[test]
    fn lex_number_keeps_trailing_dot() {
        let exp = vec![
            Ok((Token::Number(123.0), 0..3)),
            Ok((Token::Dot, 3..4)),
        ];
        assert_eq!(exp, lex("123."));
    }

    #[test]
    fn lex_keywords_and_identifiers() {
        let exp = vec![
            Ok((Token::Break, 0..5)),
            Ok((Token::Identifier("breaker".to_string()), 6..13)),
            Ok((Token::Null, 14..18)),
        ];
        assert_eq!(exp, lex("break breaker null"));
    }

    #[test]
    fn lex_ternary_tokens() {
        let exp = vec![
            Ok((Token::Identifier("a".to_string()), 0..1)),
            Ok((Token::Question, 2..3)),
            Ok((Token::Number(1.0), 4..5)),
            Ok((Token::Colon, 6..7)),
            Ok((Token::Number(2.0), 8..9)),
        ];
        assert_eq!(exp, lex("a ? 1 : 2"));
    }
}
