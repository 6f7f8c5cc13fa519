// Lexer for the code-like workflow syntaxes (sequential, staged and natural forms).
//
// A Python-flavoured subset: identifiers, dotted names, calls, keyword
// arguments, tuple targets, list and dict displays, and literals.
// Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Token types.
///
/// Literals carry parsed values. Identifiers carry no value; use the span
/// to retrieve the text from the source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|#[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    // ── Symbols ──
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
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // ── Literals ──
    /// Float literal: has a fractional part or an exponent.
    #[regex(r"-?[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", parse_float)]
    Float(f64),

    /// Integer literal in `i64::MIN..=u64::MAX`.
    #[regex(r"-?[0-9]+", parse_int)]
    Int(i128),

    /// String literal in `"..."`, `'...'` or `"""..."""` form.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    #[regex(r#"'([^'\\]|\\.)*'"#, parse_string)]
    #[regex(r#""""([^"\\]|\\.|"([^"\\]|\\.)|""([^"\\]|\\.))*""""#, parse_string)]
    Str(String),

    // ── Identifier ──
    //
    // Placed after keywords. logos prioritises fixed `#[token]` matches
    // over regex for the same length, so `None` matches None, not Ident.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ── Structure ──
    /// One or more newlines (statement terminator).
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::None => write!(f, "None"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Float(v) => write!(f, "{v:?}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Ident => write!(f, "<ident>"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Callbacks ──

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i128> {
    let n: i128 = lex.slice().parse().ok()?;
    (i128::from(i64::MIN)..=i128::from(u64::MAX))
        .contains(&n)
        .then_some(n)
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let quote = if slice.len() >= 6 && slice.starts_with("\"\"\"") {
        3
    } else {
        1
    };
    Some(unescape(&slice[quote..slice.len() - quote]))
}

/// Resolve backslash escapes. Unknown escapes are kept verbatim.
fn unescape(inner: &str) -> String {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

// ── Public API ──

/// Lex a source string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn instantiate_statement() {
        assert_eq!(
            lex_ok("vaedecode_3 = VAEDecode(x=1)"),
            vec![
                Token::Ident,
                Token::Equals,
                Token::Ident,
                Token::LParen,
                Token::Ident,
                Token::Equals,
                Token::Int(1),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn keywords_and_numbers() {
        assert_eq!(
            lex_ok("True False None Nonexistent -3 2.5 1e3 7."),
            vec![
                Token::True,
                Token::False,
                Token::None,
                Token::Ident,
                Token::Int(-3),
                Token::Float(2.5),
                Token::Float(1000.0),
                Token::Float(7.0),
            ]
        );
    }

    #[test]
    fn integers_span_the_unsigned_range() {
        assert_eq!(
            lex_ok("18446744073709551615 -9223372036854775808"),
            vec![
                Token::Int(i128::from(u64::MAX)),
                Token::Int(i128::from(i64::MIN)),
            ]
        );
        assert!(!lex("18446744073709551616").errors.is_empty());
    }

    #[test]
    fn string_forms() {
        assert_eq!(
            lex_ok(r#""a\"b" 'it\'s' """multi
line""" """""""#),
            vec![
                Token::Str("a\"b".into()),
                Token::Str("it's".into()),
                Token::Str("multi\nline".into()),
                Token::Str(String::new()),
            ]
        );
    }

    #[test]
    fn triple_quoted_allows_inner_quotes() {
        assert_eq!(
            lex_ok(r#""""say "hi" now""""#),
            vec![Token::Str("say \"hi\" now".into())]
        );
    }

    #[test]
    fn escapes() {
        assert_eq!(
            lex_ok(r#""tab\there\nC:\\dir\q""#),
            vec![Token::Str("tab\there\nC:\\dir\\q".into())]
        );
    }

    #[test]
    fn comments_and_newlines() {
        assert_eq!(
            lex_ok("# header\n\nworkflow.add_node() # trailing\n"),
            vec![
                Token::Newline,
                Token::Ident,
                Token::Dot,
                Token::Ident,
                Token::LParen,
                Token::RParen,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn unexpected_character_is_reported() {
        let result = lex("a = B(x=1) @");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 11, end: 12 });
        assert_eq!(result.tokens.len(), 8);
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let result = lex("99999999999999999999");
        assert_eq!(result.errors.len(), 1);
    }
}
