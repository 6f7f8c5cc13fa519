// Parser for the code-like workflow syntaxes.
//
// Parses a token stream (from the lexer) into an AST. Uses chumsky
// combinators. Lists, dicts and argument lists may span lines.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors.
// Failure modes: syntax errors produce `Rich` errors; `parse_program`
//                reports the first one as a malformed-statement diagnostic.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::diag::Diagnostic;
use crate::error::GraphError;
use crate::lexer::Token;
use crate::literal::Literal;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = program_parser(source);
    let (program, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        program,
        errors: all_errors,
    }
}

/// Parse, turning the first error into a diagnostic that quotes the
/// offending statement.
pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let result = parse(source);
    if let Some(err) = result.errors.first() {
        return Err(Diagnostic::new(GraphError::Malformed(err.to_string())).at(source, *err.span()));
    }
    result
        .program
        .ok_or_else(|| Diagnostic::new(GraphError::Malformed("no program".to_string())))
}

/// Parse a standalone literal (`None`, `True`, `12`, `0.5`, `"text"`).
/// Returns `None` for anything else.
pub fn parse_literal(text: &str) -> Option<Literal> {
    let result = crate::lexer::lex(text.trim());
    if !result.errors.is_empty() || result.tokens.len() != 1 {
        return None;
    }
    let (token, _) = result.tokens.into_iter().next()?;
    match token {
        Token::Int(n) => Literal::integer(n),
        Token::Float(v) => Some(Literal::Float(v)),
        Token::Str(s) => Some(Literal::Str(s)),
        Token::True => Some(Literal::Bool(true)),
        Token::False => Some(Literal::Bool(false)),
        Token::None => Some(Literal::Null),
        _ => None,
    }
}

// ── Main parser builder ──
//
// All grammar rules are built inside `program_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn program_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Newlines ──

    let nl = just(Token::Newline).repeated().ignored();

    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Literal ──

    let literal = select! {
        Token::Int(n) => Literal::integer(n),
        Token::Float(v) => Some(Literal::Float(v)),
        Token::Str(s) => Some(Literal::Str(s)),
        Token::True => Some(Literal::Bool(true)),
        Token::False => Some(Literal::Bool(false)),
        Token::None => Some(Literal::Null),
    }
    .try_map(|lit, span| lit.ok_or_else(|| Rich::custom(span, "integer out of range")))
    .map_with(|lit, e| Expr::Literal(lit, e.span()));

    // ── Expression = literal | list | dict | name ──

    let name = ident.clone().map(Expr::Name);
    let expr = recursive(|expr| {
        let item = nl.clone().ignore_then(expr).then_ignore(nl.clone());

        let list = item
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .then_ignore(nl.clone())
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map_with(|items, e| Expr::List(items, e.span()));

        let dict = item
            .clone()
            .then_ignore(just(Token::Colon))
            .then(item)
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .then_ignore(nl.clone())
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|entries, e| Expr::Dict(entries, e.span()));

        choice((literal, list, dict, name))
    });

    // ── Call: dotted.name '(' args ')' ──

    let arg = ident
        .clone()
        .then_ignore(just(Token::Equals))
        .then(expr.clone())
        .map(|(key, value)| Arg::Keyword(key, value))
        .or(expr.map(Arg::Positional));

    let args = nl
        .clone()
        .ignore_then(arg)
        .then_ignore(nl.clone())
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .then_ignore(nl.clone())
        .delimited_by(just(Token::LParen), just(Token::RParen));

    let call = ident
        .clone()
        .separated_by(just(Token::Dot))
        .at_least(1)
        .collect::<Vec<_>>()
        .then(args)
        .map_with(|(callee, args), e| Call {
            callee,
            args,
            span: e.span(),
        });

    // ── Statements ──

    let assign = ident
        .separated_by(just(Token::Comma))
        .at_least(1)
        .allow_trailing()
        .collect::<Vec<_>>()
        .then_ignore(just(Token::Equals))
        .then(call.clone())
        .map(|(targets, call)| StatementKind::Assign { targets, call });

    let statement = assign
        .or(call.map(StatementKind::Expr))
        .map_with(|kind, e| Statement {
            kind,
            span: e.span(),
        });

    // ── Program ──

    nl.clone()
        .ignore_then(
            statement
                .separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map_with(move |statements, e| Program {
            statements,
            span: e.span(),
        })
}

// ── Tests ──
