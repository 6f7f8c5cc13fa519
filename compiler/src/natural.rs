// natural.rs — Pseudo-natural form
//
// Sequential code restated as English-like sentences, one per line:
//
//   checkpointloader_1 is CheckpointLoader with the parameters of (ckpt is "m.safetensors")
//   model_1, clip_1, vae_1 is checkpointloader_1()
//
// Conversion is line-for-line, so a diagnostic raised by the sequential
// codec points at the same line of the natural text.
//
// Preconditions: none.
// Postconditions: `to_code(from_code(c))` parses to the same graph as `c`.
// Failure modes: a sentence that is not `<targets> is <callee> ...` →
//                `Diagnostic` (MalformedSyntax) on that line.
// Side effects: none.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use crate::ast::{Arg, Expr, Statement};
use crate::diag::{Diagnostic, Location};
use crate::error::GraphError;
use crate::graph::CompiledGraph;
use crate::lexer::{self, Token};
use crate::literal::Quote;
use crate::parser;
use crate::registry::Registry;
use crate::sequential;

const TRACING_TARGET: &str = "flowc::natural";

const WITH_PARAMS: &str = "with the parameters of";

// ── Sequential code → natural ──

/// Restate sequential code as natural sentences. Comment and blank lines
/// are kept; trailing comments on code lines are dropped.
pub fn from_code(code: &str) -> Result<String, Diagnostic> {
    let program = parser::parse_program(code)?;

    let mut starts: HashMap<usize, &Statement> = HashMap::new();
    let mut covered: HashSet<usize> = HashSet::new();
    for stmt in &program.statements {
        let first = line_of(code, stmt.span.start);
        let last = line_of(code, stmt.span.end.saturating_sub(1).max(stmt.span.start));
        starts.insert(first, stmt);
        covered.extend(first..=last);
    }

    let mut out = String::new();
    for (idx, line) in code.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(stmt) = starts.get(&idx) {
            writeln!(out, "{}", sentence(stmt)).unwrap();
        } else if !covered.contains(&idx) && (trimmed.is_empty() || trimmed.starts_with('#')) {
            writeln!(out, "{trimmed}").unwrap();
        }
    }
    Ok(out)
}

/// 0-based line index of a byte offset.
fn line_of(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count()
}

fn sentence(stmt: &Statement) -> String {
    let call = stmt.call();
    let args: Vec<String> = call
        .args
        .iter()
        .map(|arg| match arg {
            Arg::Positional(e) => expr(e),
            Arg::Keyword(key, e) => format!("{} is {}", key.name, expr(e)),
        })
        .collect();
    let callee = call.callee_path();
    let call_text = if args.is_empty() {
        format!("{callee}()")
    } else {
        format!("{callee} {WITH_PARAMS} ({})", args.join(", "))
    };
    match stmt.targets() {
        [] => call_text,
        targets => {
            let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
            format!("{} is {}", names.join(", "), call_text)
        }
    }
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Literal(lit, _) => lit.to_code(Quote::Double),
        Expr::Name(ident) => ident.name.clone(),
        Expr::List(items, _) => {
            let items: Vec<String> = items.iter().map(expr).collect();
            format!("[{}]", items.join(", "))
        }
        Expr::Dict(entries, _) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", expr(k), expr(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

// ── Natural → sequential code ──

/// Rewrite natural sentences as sequential code, line for line.
pub fn to_code(natural: &str) -> Result<String, Diagnostic> {
    let mut out = String::new();
    for (idx, line) in natural.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            writeln!(out, "{trimmed}").unwrap();
            continue;
        }
        let code = statement(trimmed)
            .map_err(|err| Diagnostic::new(err).with_location(idx + 1, trimmed))?;
        writeln!(out, "{code}").unwrap();
    }
    Ok(out)
}

fn is_target_list(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ',' || c == ' ')
}

fn statement(line: &str) -> Result<String, GraphError> {
    let (targets, rest) = match line.split_once(" is ") {
        Some((targets, rest)) if is_target_list(targets) => (Some(targets.trim()), rest.trim()),
        _ => (None, line),
    };
    let callee_end = rest
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(rest.len());
    let (callee, tail) = rest.split_at(callee_end);
    if callee.is_empty() {
        return Err(GraphError::Malformed(
            "expected '<targets> is <callee> with the parameters of (...)'".to_string(),
        ));
    }

    let tail = tail.trim();
    let params = tail.strip_prefix(WITH_PARAMS).map_or(tail, str::trim);
    let inner = if params.is_empty() {
        ""
    } else {
        params
            .strip_prefix('(')
            .and_then(|p| p.strip_suffix(')'))
            .ok_or_else(|| {
                GraphError::Malformed(format!(
                    "expected '{WITH_PARAMS} (...)' after '{callee}'"
                ))
            })?
    };
    let args = keywords_to_code(inner);
    Ok(match targets {
        Some(targets) => format!("{targets} = {callee}({args})"),
        None => format!("{callee}({args})"),
    })
}

/// Replace each `name is value` with `name = value`. Works on tokens, so an
/// ` is ` inside a string literal is left alone.
fn keywords_to_code(args: &str) -> String {
    let lexed = lexer::lex(args);
    let mut out = String::with_capacity(args.len());
    let mut copied = 0;
    let mut after_ident = false;
    for (token, span) in &lexed.tokens {
        let is_ident = *token == Token::Ident;
        if is_ident && after_ident && &args[span.start..span.end] == "is" {
            out.push_str(&args[copied..span.start]);
            out.push('=');
            copied = span.end;
            after_ident = false;
            continue;
        }
        after_ident = is_ident;
    }
    out.push_str(&args[copied..]);
    out
}

// ── Graph entry points ──

/// Parse the natural form into a compiled graph.
pub fn parse(natural: &str, registry: &Registry) -> Result<CompiledGraph, Diagnostic> {
    let code = to_code(natural)?;
    tracing::debug!(target: TRACING_TARGET, lines = code.lines().count(), "Converted natural form");
    sequential::parse(&code, registry).map_err(|mut diag| {
        // Quote the sentence the user wrote, not its rewrite.
        if let Some(loc) = diag.location.take() {
            let statement = natural
                .lines()
                .nth(loc.line.saturating_sub(1))
                .map_or(loc.statement.clone(), |l| l.trim().to_string());
            diag.location = Some(Location {
                line: loc.line,
                statement,
            });
        }
        diag
    })
}

/// Serialize a compiled graph in the natural form.
pub fn serialize(graph: &CompiledGraph) -> Result<String, Diagnostic> {
    from_code(&sequential::serialize(graph)?)
}

// ── Tests ───────────────────────────────────────────────────────────────────
