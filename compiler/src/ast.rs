// AST node types for the code-like workflow syntaxes.
//
// Both the sequential and the staged forms are flat statement lists of
// calls, optionally assigned to a tuple of names. The codecs give these
// calls their meaning; the AST only records shape and spans.
//
// Preconditions: produced by the parser from a valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::literal::Literal;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
    pub span: Span,
}

// ── Statements ──

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `a, b = callee(args)`
    Assign { targets: Vec<Ident>, call: Call },
    /// `callee(args)`
    Expr(Call),
}

impl Statement {
    pub fn call(&self) -> &Call {
        match &self.kind {
            StatementKind::Assign { call, .. } | StatementKind::Expr(call) => call,
        }
    }

    pub fn targets(&self) -> &[Ident] {
        match &self.kind {
            StatementKind::Assign { targets, .. } => targets,
            StatementKind::Expr(_) => &[],
        }
    }
}

// ── Calls ──

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Dotted callee path, e.g. `workflow.add_node`.
    pub callee: Vec<Ident>,
    pub args: Vec<Arg>,
    pub span: Span,
}

impl Call {
    /// The callee path joined with `.`.
    pub fn callee_path(&self) -> String {
        self.callee
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(Ident, Expr),
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, Span),
    Name(Ident),
    List(Vec<Expr>, Span),
    Dict(Vec<(Expr, Expr)>, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span) | Expr::List(_, span) | Expr::Dict(_, span) => *span,
            Expr::Name(ident) => ident.span,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expr::Literal(lit, _) => Some(lit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_literal().and_then(Literal::as_str)
    }
}
