// diag.rs — Unified diagnostics model
//
// Every fallible compiler entry point reports a `Diagnostic`: the error
// kind, its stable code, and (for textual input) the line and statement
// that triggered it. The rendered text is meant to be fed back to whoever
// produced the source so it can be repaired.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;
use crate::error::GraphError;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0200`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // Registry lookups
    pub const E0100: DiagCode = DiagCode("E0100"); // unknown node type
    pub const E0101: DiagCode = DiagCode("E0101"); // unknown parameter
    pub const E0102: DiagCode = DiagCode("E0102"); // unknown port
    pub const E0103: DiagCode = DiagCode("E0103"); // unknown node

    // Link type-checking
    pub const E0200: DiagCode = DiagCode("E0200");

    // Bindings
    pub const E0300: DiagCode = DiagCode("E0300"); // used before defined
    pub const E0301: DiagCode = DiagCode("E0301"); // duplicate binding
    pub const E0302: DiagCode = DiagCode("E0302"); // input already linked
    pub const E0303: DiagCode = DiagCode("E0303"); // invoke arity

    // Serialization
    pub const E0400: DiagCode = DiagCode("E0400"); // deadlock

    // Surface syntax
    pub const E0500: DiagCode = DiagCode("E0500");

    // Imported graphs
    pub const E0600: DiagCode = DiagCode("E0600");
}

// ── Location ─────────────────────────────────────────────────────────────

/// Where in the textual source a diagnostic was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// 1-based line number.
    pub line: usize,
    /// The offending statement, trimmed.
    pub statement: String,
}

impl Location {
    /// Locate a byte span in `source`. Multi-line statements are reported
    /// in full, from the start of their first line to the end of their last.
    pub fn from_span(source: &str, span: Span) -> Self {
        let start = span.start.min(source.len());
        let end = span.end.clamp(start, source.len());
        let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[end..].find('\n').map_or(source.len(), |i| end + i);
        Location {
            line: source[..start].matches('\n').count() + 1,
            statement: source[line_start..line_end].trim().to_string(),
        }
    }
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any codec or IR operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub error: GraphError,
    pub location: Option<Location>,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(error: GraphError) -> Self {
        Self {
            error,
            location: None,
            hint: None,
        }
    }

    pub fn code(&self) -> DiagCode {
        self.error.code()
    }

    /// Attach the statement at `span` in `source`.
    pub fn at(mut self, source: &str, span: Span) -> Self {
        self.location = Some(Location::from_span(source, span));
        self
    }

    /// Attach an explicit line and statement (line-oriented codecs).
    pub fn with_location(mut self, line: usize, statement: impl Into<String>) -> Self {
        self.location = Some(Location {
            line,
            statement: statement.into().trim().to_string(),
        });
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<GraphError> for Diagnostic {
    fn from(error: GraphError) -> Self {
        Diagnostic::new(error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error[{}]: {}", self.code(), self.error)?;
        if let Some(loc) = &self.location {
            write!(f, "\n  --> line {}: {}", loc.line, loc.statement)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(range: std::ops::Range<usize>) -> Span {
        use chumsky::span::Span as _;
        Span::new((), range)
    }

    #[test]
    fn display_without_location() {
        let d = Diagnostic::new(GraphError::UnknownNodeType("Foo".into()));
        assert_eq!(format!("{d}"), "error[E0100]: unknown node type 'Foo'");
    }

    #[test]
    fn display_with_location_and_hint() {
        let src = "a = A()\nb = Bogus()\n";
        let d = Diagnostic::new(GraphError::UnknownNodeType("Bogus".into()))
            .at(src, span(12..17))
            .with_hint("check the template directory");
        assert_eq!(
            format!("{d}"),
            "error[E0100]: unknown node type 'Bogus'\n  --> line 2: b = Bogus()\n  hint: check the template directory"
        );
    }

    #[test]
    fn location_spans_multiple_lines() {
        let src = "x = F(\n  a=1,\n)\ny = G()";
        let loc = Location::from_span(src, span(0..15));
        assert_eq!(loc.line, 1);
        assert_eq!(loc.statement, "x = F(\n  a=1,\n)");
    }

    #[test]
    fn location_clamps_out_of_range_span() {
        let loc = Location::from_span("abc", span(10..20));
        assert_eq!(loc.line, 1);
        assert_eq!(loc.statement, "abc");
    }

    #[test]
    fn code_follows_error_kind() {
        let d: Diagnostic = GraphError::UsedBeforeDefined("clip_1".into()).into();
        assert_eq!(d.code(), codes::E0300);
    }
}
