// literal.rs — Parameter literal values
//
// The literal alphabet shared by every surface syntax: None, booleans,
// integers, floats and strings. Code-like forms render them the way a
// Python reader expects (`None`, `True`, `1.0`); JSON forms use serde.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A literal parameter value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    /// Integer above `i64::MAX`; engine seeds span the full `u64` range.
    UInt(u64),
    Float(f64),
    Str(String),
}

/// How string literals are quoted when rendered as code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    /// `"value"`
    Double,
    /// `"""value"""`
    Triple,
}

impl Literal {
    /// The integer literal for `n`, or `None` outside `i64::MIN..=u64::MAX`.
    pub fn integer(n: i128) -> Option<Literal> {
        i64::try_from(n)
            .map(Literal::Int)
            .or_else(|_| u64::try_from(n).map(Literal::UInt))
            .ok()
    }

    /// Render as a code literal that the shared lexer reads back unchanged.
    pub fn to_code(&self, quote: Quote) -> String {
        match self {
            Literal::Null => "None".to_string(),
            Literal::Bool(true) => "True".to_string(),
            Literal::Bool(false) => "False".to_string(),
            Literal::Int(n) => n.to_string(),
            Literal::UInt(n) => n.to_string(),
            Literal::Float(v) => format_float(*v),
            Literal::Str(s) => match quote {
                Quote::Double => format!("\"{}\"", escape(s)),
                Quote::Triple => format!("\"\"\"{}\"\"\"", escape(s)),
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Null => serde_json::Value::Null,
            Literal::Bool(b) => serde_json::Value::Bool(*b),
            Literal::Int(n) => serde_json::Value::from(*n),
            Literal::UInt(n) => serde_json::Value::from(*n),
            Literal::Float(v) => serde_json::Value::from(*v),
            Literal::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_code(Quote::Double))
    }
}

/// Shortest representation that parses back to the same value; always
/// carries a `.` or an exponent so it never reads back as an integer.
fn format_float(v: f64) -> String {
    let s = format!("{v:?}");
    if s.contains(&['.', 'e', 'E'][..]) || !v.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}

/// Escape a string body for a double-quoted or triple-quoted literal.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
