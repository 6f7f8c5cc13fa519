// ident.rs — Identifier codec
//
// Maps display names (node types, ports) that may contain brackets,
// parentheses, spaces, `+` or `-` onto tokens usable as bare identifiers,
// and back. Each substituted character becomes a fixed marker word.
//
// Literal text that would otherwise read back as a marker (a type really
// named `ColorSpace`) is written with the `Esc_` prefix in front of its
// first character, so `decode(encode(x)) == x` holds for every input.
// Text produced by other tools without escapes decodes marker-for-marker.

const MARKERS: [(char, &str); 7] = [
    ('[', "LeftBracket"),
    (']', "RightBracket"),
    ('(', "LeftParen"),
    (')', "RightParen"),
    (' ', "Space"),
    ('+', "PLUS"),
    ('-', "Hyphen"),
];

const ESCAPE: &str = "Esc_";

fn marker_for(c: char) -> Option<&'static str> {
    MARKERS.iter().find(|(ch, _)| *ch == c).map(|(_, m)| *m)
}

/// True if `c` followed by `rest` would start with a marker or the escape.
fn reads_as_reserved(c: char, rest: &str) -> bool {
    MARKERS
        .iter()
        .map(|(_, m)| *m)
        .chain(std::iter::once(ESCAPE))
        .any(|word| {
            word.starts_with(c)
                && word.len() > c.len_utf8()
                && rest.starts_with(&word[c.len_utf8()..])
        })
}

/// Encode a display name into a safe identifier token.
pub fn encode(display: &str) -> String {
    // Built back to front: whether a literal character needs the escape
    // depends on the text that follows it.
    let mut tail = String::with_capacity(display.len());
    for c in display.chars().rev() {
        if let Some(marker) = marker_for(c) {
            tail.insert_str(0, marker);
        } else if reads_as_reserved(c, &tail) {
            tail.insert(0, c);
            tail.insert_str(0, ESCAPE);
        } else {
            tail.insert(0, c);
        }
    }
    tail
}

/// Decode a safe identifier token back into its display name.
pub fn decode(safe: &str) -> String {
    let mut out = String::with_capacity(safe.len());
    let mut rest = safe;
    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix(ESCAPE) {
            if let Some(lit) = after.chars().next() {
                out.push(lit);
                rest = &after[lit.len_utf8()..];
                continue;
            }
        }
        if let Some((ch, marker)) = MARKERS.iter().find(|(_, m)| rest.starts_with(m)) {
            out.push(*ch);
            rest = &rest[marker.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// How a name token was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenForm {
    /// A bare identifier: read decoded first.
    Identifier,
    /// A quoted string: read verbatim first.
    Quoted,
}

/// Choose between the verbatim and decoded readings of `token`, preferring
/// the one `known` accepts. When neither or both are known, the reading
/// preferred by `form` wins.
pub fn resolve(token: &str, form: TokenForm, known: impl Fn(&str) -> bool) -> String {
    let decoded = decode(token);
    let (first, second) = match form {
        TokenForm::Identifier => (decoded, token.to_string()),
        TokenForm::Quoted => (token.to_string(), decoded),
    };
    if known(&first) || !known(&second) {
        first
    } else {
        second
    }
}
