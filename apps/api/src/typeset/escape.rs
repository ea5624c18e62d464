//! LaTeX escaping: neutralizes user text before it is embedded in a document.
//!
//! Two independent passes, composed by [`escape`]:
//! 1. [`escape_chars`] applies a fixed per-character lookup table for the
//!    characters LaTeX treats as control syntax.
//! 2. [`strip_denied_sequences`] removes the control sequences that can
//!    reach the filesystem or a shell through the compiler.
//!
//! Both passes are pure functions: no I/O, no shared state, deterministic.

/// One-to-one replacement table for characters with special meaning to LaTeX.
const CHAR_ESCAPES: &[(char, &str)] = &[
    ('\\', r"\textbackslash{}"),
    ('&', r"\&"),
    ('%', r"\%"),
    ('$', r"\$"),
    ('#', r"\#"),
    ('_', r"\_"),
    ('{', r"\{"),
    ('}', r"\}"),
    ('~', r"\textasciitilde{}"),
    ('^', r"\textasciicircum{}"),
];

/// Control sequences that can execute shell commands (`\write18`) or pull in
/// arbitrary files (`\input`, `\include`). Matched case-insensitively with a
/// word boundary after the name, so `\includegraphics` is not affected.
const DENIED_SEQUENCES: &[&str] = &["write18", "input", "include"];

/// Full escaping pass applied to every fragment of user text.
pub fn escape(text: &str) -> String {
    strip_denied_sequences(&escape_chars(text))
}

/// Replaces every LaTeX-special character via the lookup table. All other
/// characters pass through unchanged.
pub fn escape_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match CHAR_ESCAPES.iter().find(|(special, _)| *special == ch) {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(ch),
        }
    }
    out
}

/// Removes denied control sequences wherever they appear.
///
/// Only the backslash and the sequence name are dropped; any argument text
/// that follows stays behind as inert content.
pub fn strip_denied_sequences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match denied_sequence_len(after) {
            Some(len) => rest = &after[len..],
            None => {
                out.push('\\');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Returns the length of the denied name at the start of `s`, if one matches.
/// A name followed by another word character (`\inputx`) is not a match.
fn denied_sequence_len(s: &str) -> Option<usize> {
    DENIED_SEQUENCES.iter().find_map(|name| {
        let len = name.len();
        let head = s.as_bytes().get(..len)?;
        if !head.eq_ignore_ascii_case(name.as_bytes()) {
            return None;
        }
        let continues = s[len..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if continues {
            None
        } else {
            Some(len)
        }
    })
}
