//! Markdown transpiler: turns the supported markdown subset into typeset
//! fragments.
//!
//! Supported subset:
//! - `# ` and `## ` headings
//! - `- ` bullet lines, with consecutive bullets collapsed into one list
//! - blank lines as paragraph breaks
//!
//! Anything else is a plain paragraph. Unsupported markdown (links, bold,
//! tables, nesting) is not interpreted; it flows through as literal text.
//! Every piece of user text is escaped exactly once, at the moment it is
//! captured into a fragment.

use crate::typeset::escape::escape;

/// A single typeset fragment. All text fields hold already-escaped LaTeX.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Top-level heading, rendered as `\section*{..}`.
    Section(String),
    /// Second-level heading, rendered as `\subsection*{..}`.
    Subsection(String),
    /// One `itemize` block; one entry per `\item`.
    ItemList(Vec<String>),
    /// A plain line of text.
    Paragraph(String),
    /// Paragraph break produced by a blank input line.
    Break,
}

/// Transpiler state: either outside any list, or buffering bullet items
/// until something other than a bullet ends the run.
enum ListState {
    None,
    InList(Vec<String>),
}

/// Converts markdown `content` into an ordered fragment list.
///
/// Lines are trimmed before classification, so indented headings and bullets
/// are still recognized. A bullet run is emitted as a single [`Fragment::ItemList`]
/// when it ends, which keeps adjacent items inside one `itemize` environment.
pub fn transpile(content: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut state = ListState::None;

    for raw in content.lines() {
        let line = raw.trim();

        if line.is_empty() {
            flush_list(&mut state, &mut fragments);
            fragments.push(Fragment::Break);
        } else if let Some(text) = line.strip_prefix("# ") {
            flush_list(&mut state, &mut fragments);
            fragments.push(Fragment::Section(escape(text.trim())));
        } else if let Some(text) = line.strip_prefix("## ") {
            flush_list(&mut state, &mut fragments);
            fragments.push(Fragment::Subsection(escape(text.trim())));
        } else if let Some(text) = line.strip_prefix("- ") {
            let item = escape(text.trim());
            match &mut state {
                ListState::InList(items) => items.push(item),
                ListState::None => state = ListState::InList(vec![item]),
            }
        } else {
            flush_list(&mut state, &mut fragments);
            fragments.push(Fragment::Paragraph(escape(line)));
        }
    }

    flush_list(&mut state, &mut fragments);
    fragments
}

/// Emits the buffered bullet run as one fragment and resets the state.
/// A no-op when no list is in progress.
fn flush_list(state: &mut ListState, fragments: &mut Vec<Fragment>) {
    if let ListState::InList(items) = std::mem::replace(state, ListState::None) {
        fragments.push(Fragment::ItemList(items));
    }
}
