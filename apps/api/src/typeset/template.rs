//! Document assembly: serializes fragments and wraps them in the fixed
//! LaTeX shell. The shell is not configurable per request; callers only
//! control the body.

use crate::typeset::markdown::Fragment;

/// The document shell: article class, one-inch margins, font and input
/// encodings, hyperlink support, and flush-left lists. `{body}` is replaced
/// with the serialized fragments.
const DOCUMENT_TEMPLATE: &str = r"\documentclass[11pt]{article}
\usepackage[margin=1in]{geometry}
\usepackage[T1]{fontenc}
\usepackage[utf8]{inputenc}
\usepackage{hyperref}
\usepackage{enumitem}
\setlist[itemize]{leftmargin=*}
\begin{document}
{body}
\end{document}
";

/// Produces the complete LaTeX source for a fragment list.
///
/// Fragments are joined with blank lines so LaTeX sees paragraph boundaries;
/// an explicit [`Fragment::Break`] widens the gap the same way a blank
/// markdown line would.
pub fn assemble(fragments: &[Fragment]) -> String {
    let body = fragments
        .iter()
        .map(render_fragment)
        .collect::<Vec<_>>()
        .join("\n\n");
    DOCUMENT_TEMPLATE.replace("{body}", &body)
}

fn render_fragment(fragment: &Fragment) -> String {
    match fragment {
        Fragment::Section(text) => format!("\\section*{{{text}}}"),
        Fragment::Subsection(text) => format!("\\subsection*{{{text}}}"),
        Fragment::ItemList(items) => {
            let items = items
                .iter()
                .map(|item| format!("\\item {item}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("\\begin{{itemize}}\n{items}\n\\end{{itemize}}")
        }
        Fragment::Paragraph(text) => text.clone(),
        Fragment::Break => String::new(),
    }
}
