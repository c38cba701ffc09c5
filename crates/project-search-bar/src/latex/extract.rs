//! Metadata extraction from LaTeX sources.

use super::scan;
use super::tokenizer::{collapse_whitespace, to_plain_text};
use crate::models::TexDocument;

/// Commands removed (with their argument) from author blocks.
const AUTHOR_NOISE: &[&str] = &["thanks", "footnote", "inst", "email", "affil", "orcid"];

/// Pull title, authors, abstract and body out of a LaTeX source.
#[must_use]
pub fn extract_document(src: &str) -> TexDocument {
    let src = scan::strip_comments(src);

    let title = scan::command_argument(&src, "title").map(to_plain_text).unwrap_or_default();

    let authors = scan::command_arguments(&src, "author")
        .into_iter()
        .flat_map(split_authors)
        .collect::<Vec<_>>();

    let (abstract_raw, abstract_span) = match scan::environment_body(&src, "abstract") {
        Some((body, span)) => (Some(body), Some(span)),
        None => (scan::command_argument(&src, "abstract"), None),
    };
    let abstract_text = abstract_raw.map(to_plain_text).unwrap_or_default();

    let body = document_body(&src, abstract_span);

    TexDocument { title, authors, abstract_text, body }
}

/// Text between `\begin{document}` and `\end{document}`, minus the abstract.
fn document_body(src: &str, abstract_span: Option<std::ops::Range<usize>>) -> String {
    match abstract_span {
        Some(span) => {
            let without = format!("{} {}", &src[..span.start], &src[span.end..]);
            body_of(&without).to_string()
        }
        None => body_of(src).to_string(),
    }
}

fn body_of(src: &str) -> &str {
    match scan::environment_body(src, "document") {
        Some((body, _)) => body,
        None => src,
    }
}

fn split_authors(block: &str) -> Vec<String> {
    let mut cleaned = block.to_string();
    for noise in AUTHOR_NOISE {
        cleaned = remove_command(&cleaned, noise);
    }

    cleaned
        .split("\\and")
        .flat_map(|part| part.split("\\AND"))
        .flat_map(|part| part.split(','))
        // Affiliations follow a `\\` line break.
        .map(|part| part.split("\\\\").next().unwrap_or_default())
        .map(to_plain_text)
        .map(|name| collapse_whitespace(name.trim_matches(|c: char| c == '.' || c.is_whitespace())))
        .filter(|name| !name.is_empty())
        .collect()
}

/// Remove every `\name{...}` (optional args included) from `src`.
fn remove_command(src: &str, name: &str) -> String {
    let needle = format!("\\{name}");
    let mut out = String::with_capacity(src.len());
    let mut from = 0;
    while let Some(off) = src[from..].find(&needle) {
        let start = from + off;
        let after = start + needle.len();
        if src[after..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            out.push_str(&src[from..after]);
            from = after;
            continue;
        }
        out.push_str(&src[from..start]);
        from = scan::skip_groups(src, after, 1);
    }
    out.push_str(&src[from..]);
    out
}
