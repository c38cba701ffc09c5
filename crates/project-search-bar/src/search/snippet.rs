//! Query-centred excerpts for result lists.

use crate::latex::{QueryTerm, collapse_whitespace};
use crate::models::{Paper, TokenKind};

/// Target excerpt width in bytes.
pub const SNIPPET_WIDTH: usize = 240;

const ELLIPSIS: char = '…';

/// Excerpt of the abstract (or the title when there is none) around the
/// first word of the query that occurs in it.
#[must_use]
pub fn snippet(paper: &Paper, terms: &[QueryTerm]) -> String {
    let source = if paper.abstract_text.trim().is_empty() { &paper.title } else { &paper.abstract_text };
    excerpt(&collapse_whitespace(source), terms, SNIPPET_WIDTH)
}

/// Cut a window of about `width` bytes out of `text`, centred on the first
/// query word, at word boundaries.
#[must_use]
pub fn excerpt(text: &str, terms: &[QueryTerm], width: usize) -> String {
    if text.len() <= width {
        return text.to_string();
    }

    let lower = text.to_ascii_lowercase();
    let hit = terms
        .iter()
        .filter(|t| t.kind == TokenKind::Word)
        .filter_map(|t| find_word(&lower, &t.term))
        .min()
        .unwrap_or(0);

    let mut start = hit.saturating_sub(width / 2);
    let mut end = (start + width).min(text.len());
    if end == text.len() {
        start = end.saturating_sub(width);
    }
    start = floor_boundary(text, start);
    end = floor_boundary(text, end);

    if start > 0 {
        if let Some(space) = text[start..hit.max(start)].find(' ') {
            start += space + 1;
        }
    }
    if end < text.len() {
        if let Some(space) = text[start..end].rfind(' ') {
            end = start + space;
        }
    }

    let mut out = String::with_capacity(end - start + 8);
    if start > 0 {
        out.push(ELLIPSIS);
    }
    out.push_str(text[start..end].trim());
    if end < text.len() {
        out.push(ELLIPSIS);
    }
    out
}

/// Byte offset of `word` in `haystack` where it starts a word.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(off) = haystack[from..].find(word) {
        let pos = from + off;
        let before_ok = haystack[..pos].chars().next_back().is_none_or(|c| !c.is_alphanumeric());
        if before_ok {
            return Some(pos);
        }
        from = pos + word.len();
    }
    None
}

fn floor_boundary(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latex::parse_query;

    fn filler(words: usize) -> String {
        (0..words).map(|i| format!("lorem{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_short_text_returned_whole() {
        let terms = parse_query("zeta");
        assert_eq!(excerpt("The zeta function.", &terms, 240), "The zeta function.");
    }

    #[test]
    fn test_window_centres_on_match() {
        let text = format!("{} the riemann hypothesis holds {}", filler(60), filler(60));
        let terms = parse_query("riemann");
        let cut = excerpt(&text, &terms, 120);
        assert!(cut.starts_with('…'));
        assert!(cut.ends_with('…'));
        assert!(cut.contains("riemann hypothesis"));
        assert!(cut.len() <= 120 + 2 * '…'.len_utf8());
    }

    #[test]
    fn test_no_match_takes_prefix() {
        let text = filler(100);
        let cut = excerpt(&text, &parse_query("absent"), 80);
        assert!(cut.starts_with("lorem0 "));
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_match_near_end() {
        let text = format!("{} final theorem", filler(100));
        let cut = excerpt(&text, &parse_query("theorem"), 80);
        assert!(cut.starts_with('…'));
        assert!(cut.ends_with("final theorem"));
    }

    #[test]
    fn test_multibyte_text_is_cut_safely() {
        let text = "é".repeat(300);
        let cut = excerpt(&text, &parse_query("nothing"), 101);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_word_start_required() {
        assert_eq!(find_word("prime primes", "primes"), Some(6));
        assert_eq!(find_word("subprime prime", "prime"), Some(9));
    }
}
