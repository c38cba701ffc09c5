//! `[n]` citation markers in model answers.

use std::sync::LazyLock;

use regex::Regex;

static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*(\d+(?:\s*,\s*\d+)*)\s*\]").expect("valid regex")
});

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([.,;:!?])").expect("valid regex"));

/// An answer with its citation markers checked against the sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedCitations {
    /// Answer text with out-of-range numbers removed.
    pub text: String,
    /// Valid 1-based source numbers in first-citation order.
    pub cited: Vec<usize>,
    /// Number of out-of-range references removed.
    pub dropped: usize,
}

/// Validate `[n]` and `[n, m]` markers against `source_count` sources.
#[must_use]
pub fn check_citations(answer: &str, source_count: usize) -> CheckedCitations {
    let mut cited: Vec<usize> = Vec::new();
    let mut dropped = 0;

    let rewritten = CITATION.replace_all(answer, |caps: &regex::Captures<'_>| {
        let mut kept: Vec<usize> = Vec::new();
        // Digits too long for usize are out of range like any other.
        for n in caps[1].split(',').map(|s| s.trim().parse::<usize>().unwrap_or(0)) {
            if (1..=source_count).contains(&n) {
                if !kept.contains(&n) {
                    kept.push(n);
                }
                if !cited.contains(&n) {
                    cited.push(n);
                }
            } else {
                dropped += 1;
            }
        }
        if kept.is_empty() {
            String::new()
        } else {
            format!("[{}]", kept.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))
        }
    });

    let text = if dropped > 0 {
        SPACE_BEFORE_PUNCT.replace_all(&rewritten, "$1").trim().to_string()
    } else {
        rewritten.trim().to_string()
    };

    CheckedCitations { text, cited, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_citations_in_first_use_order() {
        let checked = check_citations("Zeros lie on the line [2]. See also [1, 2].", 2);
        assert_eq!(checked.cited, vec![2, 1]);
        assert_eq!(checked.dropped, 0);
        assert_eq!(checked.text, "Zeros lie on the line [2]. See also [1, 2].");
    }

    #[test]
    fn test_out_of_range_removed() {
        let checked = check_citations("Claim [3]. Other claim [1, 7].", 2);
        assert_eq!(checked.cited, vec![1]);
        assert_eq!(checked.dropped, 2);
        assert_eq!(checked.text, "Claim. Other claim [1].");
    }

    #[test]
    fn test_overflowing_number_is_dropped() {
        let checked = check_citations("Huge claim [999999999999999999999999]. Fine [1, 99999999999999999999999].", 1);
        assert_eq!(checked.cited, vec![1]);
        assert_eq!(checked.dropped, 2);
        assert_eq!(checked.text, "Huge claim. Fine [1].");
    }

    #[test]
    fn test_zero_is_out_of_range() {
        let checked = check_citations("Nothing [0]", 3);
        assert!(checked.cited.is_empty());
        assert_eq!(checked.dropped, 1);
        assert_eq!(checked.text, "Nothing");
    }

    #[test]
    fn test_non_numeric_brackets_untouched() {
        let checked = check_citations("Interval [a, b] and [1]", 1);
        assert_eq!(checked.text, "Interval [a, b] and [1]");
        assert_eq!(checked.cited, vec![1]);
    }
}
