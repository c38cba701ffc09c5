//! Low-level scanning over LaTeX source: comments, math regions, brace groups.
//!
//! All positions are byte offsets. Scanning only ever stops on ASCII bytes, so
//! every offset handed back is a char boundary.

/// Environments whose body is typeset in math mode.
const MATH_ENVIRONMENTS: &[&str] = &[
    "equation",
    "align",
    "alignat",
    "gather",
    "multline",
    "eqnarray",
    "displaymath",
    "math",
    "flalign",
];

/// A run of source in either text or math mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region<'a> {
    Text(&'a str),
    Math {
        /// Content between the delimiters.
        content: &'a str,
        /// Content including its delimiters.
        raw: &'a str,
    },
}

/// Remove `%` comments up to the end of each line. `\%` is kept.
#[must_use]
pub fn strip_comments(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    for (n, line) in src.split('\n').enumerate() {
        if n > 0 {
            out.push('\n');
        }
        out.push_str(&line[..comment_start(line).unwrap_or(line.len())]);
    }
    out
}

fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1 + char_len_at(line, i + 1),
            b'%' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Byte length of the char starting at `pos`, or 0 at end of input.
pub fn char_len_at(src: &str, pos: usize) -> usize {
    src.get(pos..).and_then(|s| s.chars().next()).map_or(0, char::len_utf8)
}

/// Split comment-free source into text and math regions.
///
/// An unterminated math delimiter runs to the end of input.
#[must_use]
pub fn split_regions(src: &str) -> Vec<Region<'_>> {
    let bytes = src.as_bytes();
    let mut regions = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let opener = match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'$') => Some((2, "$$".to_string())),
            b'$' => Some((1, "$".to_string())),
            b'\\' => match bytes.get(i + 1) {
                Some(b'(') => Some((2, "\\)".to_string())),
                Some(b'[') => Some((2, "\\]".to_string())),
                Some(b'b') => math_environment_at(src, i),
                _ => None,
            },
            _ => None,
        };

        let Some((open_len, closer)) = opener else {
            i += if bytes[i] == b'\\' { 1 + char_len_at(src, i + 1) } else { 1 };
            continue;
        };

        if text_start < i {
            regions.push(Region::Text(&src[text_start..i]));
        }

        let content_start = i + open_len;
        let (content_end, region_end) = match find_unescaped(src, content_start, &closer) {
            Some(pos) => (pos, pos + closer.len()),
            None => (src.len(), src.len()),
        };

        regions.push(Region::Math {
            content: &src[content_start..content_end],
            raw: &src[i..region_end],
        });

        i = region_end;
        text_start = i;
    }

    if text_start < src.len() {
        regions.push(Region::Text(&src[text_start..]));
    }

    regions
}

/// If a math environment opens at `pos`, return its opener length and closer.
fn math_environment_at(src: &str, pos: usize) -> Option<(usize, String)> {
    let rest = src[pos..].strip_prefix("\\begin{")?;
    let close = rest.find('}')?;
    let name = rest[..close].trim();
    let base = name.trim_end_matches('*');
    MATH_ENVIRONMENTS
        .contains(&base)
        .then(|| ("\\begin{".len() + close + 1, format!("\\end{{{name}}}")))
}

/// Find `needle` at or after `from`, skipping backslash-escaped characters.
#[must_use]
pub fn find_unescaped(src: &str, from: usize, needle: &str) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if src[i..].starts_with(needle) {
            return Some(i);
        }
        i += if bytes[i] == b'\\' { 1 + char_len_at(src, i + 1) } else { char_len_at(src, i) };
    }
    None
}

/// Read an ASCII-letter command name starting at `pos` (just after the backslash).
#[must_use]
pub fn command_name_at(src: &str, pos: usize) -> &str {
    let end = src[pos..]
        .find(|c: char| !c.is_ascii_alphabetic())
        .map_or(src.len(), |off| pos + off);
    &src[pos..end]
}

/// Skip spaces and tabs (not newlines) from `pos`.
#[must_use]
pub fn skip_inline_space(src: &str, pos: usize) -> usize {
    let bytes = src.as_bytes();
    let mut i = pos;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i
}

/// Skip any number of `[...]` optional arguments starting at `pos`.
#[must_use]
pub fn skip_optional_args(src: &str, pos: usize) -> usize {
    let mut i = skip_inline_space(src, pos);
    while src.as_bytes().get(i) == Some(&b'[') {
        i = match find_unescaped(src, i + 1, "]") {
            Some(close) => close + 1,
            None => return src.len(),
        };
        i = skip_inline_space(src, i);
    }
    i
}

/// Read a balanced `{...}` group whose opening brace is at `open`.
///
/// Returns the inner content and the offset just past the closing brace.
/// An unbalanced group takes the remainder of the input.
#[must_use]
pub fn balanced_group(src: &str, open: usize) -> Option<(&str, usize)> {
    let bytes = src.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 1 + char_len_at(src, i + 1);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&src[open + 1..i], i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }
    Some((&src[open + 1..], src.len()))
}

/// Skip `count` brace groups (with optional arguments between them) from `pos`.
#[must_use]
pub fn skip_groups(src: &str, pos: usize, count: usize) -> usize {
    let mut i = pos;
    for _ in 0..count {
        let start = skip_optional_args(src, i);
        match balanced_group(src, skip_whitespace(src, start)) {
            Some((_, end)) => i = end,
            None => return start,
        }
    }
    i
}

/// Skip all whitespace including newlines.
#[must_use]
pub fn skip_whitespace(src: &str, pos: usize) -> usize {
    src[pos..].find(|c: char| !c.is_whitespace()).map_or(src.len(), |off| pos + off)
}

/// Argument of the first `\name` command (optional args skipped), if present.
#[must_use]
pub fn command_argument<'a>(src: &'a str, name: &str) -> Option<&'a str> {
    command_arguments(src, name).into_iter().next()
}

/// Arguments of every `\name` command, in source order.
#[must_use]
pub fn command_arguments<'a>(src: &'a str, name: &str) -> Vec<&'a str> {
    let needle = format!("\\{name}");
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(off) = src[from..].find(&needle) {
        let after = from + off + needle.len();
        from = after;
        if src[after..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            continue;
        }
        let open = skip_whitespace(src, skip_optional_args(src, after));
        if let Some((arg, end)) = balanced_group(src, open) {
            out.push(arg);
            from = end;
        }
    }
    out
}

/// Body of the first `\begin{name}...\end{name}` environment, with the full span.
#[must_use]
pub fn environment_body<'a>(src: &'a str, name: &str) -> Option<(&'a str, std::ops::Range<usize>)> {
    let begin = format!("\\begin{{{name}}}");
    let end = format!("\\end{{{name}}}");
    let start = src.find(&begin)?;
    let body_start = start + begin.len();
    match src[body_start..].find(&end) {
        Some(off) => {
            let body_end = body_start + off;
            Some((&src[body_start..body_end], start..body_end + end.len()))
        }
        None => Some((&src[body_start..], start..src.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments_keeps_escaped_percent() {
        let src = "50\\% of cases % a remark\nnext line";
        assert_eq!(strip_comments(src), "50\\% of cases \nnext line");
    }

    #[test]
    fn test_split_inline_and_display_math() {
        let regions = split_regions("Let $x$ be $$y^2$$ and \\(z\\) or \\[w\\].");
        let math: Vec<&str> = regions
            .iter()
            .filter_map(|r| match r {
                Region::Math { content, .. } => Some(*content),
                Region::Text(_) => None,
            })
            .collect();
        assert_eq!(math, vec!["x", "y^2", "z", "w"]);
    }

    #[test]
    fn test_split_math_environment() {
        let src = "Text \\begin{align*} a &= b \\end{align*} more";
        let regions = split_regions(src);
        assert_eq!(regions.len(), 3);
        assert_eq!(
            regions[1],
            Region::Math { content: " a &= b ", raw: "\\begin{align*} a &= b \\end{align*}" }
        );
    }

    #[test]
    fn test_escaped_dollar_is_not_math() {
        let regions = split_regions("costs \\$5 today");
        assert_eq!(regions, vec![Region::Text("costs \\$5 today")]);
    }

    #[test]
    fn test_unterminated_math_runs_to_end() {
        let regions = split_regions("see $x + y");
        assert_eq!(regions[1], Region::Math { content: "x + y", raw: "$x + y" });
    }

    #[test]
    fn test_balanced_group_nested() {
        let src = "{a {b} \\} c}rest";
        let (inner, end) = balanced_group(src, 0).unwrap();
        assert_eq!(inner, "a {b} \\} c");
        assert_eq!(&src[end..], "rest");
    }

    #[test]
    fn test_command_argument_skips_longer_names() {
        let src = "\\titlepage \\title[short]{A {Long} Title}";
        assert_eq!(command_argument(src, "title"), Some("A {Long} Title"));
    }

    #[test]
    fn test_environment_body() {
        let src = "x \\begin{abstract} We prove. \\end{abstract} y";
        let (body, span) = environment_body(src, "abstract").unwrap();
        assert_eq!(body, " We prove. ");
        assert_eq!(&src[span], "\\begin{abstract} We prove. \\end{abstract}");
    }
}
