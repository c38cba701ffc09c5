//! LaTeX-aware tokenizer.
//!
//! Text regions yield lowercase words; math regions yield `\command`,
//! identifier and number tokens. The same rules run over documents and
//! queries, so a query containing `$\zeta(s)$` meets the index on `\zeta`.

use serde::{Deserialize, Serialize};

use super::scan::{self, Region};
use crate::models::TokenKind;

/// Commands whose arguments are references or markup, never prose.
/// The number is how many brace groups to drop.
const DROP_ARG_COMMANDS: &[(&str, usize)] = &[
    ("cite", 1),
    ("citep", 1),
    ("citet", 1),
    ("nocite", 1),
    ("ref", 1),
    ("eqref", 1),
    ("autoref", 1),
    ("cref", 1),
    ("Cref", 1),
    ("pageref", 1),
    ("label", 1),
    ("url", 1),
    ("href", 1),
    ("includegraphics", 1),
    ("bibliography", 1),
    ("bibliographystyle", 1),
    ("usepackage", 1),
    ("documentclass", 1),
    ("input", 1),
    ("include", 1),
    ("begin", 1),
    ("end", 1),
    ("newcommand", 2),
    ("renewcommand", 2),
    ("def", 1),
    ("hspace", 1),
    ("vspace", 1),
    ("setlength", 2),
];

/// Math commands that only affect layout.
const LAYOUT_COMMANDS: &[&str] = &[
    "left", "right", "big", "Big", "bigg", "Bigg", "bigl", "bigr", "Bigl", "Bigr", "biggl",
    "biggr", "quad", "qquad", "mathrm", "text", "textrm", "textit", "mbox", "operatorname",
    "displaystyle", "textstyle", "scriptstyle", "limits", "nolimits", "nonumber", "notag",
    "label", "tag", "hspace", "phantom", "middle",
];

/// Accent commands written with a letter name, e.g. `\c{c}` or `\v{s}`.
const LETTER_ACCENTS: &[&str] = &["c", "v", "u", "H", "k", "r", "d", "b", "t"];

/// Control symbols that put an accent on the next letter, e.g. `\'e`.
const SYMBOL_ACCENTS: &[char] = &['\'', '"', '^', '`', '~', '=', '.'];

/// Special letters spelled as commands.
const LETTER_COMMANDS: &[(&str, &str)] = &[
    ("ss", "ss"),
    ("o", "o"),
    ("O", "o"),
    ("ae", "ae"),
    ("AE", "ae"),
    ("oe", "oe"),
    ("OE", "oe"),
    ("aa", "a"),
    ("AA", "a"),
    ("l", "l"),
    ("L", "l"),
    ("i", "i"),
    ("j", "j"),
];

/// English function words never indexed.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "an", "and", "any", "are", "as",
    "at", "be", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "doing", "during", "each", "few", "for", "from", "further",
    "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how", "if",
    "in", "into", "is", "it", "its", "itself", "just", "let", "more", "most", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "out",
    "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

/// A token with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
}

impl Token {
    fn new(text: impl Into<String>, kind: TokenKind) -> Self {
        Self { text: text.into(), kind }
    }

    /// Key under which this token is indexed.
    ///
    /// Math identifiers are prefixed with `$` so the symbol `x` never collides
    /// with prose.
    #[must_use]
    pub fn key(&self) -> String {
        match self.kind {
            TokenKind::MathSymbol => format!("${}", self.text),
            TokenKind::Word | TokenKind::MathCommand | TokenKind::Number => self.text.clone(),
        }
    }
}

/// Whether text-mode commands are markup (documents) or search terms (queries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Document,
    Query,
}

/// Tokenize LaTeX source.
#[must_use]
pub fn tokenize(src: &str) -> Vec<Token> {
    tokenize_with(src, Mode::Document)
}

pub(crate) fn tokenize_with(src: &str, mode: Mode) -> Vec<Token> {
    let stripped = scan::strip_comments(src);
    let mut tokens = Vec::new();
    for region in scan::split_regions(&stripped) {
        match region {
            Region::Text(text) => tokenize_text(text, mode, &mut tokens),
            Region::Math { content, .. } => tokenize_math(content, &mut tokens),
        }
    }
    tokens
}

/// Render a text-mode fragment as plain prose: commands removed, accents
/// folded, reference arguments dropped. Math regions are kept verbatim.
#[must_use]
pub fn to_plain_text(src: &str) -> String {
    let stripped = scan::strip_comments(src);
    let mut out = String::with_capacity(stripped.len());
    for region in scan::split_regions(&stripped) {
        match region {
            Region::Text(text) => {
                walk_text(text, Mode::Document, &mut |event| match event {
                    TextEvent::Char(c) => out.push(c),
                    TextEvent::Break | TextEvent::Command(_) => out.push(' '),
                });
            }
            Region::Math { raw, .. } => out.push_str(raw),
        }
    }
    collapse_whitespace(&out)
}

/// Collapse runs of whitespace into single spaces and trim.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

enum TextEvent<'a> {
    /// A visible character.
    Char(char),
    /// A word separator produced by markup.
    Break,
    /// A text-mode command that is not markup (only in query mode).
    Command(&'a str),
}

/// Walk a text region, resolving markup into characters and breaks.
fn walk_text<'a, F>(text: &'a str, mode: Mode, emit: &mut F)
where
    F: FnMut(TextEvent<'a>),
{
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i = walk_command(text, i, mode, emit),
            b'{' | b'}' => {
                i += 1;
            }
            b'~' => {
                emit(TextEvent::Break);
                i += 1;
            }
            _ => {
                let len = scan::char_len_at(text, i);
                if let Some(c) = text[i..].chars().next() {
                    emit(TextEvent::Char(c));
                }
                i += len;
            }
        }
    }
}

/// Handle the command starting at the backslash `pos`; return the next offset.
fn walk_command<'a, F>(text: &'a str, pos: usize, mode: Mode, emit: &mut F) -> usize
where
    F: FnMut(TextEvent<'a>),
{
    let name = scan::command_name_at(text, pos + 1);

    if name.is_empty() {
        let Some(symbol) = text[pos + 1..].chars().next() else {
            return text.len();
        };
        let after = pos + 1 + symbol.len_utf8();
        if SYMBOL_ACCENTS.contains(&symbol) {
            return accented_letter(text, after, emit);
        }
        emit(TextEvent::Break);
        return after;
    }

    let after = pos + 1 + name.len();

    if let Some((_, groups)) = DROP_ARG_COMMANDS.iter().find(|(cmd, _)| *cmd == name) {
        emit(TextEvent::Break);
        // \href{url}{text}: drop the target, keep the link text.
        return scan::skip_groups(text, after, *groups);
    }

    if LETTER_ACCENTS.contains(&name) && text[after..].starts_with('{') {
        return accented_letter(text, after, emit);
    }

    if let Some((_, letters)) = LETTER_COMMANDS.iter().find(|(cmd, _)| *cmd == name) {
        for c in letters.chars() {
            emit(TextEvent::Char(c));
        }
        // A control word swallows the following space: `\ss e` reads "sse".
        return scan::skip_inline_space(text, after);
    }

    match mode {
        Mode::Query => emit(TextEvent::Command(name)),
        Mode::Document => emit(TextEvent::Break),
    }
    after
}

/// Emit the base letter following an accent command at `pos`.
fn accented_letter<'a, F>(text: &'a str, pos: usize, emit: &mut F) -> usize
where
    F: FnMut(TextEvent<'a>),
{
    let rest = &text[pos..];
    if rest.starts_with('{') {
        if let Some((inner, end)) = scan::balanced_group(text, pos) {
            for c in inner.chars().filter(|c| c.is_alphanumeric()) {
                emit(TextEvent::Char(fold_accent(c)));
            }
            return end;
        }
    }
    match rest.chars().next() {
        Some(c) if c.is_alphabetic() => {
            emit(TextEvent::Char(fold_accent(c)));
            pos + c.len_utf8()
        }
        _ => pos,
    }
}

fn tokenize_text(text: &str, mode: Mode, tokens: &mut Vec<Token>) {
    let mut word = String::new();
    walk_text(text, mode, &mut |event| match event {
        TextEvent::Char(c) if c.is_alphanumeric() => {
            word.extend(fold_accent(c).to_lowercase());
        }
        TextEvent::Char(_) | TextEvent::Break => flush_word(&mut word, tokens),
        TextEvent::Command(name) => {
            flush_word(&mut word, tokens);
            if !LAYOUT_COMMANDS.contains(&name) {
                tokens.push(Token::new(format!("\\{name}"), TokenKind::MathCommand));
            }
        }
    });
    flush_word(&mut word, tokens);
}

fn flush_word(word: &mut String, tokens: &mut Vec<Token>) {
    if word.chars().count() >= 2 && !STOP_WORDS.contains(&word.as_str()) {
        let kind = if word.chars().all(|c| c.is_ascii_digit()) {
            TokenKind::Number
        } else {
            TokenKind::Word
        };
        tokens.push(Token::new(word.clone(), kind));
    }
    word.clear();
}

fn tokenize_math(content: &str, tokens: &mut Vec<Token>) {
    let bytes = content.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            let name = scan::command_name_at(content, i + 1);
            if name.is_empty() {
                i += 1 + scan::char_len_at(content, i + 1);
                continue;
            }
            let after = i + 1 + name.len();
            if name == "label" || name == "tag" {
                i = scan::skip_groups(content, after, 1);
                continue;
            }
            if !LAYOUT_COMMANDS.contains(&name) {
                tokens.push(Token::new(format!("\\{name}"), TokenKind::MathCommand));
            }
            i = after;
        } else if b.is_ascii_alphabetic() {
            let end = run_end(content, i, |c| c.is_ascii_alphabetic());
            tokens.push(Token::new(&content[i..end], TokenKind::MathSymbol));
            i = end;
        } else if b.is_ascii_digit() {
            let end = run_end(content, i, |c| c.is_ascii_digit());
            tokens.push(Token::new(&content[i..end], TokenKind::Number));
            i = end;
        } else {
            i += scan::char_len_at(content, i).max(1);
        }
    }
}

fn run_end(src: &str, start: usize, pred: impl Fn(u8) -> bool) -> usize {
    src.as_bytes()[start..].iter().position(|&b| !pred(b)).map_or(src.len(), |off| start + off)
}

/// Fold common Latin accented letters to their base letter.
#[must_use]
pub fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'ç' | 'ć' | 'č' => 'c',
        'Ç' | 'Ć' | 'Č' => 'C',
        'è' | 'é' | 'ê' | 'ë' | 'ě' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' | 'Ě' => 'E',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ñ' | 'ń' | 'ň' => 'n',
        'Ñ' | 'Ń' | 'Ň' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ő' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ő' => 'O',
        'ù' | 'ú' | 'û' | 'ü' | 'ů' | 'ű' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ů' | 'Ű' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        'š' | 'ś' => 's',
        'Š' | 'Ś' => 'S',
        'ž' | 'ź' | 'ż' => 'z',
        'Ž' | 'Ź' | 'Ż' => 'Z',
        'ř' => 'r',
        'Ř' => 'R',
        'ł' => 'l',
        'Ł' => 'L',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_prose_is_lowercased_without_stop_words() {
        let tokens = tokenize("The Zeros of the Riemann zeta function");
        assert_eq!(texts(&tokens), vec!["zeros", "riemann", "zeta", "function"]);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Word));
    }

    #[test]
    fn test_math_commands_and_symbols() {
        let tokens = tokenize("note $\\zeta(s) = \\sum_{n} n^{-s}$ holds");
        let math: Vec<(&str, TokenKind)> =
            tokens.iter().map(|t| (t.text.as_str(), t.kind)).collect();
        assert_eq!(
            math,
            vec![
                ("note", TokenKind::Word),
                ("\\zeta", TokenKind::MathCommand),
                ("s", TokenKind::MathSymbol),
                ("\\sum", TokenKind::MathCommand),
                ("n", TokenKind::MathSymbol),
                ("n", TokenKind::MathSymbol),
                ("s", TokenKind::MathSymbol),
                ("holds", TokenKind::Word),
            ]
        );
    }

    #[test]
    fn test_layout_commands_dropped_in_math() {
        let tokens = tokenize("$\\left( \\frac{a}{b} \\right)$");
        assert_eq!(texts(&tokens), vec!["\\frac", "a", "b"]);
    }

    #[test]
    fn test_citations_and_labels_dropped() {
        let tokens = tokenize("as shown in \\cite{hardy1914} and Lemma~\\ref{lem:main}");
        assert_eq!(texts(&tokens), vec!["shown", "lemma"]);
    }

    #[test]
    fn test_formatting_commands_keep_arguments() {
        let tokens = tokenize("an \\emph{explicit} \\textbf{bound}");
        assert_eq!(texts(&tokens), vec!["explicit", "bound"]);
    }

    #[test]
    fn test_accents_fold() {
        let tokens = tokenize("Poincar\\'e and Erd\\H{o}s and G\\\"{o}del and Poincaré");
        assert_eq!(texts(&tokens), vec!["poincare", "erdos", "godel", "poincare"]);
    }

    #[test]
    fn test_comments_ignored() {
        let tokens = tokenize("visible % hidden words\nstill visible");
        assert_eq!(texts(&tokens), vec!["visible", "still", "visible"]);
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("in 2024 we have $x_{12}$");
        assert_eq!(tokens[0], Token::new("2024", TokenKind::Number));
        assert_eq!(tokens[2], Token::new("12", TokenKind::Number));
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   % only a comment").is_empty());
    }

    #[test]
    fn test_query_mode_keeps_bare_commands() {
        let tokens = tokenize_with("\\zeta zeros \\emph", Mode::Query);
        assert_eq!(texts(&tokens), vec!["\\zeta", "zeros", "\\emph"]);
        let tokens = tokenize_with("\\zeta zeros", Mode::Document);
        assert_eq!(texts(&tokens), vec!["zeros"]);
    }

    #[test]
    fn test_token_keys_separate_math_symbols() {
        assert_eq!(Token::new("x", TokenKind::MathSymbol).key(), "$x");
        assert_eq!(Token::new("\\pi", TokenKind::MathCommand).key(), "\\pi");
        assert_eq!(Token::new("prime", TokenKind::Word).key(), "prime");
    }

    #[test]
    fn test_plain_text() {
        let plain = to_plain_text("We study \\emph{sieve} bounds~\\cite{x}\n\n for $\\pi(x)$.");
        assert_eq!(plain, "We study sieve bounds for $\\pi(x)$.");
    }
}
