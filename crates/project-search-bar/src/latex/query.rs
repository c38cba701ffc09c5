//! Query parsing on top of the tokenizer.

use serde::{Deserialize, Serialize};

use super::tokenizer::{Mode, tokenize_with};
use crate::config::ranking::MATH_ALIAS_WEIGHT;
use crate::models::TokenKind;

/// Words that also name a math command. A query word like `zeta` also
/// searches for `\zeta` at reduced weight.
const MATH_ALIASES: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "pi", "varpi", "rho", "sigma",
    "tau", "upsilon", "phi", "varphi", "chi", "psi", "omega", "Gamma", "Delta", "Theta",
    "Lambda", "Xi", "Pi", "Sigma", "Phi", "Psi", "Omega", "infty", "sum", "prod", "int",
    "oint", "partial", "nabla", "sqrt", "frac", "binom", "lim", "limsup", "liminf", "sup",
    "inf", "max", "min", "log", "exp", "sin", "cos", "tan", "det", "dim", "ker", "deg", "gcd",
    "hom", "otimes", "oplus", "wedge", "mathbb", "mathcal", "mathfrak",
];

/// One weighted term of a parsed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTerm {
    /// Index key (see [`super::Token::key`]).
    pub term: String,
    /// Query-side weight; repeats accumulate.
    pub weight: f32,
    pub kind: TokenKind,
}

/// Parse a search query into weighted index terms, in first-seen order.
///
/// Bare `\commands` count as math even outside `$...$`. Quoted phrases are
/// treated as bags of words.
#[must_use]
pub fn parse_query(query: &str) -> Vec<QueryTerm> {
    let mut terms: Vec<QueryTerm> = Vec::new();

    let mut add = |term: String, weight: f32, kind: TokenKind| {
        match terms.iter_mut().find(|t| t.term == term) {
            Some(existing) => existing.weight += weight,
            None => terms.push(QueryTerm { term, weight, kind }),
        }
    };

    for token in tokenize_with(query, Mode::Query) {
        let alias = (token.kind == TokenKind::Word)
            .then(|| MATH_ALIASES.iter().find(|a| a.eq_ignore_ascii_case(&token.text)))
            .flatten();

        add(token.key(), 1.0, token.kind);
        if let Some(alias) = alias {
            add(format!("\\{alias}"), MATH_ALIAS_WEIGHT, TokenKind::MathCommand);
        }
    }

    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(terms: &[QueryTerm]) -> Vec<&str> {
        terms.iter().map(|t| t.term.as_str()).collect()
    }

    #[test]
    fn test_plain_words() {
        let terms = parse_query("prime gaps");
        assert_eq!(keys(&terms), vec!["prime", "gaps"]);
        assert!(terms.iter().all(|t| t.weight == 1.0));
    }

    #[test]
    fn test_word_naming_symbol_adds_alias() {
        let terms = parse_query("zeta zeros");
        assert_eq!(keys(&terms), vec!["zeta", "\\zeta", "zeros"]);
        assert_eq!(terms[1].weight, 0.5);
        assert_eq!(terms[1].kind, TokenKind::MathCommand);
    }

    #[test]
    fn test_inline_math_and_bare_commands() {
        let terms = parse_query("$\\zeta(s)$ and \\zeta");
        assert_eq!(keys(&terms), vec!["\\zeta", "$s"]);
        assert_eq!(terms[0].weight, 2.0);
    }

    #[test]
    fn test_repeats_accumulate() {
        let terms = parse_query("\"modular forms\" modular");
        assert_eq!(keys(&terms), vec!["modular", "forms"]);
        assert_eq!(terms[0].weight, 2.0);
    }

    #[test]
    fn test_stop_words_only() {
        assert!(parse_query("the of and").is_empty());
    }
}
