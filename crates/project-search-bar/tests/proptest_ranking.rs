//! Property-based tests for the tokenizer, query parser and ranking.

use proptest::prelude::*;
use project_search_bar::index::{IndexFilter, IndexedDocument, InvertedIndex, scoring};
use project_search_bar::latex::{parse_query, tokenize};
use project_search_bar::models::{RankingMode, TokenKind};

const VOCAB: &[&str] = &["zeta", "zeros", "prime", "sieve", "curve", "\\zeta", "\\sum", "$x"];

/// Generate plain prose made of ASCII words.
fn arb_prose() -> impl Strategy<Value = String> {
    proptest::collection::vec("[A-Za-z]{1,12}", 0..20).prop_map(|words| words.join(" "))
}

/// Generate LaTeX-flavoured text mixing prose, math and commands.
fn arb_latex() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        "[A-Za-z]{1,10}",
        "\\$[a-z]\\$",
        Just("$\\zeta(s)$".to_string()),
        Just("\\emph{".to_string()),
        Just("}".to_string()),
        Just("% comment\n".to_string()),
        Just("\\cite{key}".to_string()),
        "[0-9]{1,4}",
    ];
    proptest::collection::vec(piece, 0..30).prop_map(|pieces| pieces.join(" "))
}

/// Generate a small corpus over a fixed vocabulary.
fn arb_corpus() -> impl Strategy<Value = Vec<IndexedDocument>> {
    proptest::collection::vec(
        (
            proptest::collection::hash_map(proptest::sample::select(VOCAB), 0.5f32..6.0, 1..5),
            proptest::option::of(1995i32..2025),
        ),
        1..12,
    )
    .prop_map(|docs| {
        docs.into_iter()
            .enumerate()
            .map(|(i, (terms, year))| IndexedDocument {
                id: i as i64 + 1,
                terms: terms.into_iter().map(|(t, tf)| (t.to_string(), tf)).collect(),
                year,
                categories: Vec::new(),
            })
            .collect()
    })
}

fn arb_mode() -> impl Strategy<Value = RankingMode> {
    prop_oneof![Just(RankingMode::Bm25), Just(RankingMode::Tfidf), Just(RankingMode::Dual)]
}

proptest! {
    /// The tokenizer never panics, whatever the input.
    #[test]
    fn tokenize_never_panics(text in ".*") {
        let _ = tokenize(&text);
        let _ = parse_query(&text);
    }

    /// Prose yields lowercase word tokens only.
    #[test]
    fn prose_tokens_are_lowercase_words(text in arb_prose()) {
        for token in tokenize(&text) {
            prop_assert_eq!(token.kind, TokenKind::Word);
            prop_assert!(!token.text.is_empty());
            prop_assert_eq!(token.text.clone(), token.text.to_lowercase());
        }
    }

    /// Math commands keep their backslash; math symbols are keyed apart from prose.
    #[test]
    fn math_tokens_are_keyed_by_kind(text in arb_latex()) {
        for token in tokenize(&text) {
            let key = token.key();
            match token.kind {
                TokenKind::MathCommand => prop_assert!(key.starts_with('\\')),
                TokenKind::MathSymbol => prop_assert!(key.starts_with('$')),
                TokenKind::Word | TokenKind::Number => prop_assert!(!key.starts_with('\\')),
            }
        }
    }

    /// Parsed query terms are unique with positive weights.
    #[test]
    fn query_terms_unique_and_weighted(text in arb_latex()) {
        let terms = parse_query(&text);
        for (i, t) in terms.iter().enumerate() {
            prop_assert!(t.weight > 0.0);
            prop_assert!(terms[i + 1..].iter().all(|other| other.term != t.term));
        }
    }

    /// Repeating a query doubles every weight and keeps the terms.
    #[test]
    fn repeated_query_accumulates_weight(text in arb_prose()) {
        let once = parse_query(&text);
        let twice = parse_query(&format!("{text} {text}"));
        prop_assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            prop_assert_eq!(&a.term, &b.term);
            prop_assert!((b.weight - 2.0 * a.weight).abs() < 1e-4);
        }
    }

    /// Results are ordered by score, ties broken by ascending document id,
    /// and every result matched at least one query term.
    #[test]
    fn ranking_is_ordered_and_matched(
        corpus in arb_corpus(),
        query in proptest::collection::vec(proptest::sample::select(VOCAB), 1..4),
        mode in arb_mode(),
    ) {
        let index = InvertedIndex::from_documents(corpus);
        let terms = parse_query(&query.join(" "));
        let ranked = index.rank(&terms, mode, &IndexFilter::default());

        for pair in ranked.windows(2) {
            prop_assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].doc < pair[1].doc)
            );
        }
        for r in &ranked {
            prop_assert!(!r.matched_terms.is_empty());
            prop_assert!(r.bm25 >= 0.0);
            prop_assert!(r.bm25_rank >= 1 && r.bm25_rank <= ranked.len());
            prop_assert!(r.tfidf_rank >= 1 && r.tfidf_rank <= ranked.len());
        }
    }

    /// A year filter never lets an out-of-range or undated document through.
    #[test]
    fn year_filter_is_respected(corpus in arb_corpus(), from in 1995i32..2025, span in 0i32..10) {
        let years: std::collections::HashMap<i64, Option<i32>> =
            corpus.iter().map(|d| (d.id, d.year)).collect();
        let index = InvertedIndex::from_documents(corpus);
        let filter = IndexFilter { year_from: Some(from), year_to: Some(from + span), category: None };
        let terms = parse_query(&VOCAB.join(" "));

        for r in index.rank(&terms, RankingMode::Dual, &filter) {
            let year = years[&r.doc];
            prop_assert!(matches!(year, Some(y) if y >= from && y <= from + span));
        }
    }

    /// BM25 grows with term frequency but stays below its saturation bound.
    #[test]
    fn bm25_monotone_and_bounded(tf in 0.5f32..50.0, extra in 0.1f32..50.0, len in 1.0f32..500.0) {
        let idf = scoring::bm25_idf(100, 7);
        let low = scoring::bm25_term(tf, idf, len, 100.0);
        let high = scoring::bm25_term(tf + extra, idf, len, 100.0);
        prop_assert!(high >= low);
        prop_assert!(high < idf * 2.5 + 1e-4);
    }

    /// Better ranks always fuse to higher scores.
    #[test]
    fn rrf_prefers_better_ranks(a in 1usize..1000, b in 1usize..1000, d in 1usize..100) {
        prop_assert!(scoring::rrf(&[a, b]) > scoring::rrf(&[a + d, b]));
    }
}
