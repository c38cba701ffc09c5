//! Tokenizer and ranking throughput.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use project_search_bar::index::{IndexFilter, IndexedDocument, InvertedIndex};
use project_search_bar::latex::{parse_query, tokenize};
use project_search_bar::models::RankingMode;

const SAMPLE: &str = r"\section{Introduction}
Let $\zeta(s)$ denote the Riemann zeta function. We show that
\begin{equation}
  \sum_{n \le x} \Lambda(n) = x + O\left(x^{1/2} \log^2 x\right)
\end{equation}
holds under the Riemann hypothesis \cite{titchmarsh}. The proof uses the
explicit formula and a smoothed contour integral; see Section~\ref{sec:proof}.
% a comment that is never indexed
\emph{Acknowledgements.} We thank the referee.";

const VOCAB: &[&str] = &[
    "zeta", "riemann", "prime", "sieve", "curve", "modular", "form", "\\zeta", "\\sum",
    "\\int", "\\lambda", "$x", "$n", "hypothesis", "explicit", "formula", "contour", "integral",
];

fn corpus(size: usize) -> InvertedIndex {
    let docs = (0..size).map(|i| {
        let terms = VOCAB
            .iter()
            .enumerate()
            .filter(|(j, _)| (i * 7 + j * 3) % 5 < 2)
            .map(|(j, t)| ((*t).to_string(), 1.0 + ((i + j) % 4) as f32))
            .collect();
        IndexedDocument { id: i as i64 + 1, terms, year: Some(2000 + (i % 25) as i32), categories: Vec::new() }
    });
    let mut index = InvertedIndex::from_documents(docs);
    index.refresh();
    index
}

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_section", |b| b.iter(|| tokenize(black_box(SAMPLE))));
    c.bench_function("parse_query", |b| {
        b.iter(|| parse_query(black_box("zeros of $\\zeta(s)$ on the critical line")));
    });
}

fn bench_rank(c: &mut Criterion) {
    let index = corpus(5_000);
    let terms = parse_query("riemann zeta $\\zeta(s)$ explicit formula");
    let filter = IndexFilter::default();

    let mut group = c.benchmark_group("rank_5000");
    for mode in [RankingMode::Bm25, RankingMode::Tfidf, RankingMode::Dual] {
        group.bench_function(mode.to_string(), |b| {
            b.iter(|| index.rank(black_box(&terms), mode, &filter));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_rank);
criterion_main!(benches);
