//! In-memory inverted index with TF-IDF, BM25 and fused ranking.
//!
//! The index mirrors the `postings` table. Document ids are store row ids.
//! Term frequencies are field-weighted floats, so a title hit counts three
//! times a body hit.
//!
//! TF-IDF document norms depend on corpus-wide statistics. They are cached by
//! [`InvertedIndex::refresh`] and computed on the fly for any document while
//! the cache is stale, so ranking is always exact.

pub mod scoring;

use std::collections::HashMap;

use serde::Serialize;

use crate::latex::QueryTerm;
use crate::models::RankingMode;

/// Weighted term frequencies of one document.
pub type TermFrequencies = HashMap<String, f32>;

/// One entry of a posting list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posting {
    pub doc: i64,
    pub tf: f32,
}

/// A document as handed to the index.
#[derive(Debug, Clone, Default)]
pub struct IndexedDocument {
    pub id: i64,
    pub terms: TermFrequencies,
    pub year: Option<i32>,
    pub categories: Vec<String>,
}

/// Per-document statistics kept alongside the postings.
#[derive(Debug, Clone)]
pub struct DocMeta {
    /// Sum of the document's term frequencies.
    pub len: f32,
    pub year: Option<i32>,
    pub categories: Vec<String>,
    terms: Vec<(String, f32)>,
}

/// Restrictions applied to candidates before ranking.
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    /// Case-insensitive category prefix, e.g. `math.NT` or `math`.
    pub category: Option<String>,
}

impl IndexFilter {
    fn is_empty(&self) -> bool {
        self.year_from.is_none() && self.year_to.is_none() && self.category.is_none()
    }

    fn matches(&self, meta: &DocMeta) -> bool {
        if self.year_from.is_some() || self.year_to.is_some() {
            let Some(year) = meta.year else {
                return false;
            };
            if self.year_from.is_some_and(|from| year < from)
                || self.year_to.is_some_and(|to| year > to)
            {
                return false;
            }
        }
        match &self.category {
            Some(prefix) => {
                let prefix = prefix.to_ascii_lowercase();
                meta.categories.iter().any(|c| c.to_ascii_lowercase().starts_with(&prefix))
            }
            None => true,
        }
    }
}

/// A ranked document with both component scores.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranked {
    pub doc: i64,
    /// Score of the requested mode.
    pub score: f32,
    pub bm25: f32,
    pub tfidf: f32,
    /// 1-based rank under BM25 among the candidates.
    pub bm25_rank: usize,
    /// 1-based rank under TF-IDF among the candidates.
    pub tfidf_rank: usize,
    /// Query terms present in the document, in query order.
    pub matched_terms: Vec<String>,
}

/// Inverted index over weighted term frequencies.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<Posting>>,
    docs: HashMap<i64, DocMeta>,
    total_len: f64,
    norms: HashMap<i64, f32>,
    norms_fresh: bool,
}

impl InvertedIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from documents and cache the TF-IDF norms.
    #[must_use]
    pub fn from_documents(docs: impl IntoIterator<Item = IndexedDocument>) -> Self {
        let mut index = Self::new();
        for doc in docs {
            index.insert(doc);
        }
        index.refresh();
        index
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the index holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of distinct terms.
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Mean document length, 0 when empty.
    #[must_use]
    pub fn avg_doc_len(&self) -> f32 {
        if self.docs.is_empty() { 0.0 } else { (self.total_len / self.docs.len() as f64) as f32 }
    }

    /// Document frequency of a term.
    #[must_use]
    pub fn df(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, Vec::len)
    }

    /// Statistics for one document.
    #[must_use]
    pub fn doc(&self, id: i64) -> Option<&DocMeta> {
        self.docs.get(&id)
    }

    /// Insert a document, replacing any previous version with the same id.
    pub fn insert(&mut self, doc: IndexedDocument) {
        self.remove(doc.id);

        let mut terms: Vec<(String, f32)> =
            doc.terms.into_iter().filter(|(_, tf)| *tf > 0.0).collect();
        terms.sort_by(|a, b| a.0.cmp(&b.0));

        let len: f32 = terms.iter().map(|(_, tf)| tf).sum();
        for (term, tf) in &terms {
            self.postings.entry(term.clone()).or_default().push(Posting { doc: doc.id, tf: *tf });
        }

        self.total_len += f64::from(len);
        self.docs.insert(
            doc.id,
            DocMeta { len, year: doc.year, categories: doc.categories, terms },
        );
        self.norms_fresh = false;
    }

    /// Remove a document. Returns whether it was present.
    pub fn remove(&mut self, id: i64) -> bool {
        let Some(meta) = self.docs.remove(&id) else {
            return false;
        };
        for (term, _) in &meta.terms {
            if let Some(list) = self.postings.get_mut(term) {
                list.retain(|p| p.doc != id);
                if list.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        self.total_len = (self.total_len - f64::from(meta.len)).max(0.0);
        self.norms.remove(&id);
        self.norms_fresh = false;
        true
    }

    /// Replace the filterable metadata of a document (after enrichment).
    pub fn update_meta(&mut self, id: i64, year: Option<i32>, categories: Vec<String>) {
        if let Some(meta) = self.docs.get_mut(&id) {
            meta.year = year;
            meta.categories = categories;
        }
    }

    /// Recompute every cached TF-IDF norm.
    pub fn refresh(&mut self) {
        let norms = self.docs.keys().map(|&id| (id, self.compute_norm(id))).collect();
        self.norms = norms;
        self.norms_fresh = true;
    }

    fn compute_norm(&self, id: i64) -> f32 {
        let n = self.docs.len();
        self.docs.get(&id).map_or(0.0, |meta| {
            meta.terms
                .iter()
                .map(|(term, tf)| {
                    let w = scoring::tfidf_weight(*tf, scoring::tfidf_idf(n, self.df(term)));
                    w * w
                })
                .sum::<f32>()
                .sqrt()
        })
    }

    fn norm(&self, id: i64) -> f32 {
        if self.norms_fresh {
            if let Some(norm) = self.norms.get(&id) {
                return *norm;
            }
        }
        self.compute_norm(id)
    }

    /// Rank the documents matching at least one query term.
    ///
    /// Results are ordered by the score of `mode`, descending, ties broken
    /// by ascending document id.
    #[must_use]
    pub fn rank(&self, terms: &[QueryTerm], mode: RankingMode, filter: &IndexFilter) -> Vec<Ranked> {
        #[derive(Default)]
        struct Acc {
            dot: f32,
            bm25: f32,
            matched: Vec<String>,
        }

        if terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let n = self.docs.len();
        let avg = self.avg_doc_len();

        let mut acc: HashMap<i64, Acc> = HashMap::new();
        let mut query_norm_sq = 0.0f32;

        for qt in terms {
            let Some(list) = self.postings.get(&qt.term) else {
                continue;
            };
            let idf = scoring::tfidf_idf(n, list.len());
            let bm25_idf = scoring::bm25_idf(n, list.len());
            let wq = qt.weight * idf;
            query_norm_sq += wq * wq;

            for posting in list {
                let Some(meta) = self.docs.get(&posting.doc) else {
                    continue;
                };
                if !filter.is_empty() && !filter.matches(meta) {
                    continue;
                }
                let entry = acc.entry(posting.doc).or_default();
                entry.dot += wq * scoring::tfidf_weight(posting.tf, idf);
                entry.bm25 += qt.weight * scoring::bm25_term(posting.tf, bm25_idf, meta.len, avg);
                if !entry.matched.contains(&qt.term) {
                    entry.matched.push(qt.term.clone());
                }
            }
        }

        let query_norm = query_norm_sq.sqrt();
        let mut ranked: Vec<Ranked> = acc
            .into_iter()
            .map(|(doc, a)| {
                let denom = query_norm * self.norm(doc);
                let tfidf = if denom > 0.0 { a.dot / denom } else { 0.0 };
                Ranked {
                    doc,
                    score: 0.0,
                    bm25: a.bm25,
                    tfidf,
                    bm25_rank: 0,
                    tfidf_rank: 0,
                    matched_terms: a.matched,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.bm25.total_cmp(&a.bm25).then(a.doc.cmp(&b.doc)));
        for (i, r) in ranked.iter_mut().enumerate() {
            r.bm25_rank = i + 1;
        }
        ranked.sort_by(|a, b| b.tfidf.total_cmp(&a.tfidf).then(a.doc.cmp(&b.doc)));
        for (i, r) in ranked.iter_mut().enumerate() {
            r.tfidf_rank = i + 1;
        }

        for r in &mut ranked {
            r.score = match mode {
                RankingMode::Bm25 => r.bm25,
                RankingMode::Tfidf => r.tfidf,
                RankingMode::Dual => scoring::rrf(&[r.bm25_rank, r.tfidf_rank]),
            };
        }
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc.cmp(&b.doc)));
        ranked
    }
}
