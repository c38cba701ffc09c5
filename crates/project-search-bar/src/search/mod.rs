//! Search engine: the store and the in-memory index kept in step.

mod snippet;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde::Serialize;

pub use crate::models::SearchRequest;
pub use snippet::{SNIPPET_WIDTH, excerpt, snippet};

use crate::error::{StoreError, StoreResult, ToolError, ToolResult};
use crate::index::{IndexFilter, IndexedDocument, InvertedIndex, TermFrequencies};
use crate::latex::{QueryTerm, parse_query};
use crate::models::{ArxivMetadata, NewPaper, Paper, RankingMode};
use crate::store::{Store, StoreStats};

/// One ranked paper.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub paper: Paper,
    pub score: f32,
    pub bm25: f32,
    pub tfidf: f32,
    pub bm25_rank: usize,
    pub tfidf_rank: usize,
    pub matched_terms: Vec<String>,
    pub snippet: String,
}

/// A page of search results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Number of matching papers before paging.
    pub total: usize,
    pub offset: usize,
    pub hits: Vec<SearchHit>,
    /// The parsed query, as the index saw it.
    pub query_terms: Vec<QueryTerm>,
    pub mode: RankingMode,
}

/// Index-wide statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(flatten)]
    pub store: StoreStats,
    pub indexed_documents: usize,
    pub avg_doc_len: f32,
    pub schema_version: Option<i64>,
}

/// Store plus in-memory index.
#[derive(Debug)]
pub struct SearchEngine {
    store: Store,
    index: RwLock<InvertedIndex>,
}

impl SearchEngine {
    /// Load every stored document into a fresh index.
    pub fn open(store: Store) -> StoreResult<Self> {
        let started = Instant::now();
        let index = InvertedIndex::from_documents(store.load_documents()?);
        tracing::info!(
            documents = index.len(),
            terms = index.term_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded search index"
        );
        Ok(Self { store, index: RwLock::new(index) })
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, InvertedIndex>> {
        self.index.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, InvertedIndex>> {
        self.index.write().map_err(|_| StoreError::Poisoned)
    }

    /// Run a search on the blocking thread pool.
    ///
    /// Ranking takes the index lock and the store mutex, so request handlers
    /// go through here rather than calling [`Self::search`] on a runtime worker.
    pub async fn search_blocking(self: &Arc<Self>, request: SearchRequest) -> ToolResult<SearchResponse> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.search(&request))
            .await
            .map_err(|e| ToolError::internal(format!("search task failed: {e}")))?
    }

    /// Run a search.
    pub fn search(&self, request: &SearchRequest) -> ToolResult<SearchResponse> {
        request.validate()?;
        let started = Instant::now();

        let query_terms = parse_query(&request.query);
        let filter = IndexFilter {
            year_from: request.year_from,
            year_to: request.year_to,
            category: request.category.clone().filter(|c| !c.trim().is_empty()),
        };

        let ranked = self.read()?.rank(&query_terms, request.mode, &filter);
        let total = ranked.len();
        let page: Vec<_> = ranked.into_iter().skip(request.offset).take(request.limit).collect();

        let ids: Vec<i64> = page.iter().map(|r| r.doc).collect();
        let mut papers: HashMap<i64, Paper> =
            self.store.papers(&ids)?.into_iter().map(|p| (p.id, p)).collect();

        let hits = page
            .into_iter()
            .filter_map(|r| {
                let paper = papers.remove(&r.doc)?;
                let snippet = snippet(&paper, &query_terms);
                Some(SearchHit {
                    paper,
                    score: r.score,
                    bm25: r.bm25,
                    tfidf: r.tfidf,
                    bm25_rank: r.bm25_rank,
                    tfidf_rank: r.tfidf_rank,
                    matched_terms: r.matched_terms,
                    snippet,
                })
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            query = %request.query,
            mode = %request.mode,
            total,
            returned = hits.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Search complete"
        );

        Ok(SearchResponse { total, offset: request.offset, hits, query_terms, mode: request.mode })
    }

    /// Store a paper with its term frequencies and add it to the index.
    ///
    /// Cached TF-IDF norms go stale until [`Self::refresh`].
    pub fn index_document(&self, paper: &NewPaper, terms: TermFrequencies) -> StoreResult<i64> {
        let id = self.store.upsert_paper(paper, &terms)?;
        // Enriched metadata may have survived the upsert.
        let (year, categories) = match self.store.paper(id)? {
            Some(stored) => (stored.year, stored.categories),
            None => (paper.year, paper.categories.clone()),
        };
        self.write()?.insert(IndexedDocument { id, terms, year, categories });
        Ok(id)
    }

    /// Recompute cached index statistics after a batch of changes.
    pub fn refresh(&self) -> StoreResult<()> {
        self.write()?.refresh();
        Ok(())
    }

    /// Remove a paper from store and index.
    pub fn remove(&self, arxiv_id: &str) -> StoreResult<bool> {
        let Some(paper) = self.store.paper_by_arxiv_id(arxiv_id)? else {
            return Ok(false);
        };
        let removed = self.store.remove_paper(arxiv_id)?;
        let mut index = self.write()?;
        index.remove(paper.id);
        index.refresh();
        Ok(removed)
    }

    /// Merge arXiv metadata and update the index filters.
    pub fn apply_metadata(&self, arxiv_id: &str, meta: &ArxivMetadata) -> StoreResult<bool> {
        if !self.store.apply_metadata(arxiv_id, meta)? {
            return Ok(false);
        }
        if let Some(paper) = self.store.paper_by_arxiv_id(arxiv_id)? {
            self.write()?.update_meta(paper.id, paper.year, paper.categories);
        }
        Ok(true)
    }

    /// Look up a paper by arXiv id.
    pub fn paper(&self, arxiv_id: &str) -> StoreResult<Option<Paper>> {
        self.store.paper_by_arxiv_id(arxiv_id)
    }

    /// Store and index statistics.
    pub fn stats(&self) -> StoreResult<IndexStats> {
        let store = self.store.stats()?;
        let index = self.read()?;
        Ok(IndexStats {
            store,
            indexed_documents: index.len(),
            avg_doc_len: index.avg_doc_len(),
            schema_version: self.store.schema_version()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latex::tokenize;

    fn engine_with(papers: &[(&str, &str, &str)]) -> SearchEngine {
        let engine = SearchEngine::open(Store::open_in_memory().unwrap()).unwrap();
        for (arxiv_id, title, abstract_text) in papers {
            let mut terms = TermFrequencies::new();
            for token in tokenize(title) {
                *terms.entry(token.key()).or_default() += 3.0;
            }
            for token in tokenize(abstract_text) {
                *terms.entry(token.key()).or_default() += 2.0;
            }
            let paper = NewPaper {
                arxiv_id: (*arxiv_id).to_string(),
                title: (*title).to_string(),
                abstract_text: (*abstract_text).to_string(),
                ..NewPaper::default()
            };
            engine.index_document(&paper, terms).unwrap();
        }
        engine.refresh().unwrap();
        engine
    }

    fn corpus() -> SearchEngine {
        engine_with(&[
            ("2101.00001", "Zeros of the Riemann zeta function", "We study $\\zeta(s)$ on the critical line."),
            ("2101.00002", "Sieve methods", "Bounds for primes via the large sieve."),
            ("2101.00003", "Elliptic curves", "Rank of elliptic curves over $\\mathbb{Q}$."),
        ])
    }

    #[tokio::test]
    async fn test_search_blocking_matches_inline_search() {
        let engine = Arc::new(corpus());
        let request = SearchRequest::new("large sieve");
        let inline = engine.search(&request).unwrap();
        let pooled = engine.search_blocking(request).await.unwrap();
        assert_eq!(pooled.total, 1);
        assert_eq!(pooled.hits[0].paper.arxiv_id, inline.hits[0].paper.arxiv_id);

        let err = engine.search_blocking(SearchRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }

    #[test]
    fn test_search_finds_math_command() {
        let engine = corpus();
        let response = engine.search(&SearchRequest::new("$\\zeta$")).unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].paper.arxiv_id, "2101.00001");
        assert_eq!(response.hits[0].matched_terms, vec!["\\zeta"]);
    }

    #[test]
    fn test_word_query_reaches_math_alias() {
        let engine = corpus();
        let response = engine.search(&SearchRequest::new("zeta")).unwrap();
        assert_eq!(response.hits[0].paper.arxiv_id, "2101.00001");
        assert!(response.hits[0].matched_terms.contains(&"\\zeta".to_string()));
    }

    #[test]
    fn test_paging() {
        let engine = corpus();
        let mut request = SearchRequest::new("sieve elliptic zeta").with_limit(1);
        let first = engine.search(&request).unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.hits.len(), 1);

        request.offset = 2;
        let last = engine.search(&request).unwrap();
        assert_eq!(last.hits.len(), 1);
        assert_ne!(last.hits[0].paper.id, first.hits[0].paper.id);
    }

    #[test]
    fn test_validation_errors() {
        let engine = corpus();
        assert!(engine.search(&SearchRequest::new("")).is_err());
        assert!(engine.search(&SearchRequest::new("x").with_limit(500)).is_err());
    }

    #[test]
    fn test_stop_word_query_is_empty_not_error() {
        let engine = corpus();
        let response = engine.search(&SearchRequest::new("the of")).unwrap();
        assert_eq!(response.total, 0);
        assert!(response.query_terms.is_empty());
    }

    #[test]
    fn test_remove_and_stats() {
        let engine = corpus();
        assert_eq!(engine.stats().unwrap().indexed_documents, 3);
        assert!(engine.remove("2101.00002").unwrap());
        assert!(!engine.remove("2101.00002").unwrap());

        let stats = engine.stats().unwrap();
        assert_eq!(stats.indexed_documents, 2);
        assert_eq!(stats.store.papers, 2);
        assert_eq!(engine.search(&SearchRequest::new("sieve")).unwrap().total, 0);
    }

    #[test]
    fn test_category_filter_after_enrichment() {
        let engine = corpus();
        let meta = ArxivMetadata {
            arxiv_id: "2101.00003".to_string(),
            categories: vec!["math.NT".to_string()],
            ..ArxivMetadata::default()
        };
        assert!(engine.apply_metadata("2101.00003", &meta).unwrap());

        let mut request = SearchRequest::new("elliptic sieve");
        request.category = Some("math.NT".to_string());
        let response = engine.search(&request).unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].paper.arxiv_id, "2101.00003");
    }
}
