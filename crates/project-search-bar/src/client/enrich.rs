//! Metadata enrichment: merge arXiv Atom records into stored papers.

use std::sync::Arc;

use crate::config::arxiv::METADATA_BATCH;
use crate::models::ArxivId;
use crate::search::SearchEngine;

use super::ArxivClient;

/// Enriches stored papers from the Atom API. Degrades to a no-op offline.
#[derive(Debug, Clone)]
pub struct Enricher {
    client: Option<ArxivClient>,
    engine: Arc<SearchEngine>,
}

impl Enricher {
    /// `client` is `None` when running offline.
    #[must_use]
    pub fn new(client: Option<ArxivClient>, engine: Arc<SearchEngine>) -> Self {
        Self { client, engine }
    }

    /// Whether an arXiv client is available.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.client.is_some()
    }

    /// Enrich up to `limit` papers that have not been enriched yet.
    pub async fn enrich_pending(&self, limit: usize) -> usize {
        match self.engine.store().unenriched(limit) {
            Ok(ids) => self.enrich(&ids).await,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list unenriched papers");
                0
            }
        }
    }

    /// Enrich the given papers. Returns how many were updated.
    ///
    /// Local (non-arXiv) ids are ignored. Any client error stops the run
    /// with a warning; papers enriched before it are kept.
    pub async fn enrich(&self, arxiv_ids: &[String]) -> usize {
        let Some(client) = &self.client else {
            if !arxiv_ids.is_empty() {
                tracing::warn!(pending = arxiv_ids.len(), "Offline; skipping metadata enrichment");
            }
            return 0;
        };

        let ids: Vec<&String> = arxiv_ids.iter().filter(|id| ArxivId::new(id.as_str()).is_arxiv()).collect();
        let mut enriched = 0;

        for batch in ids.chunks(METADATA_BATCH) {
            let request: Vec<String> = batch.iter().map(|id| (*id).clone()).collect();
            let records = match client.fetch_metadata(&request).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(error = %e, enriched, "Metadata enrichment stopped");
                    return enriched;
                }
            };

            for record in &records {
                let local = batch.iter().find(|id| ArxivId::new(id.as_str()).base() == record.arxiv_id);
                let Some(local) = local else {
                    continue;
                };
                match self.engine.apply_metadata(local, record) {
                    Ok(true) => enriched += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(arxiv_id = %local, error = %e, "Could not store metadata"),
                }
            }
        }

        tracing::info!(enriched, requested = arxiv_ids.len(), "Metadata enrichment finished");
        enriched
    }
}
