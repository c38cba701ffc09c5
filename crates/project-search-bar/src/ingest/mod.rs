//! Ingestion: LaTeX sources on disk into the store and index.

mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use sha2::{Digest, Sha256};

pub use source::{MAX_UNPACKED_BYTES, Source, SourceKind, assemble, discover_sources, read_archive, read_source};

use crate::client::Enricher;
use crate::config::ranking::{WEIGHT_ABSTRACT, WEIGHT_BODY, WEIGHT_TITLE};
use crate::index::TermFrequencies;
use crate::latex::{extract_document, tokenize};
use crate::models::{NewPaper, TexDocument, year_from_id};
use crate::search::SearchEngine;

/// Counts from one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub indexed: usize,
    /// Sources whose content hash matched the stored one.
    pub unchanged: usize,
    pub failed: usize,
    /// Papers updated from arXiv metadata afterwards.
    pub enriched: usize,
    /// arXiv ids indexed in this run.
    #[serde(skip)]
    pub indexed_ids: Vec<String>,
}

/// Field-weighted term frequencies of an extracted document.
#[must_use]
pub fn term_frequencies(doc: &TexDocument) -> TermFrequencies {
    let mut terms = TermFrequencies::new();
    for (text, weight) in [
        (doc.title.as_str(), WEIGHT_TITLE),
        (doc.abstract_text.as_str(), WEIGHT_ABSTRACT),
        (doc.body.as_str(), WEIGHT_BODY),
    ] {
        for token in tokenize(text) {
            *terms.entry(token.key()).or_default() += weight;
        }
    }
    terms
}

/// Hex SHA-256 of a source's text.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

enum Outcome {
    Indexed(String),
    Unchanged,
}

/// Reads sources, indexes changed ones and enriches what it indexed.
#[derive(Debug, Clone)]
pub struct Ingestor {
    engine: Arc<SearchEngine>,
    enricher: Enricher,
}

impl Ingestor {
    #[must_use]
    pub fn new(engine: Arc<SearchEngine>, enricher: Enricher) -> Self {
        Self { engine, enricher }
    }

    /// Ingest every source under `dir`, then enrich the newly indexed papers.
    pub async fn run(&self, dir: &Path) -> anyhow::Result<IngestReport> {
        let engine = Arc::clone(&self.engine);
        let dir: PathBuf = dir.to_path_buf();
        let mut report = tokio::task::spawn_blocking(move || ingest_dir(&engine, &dir)).await??;

        if !report.indexed_ids.is_empty() {
            report.enriched = self.enricher.enrich(&report.indexed_ids).await;
        }
        Ok(report)
    }
}

/// Synchronous ingestion of one directory. Per-source failures are logged
/// and counted.
pub fn ingest_dir(engine: &SearchEngine, dir: &Path) -> anyhow::Result<IngestReport> {
    let started = Instant::now();
    let sources = discover_sources(dir)?;
    tracing::info!(dir = %dir.display(), sources = sources.len(), "Ingesting sources");

    let mut report = IngestReport::default();
    for source in &sources {
        match ingest_source(engine, source) {
            Ok(Outcome::Indexed(id)) => {
                report.indexed += 1;
                report.indexed_ids.push(id);
            }
            Ok(Outcome::Unchanged) => report.unchanged += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(path = %source.path.display(), error = %e, "Failed to ingest source");
            }
        }
    }
    engine.refresh()?;

    tracing::info!(
        indexed = report.indexed,
        unchanged = report.unchanged,
        failed = report.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Ingestion finished"
    );
    Ok(report)
}

fn ingest_source(engine: &SearchEngine, source: &Source) -> anyhow::Result<Outcome> {
    let text = read_source(source)?;
    if text.trim().is_empty() {
        anyhow::bail!("no LaTeX content");
    }

    let arxiv_id = source.arxiv_id.as_str();
    let hash = content_hash(&text);
    if engine.store().content_hash(arxiv_id)?.as_deref() == Some(hash.as_str()) {
        return Ok(Outcome::Unchanged);
    }

    let doc = extract_document(&text);
    let terms = term_frequencies(&doc);
    let title = if doc.title.is_empty() { arxiv_id.to_string() } else { doc.title };

    let paper = NewPaper {
        arxiv_id: arxiv_id.to_string(),
        title,
        authors: doc.authors,
        abstract_text: doc.abstract_text,
        categories: Vec::new(),
        published: None,
        year: year_from_id(&source.arxiv_id),
        source_path: Some(source.path.display().to_string()),
        content_hash: hash,
    };
    engine.index_document(&paper, terms)?;
    tracing::debug!(arxiv_id, "Indexed paper");
    Ok(Outcome::Indexed(arxiv_id.to_string()))
}
