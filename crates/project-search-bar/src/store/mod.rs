//! SQLite persistence for papers and postings.
//!
//! A single connection sits behind a mutex; every call is short and
//! synchronous. Async handlers reach it through
//! `SearchEngine::search_blocking` or wrap batch work in `spawn_blocking`.

mod schema;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

pub use schema::SCHEMA_VERSION;

use crate::error::{StoreError, StoreResult};
use crate::index::{IndexedDocument, TermFrequencies};
use crate::models::{ArxivMetadata, NewPaper, Paper};

const PAPER_COLUMNS: &str = "id, arxiv_id, title, authors, abstract, categories, published, \
                             year, doi, journal_ref, source_path, enriched, ingested_at";

/// Counts reported by [`Store::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub papers: u64,
    pub enriched: u64,
    /// Distinct terms.
    pub terms: u64,
    pub postings: u64,
}

/// SQLite-backed paper store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::initialize(&conn)?;
        tracing::debug!(path = %path.display(), "Opened store");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Schema version recorded in the database.
    pub fn schema_version(&self) -> StoreResult<Option<i64>> {
        schema::version(&*self.conn()?)
    }

    /// Insert a paper or update it in place, replacing its postings.
    ///
    /// Metadata already merged from arXiv survives re-ingestion. Returns the row id.
    pub fn upsert_paper(&self, paper: &NewPaper, terms: &TermFrequencies) -> StoreResult<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let doc_len: f64 = terms.values().filter(|tf| **tf > 0.0).map(|tf| f64::from(*tf)).sum();
        let id: i64 = tx.query_row(
            "INSERT INTO papers (arxiv_id, title, authors, abstract, categories, published, year,
                                 source_path, content_hash, doc_len, enriched, ingested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)
             ON CONFLICT(arxiv_id) DO UPDATE SET
                 title       = CASE WHEN papers.enriched THEN papers.title ELSE excluded.title END,
                 authors     = CASE WHEN papers.enriched THEN papers.authors ELSE excluded.authors END,
                 abstract    = CASE WHEN papers.enriched THEN papers.abstract ELSE excluded.abstract END,
                 categories  = CASE WHEN papers.enriched THEN papers.categories ELSE excluded.categories END,
                 published   = CASE WHEN papers.enriched THEN papers.published ELSE excluded.published END,
                 year        = CASE WHEN papers.enriched THEN papers.year ELSE excluded.year END,
                 source_path = excluded.source_path,
                 content_hash = excluded.content_hash,
                 doc_len     = excluded.doc_len,
                 ingested_at = excluded.ingested_at
             RETURNING id",
            params![
                paper.arxiv_id,
                paper.title,
                serde_json::to_string(&paper.authors)?,
                paper.abstract_text,
                serde_json::to_string(&paper.categories)?,
                paper.published.map(|d| d.to_string()),
                paper.year,
                paper.source_path,
                paper.content_hash,
                doc_len,
                Utc::now().to_rfc3339(),
            ],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM postings WHERE paper_id = ?1", [id])?;
        {
            let mut insert =
                tx.prepare_cached("INSERT INTO postings (term, paper_id, tf) VALUES (?1, ?2, ?3)")?;
            for (term, tf) in terms.iter().filter(|(_, tf)| **tf > 0.0) {
                insert.execute(params![term, id, f64::from(*tf)])?;
            }
        }
        tx.commit()?;
        Ok(id)
    }

    /// Content hash recorded for a paper at its last ingestion.
    pub fn content_hash(&self, arxiv_id: &str) -> StoreResult<Option<String>> {
        let hash = self
            .conn()?
            .query_row("SELECT content_hash FROM papers WHERE arxiv_id = ?1", [arxiv_id], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?;
        Ok(hash.flatten())
    }

    /// Look up a paper by row id.
    pub fn paper(&self, id: i64) -> StoreResult<Option<Paper>> {
        let sql = format!("SELECT {PAPER_COLUMNS} FROM papers WHERE id = ?1");
        let row = self.conn()?.query_row(&sql, [id], PaperRow::from_row).optional()?;
        row.map(PaperRow::into_paper).transpose()
    }

    /// Look up a paper by arXiv id.
    pub fn paper_by_arxiv_id(&self, arxiv_id: &str) -> StoreResult<Option<Paper>> {
        let sql = format!("SELECT {PAPER_COLUMNS} FROM papers WHERE arxiv_id = ?1");
        let row = self.conn()?.query_row(&sql, [arxiv_id], PaperRow::from_row).optional()?;
        row.map(PaperRow::into_paper).transpose()
    }

    /// Hydrate several papers, in the order of `ids`. Unknown ids are skipped.
    pub fn papers(&self, ids: &[i64]) -> StoreResult<Vec<Paper>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("SELECT {PAPER_COLUMNS} FROM papers WHERE id IN ({placeholders})");

        let rows: Vec<PaperRow> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(rusqlite::params_from_iter(ids), PaperRow::from_row)?
                .collect::<Result<_, _>>()?
        };

        let mut by_id: HashMap<i64, Paper> = HashMap::with_capacity(rows.len());
        for row in rows {
            let paper = row.into_paper()?;
            by_id.insert(paper.id, paper);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Merge arXiv metadata into a paper. Non-empty remote fields win.
    ///
    /// Returns `false` when no paper has that id.
    pub fn apply_metadata(&self, arxiv_id: &str, meta: &ArxivMetadata) -> StoreResult<bool> {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        let authors = (!meta.authors.is_empty()).then(|| serde_json::to_string(&meta.authors)).transpose()?;
        let categories =
            (!meta.categories.is_empty()).then(|| serde_json::to_string(&meta.categories)).transpose()?;
        let year = meta.published.map(|d| chrono::Datelike::year(&d));

        let changed = self.conn()?.execute(
            "UPDATE papers SET
                 title       = COALESCE(?2, title),
                 abstract    = COALESCE(?3, abstract),
                 authors     = COALESCE(?4, authors),
                 categories  = COALESCE(?5, categories),
                 published   = COALESCE(?6, published),
                 year        = COALESCE(?7, year),
                 doi         = COALESCE(?8, doi),
                 journal_ref = COALESCE(?9, journal_ref),
                 enriched    = 1
             WHERE arxiv_id = ?1",
            params![
                arxiv_id,
                non_empty(&meta.title),
                non_empty(&meta.summary),
                authors,
                categories,
                meta.published.map(|d| d.to_string()),
                year,
                meta.doi.as_deref().and_then(non_empty),
                meta.journal_ref.as_deref().and_then(non_empty),
            ],
        )?;
        Ok(changed > 0)
    }

    /// arXiv ids of papers not yet enriched, oldest first.
    pub fn unenriched(&self, limit: usize) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT arxiv_id FROM papers WHERE enriched = 0 ORDER BY id LIMIT ?1")?;
        let ids = stmt
            .query_map([limit as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Delete a paper and its postings. Returns whether it existed.
    pub fn remove_paper(&self, arxiv_id: &str) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM postings WHERE paper_id IN (SELECT id FROM papers WHERE arxiv_id = ?1)",
            [arxiv_id],
        )?;
        let removed = tx.execute("DELETE FROM papers WHERE arxiv_id = ?1", [arxiv_id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Every paper's postings and filter fields, ordered by id.
    pub fn load_documents(&self) -> StoreResult<Vec<IndexedDocument>> {
        let conn = self.conn()?;

        let mut docs: HashMap<i64, IndexedDocument> = HashMap::new();
        {
            let mut stmt = conn.prepare("SELECT id, year, categories FROM papers")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                let categories: String = row.get(2)?;
                docs.insert(
                    id,
                    IndexedDocument {
                        id,
                        terms: TermFrequencies::new(),
                        year: row.get(1)?,
                        categories: serde_json::from_str(&categories)?,
                    },
                );
            }
        }

        let mut stmt = conn.prepare("SELECT term, paper_id, tf FROM postings")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let paper_id: i64 = row.get(1)?;
            if let Some(doc) = docs.get_mut(&paper_id) {
                let tf: f64 = row.get(2)?;
                doc.terms.insert(row.get(0)?, tf as f32);
            }
        }

        let mut docs: Vec<IndexedDocument> = docs.into_values().collect();
        docs.sort_by_key(|d| d.id);
        Ok(docs)
    }

    /// Row counts.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> StoreResult<u64> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        };
        Ok(StoreStats {
            papers: count("SELECT COUNT(*) FROM papers")?,
            enriched: count("SELECT COUNT(*) FROM papers WHERE enriched = 1")?,
            terms: count("SELECT COUNT(DISTINCT term) FROM postings")?,
            postings: count("SELECT COUNT(*) FROM postings")?,
        })
    }
}

/// Raw column values, decoded outside the rusqlite row callback.
struct PaperRow {
    id: i64,
    arxiv_id: String,
    title: String,
    authors: String,
    abstract_text: String,
    categories: String,
    published: Option<String>,
    year: Option<i32>,
    doi: Option<String>,
    journal_ref: Option<String>,
    source_path: Option<String>,
    enriched: bool,
    ingested_at: String,
}

impl PaperRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            arxiv_id: row.get(1)?,
            title: row.get(2)?,
            authors: row.get(3)?,
            abstract_text: row.get(4)?,
            categories: row.get(5)?,
            published: row.get(6)?,
            year: row.get(7)?,
            doi: row.get(8)?,
            journal_ref: row.get(9)?,
            source_path: row.get(10)?,
            enriched: row.get(11)?,
            ingested_at: row.get(12)?,
        })
    }

    fn into_paper(self) -> StoreResult<Paper> {
        Ok(Paper {
            id: self.id,
            arxiv_id: self.arxiv_id,
            title: self.title,
            authors: serde_json::from_str(&self.authors)?,
            abstract_text: self.abstract_text,
            categories: serde_json::from_str(&self.categories)?,
            published: self.published.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            year: self.year,
            doi: self.doi,
            journal_ref: self.journal_ref,
            source_path: self.source_path,
            enriched: self.enriched,
            ingested_at: DateTime::parse_from_rfc3339(&self.ingested_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_default(),
        })
    }
}
