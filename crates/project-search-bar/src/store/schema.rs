//! SQLite schema and migrations.

use rusqlite::{Connection, OptionalExtension};

use crate::error::StoreResult;

/// Current schema version, recorded in `meta`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS papers (
    id            INTEGER PRIMARY KEY,
    arxiv_id      TEXT UNIQUE NOT NULL,
    title         TEXT NOT NULL DEFAULT '',
    authors       TEXT NOT NULL DEFAULT '[]',
    abstract      TEXT NOT NULL DEFAULT '',
    categories    TEXT NOT NULL DEFAULT '[]',
    published     TEXT,
    year          INTEGER,
    doi           TEXT,
    journal_ref   TEXT,
    source_path   TEXT,
    content_hash  TEXT,
    doc_len       REAL NOT NULL DEFAULT 0,
    enriched      INTEGER NOT NULL DEFAULT 0,
    ingested_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS postings (
    term      TEXT NOT NULL,
    paper_id  INTEGER NOT NULL REFERENCES papers(id) ON DELETE CASCADE,
    tf        REAL NOT NULL,
    PRIMARY KEY (term, paper_id)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS postings_by_paper ON postings(paper_id);
CREATE INDEX IF NOT EXISTS papers_unenriched ON papers(enriched, id);

CREATE TABLE IF NOT EXISTS meta (
    key    TEXT PRIMARY KEY,
    value  TEXT NOT NULL
);
";

/// Apply pragmas and create the schema if needed.
pub fn initialize(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;",
    )?;
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Schema version stored in the database.
pub fn version(conn: &Connection) -> StoreResult<Option<i64>> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| row.get(0))
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()))
}
