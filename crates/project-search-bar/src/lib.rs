//! ProjectSearchBar
//!
//! Local search over academic papers written in LaTeX. Sources are harvested
//! from arXiv, tokenized with a LaTeX-aware tokenizer, persisted in SQLite and
//! ranked with TF-IDF and BM25 side by side.
//!
//! # Features
//!
//! - **LaTeX-aware querying**: math commands such as `\zeta` are first-class terms
//! - **Dual ranking**: TF-IDF cosine and BM25, fused with reciprocal rank fusion
//! - **Enrichment**: arXiv Atom metadata, tolerant of being offline
//! - **Grounded chat**: answers cite the papers they were given, `[n]` style
//! - **Research agent**: plan, retrieve, read and synthesize over several papers
//!
//! # Example
//!
//! ```no_run
//! use project_search_bar::{config::Config, search::{SearchEngine, SearchRequest}, store::Store};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Store::open(&config.db_path())?;
//!     let engine = SearchEngine::open(store)?;
//!
//!     let response = engine.search(&SearchRequest::new("riemann \\zeta zeros"))?;
//!     for hit in response.hits {
//!         println!("{:.3} {}", hit.score, hit.paper.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod formatters;
pub mod index;
pub mod ingest;
pub mod latex;
pub mod models;
pub mod search;
pub mod server;
pub mod store;
pub mod tools;

pub use client::ArxivClient;
pub use config::Config;
pub use error::{ClientError, StoreError, ToolError};
pub use search::SearchEngine;
