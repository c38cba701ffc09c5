//! Fuzzing library for project-search-bar.
//!
//! Targets cover the LaTeX tokenizer, the arXiv Atom and OAI-PMH parsers,
//! and JSON deserialization of request types.
//!
//! # Usage
//!
//! ```bash
//! cd crates/psb-fuzz
//! cargo +nightly fuzz run fuzz_tokenize -- -max_total_time=60
//! ```

pub use project_search_bar::{client, latex, models};
