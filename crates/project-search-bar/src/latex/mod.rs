//! LaTeX handling: scanning, tokenizing, query parsing and metadata extraction.

mod extract;
mod query;
mod scan;
mod tokenizer;

pub use extract::extract_document;
pub use query::{QueryTerm, parse_query};
pub use scan::strip_comments;
pub use tokenizer::{Token, collapse_whitespace, fold_accent, to_plain_text, tokenize};
