//! Enumeration types for search and tool parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output format for tool responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Human-readable Markdown format.
    #[default]
    Markdown,
    /// Machine-readable JSON format.
    Json,
}

impl ResponseFormat {
    /// Check if this is markdown format.
    #[must_use]
    pub const fn is_markdown(self) -> bool {
        matches!(self, Self::Markdown)
    }

    /// Check if this is JSON format.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Which relevance score orders the results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    /// Okapi BM25.
    Bm25,
    /// TF-IDF with cosine normalisation.
    Tfidf,
    /// Reciprocal rank fusion of both.
    #[default]
    Dual,
}

impl RankingMode {
    /// Lowercase name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bm25 => "bm25",
            Self::Tfidf => "tfidf",
            Self::Dual => "dual",
        }
    }
}

impl fmt::Display for RankingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bm25" => Ok(Self::Bm25),
            "tfidf" | "tf-idf" => Ok(Self::Tfidf),
            "dual" | "both" | "rrf" => Ok(Self::Dual),
            other => Err(format!("unknown ranking mode '{other}' (expected bm25, tfidf or dual)")),
        }
    }
}

/// Classification of a token produced by the LaTeX tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenKind {
    /// Prose word from a text region.
    Word,
    /// `\command` inside math.
    MathCommand,
    /// Identifier letters inside math.
    MathSymbol,
    /// Digits, in either region.
    Number,
}
