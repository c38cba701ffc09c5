//! Paper data model.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static NEW_STYLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}\.\d{4,5}(v\d+)?$").expect("valid regex"));

static OLD_STYLE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z][a-z\-]*(?:\.[A-Z]{2})?)[/_](\d{7})(v\d+)?$").expect("valid regex")
});

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v\d+$").expect("valid regex"));

/// An arXiv identifier.
///
/// New style ids look like `2101.00001`, old style ids like `math/0601001`.
/// Sources that do not follow either scheme keep their file stem as a local id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArxivId(String);

impl ArxivId {
    /// Wrap an id string as-is.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an id from a downloaded file or directory name.
    ///
    /// `math_0601001.tar.gz` becomes `math/0601001`; archive and `.tex`
    /// extensions are removed.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        let mut stem = name;
        for ext in [".tar.gz", ".tgz", ".tar", ".gz", ".tex"] {
            if let Some(s) = stem.strip_suffix(ext) {
                stem = s;
                break;
            }
        }

        if let Some(caps) = OLD_STYLE_ID.captures(stem) {
            let version = caps.get(3).map_or("", |m| m.as_str());
            return Self(format!("{}/{}{}", &caps[1], &caps[2], version));
        }

        Self(stem.to_string())
    }

    /// True for ids following either arXiv scheme.
    #[must_use]
    pub fn is_arxiv(&self) -> bool {
        NEW_STYLE_ID.is_match(&self.0) || OLD_STYLE_ID.is_match(&self.0)
    }

    /// The id without a trailing `vN` version.
    #[must_use]
    pub fn base(&self) -> &str {
        match VERSION_SUFFIX.find(&self.0) {
            Some(m) if self.is_arxiv() => &self.0[..m.start()],
            _ => &self.0,
        }
    }

    /// File-system safe stem (`/` replaced by `_`).
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.0.replace('/', "_")
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArxivId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArxivId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// An indexed paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    /// Row id in the store; also the document id in the index.
    pub id: i64,

    /// arXiv id (or local id for unrecognised sources).
    pub arxiv_id: String,

    /// Paper title.
    pub title: String,

    /// Author names in order.
    #[serde(default)]
    pub authors: Vec<String>,

    /// Abstract as plain text.
    #[serde(default)]
    pub abstract_text: String,

    /// arXiv categories, primary first.
    #[serde(default)]
    pub categories: Vec<String>,

    /// First publication date.
    #[serde(default)]
    pub published: Option<NaiveDate>,

    /// Publication year (from `published`, or from a new-style id).
    #[serde(default)]
    pub year: Option<i32>,

    /// DOI from arXiv metadata.
    #[serde(default)]
    pub doi: Option<String>,

    /// Journal reference from arXiv metadata.
    #[serde(default)]
    pub journal_ref: Option<String>,

    /// Where the LaTeX source was read from.
    #[serde(default)]
    pub source_path: Option<String>,

    /// Whether arXiv metadata has been merged in.
    #[serde(default)]
    pub enriched: bool,

    /// When the paper was (re)indexed.
    pub ingested_at: DateTime<Utc>,
}

impl Paper {
    /// Get the paper title, falling back to "Untitled" if empty.
    #[must_use]
    pub fn title_or_default(&self) -> &str {
        if self.title.trim().is_empty() { "Untitled" } else { &self.title }
    }

    /// Get author names as a comma-separated string.
    #[must_use]
    pub fn author_names(&self) -> String {
        self.authors.join(", ")
    }

    /// Primary category, if known.
    #[must_use]
    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }

    /// Link to the abstract page on arXiv, when the id is a real arXiv id.
    #[must_use]
    pub fn abs_url(&self) -> Option<String> {
        let id = ArxivId::new(self.arxiv_id.clone());
        id.is_arxiv().then(|| format!("https://arxiv.org/abs/{}", id.as_str()))
    }
}

/// A paper as produced by ingestion, before it has a row id.
#[derive(Debug, Clone, Default)]
pub struct NewPaper {
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    pub categories: Vec<String>,
    pub published: Option<NaiveDate>,
    pub year: Option<i32>,
    pub source_path: Option<String>,
    pub content_hash: String,
}

/// Metadata returned by the arXiv Atom API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArxivMetadata {
    /// Id without version.
    pub arxiv_id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub published: Option<NaiveDate>,
    pub updated: Option<NaiveDate>,
    pub doi: Option<String>,
    pub journal_ref: Option<String>,
}

/// Fields extracted from a LaTeX source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TexDocument {
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    /// Raw LaTeX body, still containing math for the tokenizer.
    pub body: String,
}

/// Year encoded in a new-style arXiv id (`YYMM.NNNNN`), if any.
#[must_use]
pub fn year_from_id(id: &ArxivId) -> Option<i32> {
    let base = id.base();
    if NEW_STYLE_ID.is_match(base) {
        return base[..2].parse::<i32>().ok().map(|yy| 2000 + yy);
    }
    OLD_STYLE_ID.captures(base).and_then(|caps| {
        let yy: i32 = caps[2][..2].parse().ok()?;
        Some(if yy >= 91 { 1900 + yy } else { 2000 + yy })
    })
}
