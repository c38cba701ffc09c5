//! Compact JSON output.

use serde_json::{Value, json};

use crate::search::{SearchHit, SearchResponse};
use crate::models::Paper;

/// Create a compact paper representation for JSON output.
///
/// Empty optional fields are left out.
#[must_use]
pub fn compact_paper(paper: &Paper) -> Value {
    let mut obj = json!({
        "arxivId": paper.arxiv_id,
        "title": paper.title_or_default(),
        "year": paper.year,
    });

    if !paper.authors.is_empty() {
        obj["authors"] = json!(paper.authors);
    }

    if !paper.categories.is_empty() {
        obj["categories"] = json!(paper.categories);
    }

    if let Some(doi) = &paper.doi {
        obj["doi"] = json!(doi);
    }

    if let Some(journal) = &paper.journal_ref {
        obj["journalRef"] = json!(journal);
    }

    if let Some(url) = paper.abs_url() {
        obj["url"] = json!(url);
    }

    obj
}

/// Compact form of one search hit: the paper plus its scores.
#[must_use]
pub fn compact_hit(hit: &SearchHit) -> Value {
    let mut obj = compact_paper(&hit.paper);
    obj["score"] = json!(hit.score);
    obj["bm25"] = json!(hit.bm25);
    obj["tfidf"] = json!(hit.tfidf);
    obj["matchedTerms"] = json!(hit.matched_terms);
    if !hit.snippet.is_empty() {
        obj["snippet"] = json!(hit.snippet);
    }
    obj
}

/// Compact form of a result page.
#[must_use]
pub fn compact_search(response: &SearchResponse) -> Value {
    json!({
        "total": response.total,
        "offset": response.offset,
        "mode": response.mode,
        "terms": response.query_terms.iter().map(|t| t.term.as_str()).collect::<Vec<_>>(),
        "hits": response.hits.iter().map(compact_hit).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_paper() {
        let paper = Paper {
            id: 7,
            arxiv_id: "2101.00001".to_string(),
            title: "Test Paper".to_string(),
            authors: vec!["Ada Lovelace".to_string()],
            abstract_text: String::new(),
            categories: Vec::new(),
            published: None,
            year: Some(2021),
            doi: None,
            journal_ref: None,
            source_path: None,
            enriched: false,
            ingested_at: chrono::Utc::now(),
        };

        let compact = compact_paper(&paper);

        assert_eq!(compact["arxivId"], "2101.00001");
        assert_eq!(compact["title"], "Test Paper");
        assert_eq!(compact["year"], 2021);
        assert_eq!(compact["authors"], json!(["Ada Lovelace"]));
        assert_eq!(compact["url"], "https://arxiv.org/abs/2101.00001");
        assert!(compact.get("categories").is_none());
        assert!(compact.get("doi").is_none());
    }
}
