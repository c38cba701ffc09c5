//! Markdown output formatting.

use crate::agent::AgentReport;
use crate::chat::{ChatAnswer, ChatSource, truncate_chars};
use crate::latex::{QueryTerm, Token};
use crate::models::Paper;
use crate::search::{IndexStats, SearchResponse};

const ABSTRACT_PREVIEW_CHARS: usize = 300;

/// Format a page of search results as Markdown.
#[must_use]
pub fn format_search_markdown(response: &SearchResponse) -> String {
    if response.hits.is_empty() {
        return "No papers found.".to_string();
    }

    let mut output = format!(
        "# Papers ({} of {} results, {} ranking)\n\n",
        response.hits.len(),
        response.total,
        response.mode
    );

    for (i, hit) in response.hits.iter().enumerate() {
        output.push_str(&format_paper_markdown(&hit.paper, response.offset + i + 1));
        output.push_str(&format!(
            "**Score**: {:.4} | **BM25**: {:.3} (#{}) | **TF-IDF**: {:.3} (#{})\n\n",
            hit.score, hit.bm25, hit.bm25_rank, hit.tfidf, hit.tfidf_rank
        ));
        if !hit.matched_terms.is_empty() {
            output.push_str(&format!("**Matched**: `{}`\n\n", hit.matched_terms.join("`, `")));
        }
        if !hit.snippet.is_empty() {
            output.push_str(&format!("> {}\n\n", hit.snippet));
        }
        output.push_str("---\n\n");
    }

    output
}

/// Format a single paper as Markdown.
#[must_use]
pub fn format_paper_markdown(paper: &Paper, index: usize) -> String {
    let mut output = String::new();

    if index > 0 {
        output.push_str(&format!("## {}. {}\n\n", index, paper.title_or_default()));
    } else {
        output.push_str(&format!("## {}\n\n", paper.title_or_default()));
    }

    if !paper.authors.is_empty() {
        output.push_str(&format!("**Authors**: {}\n\n", paper.author_names()));
    }

    let mut meta = vec![format!("**arXiv**: {}", paper.arxiv_id)];
    if let Some(year) = paper.year {
        meta.push(format!("**Year**: {year}"));
    }
    if !paper.categories.is_empty() {
        meta.push(format!("**Categories**: {}", paper.categories.join(", ")));
    }
    output.push_str(&format!("{}\n\n", meta.join(" | ")));

    let mut links = Vec::new();
    if let Some(url) = paper.abs_url() {
        links.push(format!("[arXiv]({url})"));
    }
    if let Some(doi) = &paper.doi {
        links.push(format!("[DOI](https://doi.org/{doi})"));
    }
    if !links.is_empty() {
        output.push_str(&format!("**Links**: {}\n\n", links.join(" | ")));
    }

    if let Some(journal) = &paper.journal_ref {
        output.push_str(&format!("**Journal**: {journal}\n\n"));
    }

    if !paper.abstract_text.is_empty() {
        output.push_str(&format!(
            "**Abstract**: {}\n\n",
            truncate_chars(&paper.abstract_text, ABSTRACT_PREVIEW_CHARS)
        ));
    }

    output
}

/// Format the tokenizer's view of some text.
#[must_use]
pub fn format_tokens_markdown(text: &str, tokens: &[Token], terms: &[QueryTerm]) -> String {
    let mut output = format!("# Tokenization\n\n**Input**: `{text}`\n\n");

    output.push_str(&format!("## Tokens ({})\n\n", tokens.len()));
    if tokens.is_empty() {
        output.push_str("_none_\n\n");
    }
    for token in tokens {
        output.push_str(&format!("- `{}` ({:?}) -> `{}`\n", token.text, token.kind, token.key()));
    }

    output.push_str(&format!("\n## Query terms ({})\n\n", terms.len()));
    for term in terms {
        output.push_str(&format!("- `{}` weight {}\n", term.term, term.weight));
    }

    output
}

fn format_source_line(source: &ChatSource) -> String {
    let year = source.year.map(|y| format!(" ({y})")).unwrap_or_default();
    format!("[{}] {}{}, arXiv:{}\n", source.index, source.title, year, source.arxiv_id)
}

/// Format a grounded answer with its reference list.
#[must_use]
pub fn format_chat_markdown(answer: &ChatAnswer) -> String {
    let mut output = format!("{}\n", answer.answer);

    if !answer.citations.is_empty() {
        output.push_str("\n## References\n\n");
        for source in &answer.citations {
            output.push_str(&format_source_line(source));
        }
    }

    if answer.dropped_citations > 0 {
        output.push_str(&format!(
            "\n_{} citation(s) to unknown sources were removed._\n",
            answer.dropped_citations
        ));
    }

    output
}

/// Format a research agent report.
#[must_use]
pub fn format_agent_markdown(report: &AgentReport) -> String {
    let mut output = format!("# Research: {}\n\n", report.goal);

    output.push_str("## Searches\n\n");
    for step in &report.steps {
        output.push_str(&format!(
            "- `{}`: {} hits, {} new\n",
            step.query,
            step.hits,
            step.new_papers.len()
        ));
    }

    if !report.notes.is_empty() {
        output.push_str("\n## Notes\n\n");
        for note in &report.notes {
            output.push_str(&format!("**[{}] {}**\n\n{}\n\n", note.source.index, note.source.title, note.note));
        }
    }

    output.push_str(&format!("## Answer\n\n{}\n", report.answer));

    if !report.citations.is_empty() {
        output.push_str("\n## References\n\n");
        for source in &report.citations {
            output.push_str(&format_source_line(source));
        }
    }

    output
}

/// Format index statistics.
#[must_use]
pub fn format_stats_markdown(stats: &IndexStats) -> String {
    let mut output = "# Index statistics\n\n".to_string();
    output.push_str(&format!("- **Papers**: {}\n", stats.store.papers));
    output.push_str(&format!("- **Enriched**: {}\n", stats.store.enriched));
    output.push_str(&format!("- **Indexed documents**: {}\n", stats.indexed_documents));
    output.push_str(&format!("- **Distinct terms**: {}\n", stats.store.terms));
    output.push_str(&format!("- **Postings**: {}\n", stats.store.postings));
    output.push_str(&format!("- **Average document length**: {:.1}\n", stats.avg_doc_len));
    if let Some(version) = stats.schema_version {
        output.push_str(&format!("- **Schema version**: {version}\n"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper() -> Paper {
        Paper {
            id: 1,
            arxiv_id: "math/0601001".to_string(),
            title: "On \\zeta".to_string(),
            authors: vec!["A. Author".to_string(), "B. Author".to_string()],
            abstract_text: "x".repeat(400),
            categories: vec!["math.NT".to_string()],
            published: None,
            year: Some(2006),
            doi: Some("10.1000/xyz".to_string()),
            journal_ref: None,
            source_path: None,
            enriched: true,
            ingested_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_format_paper_markdown() {
        let out = format_paper_markdown(&paper(), 2);
        assert!(out.starts_with("## 2. On \\zeta"));
        assert!(out.contains("**Authors**: A. Author, B. Author"));
        assert!(out.contains("**Year**: 2006"));
        assert!(out.contains("[arXiv](https://arxiv.org/abs/math/0601001)"));
        assert!(out.contains("[DOI](https://doi.org/10.1000/xyz)"));
        assert!(out.contains('…'));
    }

    #[test]
    fn test_chat_markdown_lists_references() {
        let answer = ChatAnswer {
            answer: "It holds [1].".to_string(),
            citations: vec![ChatSource::from_paper(1, &paper())],
            sources: Vec::new(),
            grounded: true,
            dropped_citations: 1,
            model: None,
        };
        let out = format_chat_markdown(&answer);
        assert!(out.contains("[1] On \\zeta (2006), arXiv:math/0601001"));
        assert!(out.contains("1 citation(s)"));
    }
}
