//! Citation-grounded question answering over indexed papers.
//!
//! The model only ever sees numbered source blocks built from the store.
//! Its `[n]` markers are checked against those numbers before the answer
//! is returned, so every citation in a [`ChatAnswer`] points at a real paper.

mod citations;
mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use citations::{CheckedCitations, check_citations};
pub use openai::OpenAiChat;

use crate::error::{ClientResult, ToolError, ToolResult};
use crate::models::{ChatMessage, ChatRequest, Paper, SearchRequest};
use crate::search::SearchEngine;

/// Reply when retrieval finds nothing to ground an answer on.
pub const NO_MATCH_REPLY: &str = "No indexed papers match this question.";

/// Abstracts are cut to this many characters in the model context.
pub const ABSTRACT_CONTEXT_CHARS: usize = 1500;

const SYSTEM_PROMPT: &str = "You answer questions about research papers using only the numbered \
sources provided. Cite every claim with the source number in square brackets, like [1] or [1, 3]. \
If the sources do not contain the answer, say so plainly. Never cite a number that is not listed.";

/// A chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model name, for reporting.
    fn name(&self) -> &str;

    /// Complete a conversation and return the assistant message.
    async fn complete(&self, messages: &[ChatMessage]) -> ClientResult<String>;
}

/// A paper offered to the model as a numbered source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSource {
    /// 1-based number used in `[n]` markers.
    pub index: usize,
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
}

impl ChatSource {
    #[must_use]
    pub fn from_paper(index: usize, paper: &Paper) -> Self {
        Self {
            index,
            arxiv_id: paper.arxiv_id.clone(),
            title: paper.title_or_default().to_string(),
            authors: paper.authors.clone(),
            year: paper.year,
        }
    }
}

/// A grounded answer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub answer: String,
    /// Cited sources in first-citation order.
    pub citations: Vec<ChatSource>,
    /// Every source the model was given.
    pub sources: Vec<ChatSource>,
    /// True when at least one valid citation was made.
    pub grounded: bool,
    /// Out-of-range citation numbers removed from the answer.
    pub dropped_citations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatAnswer {
    fn no_match() -> Self {
        Self {
            answer: NO_MATCH_REPLY.to_string(),
            citations: Vec::new(),
            sources: Vec::new(),
            grounded: false,
            dropped_citations: 0,
            model: None,
        }
    }
}

/// Render one numbered source block.
#[must_use]
pub fn source_block(index: usize, paper: &Paper) -> String {
    let authors = if paper.authors.is_empty() { "Unknown authors".to_string() } else { paper.author_names() };
    format!(
        "[{index}] {}, {} (arXiv:{})\n{}",
        paper.title_or_default(),
        authors,
        paper.arxiv_id,
        truncate_chars(&paper.abstract_text, ABSTRACT_CONTEXT_CHARS)
    )
}

/// Cut `text` to at most `max` characters, marking the cut with `…`.
#[must_use]
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

/// Resolve a citation check into answer parts.
#[must_use]
pub fn resolve_citations(sources: &[ChatSource], checked: &CheckedCitations) -> Vec<ChatSource> {
    checked.cited.iter().filter_map(|n| sources.get(n - 1).cloned()).collect()
}

/// Answers questions from retrieved papers.
#[derive(Clone)]
pub struct ChatService {
    engine: Arc<SearchEngine>,
    model: Option<Arc<dyn ChatModel>>,
}

impl ChatService {
    #[must_use]
    pub fn new(engine: Arc<SearchEngine>, model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { engine, model }
    }

    /// Whether a model is configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    /// Papers for the request: the given ids, or the top search hits.
    pub async fn sources_for(&self, request: &ChatRequest) -> ToolResult<Vec<Paper>> {
        match &request.paper_ids {
            Some(ids) => ids
                .iter()
                .map(|id| self.engine.paper(id)?.ok_or_else(|| ToolError::not_found(id.clone())))
                .collect(),
            None => {
                let search = SearchRequest::new(request.question.clone()).with_limit(request.top_k);
                Ok(self.engine.search_blocking(search).await?.hits.into_iter().map(|h| h.paper).collect())
            }
        }
    }

    /// Answer a question with `[n]` citations to indexed papers.
    pub async fn ask(&self, request: &ChatRequest) -> ToolResult<ChatAnswer> {
        request.validate()?;

        let papers = self.sources_for(request).await?;
        if papers.is_empty() {
            tracing::debug!(question = %request.question, "No sources; answering without the model");
            return Ok(ChatAnswer::no_match());
        }

        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ToolError::unavailable("no chat model configured"))?;

        let context = papers
            .iter()
            .enumerate()
            .map(|(i, p)| source_block(i + 1, p))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
        messages.extend(request.history.iter().cloned());
        messages.push(ChatMessage::user(format!(
            "Sources:\n\n{context}\n\nQuestion: {}",
            request.question.trim()
        )));

        let raw = model.complete(&messages).await?;
        let sources: Vec<ChatSource> =
            papers.iter().enumerate().map(|(i, p)| ChatSource::from_paper(i + 1, p)).collect();
        let checked = check_citations(&raw, sources.len());
        if checked.dropped > 0 {
            tracing::warn!(dropped = checked.dropped, "Removed out-of-range citations");
        }

        let citations = resolve_citations(&sources, &checked);
        Ok(ChatAnswer {
            answer: checked.text,
            grounded: !citations.is_empty(),
            citations,
            sources,
            dropped_citations: checked.dropped,
            model: Some(model.name().to_string()),
        })
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService").field("model", &self.model.as_ref().map(|m| m.name())).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::index::TermFrequencies;
    use crate::models::NewPaper;
    use crate::store::Store;

    /// Replays a fixed reply and records what it was sent.
    struct ScriptedModel {
        reply: String,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: reply.to_string(), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: &[ChatMessage]) -> ClientResult<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    fn engine() -> Arc<SearchEngine> {
        let engine = SearchEngine::open(Store::open_in_memory().unwrap()).unwrap();
        for (id, title, abs) in [
            ("2101.00001", "Riemann zeta zeros", "Zeros of zeta on the critical line."),
            ("2101.00002", "Large sieve", "Sieve bounds for primes."),
        ] {
            let paper = NewPaper {
                arxiv_id: id.to_string(),
                title: title.to_string(),
                abstract_text: abs.to_string(),
                ..NewPaper::default()
            };
            let mut terms = TermFrequencies::new();
            for token in crate::latex::tokenize(&format!("{title} {abs}")) {
                *terms.entry(token.key()).or_default() += 1.0;
            }
            engine.index_document(&paper, terms).unwrap();
        }
        engine.refresh().unwrap();
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_answer_with_valid_and_invalid_citations() {
        let model = ScriptedModel::new("Zeros lie on the line [1]. Unrelated [4].");
        let service = ChatService::new(engine(), Some(model.clone()));

        let answer = service.ask(&ChatRequest::new("where are the zeta zeros?")).await.unwrap();
        assert_eq!(answer.answer, "Zeros lie on the line [1]. Unrelated.");
        assert!(answer.grounded);
        assert_eq!(answer.dropped_citations, 1);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].arxiv_id, "2101.00001");

        let seen = model.seen.lock().unwrap();
        let prompt = &seen[0].last().unwrap().content;
        assert!(prompt.contains("[1] Riemann zeta zeros, Unknown authors (arXiv:2101.00001)"));
    }

    #[tokio::test]
    async fn test_no_sources_skips_model() {
        let model = ScriptedModel::new("should not be used");
        let service = ChatService::new(engine(), Some(model.clone()));

        let answer = service.ask(&ChatRequest::new("elliptic curves")).await.unwrap();
        assert_eq!(answer.answer, NO_MATCH_REPLY);
        assert!(!answer.grounded);
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_paper_ids() {
        let model = ScriptedModel::new("Sieve bounds [1].");
        let service = ChatService::new(engine(), Some(model));

        let mut request = ChatRequest::new("what bounds?");
        request.paper_ids = Some(vec!["2101.00002".to_string()]);
        let answer = service.ask(&request).await.unwrap();
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.citations[0].arxiv_id, "2101.00002");

        request.paper_ids = Some(vec!["9999.99999".to_string()]);
        let err = service.ask(&request).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_missing_model_is_unavailable() {
        let service = ChatService::new(engine(), None);
        let err = service.ask(&ChatRequest::new("zeta zeros")).await.unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 10), "abcdef");
        assert_eq!(truncate_chars("ééééé", 3), "ééé…");
    }
}
