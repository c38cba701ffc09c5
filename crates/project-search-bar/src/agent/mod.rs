//! Multi-document research agent.
//!
//! One run goes through four steps: plan search queries with the model,
//! retrieve papers from the local index, read each paper into a short note,
//! then synthesize a cited answer from the notes.

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Serialize;

use crate::chat::{ChatModel, ChatSource, check_citations, resolve_citations, source_block};
use crate::error::{ToolError, ToolResult};
use crate::models::{AgentRequest, ChatMessage, Paper, SearchRequest};
use crate::search::SearchEngine;

/// Papers read concurrently.
const READ_CONCURRENCY: usize = 4;

/// Reply when retrieval finds nothing.
pub const NO_DOCUMENTS_REPLY: &str = "No indexed papers were found for this goal.";

const PLANNER_PROMPT: &str = "You plan literature searches over a local index of mathematics and \
physics papers. Reply with short keyword queries, one per line, and nothing else. LaTeX commands \
such as \\zeta may be used.";

const READER_PROMPT: &str = "You read one paper's abstract for a researcher. In two to four \
sentences, say what the paper contributes and how it bears on the research goal. Do not invent \
results that the abstract does not state.";

const SYNTHESIS_PROMPT: &str = "You write a short research summary from numbered notes on papers. \
Use only the notes. Cite every claim with the note number in square brackets, like [1] or [2, 3].";

/// One executed search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStep {
    pub query: String,
    pub hits: usize,
    /// Papers this query added to the reading list.
    pub new_papers: Vec<String>,
}

/// A note written while reading one paper.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentNote {
    pub source: ChatSource,
    pub note: String,
}

/// Outcome of an agent run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReport {
    pub goal: String,
    pub steps: Vec<AgentStep>,
    pub notes: Vec<AgentNote>,
    pub answer: String,
    pub citations: Vec<ChatSource>,
    pub dropped_citations: usize,
    pub elapsed_ms: u64,
}

/// Plan, retrieve, read and synthesize over the local index.
#[derive(Clone)]
pub struct ResearchAgent {
    engine: Arc<SearchEngine>,
    model: Option<Arc<dyn ChatModel>>,
}

impl ResearchAgent {
    #[must_use]
    pub fn new(engine: Arc<SearchEngine>, model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { engine, model }
    }

    /// Run the agent for one goal.
    pub async fn run(&self, request: &AgentRequest) -> ToolResult<AgentReport> {
        request.validate()?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ToolError::unavailable("no chat model configured"))?;
        let started = Instant::now();

        let queries = self.plan(model.as_ref(), request).await;
        tracing::info!(goal = %request.goal, queries = ?queries, "Agent plan");

        let (papers, steps) = self.retrieve(request, &queries).await?;
        if papers.is_empty() {
            return Ok(AgentReport {
                goal: request.goal.clone(),
                steps,
                notes: Vec::new(),
                answer: NO_DOCUMENTS_REPLY.to_string(),
                citations: Vec::new(),
                dropped_citations: 0,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let notes = self.read(model.as_ref(), &request.goal, &papers).await;
        if notes.is_empty() {
            return Err(ToolError::unavailable("the chat model could not read any paper"));
        }

        let (answer, citations, dropped) = self.synthesize(model.as_ref(), &request.goal, &notes).await?;
        let report = AgentReport {
            goal: request.goal.clone(),
            steps,
            notes,
            answer,
            citations,
            dropped_citations: dropped,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            papers = papers.len(),
            notes = report.notes.len(),
            citations = report.citations.len(),
            elapsed_ms = report.elapsed_ms,
            "Agent run finished"
        );
        Ok(report)
    }

    /// Ask for search queries; fall back to the goal itself.
    async fn plan(&self, model: &dyn ChatModel, request: &AgentRequest) -> Vec<String> {
        let messages = [
            ChatMessage::system(PLANNER_PROMPT),
            ChatMessage::user(format!(
                "Research goal: {}\nGive at most {} queries.",
                request.goal.trim(),
                request.max_queries
            )),
        ];
        let reply = match model.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Planning failed; searching for the goal directly");
                String::new()
            }
        };

        let mut queries = parse_plan(&reply, request.max_queries);
        if queries.is_empty() {
            queries.push(request.goal.trim().to_string());
        }
        queries
    }

    /// Collect unique papers in discovery order, seeded with explicit ids.
    async fn retrieve(&self, request: &AgentRequest, queries: &[String]) -> ToolResult<(Vec<Paper>, Vec<AgentStep>)> {
        let mut papers: Vec<Paper> = Vec::new();

        for id in request.paper_ids.iter().flatten() {
            let paper = self.engine.paper(id)?.ok_or_else(|| ToolError::not_found(id.clone()))?;
            if papers.len() < request.max_documents && !papers.iter().any(|p| p.id == paper.id) {
                papers.push(paper);
            }
        }

        let mut steps = Vec::with_capacity(queries.len());
        for query in queries {
            let search = SearchRequest::new(query.clone()).with_limit(request.per_query);
            let hits = match self.engine.search_blocking(search).await {
                Ok(response) => response.hits,
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Agent search failed");
                    Vec::new()
                }
            };

            let mut step = AgentStep { query: query.clone(), hits: hits.len(), new_papers: Vec::new() };
            for hit in hits {
                if papers.len() >= request.max_documents {
                    break;
                }
                if !papers.iter().any(|p| p.id == hit.paper.id) {
                    step.new_papers.push(hit.paper.arxiv_id.clone());
                    papers.push(hit.paper);
                }
            }
            steps.push(step);
        }
        Ok((papers, steps))
    }

    /// Write a note per paper, four at a time. Failed reads are left out.
    async fn read(&self, model: &dyn ChatModel, goal: &str, papers: &[Paper]) -> Vec<AgentNote> {
        let reads: Vec<_> = papers
            .iter()
            .enumerate()
            .map(|(i, paper)| async move {
                let messages = [
                    ChatMessage::system(READER_PROMPT),
                    ChatMessage::user(format!("Research goal: {goal}\n\n{}", source_block(1, paper))),
                ];
                match model.complete(&messages).await {
                    Ok(note) => Some(AgentNote { source: ChatSource::from_paper(i + 1, paper), note }),
                    Err(e) => {
                        tracing::warn!(arxiv_id = %paper.arxiv_id, error = %e, "Could not read paper");
                        None
                    }
                }
            })
            .collect();
        let results: Vec<Option<AgentNote>> = stream::iter(reads)
            .buffered(READ_CONCURRENCY)
            .collect()
            .await;

        // Renumber so note numbers stay contiguous after failures.
        results
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(i, mut note)| {
                note.source.index = i + 1;
                note
            })
            .collect()
    }

    async fn synthesize(
        &self,
        model: &dyn ChatModel,
        goal: &str,
        notes: &[AgentNote],
    ) -> ToolResult<(String, Vec<ChatSource>, usize)> {
        let numbered = notes
            .iter()
            .map(|n| format!("[{}] {} (arXiv:{})\n{}", n.source.index, n.source.title, n.source.arxiv_id, n.note))
            .collect::<Vec<_>>()
            .join("\n\n");
        let messages = [
            ChatMessage::system(SYNTHESIS_PROMPT),
            ChatMessage::user(format!("Research goal: {}\n\nNotes:\n\n{numbered}", goal.trim())),
        ];

        let raw = model.complete(&messages).await?;
        let sources: Vec<ChatSource> = notes.iter().map(|n| n.source.clone()).collect();
        let checked = check_citations(&raw, sources.len());
        let citations = resolve_citations(&sources, &checked);
        Ok((checked.text, citations, checked.dropped))
    }
}

impl std::fmt::Debug for ResearchAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchAgent").field("model", &self.model.as_ref().map(|m| m.name())).finish()
    }
}

/// A leading list marker: `1.`, `2)` or a bullet, followed by whitespace.
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+[.)]|[-*•])(?:\s+|$)").expect("valid regex"));

/// Turn a planner reply into at most `max` distinct queries.
#[must_use]
pub fn parse_plan(reply: &str, max: usize) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for line in reply.lines() {
        let line = line.trim();
        let query = LIST_MARKER.find(line).map_or(line, |m| &line[m.end()..]).trim_matches('"').trim();
        if query.is_empty() || queries.iter().any(|q| q.eq_ignore_ascii_case(query)) {
            continue;
        }
        queries.push(query.to_string());
        if queries.len() == max {
            break;
        }
    }
    queries
}
