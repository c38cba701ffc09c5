//! Search tools: search_papers, get_paper, tokenize_query, index_stats.

use serde_json::json;

use super::{McpTool, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::formatters;
use crate::latex::{parse_query, tokenize};
use crate::models::{IndexStatsInput, PaperIdInput, ResponseFormat, SearchPapersInput, TokenizeInput};

fn response_format_schema() -> serde_json::Value {
    json!({
        "type": "string",
        "enum": ["markdown", "json"],
        "default": "markdown"
    })
}

/// Ranked search over the local index.
pub struct SearchPapersTool;

#[async_trait::async_trait]
impl McpTool for SearchPapersTool {
    fn name(&self) -> &'static str {
        "search_papers"
    }

    fn description(&self) -> &'static str {
        "Search locally indexed papers. Queries may mix words and LaTeX math \
         such as $\\zeta(s)$ or \\mathbb{Z}. Ranks with BM25, TF-IDF or both fused (dual)."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search text, optionally with LaTeX"
                },
                "mode": {
                    "type": "string",
                    "enum": ["dual", "bm25", "tfidf"],
                    "default": "dual"
                },
                "limit": {
                    "type": "integer",
                    "default": 20,
                    "minimum": 1,
                    "maximum": 100
                },
                "offset": {
                    "type": "integer",
                    "default": 0,
                    "minimum": 0
                },
                "yearFrom": {"type": "integer"},
                "yearTo": {"type": "integer"},
                "category": {
                    "type": "string",
                    "description": "Category prefix, e.g. math.NT or math"
                },
                "responseFormat": response_format_schema()
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: SearchPapersInput = serde_json::from_value(input)?;
        let response = ctx.engine.search_blocking(params.request).await?;

        match params.response_format {
            ResponseFormat::Markdown => Ok(formatters::format_search_markdown(&response)),
            ResponseFormat::Json => Ok(serde_json::to_string_pretty(&formatters::compact_search(&response))?),
        }
    }
}

/// Full record of one indexed paper.
pub struct GetPaperTool;

#[async_trait::async_trait]
impl McpTool for GetPaperTool {
    fn name(&self) -> &'static str {
        "get_paper"
    }

    fn description(&self) -> &'static str {
        "Get the stored metadata and abstract of one indexed paper by arXiv id."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "arxivId": {
                    "type": "string",
                    "description": "arXiv id, e.g. 2101.00001 or math/0601001"
                },
                "responseFormat": response_format_schema()
            },
            "required": ["arxivId"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: PaperIdInput = serde_json::from_value(input)?;
        let arxiv_id = params.arxiv_id.trim();
        let paper = ctx.engine.paper(arxiv_id)?.ok_or_else(|| ToolError::not_found(arxiv_id))?;

        match params.response_format {
            ResponseFormat::Markdown => Ok(formatters::format_paper_markdown(&paper, 0)),
            ResponseFormat::Json => Ok(serde_json::to_string_pretty(&paper)?),
        }
    }
}

/// Shows how text is tokenized and how a query is parsed.
pub struct TokenizeQueryTool;

#[async_trait::async_trait]
impl McpTool for TokenizeQueryTool {
    fn name(&self) -> &'static str {
        "tokenize_query"
    }

    fn description(&self) -> &'static str {
        "Debug the LaTeX-aware tokenizer: list the tokens of some text and the \
         weighted terms a search for it would use."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text or query to tokenize"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, _ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: TokenizeInput = serde_json::from_value(input)?;
        let tokens = tokenize(&params.text);
        let terms = parse_query(&params.text);
        Ok(formatters::format_tokens_markdown(&params.text, &tokens, &terms))
    }
}

/// Counts describing the store and the in-memory index.
pub struct IndexStatsTool;

#[async_trait::async_trait]
impl McpTool for IndexStatsTool {
    fn name(&self) -> &'static str {
        "index_stats"
    }

    fn description(&self) -> &'static str {
        "Report how many papers are indexed and enriched, with term and posting counts."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "responseFormat": response_format_schema()
            }
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: IndexStatsInput =
            if input.is_null() { IndexStatsInput::default() } else { serde_json::from_value(input)? };
        let stats = ctx.engine.stats()?;

        match params.response_format {
            ResponseFormat::Markdown => Ok(formatters::format_stats_markdown(&stats)),
            ResponseFormat::Json => Ok(serde_json::to_string_pretty(&stats)?),
        }
    }
}
