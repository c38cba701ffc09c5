//! Research tools: ask_papers, research_agent.

use serde_json::json;

use super::{McpTool, ToolContext};
use crate::error::ToolResult;
use crate::formatters;
use crate::models::{AskPapersInput, ResearchAgentInput, ResponseFormat};

/// Question answering grounded in indexed papers.
pub struct AskPapersTool;

#[async_trait::async_trait]
impl McpTool for AskPapersTool {
    fn name(&self) -> &'static str {
        "ask_papers"
    }

    fn description(&self) -> &'static str {
        "Answer a question from indexed papers. The answer cites its sources as [n]; \
         citations to papers that were not provided are removed. Requires a configured chat model."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "question": {"type": "string"},
                "paperIds": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Use these papers instead of searching"
                },
                "topK": {
                    "type": "integer",
                    "default": 5,
                    "minimum": 1,
                    "maximum": 20
                },
                "history": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "role": {"type": "string", "enum": ["user", "assistant"]},
                            "content": {"type": "string"}
                        },
                        "required": ["role", "content"]
                    }
                },
                "responseFormat": {
                    "type": "string",
                    "enum": ["markdown", "json"],
                    "default": "markdown"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: AskPapersInput = serde_json::from_value(input)?;
        let answer = ctx.chat.ask(&params.request).await?;

        match params.response_format {
            ResponseFormat::Markdown => Ok(formatters::format_chat_markdown(&answer)),
            ResponseFormat::Json => Ok(serde_json::to_string_pretty(&answer)?),
        }
    }
}

/// Plan, retrieve, read and synthesize across several papers.
pub struct ResearchAgentTool;

#[async_trait::async_trait]
impl McpTool for ResearchAgentTool {
    fn name(&self) -> &'static str {
        "research_agent"
    }

    fn description(&self) -> &'static str {
        "Research a goal across several indexed papers: plans searches, reads each paper \
         and writes a cited summary. Slower than ask_papers; requires a configured chat model."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "goal": {"type": "string"},
                "paperIds": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Papers to read regardless of search results"
                },
                "maxQueries": {"type": "integer", "default": 3, "minimum": 1, "maximum": 6},
                "perQuery": {"type": "integer", "default": 4, "minimum": 1},
                "maxDocuments": {"type": "integer", "default": 8, "minimum": 1, "maximum": 16},
                "responseFormat": {
                    "type": "string",
                    "enum": ["markdown", "json"],
                    "default": "markdown"
                }
            },
            "required": ["goal"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: ResearchAgentInput = serde_json::from_value(input)?;
        let report = ctx.agent.run(&params.request).await?;

        match params.response_format {
            ResponseFormat::Markdown => Ok(formatters::format_agent_markdown(&report)),
            ResponseFormat::Json => Ok(serde_json::to_string_pretty(&report)?),
        }
    }
}
