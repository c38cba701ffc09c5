//! Enrichment tools: enrich_paper.

use serde_json::json;

use super::{McpTool, ToolContext};
use crate::error::{ToolError, ToolResult};
use crate::formatters;
use crate::models::{ArxivId, Paper, PaperIdInput, ResponseFormat};

/// Refresh one paper's metadata from arXiv and return the stored record.
///
/// Shared by the tool and `POST /api/papers/{id}/enrich`.
pub async fn enrich_paper(ctx: &ToolContext, arxiv_id: &str) -> ToolResult<(Paper, bool)> {
    let arxiv_id = arxiv_id.trim();
    if ctx.engine.paper(arxiv_id)?.is_none() {
        return Err(ToolError::not_found(arxiv_id));
    }
    if !ArxivId::new(arxiv_id).is_arxiv() {
        return Err(ToolError::validation("arxivId", "local papers have no arXiv metadata"));
    }
    if !ctx.enricher.is_online() {
        return Err(ToolError::unavailable("metadata enrichment is disabled in offline mode"));
    }

    let updated = ctx.enricher.enrich(&[arxiv_id.to_string()]).await > 0;
    let paper = ctx.engine.paper(arxiv_id)?.ok_or_else(|| ToolError::not_found(arxiv_id))?;
    Ok((paper, updated))
}

/// Metadata enrichment for one paper.
pub struct EnrichPaperTool;

#[async_trait::async_trait]
impl McpTool for EnrichPaperTool {
    fn name(&self) -> &'static str {
        "enrich_paper"
    }

    fn description(&self) -> &'static str {
        "Fetch title, authors, abstract, categories and DOI for an indexed paper \
         from the arXiv API and store them."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "arxivId": {
                    "type": "string",
                    "description": "arXiv id of an indexed paper"
                },
                "responseFormat": {
                    "type": "string",
                    "enum": ["markdown", "json"],
                    "default": "markdown"
                }
            },
            "required": ["arxivId"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String> {
        let params: PaperIdInput = serde_json::from_value(input)?;
        let (paper, updated) = enrich_paper(ctx, &params.arxiv_id).await?;

        match params.response_format {
            ResponseFormat::Markdown => {
                let status = if updated { "Metadata updated from arXiv." } else { "arXiv returned no metadata." };
                Ok(format!("{status}\n\n{}", formatters::format_paper_markdown(&paper, 0)))
            }
            ResponseFormat::Json => Ok(serde_json::to_string_pretty(&json!({
                "updated": updated,
                "paper": paper,
            }))?),
        }
    }
}
