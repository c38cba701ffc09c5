//! MCP tool implementations.
//!
//! Each tool:
//! 1. Parses and validates its JSON arguments
//! 2. Calls the search engine, chat service, agent or enricher
//! 3. Formats the result as Markdown or JSON
//!
//! The HTTP API calls the same services through [`ToolContext`].

mod enrichment;
mod research;
mod search;

pub use enrichment::*;
pub use research::*;
pub use search::*;

use std::sync::Arc;

use crate::agent::ResearchAgent;
use crate::chat::{ChatModel, ChatService, OpenAiChat};
use crate::client::{ArxivClient, Enricher};
use crate::config::Config;
use crate::error::ToolResult;
use crate::search::SearchEngine;
use crate::store::Store;

/// Tool execution context.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Store and in-memory index.
    pub engine: Arc<SearchEngine>,

    /// arXiv metadata enrichment (a no-op offline).
    pub enricher: Enricher,

    /// Grounded question answering.
    pub chat: ChatService,

    /// Multi-document research agent.
    pub agent: ResearchAgent,
}

impl ToolContext {
    /// Create a context from already-built parts.
    #[must_use]
    pub fn new(
        engine: Arc<SearchEngine>,
        client: Option<ArxivClient>,
        model: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        Self {
            enricher: Enricher::new(client, Arc::clone(&engine)),
            chat: ChatService::new(Arc::clone(&engine), model.clone()),
            agent: ResearchAgent::new(Arc::clone(&engine), model),
            engine,
        }
    }

    /// Open the store and build every service the configuration enables.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or an HTTP client fails to build.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = Store::open(&config.db_path())?;
        let engine = Arc::new(SearchEngine::open(store)?);

        let client = if config.offline { None } else { Some(ArxivClient::new(config)?) };
        let model: Option<Arc<dyn ChatModel>> = match &config.llm {
            Some(llm) => Some(Arc::new(OpenAiChat::new(llm)?)),
            None => None,
        };

        tracing::info!(
            offline = config.offline,
            chat = ?model.as_ref().map(|m| m.name()),
            "Services ready"
        );
        Ok(Self::new(engine, client, model))
    }
}

/// Trait for MCP tools.
#[async_trait::async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name (e.g., "search_papers").
    fn name(&self) -> &'static str;

    /// Tool description for LLM.
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with given input.
    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult<String>;
}

/// Register all tools.
#[must_use]
pub fn register_all_tools() -> Vec<Box<dyn McpTool>> {
    vec![
        // Search tools (4)
        Box::new(search::SearchPapersTool),
        Box::new(search::GetPaperTool),
        Box::new(search::TokenizeQueryTool),
        Box::new(search::IndexStatsTool),
        // Research tools (2)
        Box::new(research::AskPapersTool),
        Box::new(research::ResearchAgentTool),
        // Enrichment tools (1)
        Box::new(enrichment::EnrichPaperTool),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_are_unique() {
        let tools = register_all_tools();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), tools.len());
        assert_eq!(tools.len(), 7);
    }

    #[test]
    fn test_schemas_are_objects() {
        for tool in register_all_tools() {
            let schema = tool.input_schema();
            assert_eq!(schema["type"], "object", "{}", tool.name());
            assert!(!tool.description().is_empty());
        }
    }
}
