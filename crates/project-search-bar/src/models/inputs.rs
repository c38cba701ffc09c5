//! Request models for search, chat, the research agent and the tools.
//!
//! Each request deserializes from the JSON bodies of the HTTP API and from
//! MCP `tools/call` arguments, and validates itself before use.

use serde::{Deserialize, Serialize};

use super::{RankingMode, ResponseFormat};
use crate::config::ranking;
use crate::error::{ToolError, ToolResult};

/// A search over the local index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free text; may contain inline math such as `$\zeta(s)$`.
    #[serde(alias = "q")]
    pub query: String,

    /// Score used for ordering.
    #[serde(default)]
    pub mode: RankingMode,

    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Number of ranked hits to skip.
    #[serde(default)]
    pub offset: usize,

    /// Minimum publication year (inclusive).
    #[serde(default)]
    pub year_from: Option<i32>,

    /// Maximum publication year (inclusive).
    #[serde(default)]
    pub year_to: Option<i32>,

    /// Category prefix filter (e.g. `math.NT` or `math`).
    #[serde(default)]
    pub category: Option<String>,
}

fn default_limit() -> usize {
    ranking::DEFAULT_LIMIT
}

impl SearchRequest {
    /// A request with default paging and dual ranking.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: RankingMode::default(),
            limit: ranking::DEFAULT_LIMIT,
            offset: 0,
            year_from: None,
            year_to: None,
            category: None,
        }
    }

    /// Set the ranking mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: RankingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Check the request before it reaches the index.
    pub fn validate(&self) -> ToolResult<()> {
        if self.query.trim().is_empty() {
            return Err(ToolError::validation("query", "cannot be empty"));
        }
        if self.limit == 0 || self.limit > ranking::MAX_LIMIT {
            return Err(ToolError::validation(
                "limit",
                format!("must be between 1 and {}", ranking::MAX_LIMIT),
            ));
        }
        if let (Some(from), Some(to)) = (self.year_from, self.year_to) {
            if from > to {
                return Err(ToolError::validation("yearFrom", "must not be after yearTo"));
            }
        }
        Ok(())
    }
}

/// Input for the `search_papers` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPapersInput {
    #[serde(flatten)]
    pub request: SearchRequest,

    /// Output format.
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Input for tools addressing a single paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperIdInput {
    /// arXiv id as indexed (e.g. `2101.00001` or `math/0601001`).
    pub arxiv_id: String,

    /// Output format.
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Input for the debug tokenizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeInput {
    /// Text or query to tokenize.
    #[serde(alias = "q")]
    pub text: String,
}

/// A chat message in OpenAI role/content form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// A grounded chat question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub question: String,

    /// Restrict the sources to these papers instead of searching.
    #[serde(default)]
    pub paper_ids: Option<Vec<String>>,

    /// Earlier turns of the conversation.
    #[serde(default)]
    pub history: Vec<ChatMessage>,

    /// Number of papers retrieved when `paper_ids` is absent.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl ChatRequest {
    pub const MAX_TOP_K: usize = 20;

    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), paper_ids: None, history: Vec::new(), top_k: 5 }
    }

    pub fn validate(&self) -> ToolResult<()> {
        if self.question.trim().is_empty() {
            return Err(ToolError::validation("question", "cannot be empty"));
        }
        if self.top_k == 0 || self.top_k > Self::MAX_TOP_K {
            return Err(ToolError::validation(
                "topK",
                format!("must be between 1 and {}", Self::MAX_TOP_K),
            ));
        }
        if matches!(&self.paper_ids, Some(ids) if ids.is_empty()) {
            return Err(ToolError::validation("paperIds", "cannot be an empty list"));
        }
        Ok(())
    }
}

/// A research agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    /// What the user wants to learn.
    pub goal: String,

    /// Papers that must be read regardless of search results.
    #[serde(default)]
    pub paper_ids: Option<Vec<String>>,

    /// Upper bound on planned search queries.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Hits taken from each query.
    #[serde(default = "default_per_query")]
    pub per_query: usize,

    /// Upper bound on papers read.
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
}

fn default_max_queries() -> usize {
    3
}

fn default_per_query() -> usize {
    4
}

fn default_max_documents() -> usize {
    8
}

impl AgentRequest {
    pub const MAX_QUERIES: usize = 6;
    pub const MAX_DOCUMENTS: usize = 16;

    #[must_use]
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            paper_ids: None,
            max_queries: default_max_queries(),
            per_query: default_per_query(),
            max_documents: default_max_documents(),
        }
    }

    pub fn validate(&self) -> ToolResult<()> {
        if self.goal.trim().is_empty() {
            return Err(ToolError::validation("goal", "cannot be empty"));
        }
        if self.max_queries == 0 || self.max_queries > Self::MAX_QUERIES {
            return Err(ToolError::validation(
                "maxQueries",
                format!("must be between 1 and {}", Self::MAX_QUERIES),
            ));
        }
        if self.per_query == 0 || self.per_query > ranking::MAX_LIMIT {
            return Err(ToolError::validation("perQuery", "must be positive"));
        }
        if self.max_documents == 0 || self.max_documents > Self::MAX_DOCUMENTS {
            return Err(ToolError::validation(
                "maxDocuments",
                format!("must be between 1 and {}", Self::MAX_DOCUMENTS),
            ));
        }
        Ok(())
    }
}

/// Input for the `ask_papers` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskPapersInput {
    #[serde(flatten)]
    pub request: ChatRequest,

    /// Output format.
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Input for the `research_agent` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchAgentInput {
    #[serde(flatten)]
    pub request: AgentRequest,

    /// Output format.
    #[serde(default)]
    pub response_format: ResponseFormat,
}

/// Input for `index_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatsInput {
    /// Output format.
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults_from_json() {
        let req: SearchRequest = serde_json::from_str(r#"{"q": "zeta"}"#).unwrap();
        assert_eq!(req.query, "zeta");
        assert_eq!(req.limit, 20);
        assert_eq!(req.mode, RankingMode::Dual);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_search_request_validation() {
        assert!(SearchRequest::new("  ").validate().is_err());
        assert!(SearchRequest::new("x").with_limit(0).validate().is_err());
        assert!(SearchRequest::new("x").with_limit(101).validate().is_err());

        let mut req = SearchRequest::new("x");
        req.year_from = Some(2020);
        req.year_to = Some(2010);
        let err = req.validate().unwrap_err();
        assert!(err.to_user_message().contains("yearFrom"));
    }

    #[test]
    fn test_search_papers_input_flattens() {
        let input: SearchPapersInput = serde_json::from_value(serde_json::json!({
            "query": "elliptic curves",
            "mode": "bm25",
            "responseFormat": "json"
        }))
        .unwrap();
        assert_eq!(input.request.mode, RankingMode::Bm25);
        assert!(input.response_format.is_json());
    }

    #[test]
    fn test_chat_request_validation() {
        assert!(ChatRequest::new("what is a modular form?").validate().is_ok());
        assert!(ChatRequest::new("").validate().is_err());

        let mut req = ChatRequest::new("q");
        req.paper_ids = Some(vec![]);
        assert!(req.validate().is_err());

        req.paper_ids = None;
        req.top_k = 21;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_agent_request_bounds() {
        assert!(AgentRequest::new("survey sieve methods").validate().is_ok());

        let mut req = AgentRequest::new("goal");
        req.max_queries = 7;
        assert!(req.validate().is_err());

        let mut req = AgentRequest::new("goal");
        req.max_documents = 17;
        assert!(req.validate().is_err());
    }
}
