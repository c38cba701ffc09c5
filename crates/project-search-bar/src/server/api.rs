//! HTTP API routes.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::transport::{self, JsonRpcRequest, JsonRpcResponse, codes};
use crate::agent::AgentReport;
use crate::chat::ChatAnswer;
use crate::config::server::MAX_CONCURRENT_REQUESTS;
use crate::error::{StoreError, ToolError};
use crate::latex::{QueryTerm, Token, parse_query, tokenize};
use crate::models::{AgentRequest, ArxivId, ChatRequest, Paper};
use crate::search::{IndexStats, SearchRequest, SearchResponse};
use crate::tools::{self, McpTool, ToolContext};

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub tools: Vec<Box<dyn McpTool>>,
    pub ctx: ToolContext,
}

/// A [`ToolError`] rendered as `{"error": message}` with its status code.
#[derive(Debug)]
pub struct ApiError(pub ToolError);

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(ToolError::validation("query string", rejection.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ToolError::validation("body", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_user_message() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Create the HTTP router: JSON API, MCP endpoint and the optional static UI.
pub fn create_router(tools: Vec<Box<dyn McpTool>>, ctx: ToolContext, ui_dir: Option<PathBuf>) -> Router {
    let state = Arc::new(HttpState { tools, ctx });

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/stats", get(stats))
        .route("/api/search", get(search))
        .route("/api/papers/{*path}", get(get_paper).post(paper_action))
        .route("/api/debug/tokenize", get(debug_tokenize))
        .route("/api/chat", post(chat))
        .route("/api/agent", post(agent))
        .route("/mcp", post(handle_mcp_post))
        .with_state(state);

    let router = match ui_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Serving static UI");
            router.fallback_service(ServeDir::new(dir))
        }
        None => router.fallback(not_found),
    };

    router
        .layer(GlobalConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
            tracing::info_span!(
                "http",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %uuid::Uuid::new_v4()
            )
        }))
}

async fn health_check(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "project-search-bar",
        "version": env!("CARGO_PKG_VERSION"),
        "chat": state.ctx.chat.is_available(),
        "online": state.ctx.enricher.is_online(),
        "tools": state.tools.len()
    }))
}

async fn not_found() -> ApiError {
    ApiError(ToolError::not_found("route"))
}

async fn stats(State(state): State<Arc<HttpState>>) -> ApiResult<IndexStats> {
    Ok(Json(state.ctx.engine.stats()?))
}

async fn search(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<SearchRequest>, QueryRejection>,
) -> ApiResult<SearchResponse> {
    let Query(request) = query?;
    Ok(Json(state.ctx.engine.search_blocking(request).await?))
}

/// Accepts `math/0601001` as well as the file-name form `math_0601001`.
fn normalize_id(raw: &str) -> String {
    ArxivId::from_file_name(raw.trim().trim_matches('/')).as_str().to_string()
}

async fn get_paper(State(state): State<Arc<HttpState>>, Path(path): Path<String>) -> ApiResult<Paper> {
    let arxiv_id = normalize_id(&path);
    let paper = state.ctx.engine.paper(&arxiv_id)?.ok_or_else(|| ToolError::not_found(arxiv_id))?;
    Ok(Json(paper))
}

async fn paper_action(
    State(state): State<Arc<HttpState>>,
    Path(path): Path<String>,
) -> ApiResult<serde_json::Value> {
    let Some(id) = path.strip_suffix("/enrich") else {
        return Err(ApiError(ToolError::not_found(format!("action on {path}"))));
    };
    let (paper, updated) = tools::enrich_paper(&state.ctx, &normalize_id(id)).await?;
    Ok(Json(serde_json::json!({ "updated": updated, "paper": paper })))
}

#[derive(Debug, Deserialize)]
struct TokenizeQuery {
    #[serde(alias = "text")]
    q: String,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenizeResponse {
    text: String,
    tokens: Vec<Token>,
    keys: Vec<String>,
    query_terms: Vec<QueryTerm>,
}

async fn debug_tokenize(query: Result<Query<TokenizeQuery>, QueryRejection>) -> ApiResult<TokenizeResponse> {
    let Query(query) = query?;
    let tokens = tokenize(&query.q);
    let keys = tokens.iter().map(Token::key).collect();
    let query_terms = parse_query(&query.q);
    Ok(Json(TokenizeResponse { text: query.q, tokens, keys, query_terms }))
}

async fn chat(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatAnswer> {
    let Json(request) = body?;
    Ok(Json(state.ctx.chat.ask(&request).await?))
}

async fn agent(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<AgentRequest>, JsonRejection>,
) -> ApiResult<AgentReport> {
    let Json(request) = body?;
    Ok(Json(state.ctx.agent.run(&request).await?))
}

/// Handle POST requests to /mcp (single-response streamable HTTP).
async fn handle_mcp_post(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<JsonRpcRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let reply = JsonRpcResponse::error(None, codes::PARSE_ERROR, rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(reply)).into_response();
        }
    };
    tracing::debug!(method = %req.method, "Handling MCP POST request");
    let is_initialize = req.method == "initialize";

    match transport::dispatch(req, &state.tools, &state.ctx).await {
        None => StatusCode::ACCEPTED.into_response(),
        Some(response) => {
            let mut res = Json(response).into_response();
            if is_initialize {
                if let Ok(value) = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()) {
                    res.headers_mut().insert("Mcp-Session-Id", value);
                }
            }
            res
        }
    }
}
