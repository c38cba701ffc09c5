//! Server: HTTP (JSON API, MCP endpoint, static UI) and MCP over stdio.

pub mod api;
pub mod stdio;
pub mod transport;

use std::path::PathBuf;

use crate::tools::{self, McpTool, ToolContext};

pub use api::{ApiError, create_router};

/// Server holding the tool context and the registered tools.
pub struct Server {
    /// Tool execution context.
    ctx: ToolContext,

    /// Registered tools.
    tools: Vec<Box<dyn McpTool>>,
}

impl Server {
    /// Create a server with every tool registered.
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx, tools: tools::register_all_tools() }
    }

    /// Run MCP over stdin/stdout until EOF.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        tracing::info!("Starting MCP server in stdio mode");
        tracing::info!("Registered {} tools", self.tools.len());

        stdio::run_stdio(self.tools, self.ctx).await
    }

    /// Run the HTTP server until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound or the server fails.
    pub async fn run_http(self, addr: &str, ui_dir: Option<PathBuf>) -> anyhow::Result<()> {
        tracing::info!("Registered {} tools", self.tools.len());

        let router = self.into_router(ui_dir);
        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }

    /// Build the HTTP router without binding.
    #[must_use]
    pub fn into_router(self, ui_dir: Option<PathBuf>) -> axum::Router {
        create_router(self.tools, self.ctx, ui_dir)
    }

    /// List all available tools.
    #[must_use]
    pub fn list_tools(&self) -> Vec<(&str, &str)> {
        self.tools.iter().map(|t| (t.name(), t.description())).collect()
    }

    /// Get tool context for execution.
    #[must_use]
    pub const fn context(&self) -> &ToolContext {
        &self.ctx
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("tools", &self.tools.len()).finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
