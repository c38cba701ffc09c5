//! Stdio transport for MCP protocol.
//!
//! Newline-delimited JSON-RPC 2.0 over stdin/stdout. Logs go to stderr.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::transport::dispatch_str;
use crate::tools::{McpTool, ToolContext};

/// Handle MCP protocol over the process's stdin and stdout.
pub async fn run_stdio(tools: Vec<Box<dyn McpTool>>, ctx: ToolContext) -> anyhow::Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();
    serve_lines(reader, writer, &tools, &ctx).await
}

/// Serve requests from `reader` until EOF, writing one reply line per request.
pub async fn serve_lines<R, W>(
    reader: R,
    mut writer: W,
    tools: &[Box<dyn McpTool>],
    ctx: &ToolContext,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    tracing::info!("MCP stdio server ready, waiting for requests...");

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some(response) = dispatch_str(trimmed, tools, ctx).await else {
            continue;
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    tracing::info!("Stdin closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::search::SearchEngine;
    use crate::store::Store;
    use crate::tools::register_all_tools;

    #[tokio::test]
    async fn test_serve_lines_replies_per_request() {
        let engine = Arc::new(SearchEngine::open(Store::open_in_memory().unwrap()).unwrap());
        let ctx = ToolContext::new(engine, None, None);
        let tools = register_all_tools();

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        );
        let mut output = Vec::new();
        serve_lines(input.as_bytes(), &mut output, &tools, &ctx).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let replies: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["result"]["tools"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_serve_lines_writes_exact_frames() {
        let engine = Arc::new(SearchEngine::open(Store::open_in_memory().unwrap()).unwrap());
        let ctx = ToolContext::new(engine, None, None);
        let tools = register_all_tools();

        let reader = tokio_test::io::Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":7,")
            .read(b"\"method\":\"ping\"}\n")
            .build();
        let writer = tokio_test::io::Builder::new()
            .write(br#"{"jsonrpc":"2.0","result":{},"id":7}"#)
            .write(b"\n")
            .build();

        serve_lines(BufReader::new(reader), writer, &tools, &ctx).await.unwrap();
    }
}
