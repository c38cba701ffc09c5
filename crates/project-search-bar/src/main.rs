//! ProjectSearchBar - Entry Point
//!
//! Serves the HTTP API and MCP, and runs indexing, harvesting and search from
//! the command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use project_search_bar::{
    ArxivClient, Config, SearchEngine,
    client::{Enricher, HarvestOptions, Harvester},
    formatters,
    ingest::Ingestor,
    latex::{parse_query, tokenize},
    models::RankingMode,
    search::SearchRequest,
    server::Server,
    store::Store,
    tools::ToolContext,
};

#[derive(Parser, Debug)]
#[command(name = "project-search-bar")]
#[command(about = "Local academic paper search with LaTeX-aware querying")]
#[command(version)]
struct Cli {
    /// Data directory (database, vectors, papers)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and UI, or MCP over stdio
    Serve {
        /// Bind host
        #[arg(long)]
        host: Option<String>,

        /// Bind port
        #[arg(long)]
        port: Option<u16>,

        /// Speak MCP over stdin/stdout instead of HTTP
        #[arg(long)]
        stdio: bool,
    },

    /// Index LaTeX sources and enrich them from arXiv
    Index {
        /// Directory of .tex files, e-print archives or source directories
        #[arg(long)]
        papers: Option<PathBuf>,

        /// Skip arXiv metadata enrichment
        #[arg(long)]
        offline: bool,
    },

    /// Harvest e-print sources listed by arXiv OAI-PMH
    Download {
        /// Output directory (defaults to the papers directory)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Stop after this many downloads
        #[arg(long, default_value_t = 50_000)]
        max: usize,

        /// Lower datestamp (YYYY-MM-DD)
        #[arg(long, default_value = "2010-01-01")]
        from: String,

        /// Upper datestamp (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// OAI set, e.g. math or cs
        #[arg(long, default_value = "math")]
        set: String,

        /// Seconds to pause between downloads
        #[arg(long, default_value_t = 2.5)]
        sleep: f64,
    },

    /// Search the local index
    Search {
        /// Query text, may contain LaTeX
        query: String,

        /// Ranking: dual, bm25 or tfidf
        #[arg(long, default_value = "dual")]
        mode: RankingMode,

        /// Number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Print JSON instead of Markdown
        #[arg(long)]
        json: bool,
    },

    /// Show how text is tokenized
    Tokenize {
        /// Text or query
        text: String,
    },

    /// Enrich papers that have no arXiv metadata yet
    Enrich {
        /// Maximum papers to enrich
        #[arg(long, default_value_t = 200)]
        limit: usize,
    },
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

/// Environment configuration with the global flags applied.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::from_lookup(|key| std::env::var(key).ok());
    if let Some(dir) = &cli.data_dir {
        if config.papers_dir == config.data_dir.join("papers") {
            config.papers_dir = dir.join("papers");
        }
        config.data_dir.clone_from(dir);
    }
    config.ensure_dirs()?;
    Ok(config)
}

fn open_engine(config: &Config) -> anyhow::Result<Arc<SearchEngine>> {
    let store = Store::open(&config.db_path())?;
    Ok(Arc::new(SearchEngine::open(store)?))
}

fn arxiv_client(config: &Config) -> anyhow::Result<Option<ArxivClient>> {
    if config.offline { Ok(None) } else { Ok(Some(ArxivClient::new(config)?)) }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = load_config(&cli)?;
    tracing::debug!(data_dir = %config.data_dir.display(), "Configuration loaded");

    match cli.command {
        Command::Serve { host, port, stdio } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                stdio,
                "Starting ProjectSearchBar server"
            );

            let server = Server::new(ToolContext::from_config(&config)?);
            if stdio {
                server.run_stdio().await?;
            } else {
                server.run_http(&config.bind_addr(), config.ui_dir.clone()).await?;
            }
        }

        Command::Index { papers, offline } => {
            config.offline |= offline;
            let dir = papers.unwrap_or_else(|| config.papers_dir.clone());

            let engine = open_engine(&config)?;
            let enricher = Enricher::new(arxiv_client(&config)?, Arc::clone(&engine));
            let report = Ingestor::new(engine, enricher).run(&dir).await?;

            println!(
                "Indexed {} papers ({} unchanged, {} failed, {} enriched)",
                report.indexed, report.unchanged, report.failed, report.enriched
            );
        }

        Command::Download { out, max, from, until, set, sleep } => {
            let out = out.unwrap_or_else(|| config.papers_dir.clone());
            std::fs::create_dir_all(&out)?;

            let options = HarvestOptions {
                out,
                max,
                from: Some(from),
                until,
                set: Some(set).filter(|s| !s.is_empty()),
                delay: Duration::from_secs_f64(sleep.max(0.0)),
            };
            let report = Harvester::new(ArxivClient::new(&config)?).run(&options).await;

            println!(
                "Downloaded {} ({} skipped, {} failed) over {} listing pages",
                report.downloaded, report.skipped, report.failed, report.pages
            );
            if let Some(error) = report.error {
                anyhow::bail!("harvest stopped early: {error}");
            }
        }

        Command::Search { query, mode, limit, json } => {
            let engine = open_engine(&config)?;
            let request = SearchRequest::new(query).with_mode(mode).with_limit(limit);
            let response = engine.search(&request).map_err(|e| anyhow::anyhow!(e.to_user_message()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&formatters::compact_search(&response))?);
            } else {
                println!("{}", formatters::format_search_markdown(&response));
            }
        }

        Command::Tokenize { text } => {
            let tokens = tokenize(&text);
            let terms = parse_query(&text);
            println!("{}", formatters::format_tokens_markdown(&text, &tokens, &terms));
        }

        Command::Enrich { limit } => {
            let engine = open_engine(&config)?;
            let Some(client) = arxiv_client(&config)? else {
                anyhow::bail!("offline mode is enabled; unset PROJECTSEARCHBAR_OFFLINE to enrich");
            };
            let enriched = Enricher::new(Some(client), engine).enrich_pending(limit).await;
            println!("Enriched {enriched} papers");
        }
    }

    Ok(())
}
