//! arXiv API client.
//!
//! Provides async HTTP access with:
//! - Retry middleware with exponential backoff
//! - A shared rate limiter honouring arXiv's request spacing
//! - Metadata response caching
//! - Streaming e-print downloads written atomically

mod enrich;
mod harvest;
mod parse;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use moka::future::Cache;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tokio::io::AsyncWriteExt;

pub use enrich::Enricher;
pub use harvest::{HarvestOptions, HarvestReport, Harvester};
pub use parse::{OaiPage, parse_atom, parse_list_records, unescape_xml};

use crate::config::{Config, arxiv};
use crate::error::{ClientError, ClientResult};
use crate::models::{ArxivId, ArxivMetadata};

/// Parameters of one OAI-PMH `ListRecords` call.
#[derive(Debug, Clone, Default)]
pub struct ListRecordsRequest {
    /// OAI set, e.g. `math` or `cs`.
    pub set: Option<String>,
    /// Inclusive lower datestamp (`YYYY-MM-DD`).
    pub from: Option<String>,
    /// Inclusive upper datestamp.
    pub until: Option<String>,
    /// Continuation token from the previous page. When present the other
    /// fields are not sent.
    pub resumption_token: Option<String>,
}

/// Result of one e-print download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded,
    /// The file already exists and is non-empty.
    Skipped,
    /// Short reason, e.g. `http 404` or `content-type`.
    Failed(String),
}

/// arXiv API client.
#[derive(Clone)]
pub struct ArxivClient {
    /// HTTP client with middleware.
    client: ClientWithMiddleware,

    /// Atom responses keyed by request hash.
    cache: Cache<String, String>,

    /// Request spacing shared by every clone.
    limiter: Option<Arc<DefaultDirectRateLimiter>>,

    oai_url: String,
    atom_url: String,
    eprint_url: String,
    request_timeout: Duration,
    download_timeout: Duration,
    user_agent: String,
}

impl ArxivClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let user_agent = config.user_agent();
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, user_agent.parse()?);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_secs(1), Duration::from_secs(30))
            .build_with_max_retries(config.max_retries);

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let cache = Cache::builder()
            .max_capacity(config.cache_max_size)
            .time_to_live(config.cache_ttl.max(Duration::from_millis(1)))
            .build();

        let limiter = Quota::with_period(config.rate_limit_delay)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Ok(Self {
            client,
            cache,
            limiter,
            oai_url: config.oai_url.clone(),
            atom_url: config.atom_url.clone(),
            eprint_url: config.eprint_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
            download_timeout: config.download_timeout,
            user_agent,
        })
    }

    /// User-Agent sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Fetch Atom metadata for up to [`arxiv::METADATA_BATCH`] ids.
    ///
    /// Versions are stripped before the request; records come back keyed by
    /// their unversioned id.
    ///
    /// # Errors
    ///
    /// Returns error on API failure.
    pub async fn fetch_metadata(&self, ids: &[String]) -> ClientResult<Vec<ArxivMetadata>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > arxiv::METADATA_BATCH {
            return Err(ClientError::bad_request(format!(
                "at most {} ids per metadata request",
                arxiv::METADATA_BATCH
            )));
        }

        let id_list = ids.iter().map(|id| ArxivId::new(id.as_str()).base().to_string()).collect::<Vec<_>>();
        let params = vec![
            ("id_list".to_string(), id_list.join(",")),
            ("max_results".to_string(), id_list.len().to_string()),
        ];

        let body = self.get_text(&self.atom_url, &params, true).await?;
        Ok(parse_atom(&body))
    }

    /// Fetch one page of OAI-PMH `ListRecords` (`metadataPrefix=arXiv`).
    ///
    /// # Errors
    ///
    /// Returns error on API failure.
    pub async fn list_records(&self, request: &ListRecordsRequest) -> ClientResult<OaiPage> {
        let mut params = vec![("verb".to_string(), "ListRecords".to_string())];
        match &request.resumption_token {
            Some(token) => params.push(("resumptionToken".to_string(), token.clone())),
            None => {
                params.push(("metadataPrefix".to_string(), "arXiv".to_string()));
                if let Some(set) = &request.set {
                    params.push(("set".to_string(), set.clone()));
                }
                if let Some(from) = &request.from {
                    params.push(("from".to_string(), from.clone()));
                }
                if let Some(until) = &request.until {
                    params.push(("until".to_string(), until.clone()));
                }
            }
        }

        let body = self.get_text(&self.oai_url, &params, false).await?;
        Ok(parse_list_records(&body))
    }

    /// Download the LaTeX source of `id` into `out_dir` as `<stem>.tar.gz`.
    ///
    /// Never fails outright: problems are reported as [`DownloadOutcome::Failed`].
    pub async fn download_eprint(&self, id: &ArxivId, out_dir: &Path) -> DownloadOutcome {
        let target = out_dir.join(format!("{}.tar.gz", id.file_stem()));
        if tokio::fs::metadata(&target).await.is_ok_and(|m| m.len() > 0) {
            return DownloadOutcome::Skipped;
        }

        match self.fetch_eprint(id, &target).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(arxiv_id = %id, error = %e, "Download failed");
                DownloadOutcome::Failed(e.to_string())
            }
        }
    }

    async fn fetch_eprint(&self, id: &ArxivId, target: &Path) -> ClientResult<DownloadOutcome> {
        self.wait_turn().await;

        let url = format!("{}/{}", self.eprint_url, id.as_str());
        let mut response = self.client.get(&url).timeout(self.download_timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Ok(DownloadOutcome::Failed(format!("http {}", status.as_u16())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let Some(first) = response.chunk().await? else {
            return Ok(DownloadOutcome::Failed("empty".to_string()));
        };
        if !is_archive_type(&content_type) && looks_like_html(&first) {
            return Ok(DownloadOutcome::Failed("content-type".to_string()));
        }

        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let partial = target.with_extension("gz.part");
        let streamed = async {
            let written = stream_to_file(&mut response, &first, &partial).await?;
            tokio::fs::rename(&partial, target).await?;
            Ok::<_, ClientError>(written)
        }
        .await;
        let written = match streamed {
            Ok(written) => written,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&partial).await {
                    tracing::debug!(path = %partial.display(), error = %rm, "Could not remove partial download");
                }
                return Err(e);
            }
        };

        tracing::debug!(arxiv_id = %id, bytes = written, "Downloaded e-print");
        Ok(DownloadOutcome::Downloaded)
    }

    async fn wait_turn(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Make a GET request and return the body text.
    async fn get_text(&self, url: &str, params: &[(String, String)], cached: bool) -> ClientResult<String> {
        let cache_key = self.cache_key("GET", url, params);
        if cached {
            if let Some(body) = self.cache.get(&cache_key).await {
                return Ok(body);
            }
        }

        self.wait_turn().await;

        let response = self.client.get(url).query(params).send().await.map_err(|e| match e {
            reqwest_middleware::Error::Reqwest(inner) if inner.is_timeout() => {
                ClientError::Timeout(self.request_timeout)
            }
            other => other.into(),
        })?;
        let response = handle_response(response).await?;
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() { ClientError::Timeout(self.request_timeout) } else { e.into() }
        })?;

        if cached {
            self.cache.insert(cache_key, body.clone()).await;
        }
        Ok(body)
    }

    /// Generate cache key.
    fn cache_key(&self, method: &str, url: &str, params: &[(String, String)]) -> String {
        use md5::{Digest, Md5};

        let mut hasher = Md5::new();
        hasher.update(method.as_bytes());
        hasher.update(b"|");
        hasher.update(url.as_bytes());
        hasher.update(b"|");

        for (k, v) in params {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
            hasher.update(b"&");
        }

        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for ArxivClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArxivClient")
            .field("user_agent", &self.user_agent)
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

/// Map API status codes onto [`ClientError`].
pub(crate) async fn handle_response(response: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        429 | 503 if response.headers().contains_key(reqwest::header::RETRY_AFTER) => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);

            Err(ClientError::rate_limited(retry_after))
        }
        429 => Err(ClientError::rate_limited(60)),
        404 => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::not_found(text))
        }
        400 => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::bad_request(text))
        }
        500..=599 => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::server(status.as_u16(), text))
        }
        _ => {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::UnexpectedStatus { status: status.as_u16(), message: text })
        }
    }
}

/// Write `first` and the rest of the body to `path`, returning the byte count.
async fn stream_to_file(response: &mut reqwest::Response, first: &[u8], path: &Path) -> ClientResult<usize> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(first).await?;
    let mut written = first.len();
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    Ok(written)
}

fn is_archive_type(content_type: &str) -> bool {
    ["gzip", "x-tar", "octet-stream", "x-eprint"].iter().any(|t| content_type.contains(t))
}

fn looks_like_html(first: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&first[..first.len().min(512)]).to_ascii_lowercase();
    let head = head.trim_start();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<html")
}
