//! Bulk e-print harvesting driven by OAI-PMH listings.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use super::{ArxivClient, DownloadOutcome, ListRecordsRequest, OaiPage};
use crate::error::ClientResult;

/// Progress is logged after this many downloads.
const PROGRESS_EVERY: usize = 25;

/// Attempts per listing page before the harvest stops.
const LIST_ATTEMPTS: u32 = 3;

/// Options for a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Directory receiving `<id>.tar.gz` files.
    pub out: PathBuf,
    /// Stop after this many successful downloads.
    pub max: usize,
    pub from: Option<String>,
    pub until: Option<String>,
    pub set: Option<String>,
    /// Pause after each download attempt that hit the network.
    pub delay: Duration,
}

impl HarvestOptions {
    /// Defaults: 50 000 papers of the `math` set since 2010, 2.5 s apart.
    #[must_use]
    pub fn new(out: impl Into<PathBuf>) -> Self {
        Self {
            out: out.into(),
            max: 50_000,
            from: Some("2010-01-01".to_string()),
            until: None,
            set: Some("math".to_string()),
            delay: Duration::from_millis(2500),
        }
    }
}

/// Counts from a harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Listing pages fetched.
    pub pages: usize,
    /// Listing error that ended the run early, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Pages through `ListRecords` and downloads each listed e-print.
#[derive(Debug, Clone)]
pub struct Harvester {
    client: ArxivClient,
}

impl Harvester {
    #[must_use]
    pub fn new(client: ArxivClient) -> Self {
        Self { client }
    }

    /// Fetch one listing page, waiting out transient failures.
    ///
    /// Honors the server's `Retry-After` when it sends one and otherwise
    /// waits `delay` between attempts.
    async fn list_page(&self, request: &ListRecordsRequest, delay: Duration) -> ClientResult<OaiPage> {
        let mut attempt = 1;
        loop {
            match self.client.list_records(request).await {
                Err(e) if e.is_retryable() && attempt < LIST_ATTEMPTS => {
                    let wait = e.retry_after().unwrap_or(delay);
                    tracing::warn!(error = %e, attempt, wait_ms = wait.as_millis(), "Listing failed; retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Run until `max` downloads, the end of the listing, or an empty page.
    pub async fn run(&self, options: &HarvestOptions) -> HarvestReport {
        let mut report = HarvestReport::default();
        let mut request = ListRecordsRequest {
            set: options.set.clone(),
            from: options.from.clone(),
            until: options.until.clone(),
            resumption_token: None,
        };

        tracing::info!(
            out = %options.out.display(),
            max = options.max,
            set = ?options.set,
            from = ?options.from,
            "Starting harvest"
        );

        'pages: while report.downloaded < options.max {
            let page = match self.list_page(&request, options.delay).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(error = %e, pages = report.pages, "Listing failed; stopping harvest");
                    report.error = Some(e.to_string());
                    break;
                }
            };
            report.pages += 1;

            if page.ids.is_empty() {
                tracing::info!(pages = report.pages, "Empty listing page; stopping harvest");
                break;
            }

            for id in &page.ids {
                if report.downloaded >= options.max {
                    break 'pages;
                }
                match self.client.download_eprint(id, &options.out).await {
                    DownloadOutcome::Skipped => {
                        report.skipped += 1;
                        continue;
                    }
                    DownloadOutcome::Downloaded => {
                        report.downloaded += 1;
                        if report.downloaded % PROGRESS_EVERY == 0 {
                            tracing::info!(
                                downloaded = report.downloaded,
                                skipped = report.skipped,
                                failed = report.failed,
                                "Harvest progress"
                            );
                        }
                    }
                    DownloadOutcome::Failed(reason) => {
                        report.failed += 1;
                        tracing::warn!(arxiv_id = %id, reason = %reason, "Download failed");
                    }
                }
                if !options.delay.is_zero() {
                    tokio::time::sleep(options.delay).await;
                }
            }

            match page.resumption_token {
                Some(token) => request.resumption_token = Some(token),
                None => break,
            }
        }

        tracing::info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed,
            pages = report.pages,
            "Harvest finished"
        );
        report
    }
}
