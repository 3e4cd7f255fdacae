// src/pipeline.rs
// =============================================================================
// Wires the crawler and the downloader into one run.
//
// Order matters for the "nothing is written on a fatal error" rule:
// 1. Parse the start URL            (fatal if invalid)
// 2. Crawl the site                 (fatal if the start host is unreachable)
// 3. Create the output directory    (fatal if impossible)
// 4. Download every image found     (never fatal)
// =============================================================================

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CrawlConfig;
use crate::crawl::{crawl_site, parse_start_url, CrawlOutcome};
use crate::download::{DownloadResult, Downloader, ImageReport};
use crate::error::CrawlError;

/// A page that could not be used, for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailureReport {
    pub url: String,
    pub depth: usize,
    pub error: String,
}

/// Final counts of one run, plus the per-item details behind them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub start_url: String,
    pub output_dir: PathBuf,
    pub pages_visited: usize,
    pub pages_failed: usize,
    pub images_discovered: usize,
    pub images_saved: usize,
    pub images_skipped_duplicate: usize,
    pub images_rejected_content_type: usize,
    pub images_failed: usize,
    /// Files written during this run, sorted.
    pub files: Vec<PathBuf>,
    pub page_failures: Vec<PageFailureReport>,
    pub images: Vec<ImageReport>,
}

impl RunSummary {
    fn new(
        start_url: String,
        output_dir: PathBuf,
        outcome: &CrawlOutcome,
        images: Vec<ImageReport>,
    ) -> Self {
        let mut summary = RunSummary {
            start_url,
            output_dir,
            pages_visited: outcome.visited.len(),
            pages_failed: outcome.failures.len(),
            images_discovered: outcome.images.len(),
            page_failures: outcome
                .failures
                .iter()
                .map(|failure| PageFailureReport {
                    url: failure.url.to_string(),
                    depth: failure.depth,
                    error: failure.error.to_string(),
                })
                .collect(),
            ..Default::default()
        };

        for report in &images {
            match &report.result {
                DownloadResult::Saved { path } => {
                    summary.images_saved += 1;
                    summary.files.push(path.clone());
                }
                DownloadResult::SkippedDuplicate => summary.images_skipped_duplicate += 1,
                DownloadResult::RejectedContentType { .. } => {
                    summary.images_rejected_content_type += 1
                }
                DownloadResult::Failed { .. } => summary.images_failed += 1,
            }
        }
        summary.files.sort();
        summary.images = images;
        summary
    }
}

/// Crawls `config.start_url` and downloads every image found into
/// `config.output_dir`.
///
/// Returns an error only for fatal problems; everything else ends up as a
/// count in the summary.
pub async fn run(config: &CrawlConfig) -> Result<RunSummary, CrawlError> {
    let start = parse_start_url(&config.start_url)?;
    let client = config.http_client()?;

    let outcome = crawl_site(&client, &start, config).await?;

    let downloader = Downloader::new(client, config).await?;
    let reports = downloader.download_all(outcome.images.iter().cloned()).await;

    let summary = RunSummary::new(
        start.as_str().to_string(),
        downloader.output_dir().to_path_buf(),
        &outcome,
        reports,
    );
    info!(
        pages = summary.pages_visited,
        images = summary.images_discovered,
        saved = summary.images_saved,
        failed = summary.images_failed,
        "run complete"
    );
    Ok(summary)
}
