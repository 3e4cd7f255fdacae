// src/config.rs
// =============================================================================
// Runtime configuration for one crawl.
//
// The CLI builds a CrawlConfig; tests build one directly with
// `CrawlConfig::new(url, dir)` and tweak the fields they care about.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;

use crate::error::CrawlError;

/// Sent with every request. Some sites refuse the default reqwest agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_MAX_DEPTH: usize = 2;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Raw start URL as given by the user (parsed by the pipeline).
    pub start_url: String,
    pub output_dir: PathBuf,
    /// 0 = only the start page.
    pub max_depth: usize,
    pub page_timeout: Duration,
    pub image_timeout: Duration,
    /// Upper bound for writing one image file to disk.
    pub write_timeout: Duration,
    /// Worker pool size for page fetches within a level and for downloads.
    pub concurrency: usize,
    pub user_agent: String,
}

impl CrawlConfig {
    pub fn new(start_url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            start_url: start_url.into(),
            output_dir: output_dir.into(),
            max_depth: DEFAULT_MAX_DEPTH,
            page_timeout: Duration::from_secs(10),
            image_timeout: Duration::from_secs(20),
            write_timeout: Duration::from_secs(30),
            concurrency: 8,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Builds the single HTTP client shared by the crawler and the downloader.
    ///
    /// Timeouts are applied per request, since pages and images use
    /// different limits.
    pub fn http_client(&self) -> Result<Client, CrawlError> {
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(self.page_timeout)
            .build()?;
        Ok(client)
    }

    pub(crate) fn workers(&self) -> usize {
        self.concurrency.max(1)
    }
}
