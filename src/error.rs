// src/error.rs
// =============================================================================
// Error types shared across the crawler.
//
// Two families:
// - FetchError: one HTTP request went wrong. Always recovered by the caller
//   (the page or image is skipped and counted).
// - CrawlError: the whole run cannot continue. Only raised for a bad start
//   URL, an unreachable start host, or an unusable output directory.
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Why a single GET could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP {0}")]
    Http(u16),

    #[error("not an HTML page (content-type: {0})")]
    NonHtmlContent(String),
}

impl FetchError {
    /// True for failures where the host never produced a usable response.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::Connection(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = error.status() {
            FetchError::Http(status.as_u16())
        } else {
            FetchError::Connection(error.to_string())
        }
    }
}

/// Fatal errors that abort the run before it can produce a summary.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid start URL '{url}': {reason}")]
    InvalidStartUrl { url: String, reason: String },

    #[error("start page {url} is unreachable: {source}")]
    StartUnreachable {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
