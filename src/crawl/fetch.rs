// src/crawl/fetch.rs
// =============================================================================
// HTTP GET with a timeout, turned into a typed result.
//
// Nothing in here panics or bubbles up a reqwest error. Every failure is one
// of the FetchError kinds, so callers can `match` on it and decide whether
// the page or image is simply skipped.
//
// Rust concepts:
// - The `?` operator: converts reqwest::Error into FetchError through the
//   From impl in error.rs
// - Per-request timeout: RequestBuilder::timeout overrides the client's
// =============================================================================

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use url::Url;

use crate::crawl::normalize::PageUrl;
use crate::error::FetchError;

/// A successful response body.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Where the body actually came from (after redirects).
    pub url: Url,
    /// Lowercased media type, parameters included (e.g. "text/html; charset=utf-8").
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Fetched {
    pub fn is_html(&self) -> bool {
        self.content_type.starts_with("text/html")
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

// Issues one GET bounded by `timeout`
//
// Parameters:
//   client: The shared HTTP client
//   url: Absolute http(s) URL to fetch
//   timeout: Budget for the whole exchange, body included
//
// Returns: The final URL (after redirects), the lowercased content type and
//   the body. Non-2xx statuses come back as `FetchError::Http`.
pub async fn get(client: &Client, url: &Url, timeout: Duration) -> Result<Fetched, FetchError> {
    let response = client.get(url.clone()).timeout(timeout).send().await?;

    // Redirects were already followed by the client, so this is the final status
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let final_url = response.url().clone();

    // Reading the body still counts against the timeout
    let bytes = response.bytes().await?;

    Ok(Fetched {
        url: final_url,
        content_type,
        bytes: bytes.to_vec(),
    })
}

/// Fetches a crawlable page. Anything that isn't `text/html` is rejected
/// with `FetchError::NonHtmlContent`.
pub async fn fetch_page(
    client: &Client,
    page: &PageUrl,
    timeout: Duration,
) -> Result<Fetched, FetchError> {
    let fetched = get(client, page.as_url(), timeout).await?;
    if !fetched.is_html() {
        return Err(FetchError::NonHtmlContent(fetched.content_type));
    }
    Ok(fetched)
}
