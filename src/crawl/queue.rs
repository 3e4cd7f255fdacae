// src/crawl/queue.rs
// =============================================================================
// This module implements website crawling with a breadth-first approach.
//
// How it works:
// 1. Start with the initial URL as the only page of level 0
// 2. Fetch every page of the current level (up to `concurrency` at once)
// 3. Extract links and images from each page
// 4. Collect images; claim unseen same-host links for the next level
// 5. Repeat until a level comes back empty or max depth is reached
//
// A page is claimed in the visited set at the moment it is queued, so two
// pages of the same level linking to the same target only queue it once.
// Levels run one after the other: a link is only followed once the page it
// came from has been fully extracted.
//
// If the start page redirects to another host (example.com ->
// www.example.com), that host joins the scope before the start page is
// extracted. Otherwise every relative link on it would look off-site.
//
// Rust concepts:
// - HashSet::insert: returns false if the value was already there, which
//   makes it a test-and-set for the visited check
// - buffer_unordered: runs up to N futures at once, yields in finish order
// =============================================================================

use std::collections::HashSet;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::CrawlConfig;
use crate::crawl::extract::extract;
use crate::crawl::fetch::{fetch_page, Fetched};
use crate::crawl::normalize::{ImageUrl, PageUrl, Scope};
use crate::error::{CrawlError, FetchError};

/// Pages already queued or processed during this crawl. Only grows.
#[derive(Debug, Default)]
pub struct VisitedSet {
    pages: HashSet<PageUrl>,
}

impl VisitedSet {
    /// Test-and-set: returns true if `page` was not yet visited and is now
    /// claimed by the caller.
    pub fn claim(&mut self, page: PageUrl) -> bool {
        self.pages.insert(page)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn into_sorted(self) -> Vec<PageUrl> {
        let mut pages: Vec<_> = self.pages.into_iter().collect();
        pages.sort();
        pages
    }
}

/// A page that was fetched but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub url: PageUrl,
    pub depth: usize,
    pub error: FetchError,
}

/// Everything one crawl produced.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Every page a fetch was attempted for, sorted.
    pub visited: Vec<PageUrl>,
    pub images: HashSet<ImageUrl>,
    pub failures: Vec<PageFailure>,
}

// Crawls a website level by level, starting from `start`
//
// Parameters:
//   client: Shared HTTP client (user agent, redirect policy)
//   start: The normalized start page, depth 0
//   config: max_depth, page timeout and how many pages to fetch at once
//
// Returns: The visited pages, every image address found and the pages that
//   failed. Per-page failures never stop the crawl; the only error is a
//   start page whose host cannot be reached at all.
//
// Example:
//   max_depth=0: Only the start page
//   max_depth=1: Start page + every same-host page it links to
pub async fn crawl_site(
    client: &Client,
    start: &PageUrl,
    config: &CrawlConfig,
) -> Result<CrawlOutcome, CrawlError> {
    // Only pages on the start host (plus its redirect target) are followed
    let mut scope = Scope::of(start);
    let timeout = config.page_timeout;

    let mut visited = VisitedSet::default();
    let mut images = HashSet::new();
    let mut failures = Vec::new();

    // The start page is claimed up front so a link back to it is ignored
    visited.claim(start.clone());
    let mut frontier = vec![start.clone()];
    let mut depth = 0;

    info!(host = scope.host(), max_depth = config.max_depth, "starting crawl");

    while !frontier.is_empty() {
        info!(depth, pages = frontier.len(), seen = visited.len(), "crawling level");

        // Fetch the whole level concurrently; results arrive in finish order
        let results: Vec<(PageUrl, Result<Fetched, FetchError>)> = stream::iter(frontier)
            .map(move |page| async move {
                let result = visit(client, &page, timeout).await;
                (page, result)
            })
            .buffer_unordered(config.workers())
            .collect()
            .await;

        let mut next = Vec::new();
        for (page, result) in results {
            match result {
                Ok(fetched) => {
                    // A host redirect on the start page widens the scope
                    if depth == 0 && scope.allow(&fetched.url) {
                        info!(from = %page, to = %fetched.url, "start page redirected to another host");
                    }

                    // Relative links resolve against where the page really lives
                    let found = extract(&fetched.bytes, &fetched.url, &scope);
                    debug!(
                        page = %page,
                        links = found.links.len(),
                        images = found.images.len(),
                        "extracted"
                    );
                    images.extend(found.images);

                    // Only queue links if the next level is still allowed
                    if depth < config.max_depth {
                        for link in found.links {
                            if visited.claim(link.clone()) {
                                next.push(link);
                            }
                        }
                    }
                }
                // The start host not answering at all ends the run
                Err(error) if depth == 0 && error.is_unreachable() => {
                    return Err(CrawlError::StartUnreachable {
                        url: page.to_string(),
                        source: error,
                    });
                }
                Err(error) => {
                    warn!(page = %page, depth, %error, "skipping page");
                    failures.push(PageFailure { url: page, depth, error });
                }
            }
        }

        // Sorted so that runs are reproducible
        next.sort();
        frontier = next;
        depth += 1;
    }

    failures.sort_by(|a, b| a.url.cmp(&b.url));
    let outcome = CrawlOutcome {
        visited: visited.into_sorted(),
        images,
        failures,
    };

    info!(
        pages = outcome.visited.len(),
        failed = outcome.failures.len(),
        images = outcome.images.len(),
        "crawl finished"
    );
    Ok(outcome)
}

// Fetches one page; extraction happens back in the crawl loop, once the
// scope is final for this level
async fn visit(client: &Client, page: &PageUrl, timeout: Duration) -> Result<Fetched, FetchError> {
    debug!(page = %page, "fetching");
    fetch_page(client, page, timeout).await
}
