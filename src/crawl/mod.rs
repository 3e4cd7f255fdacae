// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Features:
// - Breadth-first crawling starting from a URL, one depth level at a time
// - Same-host restriction (doesn't crawl external sites)
// - Configurable depth limit
// - Collects every image address seen on the crawled pages
//
// Submodules:
// - normalize: URL resolution, fragment stripping, scope filtering
// - fetch: HTTP GET with timeouts and typed errors
// - extract: links and image sources out of HTML
// - queue: the crawl loop itself
// =============================================================================

pub mod extract;
pub mod fetch;
pub mod normalize;
mod queue;

// Re-export what the pipeline needs
pub use normalize::parse_start_url;
pub use queue::{crawl_site, CrawlOutcome};
