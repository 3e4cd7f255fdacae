// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things). The parsed arguments are
// turned into a CrawlConfig, which is all the rest of the program sees.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{CrawlConfig, DEFAULT_MAX_DEPTH, DEFAULT_USER_AGENT};

#[derive(Parser, Debug)]
#[command(
    name = "image-harvester",
    version,
    about = "Crawl a website and download every unique image it references",
    long_about = "image-harvester starts at a URL, follows links on the same host up to a \
                  maximum depth, and saves every image it finds (including lazy-loaded ones) \
                  into an output directory. Existing files in that directory are never \
                  overwritten; clashing names get a -N suffix instead."
)]
pub struct Cli {
    /// Website URL to start from (e.g., https://example.com)
    ///
    /// https:// is assumed when no scheme is given
    pub url: String,

    /// Directory to save the images in (created if missing)
    ///
    /// Files already in it are never overwritten: an image whose name is
    /// taken is saved as name-1.ext, name-2.ext, ... Running again into the
    /// same directory therefore adds a new numbered copy of every image.
    #[arg(short, long, default_value = "images")]
    pub output: PathBuf,

    /// Maximum crawl depth
    ///
    /// Depth 0 = just the starting page
    /// Depth 1 = starting page + all pages it links to
    /// etc.
    #[arg(short, long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub depth: usize,

    /// How many pages or images to fetch at the same time
    #[arg(short, long, default_value_t = 8)]
    pub concurrency: usize,

    /// Seconds to wait for a page before giving up on it
    #[arg(long, default_value_t = 10)]
    pub page_timeout: u64,

    /// Seconds to wait for an image before giving up on it
    #[arg(long, default_value_t = 20)]
    pub image_timeout: u64,

    /// User-Agent header sent with every request
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Output the run summary in JSON format instead of a table
    #[arg(long)]
    pub json: bool,

    /// Log every page and image decision (same as RUST_LOG=debug)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn to_config(&self) -> CrawlConfig {
        let mut config = CrawlConfig::new(self.url.clone(), self.output.clone());
        config.max_depth = self.depth;
        config.concurrency = self.concurrency;
        config.page_timeout = Duration::from_secs(self.page_timeout);
        config.image_timeout = Duration::from_secs(self.image_timeout);
        config.user_agent = self.user_agent.clone();
        config
    }
}
