// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing, filtered by RUST_LOG)
// 3. Run the crawl + download pipeline, racing it against Ctrl-C
// 4. Print the summary and exit with a proper code
//    (0 = completed, 2 = fatal error, 130 = interrupted)
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - runtime settings
mod crawl; // src/crawl/ - website crawling logic
mod download; // src/download/ - image downloading
mod error; // src/error.rs - error types
mod pipeline; // src/pipeline.rs - crawl, then download

use anyhow::Result;
use clap::Parser; // Parser trait enables the parse() method
use tracing_subscriber::EnvFilter;

use cli::Cli;
use download::DownloadResult;
use pipeline::RunSummary;

const EXIT_OK: i32 = 0;
const EXIT_FATAL: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            // One clear message for the fatal error, nothing else
            eprintln!("Error: {}", e);
            EXIT_FATAL
        }
    };

    std::process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> Result<i32> {
    let config = cli.to_config();

    // Keep stdout clean for --json
    if !cli.json {
        println!("🔍 Crawling: {}", config.start_url);
        println!("📊 Max crawl depth: {}", config.max_depth);
        println!("📁 Saving images to: {}", config.output_dir.display());
    }

    let summary = tokio::select! {
        result = pipeline::run(&config) => result?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n⚠️  Interrupted, in-flight downloads abandoned");
            return Ok(EXIT_INTERRUPTED);
        }
    };

    print_results(&summary, cli.json)?;
    Ok(EXIT_OK)
}

// Prints the summary either as a table or JSON
fn print_results(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(summary)?;
        println!("{}", json_output);
    } else {
        print_table(summary);
    }
    Ok(())
}

// Prints per-image results and the final counts as a human-readable table
fn print_table(summary: &RunSummary) {
    if !summary.images.is_empty() {
        println!();
        println!("{:<60} {:<15} {:<30}", "IMAGE", "STATUS", "DETAIL");
        println!("{}", "=".repeat(105));
    }

    for report in &summary.images {
        let (status, detail) = format_result(&report.result);

        // Truncate URL if too long for display
        let url_display = if report.url.chars().count() > 57 {
            format!("{}...", report.url.chars().take(57).collect::<String>())
        } else {
            report.url.clone()
        };

        println!("{:<60} {:<15} {:<30}", url_display, status, detail);
    }

    if !summary.page_failures.is_empty() {
        println!();
        println!("Pages that could not be crawled:");
        for failure in &summary.page_failures {
            println!("   ❌ [depth {}] {}: {}", failure.depth, failure.url, failure.error);
        }
    }

    println!();
    println!("📊 Summary:");
    println!("   📄 Pages visited: {}", summary.pages_visited);
    println!("   ⚠️  Pages failed: {}", summary.pages_failed);
    println!("   🖼️  Images found: {}", summary.images_discovered);
    println!("   ✅ Saved: {}", summary.images_saved);
    println!("   🔁 Skipped (duplicate): {}", summary.images_skipped_duplicate);
    println!("   🚫 Rejected (not an image): {}", summary.images_rejected_content_type);
    println!("   ❌ Failed: {}", summary.images_failed);
}

fn format_result(result: &DownloadResult) -> (String, String) {
    match result {
        DownloadResult::Saved { path } => ("✅ SAVED".to_string(), path.display().to_string()),
        DownloadResult::SkippedDuplicate => ("🔁 DUPLICATE".to_string(), String::new()),
        DownloadResult::RejectedContentType { content_type } => {
            ("🚫 REJECTED".to_string(), content_type.clone())
        }
        DownloadResult::Failed { reason } => ("❌ FAILED".to_string(), reason.clone()),
    }
}
