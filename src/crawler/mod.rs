//! Crawler module for recipe page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Rate-limited HTTP fetching with retry logic
//! - Selector-driven extraction of categories, listings and recipes
//! - The shared frontier with retry ceilings and pagination cursors
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod rate_limit;

pub use coordinator::Coordinator;
pub use extractor::{
    extract_categories, extract_listing_page, extract_recipe_detail, parse_recipe_count,
    ExtractError, ListingExtract, Selectors,
};
pub use fetcher::{backoff_delay, build_http_client, FetchError, Fetcher, HttpFetcher};
pub use frontier::{
    listing_page_url, Claim, DeadLetter, FailOutcome, Frontier, FrontierItem, FrontierStats,
    KindCounts, ListingReport, PageKind,
};
pub use rate_limit::RateLimiter;

use crate::config::Config;
use crate::model::Category;
use crate::output::RunSummary;
use crate::sink::SqliteSink;
use crate::HarvestError;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl into the configured SQLite database
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the database and record a new run
/// 2. Build the HTTP fetcher
/// 3. Discover categories and crawl every listing and recipe
/// 4. Close the run with its summary
///
/// Returns the summary together with the stored category tree.
pub async fn crawl(
    config: Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<(RunSummary, Vec<Category>), HarvestError> {
    let sink = Arc::new(SqliteSink::open(Path::new(&config.output.database_path))?);
    let run_id = sink.begin_run(config_hash)?;
    tracing::info!(run_id, database = %config.output.database_path, "Starting crawl run");

    let fetcher = Arc::new(HttpFetcher::new(&config)?);
    let coordinator = Coordinator::new(config, fetcher, sink.clone(), cancel)?;
    let summary = coordinator.run().await?;

    let categories = sink.categories()?;
    Ok((summary, categories))
}
