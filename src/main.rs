//! Recipe-Harvest main entry point
//!
//! This is the command-line interface for the Recipe-Harvest crawler.

use anyhow::Context;
use clap::Parser;
use recipe_harvest::config::{load_config_with_hash, Config};
use recipe_harvest::crawler::crawl;
use recipe_harvest::output::{
    load_statistics, print_category_tree, print_statistics, print_summary,
};
use recipe_harvest::sink::SqliteSink;
use recipe_harvest::HarvestError;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Recipe-Harvest: a polite recipe site crawler
///
/// Recipe-Harvest discovers a recipe site's category taxonomy, walks every
/// category listing and stores each recipe it finds, while respecting
/// per-domain rate limits.
#[derive(Parser, Debug)]
#[command(name = "recipe-harvest")]
#[command(version)]
#[command(about = "A polite recipe site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("recipe_harvest=info,warn"),
            1 => EnvFilter::new("recipe_harvest=debug,info"),
            2 => EnvFilter::new("recipe_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Recipe-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Taxonomy page: {}", config.site.taxonomy_path);
    println!("  Category prefix: {}", config.site.category_prefix);
    println!("  Allowed domains: {}", config.site.allowed_domains.join(", "));

    println!("\nCrawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!(
        "  Minimum delay per domain: {}ms",
        config.crawler.min_request_delay_ms
    );
    println!("  Max attempts per item: {}", config.crawler.max_attempts);
    println!(
        "  Fetch retries per attempt: {}",
        config.crawler.max_fetch_retries
    );
    println!(
        "  Backoff: {}ms base, {}ms cap",
        config.crawler.backoff_base_ms, config.crawler.backoff_max_ms
    );
    println!(
        "  Failure-rate guard: {:.0}% after {} items",
        config.crawler.failure_rate_threshold * 100.0,
        config.crawler.failure_rate_min_samples
    );
    println!("  Listing page cap: {}", config.crawler.max_listing_pages);
    println!(
        "  Parent category listings: {}",
        if config.crawler.crawl_parent_categories { "yes" } else { "no" }
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let sink = SqliteSink::open(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&sink).context("Failed to read statistics")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            on_interrupt.cancel();
        }
    });

    match crawl(config, config_hash, cancel).await {
        Ok((summary, categories)) => {
            print_category_tree(&categories);
            println!();
            print_summary(&summary);
            Ok(())
        }
        Err(e @ HarvestError::FailureRateExceeded { .. }) => {
            tracing::error!("Crawl aborted: {}", e);
            Err(e).context("Too many pages failed; the run summary was saved to the database")
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
