//! Statistics read back from the recipe database
//!
//! Backs the `--stats` command: counts of stored records plus the
//! bookkeeping of the most recent run.

use crate::sink::{RunRecord, SinkResult, SqliteSink};

/// Stored-data statistics
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub categories: u64,

    /// Top-level categories among `categories`
    pub parent_categories: u64,

    pub recipes: u64,

    /// Largest categories by stored recipes
    pub top_categories: Vec<(String, u64)>,

    pub latest_run: Option<RunRecord>,

    /// Dead letters recorded by the latest run
    pub latest_dead_letters: u64,
}

/// Loads statistics from the database
pub fn load_statistics(sink: &SqliteSink) -> SinkResult<CrawlStatistics> {
    let latest_run = sink.latest_run()?;
    let latest_dead_letters = match &latest_run {
        Some(run) => sink.count_dead_letters(run.id)?,
        None => 0,
    };

    Ok(CrawlStatistics {
        categories: sink.count_categories()?,
        parent_categories: sink.count_parent_categories()?,
        recipes: sink.count_recipes()?,
        top_categories: sink.recipes_per_category(10)?,
        latest_run,
        latest_dead_letters,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Recipe Statistics ===\n");

    println!("Overview:");
    println!(
        "  Categories: {} ({} top-level)",
        stats.categories, stats.parent_categories
    );
    println!("  Recipes: {}", stats.recipes);
    println!();

    if !stats.top_categories.is_empty() {
        println!("Largest Categories:");
        for (slug, count) in &stats.top_categories {
            println!("  {}: {}", slug, count);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            let outcome = run
                .outcome
                .map(|outcome| outcome.to_db_string())
                .unwrap_or("running");
            println!("  Outcome: {}", outcome);
            println!("  Recipes stored: {}", run.recipes_succeeded);
            println!("  Recipes dead-lettered: {}", run.recipes_dead_lettered);
            println!("  Dead letters (all kinds): {}", stats.latest_dead_letters);
            println!("  Stalled listings: {}", run.stalls);
        }
        None => println!("No crawl runs recorded"),
    }
}
