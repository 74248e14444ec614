//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl driver that coordinates all aspects of a
//! run, including:
//! - Discovering the category taxonomy (phase 1)
//! - Paginating category listings and fetching recipe pages (phase 2)
//! - Running the worker pool over the shared frontier
//! - Cancellation and the failure-rate guard
//! - Building the final run summary

use crate::config::Config;
use crate::crawler::extractor::{
    extract_categories, extract_listing_page, extract_recipe_detail, ExtractError, Selectors,
};
use crate::crawler::fetcher::{backoff_delay, FetchError, Fetcher};
use crate::crawler::frontier::{Claim, FailOutcome, FrontierItem, Frontier, PageKind};
use crate::model::{recipe_id_from_href, Category, Recipe};
use crate::output::{RunOutcome, RunSummary};
use crate::sink::Sink;
use crate::state::{ListingStatus, ListingStep};
use crate::url::resolve_href;
use crate::HarvestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Upper bound on how long an idle worker sleeps before re-checking the frontier
const IDLE_TICK: Duration = Duration::from_millis(250);

/// How a single item failed
enum ItemFailure {
    /// Worth another attempt
    Transient(String),

    /// Retrying cannot help
    Permanent(String),
}

impl From<ExtractError> for ItemFailure {
    fn from(e: ExtractError) -> Self {
        Self::Permanent(format!("extraction failed: {}", e))
    }
}

/// State shared between the coordinator and its workers
struct Shared {
    config: Config,
    selectors: Selectors,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn Sink>,
    frontier: Frontier,

    /// Cancelled by the caller's token or by the failure-rate guard
    dispatch: CancellationToken,

    categories: Mutex<Vec<Category>>,

    /// Failure rate that tripped the guard, if it did
    tripped: Mutex<Option<f64>>,

    listing_pages: AtomicUsize,
    recipes_succeeded: AtomicUsize,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    taxonomy_url: Url,
    base_url: Url,
}

impl Coordinator {
    /// Creates a coordinator for one run
    ///
    /// Fails when the base URL or the selector profile in `config` is
    /// unusable.
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn Sink>,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.site.base_url)?;
        let taxonomy_url = base_url.join(&config.site.taxonomy_path)?;
        let selectors = Selectors::compile(&config.selectors)?
            .with_category_prefix(config.site.category_prefix.clone());
        let frontier = Frontier::new(config.crawler.max_attempts, config.crawler.max_listing_pages);

        let shared = Arc::new(Shared {
            config,
            selectors,
            fetcher,
            sink,
            frontier,
            dispatch: cancel.child_token(),
            categories: Mutex::new(Vec::new()),
            tripped: Mutex::new(None),
            listing_pages: AtomicUsize::new(0),
            recipes_succeeded: AtomicUsize::new(0),
        });

        Ok(Self {
            shared,
            cancel,
            taxonomy_url,
            base_url,
        })
    }

    /// Runs the crawl to completion, cancellation or failure
    pub async fn run(&self) -> Result<RunSummary, HarvestError> {
        let start = Instant::now();
        let shared = &self.shared;

        // Phase 1: taxonomy
        tracing::info!(url = %self.taxonomy_url, "Discovering categories");
        shared
            .frontier
            .enqueue(self.taxonomy_url.clone(), PageKind::Category);
        self.drain().await;

        let categories = lock(&shared.categories).clone();
        if categories.is_empty() && !self.cancel.is_cancelled() && !shared.is_tripped() {
            let mut summary = self.summary(0, start.elapsed());
            summary.outcome = RunOutcome::Failed;
            self.finish(&summary).await;
            return Err(HarvestError::NoCategories {
                url: self.taxonomy_url.to_string(),
            });
        }

        let parents = categories.iter().filter(|c| c.is_parent()).count();
        tracing::info!(
            categories = categories.len(),
            parents,
            children = categories.len() - parents,
            "Category discovery complete"
        );

        let unstored_categories = self.store_categories(&categories).await;

        // Phase 2: listings and recipes
        if !shared.dispatch.is_cancelled() {
            let mut started = 0;
            for category in &categories {
                if category.is_parent() && !shared.config.crawler.crawl_parent_categories {
                    continue;
                }
                let Some(url) = resolve_href(&category.href, &self.base_url) else {
                    tracing::warn!(category = %category.slug, href = %category.href, "Unusable category href");
                    continue;
                };
                if shared.frontier.start_listing(&category.slug, url) {
                    started += 1;
                }
            }
            tracing::info!(listings = started, "Crawling category listings");
            self.drain().await;
        }

        let mut summary = self.summary(categories.len(), start.elapsed());
        summary.unstored_categories = unstored_categories;

        tracing::info!(
            outcome = summary.outcome.to_db_string(),
            categories = summary.categories,
            recipes_succeeded = summary.recipes_succeeded,
            recipes_dead_lettered = summary.recipes_dead_lettered,
            stalls = summary.stalls.len(),
            elapsed_secs = summary.elapsed.as_secs(),
            "Crawl finished"
        );

        self.finish(&summary).await;

        if let Some(rate) = *lock(&shared.tripped) {
            return Err(HarvestError::FailureRateExceeded {
                rate,
                threshold: shared.config.crawler.failure_rate_threshold,
            });
        }

        Ok(summary)
    }

    /// Writes every category, retrying each failed write with backoff
    ///
    /// Returns the slugs the sink still rejected after `max-attempts` tries.
    /// Their listings are crawled regardless.
    async fn store_categories(&self, categories: &[Category]) -> Vec<String> {
        let crawler = &self.shared.config.crawler;
        let mut unstored = Vec::new();

        for category in categories {
            let mut attempt = 1;
            loop {
                match self.shared.sink.put_category(category).await {
                    Ok(()) => break,
                    Err(e) if attempt < crawler.max_attempts => {
                        let delay =
                            backoff_delay(attempt, crawler.backoff_base_ms, crawler.backoff_max_ms);
                        tracing::warn!(
                            category = %category.slug,
                            attempt,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Category write failed, will retry"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            category = %category.slug,
                            attempts = attempt,
                            error = %e,
                            "Giving up on storing category"
                        );
                        unstored.push(category.slug.clone());
                        break;
                    }
                }
            }
        }

        unstored
    }

    /// Hands the summary to the sink; a failure here is logged, not returned
    async fn finish(&self, summary: &RunSummary) {
        if let Err(e) = self.shared.sink.finish(summary).await {
            tracing::error!(error = %e, "Failed to record run summary");
        }
    }

    /// Runs the worker pool until the frontier drains or dispatch stops
    async fn drain(&self) {
        let workers = self.shared.config.crawler.workers.max(1);
        let mut set = JoinSet::new();
        for id in 0..workers {
            let shared = self.shared.clone();
            set.spawn(async move { worker(shared, id).await });
        }

        while let Some(result) = set.join_next().await {
            if let Err(e) = result {
                tracing::error!("Worker task failed: {}", e);
            }
        }
    }

    fn summary(&self, categories: usize, elapsed: Duration) -> RunSummary {
        let shared = &self.shared;
        let stats = shared.frontier.stats();

        let outcome = if shared.is_tripped() {
            RunOutcome::Failed
        } else if self.cancel.is_cancelled() {
            RunOutcome::Cancelled
        } else {
            RunOutcome::Completed
        };

        let incomplete_listings = shared
            .frontier
            .listings()
            .into_iter()
            .filter(|listing| listing.status != ListingStatus::Complete)
            .map(|listing| (listing.category_slug, listing.status))
            .collect();

        RunSummary {
            categories,
            unstored_categories: Vec::new(),
            listing_pages: shared.listing_pages.load(Ordering::Relaxed),
            recipes_succeeded: shared.recipes_succeeded.load(Ordering::Relaxed),
            recipes_dead_lettered: stats.recipes.dead_lettered,
            dead_letters: shared.frontier.dead_letters(),
            stalls: shared.frontier.stalls(),
            incomplete_listings,
            outcome,
            elapsed,
        }
    }
}

async fn worker(shared: Arc<Shared>, id: u32) {
    tracing::trace!(worker = id, "Worker started");

    loop {
        if shared.dispatch.is_cancelled() {
            break;
        }

        // Registered before claiming so a notify between claim and wait is not lost
        let notified = shared.frontier.notifier().notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match shared.frontier.claim(Instant::now()) {
            Claim::Ready(item) => {
                shared.process(item).await;
                shared.check_failure_rate();
            }
            Claim::Wait(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut notified => {}
                    _ = shared.dispatch.cancelled() => break,
                }
            }
            Claim::Idle => {
                tokio::select! {
                    _ = &mut notified => {}
                    _ = tokio::time::sleep(IDLE_TICK) => {}
                    _ = shared.dispatch.cancelled() => break,
                }
            }
            Claim::Drained => break,
        }
    }

    tracing::trace!(worker = id, "Worker stopped");
}

impl Shared {
    async fn process(&self, item: FrontierItem) {
        tracing::debug!(url = %item.url, kind = %item.kind, attempt = item.attempts + 1, "Fetching");

        let result = match self.fetcher.fetch(&item.url).await {
            Ok(body) => self.handle_page(&item, &body).await,
            Err(e @ FetchError::Transient { .. }) => Err(ItemFailure::Transient(e.to_string())),
            Err(e @ FetchError::Permanent { .. }) => Err(ItemFailure::Permanent(e.to_string())),
        };

        let recorded = match result {
            Ok(()) => {
                let done = self.frontier.complete(&item.key);
                if done.is_ok() && matches!(item.kind, PageKind::Recipe { .. }) {
                    self.recipes_succeeded.fetch_add(1, Ordering::Relaxed);
                }
                done
            }
            Err(ItemFailure::Transient(reason)) => self.retry(&item, &reason),
            Err(ItemFailure::Permanent(reason)) => {
                tracing::warn!(url = %item.url, kind = %item.kind, reason = %reason, "Dead-lettered");
                self.frontier.dead_letter(&item.key, &reason)
            }
        };

        if let Err(e) = recorded {
            tracing::error!(url = %item.url, error = %e, "Failed to record item outcome");
        }
    }

    fn retry(&self, item: &FrontierItem, reason: &str) -> Result<(), HarvestError> {
        let crawler = &self.config.crawler;
        let delay = backoff_delay(item.attempts + 1, crawler.backoff_base_ms, crawler.backoff_max_ms);

        match self.frontier.fail(&item.key, reason, delay, Instant::now())? {
            FailOutcome::Retry { attempts } => {
                tracing::warn!(
                    url = %item.url,
                    kind = %item.kind,
                    attempts,
                    max_attempts = crawler.max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    reason,
                    "Fetch failed, will retry"
                );
            }
            FailOutcome::DeadLettered { attempts } => {
                tracing::warn!(
                    url = %item.url,
                    kind = %item.kind,
                    attempts,
                    reason,
                    "Giving up after max attempts"
                );
            }
        }
        Ok(())
    }

    async fn handle_page(&self, item: &FrontierItem, body: &str) -> Result<(), ItemFailure> {
        match &item.kind {
            PageKind::Category => self.handle_taxonomy(body),
            PageKind::Listing {
                category_slug,
                page,
            } => self.handle_listing(item, category_slug, *page, body),
            PageKind::Recipe { category_slug, .. } => {
                self.handle_recipe(item, category_slug, body).await
            }
        }
    }

    fn handle_taxonomy(&self, body: &str) -> Result<(), ItemFailure> {
        let categories = extract_categories(body, &self.selectors)?;
        *lock(&self.categories) = categories;
        Ok(())
    }

    fn handle_listing(
        &self,
        item: &FrontierItem,
        category_slug: &str,
        page: u32,
        body: &str,
    ) -> Result<(), ItemFailure> {
        let extract = extract_listing_page(body, &self.selectors)?;

        let mut links = Vec::with_capacity(extract.recipe_hrefs.len());
        for href in &extract.recipe_hrefs {
            let Some(url) = resolve_href(href, &item.url) else {
                tracing::debug!(href = %href, "Skipping unresolvable recipe link");
                continue;
            };
            match recipe_id_from_href(url.path()) {
                Ok(id) => links.push((url, id)),
                Err(e) => tracing::warn!(category = category_slug, href = %href, error = %e, "Skipping recipe link without id"),
            }
        }

        let report = self
            .frontier
            .record_listing_page(category_slug, page, extract.total, links)
            .map_err(|e| ItemFailure::Permanent(e.to_string()))?;
        self.listing_pages.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            category = category_slug,
            page,
            found = report.found,
            expected = report.expected.unwrap_or(extract.total),
            new_recipes = report.recipes_enqueued,
            "Listing progress"
        );

        if let ListingStep::Stalled(warning) = &report.step {
            tracing::warn!(
                category = %warning.category_slug,
                page = warning.page,
                found = warning.found,
                expected = warning.expected,
                "{}",
                warning
            );
        }

        Ok(())
    }

    async fn handle_recipe(
        &self,
        item: &FrontierItem,
        category_slug: &str,
        body: &str,
    ) -> Result<(), ItemFailure> {
        let mut recipe = Recipe::stub(item.url.path(), category_slug)?;
        let fields = extract_recipe_detail(body, &self.selectors)?;
        recipe.enrich(fields);

        self.sink
            .put_recipe(&recipe)
            .await
            .map_err(|e| ItemFailure::Transient(format!("sink write failed: {}", e)))?;

        tracing::debug!(id = recipe.id, name = %recipe.name, category = category_slug, "Recipe stored");
        Ok(())
    }

    /// Stops dispatch when too many finished items were dead-lettered
    fn check_failure_rate(&self) {
        let crawler = &self.config.crawler;
        let stats = self.frontier.stats();
        if stats.finished() < crawler.failure_rate_min_samples as usize {
            return;
        }

        let rate = stats.failure_rate();
        if rate <= crawler.failure_rate_threshold {
            return;
        }

        let mut tripped = lock(&self.tripped);
        if tripped.is_none() {
            tracing::error!(
                rate,
                threshold = crawler.failure_rate_threshold,
                dead_lettered = stats.dead_lettered,
                finished = stats.finished(),
                "Failure rate exceeded, stopping crawl"
            );
            *tripped = Some(rate);
            self.dispatch.cancel();
        }
    }

    fn is_tripped(&self) -> bool {
        lock(&self.tripped).is_some()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
