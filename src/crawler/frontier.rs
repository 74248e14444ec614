//! Crawl frontier: the shared work queue and per-item state machine
//!
//! This module handles:
//! - Deduplication of URLs by frontier key
//! - Priority ordering (recipe pages, then listing pages, then category pages)
//! - Retry scheduling with an attempt ceiling and dead-lettering
//! - Pagination cursors, one per category listing
//! - Waking idle workers when new work is claimable
//!
//! All state sits behind one std mutex. No method awaits while holding it.

use crate::state::{ItemState, ListingProgress, ListingStep, StallWarning};
use crate::url::frontier_key;
use crate::HarvestError;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use url::Url;

/// What a frontier item points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    /// The taxonomy page
    Category,

    /// One page of a category listing
    Listing { category_slug: String, page: u32 },

    /// A recipe detail page
    Recipe { category_slug: String, recipe_id: u64 },
}

impl PageKind {
    /// Lower values are claimed first
    fn priority(&self) -> u8 {
        match self {
            Self::Recipe { .. } => 0,
            Self::Listing { .. } => 1,
            Self::Category => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Listing { .. } => "listing",
            Self::Recipe { .. } => "recipe",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => write!(f, "category page"),
            Self::Listing {
                category_slug,
                page,
            } => write!(f, "listing {} page {}", category_slug, page),
            Self::Recipe {
                category_slug,
                recipe_id,
            } => write!(f, "recipe {} in {}", recipe_id, category_slug),
        }
    }
}

/// A unit of work owned by the frontier
#[derive(Debug, Clone)]
pub struct FrontierItem {
    pub url: Url,
    /// Dedup key, see [`frontier_key`]
    pub key: String,
    pub kind: PageKind,
    /// Completed fetch attempts
    pub attempts: u32,
    pub state: ItemState,
    /// Earliest instant a retry may be claimed
    pub not_before: Option<Instant>,
    pub last_error: Option<String>,
}

/// Result of [`Frontier::claim`]
#[derive(Debug)]
pub enum Claim {
    /// An item moved to `InFlight` for the caller
    Ready(FrontierItem),

    /// Only retries are queued; the earliest is ready after this duration
    Wait(Duration),

    /// Nothing claimable while other items are in flight
    Idle,

    /// Nothing queued and nothing in flight
    Drained,
}

/// Result of [`Frontier::fail`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Item rescheduled after the retry delay
    Retry { attempts: u32 },

    /// Attempt ceiling reached
    DeadLettered { attempts: u32 },
}

/// Terminal failure record kept for the run summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub url: String,
    pub kind: PageKind,
    pub attempts: u32,
    pub reason: String,
}

/// Result of folding one listing page into its cursor
#[derive(Debug, Clone)]
pub struct ListingReport {
    pub step: ListingStep,
    /// Recipe pages newly enqueued from this listing page
    pub recipes_enqueued: usize,
    /// Distinct recipe ids seen in the category so far
    pub found: usize,
    pub expected: Option<u32>,
    /// URL of the next listing page, when one was enqueued
    pub next_page: Option<Url>,
}

/// Done and dead-lettered counts for one page kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub done: usize,
    pub dead_lettered: usize,
}

/// Snapshot of the frontier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    /// Pending items plus failed items waiting for a retry
    pub pending: usize,
    pub in_flight: usize,
    pub done: usize,
    pub dead_lettered: usize,
    pub categories: KindCounts,
    pub listings: KindCounts,
    pub recipes: KindCounts,
}

impl FrontierStats {
    /// Items that reached a terminal state
    pub fn finished(&self) -> usize {
        self.done + self.dead_lettered
    }

    /// Share of finished items that were dead-lettered
    pub fn failure_rate(&self) -> f64 {
        match self.finished() {
            0 => 0.0,
            finished => self.dead_lettered as f64 / finished as f64,
        }
    }
}

/// Heap entry; the item itself lives in `Inner::items`
#[derive(Debug, PartialEq, Eq)]
struct Queued {
    priority: u8,
    seq: u64,
    key: String,
}

// BinaryHeap is a max-heap: lower priority values and older entries first
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<String, FrontierItem>,
    queue: BinaryHeap<Queued>,
    next_seq: u64,
    in_flight: usize,
    listings: BTreeMap<String, ListingProgress>,
    /// First category that discovered each recipe id
    recipe_owners: HashMap<u64, String>,
    stalls: Vec<StallWarning>,
    dead_letters: Vec<DeadLetter>,
}

impl Inner {
    fn enqueue(&mut self, url: Url, kind: PageKind) -> bool {
        let key = frontier_key(&url);
        if self.items.contains_key(&key) {
            return false;
        }

        self.push(key.clone(), kind.priority());
        self.items.insert(
            key.clone(),
            FrontierItem {
                url,
                key,
                kind,
                attempts: 0,
                state: ItemState::Pending,
                not_before: None,
                last_error: None,
            },
        );
        true
    }

    fn push(&mut self, key: String, priority: u8) {
        self.next_seq += 1;
        self.queue.push(Queued {
            priority,
            seq: self.next_seq,
            key,
        });
    }

    fn item_mut(&mut self, key: &str) -> Result<&mut FrontierItem, HarvestError> {
        self.items
            .get_mut(key)
            .ok_or_else(|| HarvestError::UnknownItem(key.to_string()))
    }

    /// Moves an item to `to`, keeping the in-flight counter in step
    fn transition(&mut self, key: &str, to: ItemState) -> Result<&mut FrontierItem, HarvestError> {
        let left_in_flight = {
            let item = self.item_mut(key)?;
            if !item.state.can_transition_to(to) {
                return Err(HarvestError::InvalidTransition {
                    from: item.state,
                    to,
                });
            }
            let was_in_flight = item.state == ItemState::InFlight;
            item.state = to;
            was_in_flight
        };

        if left_in_flight {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        if to == ItemState::InFlight {
            self.in_flight += 1;
        }

        self.item_mut(key)
    }

    fn abort_listing(&mut self, kind: &PageKind) {
        if let PageKind::Listing { category_slug, .. } = kind {
            if let Some(listing) = self.listings.get_mut(category_slug) {
                listing.abort();
            }
        }
    }
}

/// Thread-safe crawl frontier
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
    max_attempts: u32,
    max_listing_pages: u32,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// `max_attempts` is the number of fetch attempts an item gets before it
    /// is dead-lettered; `max_listing_pages` caps every category listing.
    pub fn new(max_attempts: u32, max_listing_pages: u32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            max_attempts: max_attempts.max(1),
            max_listing_pages: max_listing_pages.max(1),
        }
    }

    /// Wakes workers waiting for new work or for the frontier to drain
    pub fn notifier(&self) -> &Notify {
        &self.notify
    }

    /// Adds a URL unless its key is already known
    ///
    /// Returns false, and changes nothing, for a key seen before in any
    /// state.
    pub fn enqueue(&self, url: Url, kind: PageKind) -> bool {
        let added = self.lock().enqueue(url, kind);
        if added {
            self.notify.notify_waiters();
        }
        added
    }

    /// Atomically hands the next ready item to the caller
    pub fn claim(&self, now: Instant) -> Claim {
        let mut inner = self.lock();

        let mut deferred = Vec::new();
        let mut earliest: Option<Instant> = None;
        let mut ready = None;

        while let Some(queued) = inner.queue.pop() {
            let Some(item) = inner.items.get(&queued.key) else {
                continue;
            };
            if !item.state.is_claimable() {
                continue;
            }

            match item.not_before {
                Some(at) if at > now => {
                    earliest = Some(earliest.map_or(at, |e| e.min(at)));
                    deferred.push(queued);
                }
                _ => {
                    ready = Some(queued.key);
                    break;
                }
            }
        }
        inner.queue.extend(deferred);

        if let Some(key) = ready {
            return match inner.transition(&key, ItemState::InFlight) {
                Ok(item) => Claim::Ready(item.clone()),
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Frontier queue out of sync");
                    Claim::Idle
                }
            };
        }

        if let Some(at) = earliest {
            return Claim::Wait(at.saturating_duration_since(now));
        }

        if inner.in_flight > 0 {
            Claim::Idle
        } else {
            Claim::Drained
        }
    }

    /// Marks an in-flight item as done
    pub fn complete(&self, key: &str) -> Result<(), HarvestError> {
        {
            let mut inner = self.lock();
            let item = inner.transition(key, ItemState::Done)?;
            item.attempts += 1;
            item.last_error = None;
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Records a transient failure of an in-flight item
    ///
    /// Below the attempt ceiling the item becomes `Failed` and is claimable
    /// again after `retry_delay`; at the ceiling it is dead-lettered.
    pub fn fail(
        &self,
        key: &str,
        reason: &str,
        retry_delay: Duration,
        now: Instant,
    ) -> Result<FailOutcome, HarvestError> {
        let outcome = {
            let mut inner = self.lock();
            let item = inner.item_mut(key)?;
            if item.state != ItemState::InFlight {
                return Err(HarvestError::InvalidTransition {
                    from: item.state,
                    to: ItemState::Failed,
                });
            }
            let attempts = item.attempts + 1;

            if attempts >= self.max_attempts {
                let item = inner.transition(key, ItemState::DeadLettered)?;
                item.attempts = attempts;
                item.last_error = Some(reason.to_string());
                let letter = DeadLetter {
                    url: item.url.to_string(),
                    kind: item.kind.clone(),
                    attempts,
                    reason: reason.to_string(),
                };
                inner.abort_listing(&letter.kind);
                inner.dead_letters.push(letter);
                FailOutcome::DeadLettered { attempts }
            } else {
                let item = inner.transition(key, ItemState::Failed)?;
                item.attempts = attempts;
                item.last_error = Some(reason.to_string());
                item.not_before = Some(now + retry_delay);
                let priority = item.kind.priority();
                inner.push(key.to_string(), priority);
                FailOutcome::Retry { attempts }
            }
        };

        self.notify.notify_waiters();
        Ok(outcome)
    }

    /// Terminally fails an item without further retries
    ///
    /// A dead-lettered listing page aborts its category's pagination.
    pub fn dead_letter(&self, key: &str, reason: &str) -> Result<(), HarvestError> {
        {
            let mut inner = self.lock();
            let was_in_flight = inner.item_mut(key)?.state == ItemState::InFlight;
            let item = inner.transition(key, ItemState::DeadLettered)?;
            if was_in_flight {
                item.attempts += 1;
            }
            item.last_error = Some(reason.to_string());
            let letter = DeadLetter {
                url: item.url.to_string(),
                kind: item.kind.clone(),
                attempts: item.attempts,
                reason: reason.to_string(),
            };
            inner.abort_listing(&letter.kind);
            inner.dead_letters.push(letter);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Creates the pagination cursor of a category and enqueues page 1
    ///
    /// Returns false when the category already has a cursor or its listing
    /// URL is already known.
    pub fn start_listing(&self, category_slug: &str, url: Url) -> bool {
        let added = {
            let mut inner = self.lock();
            if inner.listings.contains_key(category_slug) {
                return false;
            }

            let mut listing = ListingProgress::new(category_slug, url.clone());
            let kind = PageKind::Listing {
                category_slug: category_slug.to_string(),
                page: 1,
            };
            let added = inner.enqueue(url, kind);
            if !added {
                listing.abort();
            }
            inner.listings.insert(category_slug.to_string(), listing);
            added
        };

        if added {
            self.notify.notify_waiters();
        }
        added
    }

    /// Folds an extracted listing page into its category's cursor
    ///
    /// `links` are the page's recipe URLs with their ids. Recipes are
    /// enqueued under the first category that saw their id; later sightings
    /// still count towards this category's progress. The next page is
    /// enqueued only when the cursor asks for it.
    pub fn record_listing_page(
        &self,
        category_slug: &str,
        page: u32,
        total: u32,
        links: Vec<(Url, u64)>,
    ) -> Result<ListingReport, HarvestError> {
        let report = {
            let mut inner = self.lock();
            let max_pages = self.max_listing_pages;

            let ids: Vec<u64> = links.iter().map(|(_, id)| *id).collect();
            let (step, category_url) = {
                let listing = inner
                    .listings
                    .get_mut(category_slug)
                    .ok_or_else(|| HarvestError::UnknownItem(category_slug.to_string()))?;
                (
                    listing.apply_page(page, total, &ids, max_pages),
                    listing.category_url.clone(),
                )
            };

            let mut recipes_enqueued = 0;
            if step != ListingStep::Halted {
                for (url, recipe_id) in links {
                    if inner.recipe_owners.contains_key(&recipe_id) {
                        continue;
                    }
                    inner
                        .recipe_owners
                        .insert(recipe_id, category_slug.to_string());

                    let kind = PageKind::Recipe {
                        category_slug: category_slug.to_string(),
                        recipe_id,
                    };
                    if inner.enqueue(url, kind) {
                        recipes_enqueued += 1;
                    }
                }
            }

            let mut next_page = None;
            match &step {
                ListingStep::NextPage(next) => {
                    let url = listing_page_url(&category_url, *next);
                    let kind = PageKind::Listing {
                        category_slug: category_slug.to_string(),
                        page: *next,
                    };
                    if inner.enqueue(url.clone(), kind) {
                        next_page = Some(url);
                    } else if let Some(listing) = inner.listings.get_mut(category_slug) {
                        listing.abort();
                    }
                }
                ListingStep::Stalled(warning) => inner.stalls.push(warning.clone()),
                ListingStep::Complete | ListingStep::Halted => {}
            }

            let listing = inner.listings.get(category_slug);
            ListingReport {
                step,
                recipes_enqueued,
                found: listing.map_or(0, |l| l.found.len()),
                expected: listing.and_then(|l| l.expected_total),
                next_page,
            }
        };

        if report.recipes_enqueued > 0 || report.next_page.is_some() {
            self.notify.notify_waiters();
        }
        Ok(report)
    }

    /// Returns the category that owns a recipe id
    pub fn recipe_owner(&self, recipe_id: u64) -> Option<String> {
        self.lock().recipe_owners.get(&recipe_id).cloned()
    }

    /// Returns a copy of an item
    pub fn get(&self, key: &str) -> Option<FrontierItem> {
        self.lock().items.get(key).cloned()
    }

    pub fn stats(&self) -> FrontierStats {
        let inner = self.lock();
        let mut stats = FrontierStats {
            in_flight: inner.in_flight,
            ..FrontierStats::default()
        };

        for item in inner.items.values() {
            let counts = match item.kind {
                PageKind::Category => &mut stats.categories,
                PageKind::Listing { .. } => &mut stats.listings,
                PageKind::Recipe { .. } => &mut stats.recipes,
            };

            match item.state {
                ItemState::Pending | ItemState::Failed => stats.pending += 1,
                ItemState::InFlight => {}
                ItemState::Done => {
                    stats.done += 1;
                    counts.done += 1;
                }
                ItemState::DeadLettered => {
                    stats.dead_lettered += 1;
                    counts.dead_lettered += 1;
                }
            }
        }

        stats
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead_letters.clone()
    }

    pub fn stalls(&self) -> Vec<StallWarning> {
        self.lock().stalls.clone()
    }

    /// Snapshot of every pagination cursor, ordered by category slug
    pub fn listings(&self) -> Vec<ListingProgress> {
        self.lock().listings.values().cloned().collect()
    }

    /// True when nothing is queued and nothing is in flight
    pub fn is_drained(&self) -> bool {
        let inner = self.lock();
        inner.in_flight == 0 && inner.items.values().all(|item| item.state.is_terminal())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builds the URL of listing page `page` (`?page=N`, page 1 is the bare URL)
pub fn listing_page_url(category_url: &Url, page: u32) -> Url {
    let mut url = category_url.clone();
    let others: Vec<(String, String)> = category_url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_query(None);
    if page > 1 || !others.is_empty() {
        let mut pairs = url.query_pairs_mut();
        pairs.extend_pairs(others);
        if page > 1 {
            pairs.append_pair("page", &page.to_string());
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ListingStatus, StallReason};

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://eda.ru{}", path)).unwrap()
    }

    fn recipe_links(slug: &str, ids: std::ops::Range<u64>) -> Vec<(Url, u64)> {
        ids.map(|id| (url(&format!("/recepty/{}/dish-{}", slug, id)), id))
            .collect()
    }

    fn claim_ready(frontier: &Frontier) -> FrontierItem {
        match frontier.claim(Instant::now()) {
            Claim::Ready(item) => item,
            other => panic!("expected ready item, got {:?}", other),
        }
    }

    #[test]
    fn test_double_enqueue_yields_one_claim() {
        let frontier = Frontier::new(3, 500);

        assert!(frontier.enqueue(url("/recepty/supy"), PageKind::Category));
        assert!(!frontier.enqueue(url("/recepty/supy/"), PageKind::Category));
        assert!(!frontier.enqueue(url("/Recepty/Supy#top"), PageKind::Category));

        let item = claim_ready(&frontier);
        assert_eq!(item.state, ItemState::InFlight);
        assert!(matches!(frontier.claim(Instant::now()), Claim::Idle));

        frontier.complete(&item.key).unwrap();
        assert!(!frontier.enqueue(url("/recepty/supy"), PageKind::Category));
        assert!(matches!(frontier.claim(Instant::now()), Claim::Drained));
        assert!(frontier.is_drained());
    }

    #[test]
    fn test_priority_then_fifo() {
        let frontier = Frontier::new(3, 500);
        frontier.enqueue(url("/"), PageKind::Category);
        frontier.enqueue(
            url("/recepty/supy"),
            PageKind::Listing {
                category_slug: "supy".to_string(),
                page: 1,
            },
        );
        for id in [1, 2] {
            frontier.enqueue(
                url(&format!("/recepty/supy/dish-{}", id)),
                PageKind::Recipe {
                    category_slug: "supy".to_string(),
                    recipe_id: id,
                },
            );
        }

        let order: Vec<String> = (0..4).map(|_| claim_ready(&frontier).url.path().to_string()).collect();
        assert_eq!(
            order,
            vec!["/recepty/supy/dish-1", "/recepty/supy/dish-2", "/recepty/supy", "/"]
        );
    }

    #[test]
    fn test_retry_ceiling() {
        let frontier = Frontier::new(3, 500);
        frontier.enqueue(url("/recepty/supy"), PageKind::Category);

        let mut claims = 0;
        loop {
            let item = claim_ready(&frontier);
            claims += 1;
            match frontier.fail(&item.key, "HTTP 503", Duration::ZERO, Instant::now()).unwrap() {
                FailOutcome::Retry { attempts } => assert_eq!(attempts, claims),
                FailOutcome::DeadLettered { attempts } => {
                    assert_eq!(attempts, 3);
                    break;
                }
            }
        }

        assert_eq!(claims, 3);
        assert!(matches!(frontier.claim(Instant::now()), Claim::Drained));

        let letters = frontier.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].attempts, 3);
        assert_eq!(letters[0].reason, "HTTP 503");
        assert_eq!(frontier.stats().dead_lettered, 1);
    }

    #[test]
    fn test_retry_waits_for_delay() {
        let frontier = Frontier::new(3, 500);
        frontier.enqueue(url("/"), PageKind::Category);

        let now = Instant::now();
        let item = claim_ready(&frontier);
        frontier.fail(&item.key, "timeout", Duration::from_secs(5), now).unwrap();

        match frontier.claim(now) {
            Claim::Wait(wait) => assert_eq!(wait, Duration::from_secs(5)),
            other => panic!("expected wait, got {:?}", other),
        }

        match frontier.claim(now + Duration::from_secs(5)) {
            Claim::Ready(item) => {
                assert_eq!(item.attempts, 1);
                assert_eq!(item.last_error.as_deref(), Some("timeout"));
            }
            other => panic!("expected ready, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_transitions() {
        let frontier = Frontier::new(3, 500);
        frontier.enqueue(url("/"), PageKind::Category);
        let key = frontier_key(&url("/"));

        assert!(matches!(
            frontier.complete(&key),
            Err(HarvestError::InvalidTransition {
                from: ItemState::Pending,
                to: ItemState::Done
            })
        ));
        assert!(matches!(
            frontier.fail(&key, "x", Duration::ZERO, Instant::now()),
            Err(HarvestError::InvalidTransition { .. })
        ));
        assert!(matches!(
            frontier.complete("https://eda.ru/nowhere"),
            Err(HarvestError::UnknownItem(_))
        ));

        let item = claim_ready(&frontier);
        frontier.complete(&item.key).unwrap();
        assert!(frontier.complete(&item.key).is_err());
        assert!(frontier.dead_letter(&item.key, "late").is_err());
    }

    #[test]
    fn test_pagination_42_over_three_pages() {
        let frontier = Frontier::new(3, 500);
        assert!(frontier.start_listing("supy", url("/recepty/supy")));

        let page1 = claim_ready(&frontier);
        let report = frontier
            .record_listing_page("supy", 1, 42, recipe_links("supy", 0..20))
            .unwrap();
        frontier.complete(&page1.key).unwrap();
        assert_eq!(report.step, ListingStep::NextPage(2));
        assert_eq!(report.recipes_enqueued, 20);
        assert_eq!(
            report.next_page.unwrap().as_str(),
            "https://eda.ru/recepty/supy?page=2"
        );

        let report = frontier
            .record_listing_page("supy", 2, 42, recipe_links("supy", 20..40))
            .unwrap();
        assert_eq!(report.step, ListingStep::NextPage(3));

        let report = frontier
            .record_listing_page("supy", 3, 42, recipe_links("supy", 40..42))
            .unwrap();
        assert_eq!(report.step, ListingStep::Complete);
        assert_eq!(report.found, 42);
        assert!(report.next_page.is_none());
        assert!(frontier.stalls().is_empty());

        let listings = frontier.listings();
        let listing = &listings[0];
        assert_eq!(listing.status, ListingStatus::Complete);
        assert_eq!(listing.pages_fetched, 3);
    }

    #[test]
    fn test_single_page_listing_enqueues_no_next_page() {
        let frontier = Frontier::new(3, 500);
        frontier.start_listing("salaty", url("/recepty/salaty"));
        let page1 = claim_ready(&frontier);

        let report = frontier
            .record_listing_page("salaty", 1, 10, recipe_links("salaty", 0..10))
            .unwrap();
        frontier.complete(&page1.key).unwrap();

        assert_eq!(report.step, ListingStep::Complete);
        assert!(report.next_page.is_none());

        // only the ten recipes remain
        let stats = frontier.stats();
        assert_eq!(stats.pending, 10);
        assert_eq!(stats.listings.done, 1);
    }

    #[test]
    fn test_stall_on_page_without_new_recipes() {
        let frontier = Frontier::new(3, 500);
        frontier.start_listing("supy", url("/recepty/supy"));

        frontier
            .record_listing_page("supy", 1, 42, recipe_links("supy", 0..20))
            .unwrap();
        let report = frontier
            .record_listing_page("supy", 2, 42, recipe_links("supy", 0..20))
            .unwrap();

        assert!(matches!(report.step, ListingStep::Stalled(_)));
        assert_eq!(report.recipes_enqueued, 0);
        assert!(report.next_page.is_none());

        let stalls = frontier.stalls();
        assert_eq!(stalls.len(), 1);
        assert_eq!(stalls[0].reason, StallReason::NoNewRecipes);
        assert_eq!(stalls[0].found, 20);
    }

    #[test]
    fn test_first_category_owns_recipe() {
        let frontier = Frontier::new(3, 500);
        frontier.start_listing("supy", url("/recepty/supy"));
        frontier.start_listing("obedy", url("/recepty/obedy"));

        let shared = url("/recepty/supy/borsch-7");
        frontier
            .record_listing_page("supy", 1, 1, vec![(shared.clone(), 7)])
            .unwrap();
        let report = frontier
            .record_listing_page("obedy", 1, 2, vec![(shared, 7), (url("/recepty/obedy/plov-8"), 8)])
            .unwrap();

        assert_eq!(report.recipes_enqueued, 1);
        assert_eq!(report.found, 2);
        assert_eq!(report.step, ListingStep::Complete);
        assert_eq!(frontier.recipe_owner(7).as_deref(), Some("supy"));
        assert_eq!(frontier.recipe_owner(8).as_deref(), Some("obedy"));
    }

    #[test]
    fn test_dead_lettered_listing_aborts_cursor() {
        let frontier = Frontier::new(3, 500);
        frontier.start_listing("supy", url("/recepty/supy"));

        let page1 = claim_ready(&frontier);
        frontier.dead_letter(&page1.key, "HTTP 404").unwrap();

        let listings = frontier.listings();
        let listing = &listings[0];
        assert_eq!(listing.status, ListingStatus::Aborted);

        let report = frontier
            .record_listing_page("supy", 1, 42, recipe_links("supy", 0..20))
            .unwrap();
        assert_eq!(report.step, ListingStep::Halted);
        assert_eq!(report.recipes_enqueued, 0);
    }

    #[test]
    fn test_start_listing_twice() {
        let frontier = Frontier::new(3, 500);
        assert!(frontier.start_listing("supy", url("/recepty/supy")));
        assert!(!frontier.start_listing("supy", url("/recepty/supy")));
        assert!(frontier
            .record_listing_page("unknown", 1, 1, Vec::new())
            .is_err());
    }

    #[test]
    fn test_failure_rate() {
        let stats = FrontierStats {
            done: 6,
            dead_lettered: 2,
            ..FrontierStats::default()
        };
        assert_eq!(stats.finished(), 8);
        assert!((stats.failure_rate() - 0.25).abs() < f64::EPSILON);
        assert_eq!(FrontierStats::default().failure_rate(), 0.0);
    }

    #[test]
    fn test_listing_page_url() {
        let base = url("/recepty/supy");
        assert_eq!(listing_page_url(&base, 1).as_str(), "https://eda.ru/recepty/supy");
        assert_eq!(
            listing_page_url(&base, 3).as_str(),
            "https://eda.ru/recepty/supy?page=3"
        );

        let filtered = url("/recepty/supy?sort=new&page=9");
        assert_eq!(
            listing_page_url(&filtered, 2).as_str(),
            "https://eda.ru/recepty/supy?sort=new&page=2"
        );
    }
}
