//! Pagination cursor for one category listing
//!
//! A listing is walked one page at a time. Page 1 fixes the expected total
//! and the page size; every page folds its recipe ids into the `found` set.
//! The cursor stops when the total is reached, when a page brings nothing
//! new, or when the page budget runs out.

use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Where a category's pagination stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    /// More pages may follow
    Paginating,

    /// `found` reached the expected total
    Complete,

    /// A page yielded no new recipe ids
    Stalled,

    /// The page budget ran out before the total was reached
    PageBudgetExhausted,

    /// A listing page was dead-lettered
    Aborted,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paginating => "paginating",
            Self::Complete => "complete",
            Self::Stalled => "stalled",
            Self::PageBudgetExhausted => "page_budget_exhausted",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why pagination stopped short of the expected total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallReason {
    NoNewRecipes,
    PageBudgetExhausted,
}

/// Non-fatal report of a listing that ended below its expected total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StallWarning {
    pub category_slug: String,
    /// Page whose result ended pagination
    pub page: u32,
    /// Distinct recipe ids seen in this category
    pub found: usize,
    pub expected: u32,
    pub reason: StallReason,
}

impl fmt::Display for StallWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.reason {
            StallReason::NoNewRecipes => "no new recipes",
            StallReason::PageBudgetExhausted => "page budget exhausted",
        };
        write!(
            f,
            "{} stalled at page {} with {}/{} recipes ({})",
            self.category_slug, self.page, self.found, self.expected, reason
        )
    }
}

/// What the cursor wants after a page has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingStep {
    /// Fetch this page next
    NextPage(u32),

    /// Expected total reached
    Complete,

    /// Pagination halted early
    Stalled(StallWarning),

    /// The cursor was already terminal; the page was ignored
    Halted,
}

/// Pagination progress for one category
#[derive(Debug, Clone)]
pub struct ListingProgress {
    pub category_slug: String,
    pub category_url: Url,
    pub pages_fetched: u32,
    /// Total announced by page 1
    pub expected_total: Option<u32>,
    /// Number of recipe links on page 1
    pub page_size: Option<usize>,
    pub found: HashSet<u64>,
    pub status: ListingStatus,
}

impl ListingProgress {
    pub fn new(category_slug: impl Into<String>, category_url: Url) -> Self {
        Self {
            category_slug: category_slug.into(),
            category_url,
            pages_fetched: 0,
            expected_total: None,
            page_size: None,
            found: HashSet::new(),
            status: ListingStatus::Paginating,
        }
    }

    /// Returns true once no more pages will be requested
    pub fn is_terminal(&self) -> bool {
        self.status != ListingStatus::Paginating
    }

    /// Highest page number this listing may fetch
    ///
    /// `ceil(expected / page_size) + 1`, clamped by `max_pages`. Unknown
    /// until page 1 has been applied.
    pub fn page_budget(&self, max_pages: u32) -> Option<u32> {
        let expected = self.expected_total?;
        let page_size = self.page_size?.max(1) as u64;
        let pages = (expected as u64).div_ceil(page_size) + 1;
        Some(pages.min(max_pages as u64) as u32)
    }

    /// Folds one page of results into the cursor
    ///
    /// `total` is the count the page announced. Only page 1 sets the
    /// expected total and page size; later pages contribute ids only.
    pub fn apply_page(&mut self, page: u32, total: u32, ids: &[u64], max_pages: u32) -> ListingStep {
        if self.is_terminal() {
            return ListingStep::Halted;
        }

        self.pages_fetched += 1;

        if self.expected_total.is_none() {
            self.expected_total = Some(total);
            self.page_size = Some(ids.len());
        }
        let expected = self.expected_total.unwrap_or(total);

        let mut new_ids = 0;
        for id in ids {
            if self.found.insert(*id) {
                new_ids += 1;
            }
        }

        if self.found.len() >= expected as usize {
            self.status = ListingStatus::Complete;
            return ListingStep::Complete;
        }

        if new_ids == 0 {
            self.status = ListingStatus::Stalled;
            return ListingStep::Stalled(self.stall(page, expected, StallReason::NoNewRecipes));
        }

        let budget = self.page_budget(max_pages).unwrap_or(max_pages);
        if page >= budget {
            self.status = ListingStatus::PageBudgetExhausted;
            return ListingStep::Stalled(self.stall(
                page,
                expected,
                StallReason::PageBudgetExhausted,
            ));
        }

        ListingStep::NextPage(page + 1)
    }

    /// Stops pagination after a listing page was dead-lettered
    pub fn abort(&mut self) {
        if !self.is_terminal() {
            self.status = ListingStatus::Aborted;
        }
    }

    fn stall(&self, page: u32, expected: u32, reason: StallReason) -> StallWarning {
        StallWarning {
            category_slug: self.category_slug.clone(),
            page,
            found: self.found.len(),
            expected,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress() -> ListingProgress {
        ListingProgress::new("supy", Url::parse("https://eda.ru/recepty/supy").unwrap())
    }

    fn ids(range: std::ops::Range<u64>) -> Vec<u64> {
        range.collect()
    }

    #[test]
    fn test_completes_over_three_pages() {
        let mut listing = progress();

        assert_eq!(listing.apply_page(1, 42, &ids(0..20), 500), ListingStep::NextPage(2));
        assert_eq!(listing.apply_page(2, 42, &ids(20..40), 500), ListingStep::NextPage(3));
        assert_eq!(listing.apply_page(3, 42, &ids(40..42), 500), ListingStep::Complete);

        assert_eq!(listing.found.len(), 42);
        assert_eq!(listing.pages_fetched, 3);
        assert_eq!(listing.status, ListingStatus::Complete);
    }

    #[test]
    fn test_single_full_page_completes() {
        let mut listing = progress();
        assert_eq!(listing.apply_page(1, 10, &ids(0..10), 500), ListingStep::Complete);
        assert_eq!(listing.pages_fetched, 1);
    }

    #[test]
    fn test_empty_category_completes() {
        let mut listing = progress();
        assert_eq!(listing.apply_page(1, 0, &[], 500), ListingStep::Complete);
    }

    #[test]
    fn test_page_without_new_ids_stalls() {
        let mut listing = progress();
        listing.apply_page(1, 42, &ids(0..20), 500);

        match listing.apply_page(2, 42, &ids(0..20), 500) {
            ListingStep::Stalled(warning) => {
                assert_eq!(warning.reason, StallReason::NoNewRecipes);
                assert_eq!(warning.page, 2);
                assert_eq!(warning.found, 20);
                assert_eq!(warning.expected, 42);
            }
            other => panic!("expected stall, got {:?}", other),
        }
        assert_eq!(listing.status, ListingStatus::Stalled);
    }

    #[test]
    fn test_empty_first_page_with_total_stalls() {
        let mut listing = progress();
        assert!(matches!(
            listing.apply_page(1, 5, &[], 500),
            ListingStep::Stalled(_)
        ));
    }

    #[test]
    fn test_page_budget_bounds_pagination() {
        let mut listing = progress();
        // Total never reachable: each page brings one new id
        let mut page = 1;
        let mut fetched = 0;
        loop {
            fetched += 1;
            let step = listing.apply_page(page, 40, &[page as u64 * 1000, 1], 500);
            match step {
                ListingStep::NextPage(next) => page = next,
                ListingStep::Stalled(warning) => {
                    assert_eq!(warning.reason, StallReason::PageBudgetExhausted);
                    break;
                }
                other => panic!("unexpected step {:?}", other),
            }
        }
        // ceil(40 / 2) + 1
        assert_eq!(fetched, 21);
        assert_eq!(listing.status, ListingStatus::PageBudgetExhausted);
    }

    #[test]
    fn test_hard_page_cap() {
        let mut listing = progress();
        assert_eq!(listing.apply_page(1, 1000, &ids(0..10), 2), ListingStep::NextPage(2));
        assert!(matches!(
            listing.apply_page(2, 1000, &ids(10..20), 2),
            ListingStep::Stalled(StallWarning {
                reason: StallReason::PageBudgetExhausted,
                ..
            })
        ));
    }

    #[test]
    fn test_expected_total_fixed_by_first_page() {
        let mut listing = progress();
        listing.apply_page(1, 30, &ids(0..20), 500);
        assert_eq!(listing.apply_page(2, 25, &ids(20..25), 500), ListingStep::NextPage(3));
        assert_eq!(listing.expected_total, Some(30));
        assert_eq!(listing.page_size, Some(20));
    }

    #[test]
    fn test_terminal_cursor_ignores_pages() {
        let mut listing = progress();
        listing.apply_page(1, 10, &ids(0..10), 500);
        assert_eq!(listing.apply_page(2, 10, &ids(10..20), 500), ListingStep::Halted);
        assert_eq!(listing.found.len(), 10);
    }

    #[test]
    fn test_abort() {
        let mut listing = progress();
        listing.apply_page(1, 42, &ids(0..20), 500);
        listing.abort();
        assert_eq!(listing.status, ListingStatus::Aborted);
        assert_eq!(listing.apply_page(2, 42, &ids(20..40), 500), ListingStep::Halted);
    }

    #[test]
    fn test_abort_keeps_completed_status() {
        let mut listing = progress();
        listing.apply_page(1, 10, &ids(0..10), 500);
        listing.abort();
        assert_eq!(listing.status, ListingStatus::Complete);
    }

    #[test]
    fn test_stall_warning_display() {
        let warning = StallWarning {
            category_slug: "supy".to_string(),
            page: 2,
            found: 20,
            expected: 42,
            reason: StallReason::NoNewRecipes,
        };
        assert_eq!(
            warning.to_string(),
            "supy stalled at page 2 with 20/42 recipes (no new recipes)"
        );
    }
}
