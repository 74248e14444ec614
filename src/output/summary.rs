//! Run summary produced by the coordinator
//!
//! The summary always lists dead-lettered items and stalled listings
//! explicitly so that a partial crawl is never mistaken for a complete one.

use crate::crawler::DeadLetter;
use crate::state::{ListingStatus, StallWarning};
use std::time::Duration;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The frontier drained
    Completed,

    /// The cancellation token fired
    Cancelled,

    /// The failure-rate guard stopped dispatch
    Failed,
}

impl RunOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Final statistics of a crawl run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub categories: usize,

    /// Slugs of categories the sink rejected after every retry
    pub unstored_categories: Vec<String>,

    /// Listing pages fetched and extracted
    pub listing_pages: usize,

    /// Recipes committed to the sink
    pub recipes_succeeded: usize,

    pub recipes_dead_lettered: usize,

    /// Every dead-lettered item, of any kind
    pub dead_letters: Vec<DeadLetter>,

    pub stalls: Vec<StallWarning>,

    /// Categories whose pagination ended in a state other than complete
    pub incomplete_listings: Vec<(String, ListingStatus)>,

    pub outcome: RunOutcome,

    pub elapsed: Duration,
}

impl RunSummary {
    pub fn is_cancelled(&self) -> bool {
        self.outcome == RunOutcome::Cancelled
    }

    /// Dead-lettered items of one kind
    pub fn dead_letters_of<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a DeadLetter> + 'a {
        self.dead_letters
            .iter()
            .filter(move |letter| letter.kind.label() == label)
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            categories: 0,
            unstored_categories: Vec::new(),
            listing_pages: 0,
            recipes_succeeded: 0,
            recipes_dead_lettered: 0,
            dead_letters: Vec::new(),
            stalls: Vec::new(),
            incomplete_listings: Vec::new(),
            outcome: RunOutcome::Completed,
            elapsed: Duration::ZERO,
        }
    }
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Outcome: {}", summary.outcome.to_db_string());
    println!("Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    println!("Overview:");
    println!("  Categories: {}", summary.categories);
    println!("  Listing pages: {}", summary.listing_pages);
    println!("  Recipes saved: {}", summary.recipes_succeeded);
    println!("  Recipes dead-lettered: {}", summary.recipes_dead_lettered);
    println!();

    if !summary.unstored_categories.is_empty() {
        println!(
            "Categories Not Stored ({}): {}",
            summary.unstored_categories.len(),
            summary.unstored_categories.join(", ")
        );
        println!();
    }

    if !summary.stalls.is_empty() {
        println!("Stalled Listings ({}):", summary.stalls.len());
        for stall in &summary.stalls {
            println!("  - {}", stall);
        }
        println!();
    }

    if !summary.incomplete_listings.is_empty() {
        println!("Incomplete Listings ({}):", summary.incomplete_listings.len());
        for (slug, status) in &summary.incomplete_listings {
            println!("  - {}: {}", slug, status);
        }
        println!();
    }

    if !summary.dead_letters.is_empty() {
        println!("Dead Letters ({}):", summary.dead_letters.len());
        for letter in &summary.dead_letters {
            println!(
                "  - {} [{}] after {} attempt(s): {}",
                letter.url, letter.kind, letter.attempts, letter.reason
            );
        }
        println!();
    }

    let attempted = summary.recipes_succeeded + summary.recipes_dead_lettered;
    let success_rate = if attempted > 0 {
        (summary.recipes_succeeded as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} recipes saved)",
        success_rate, summary.recipes_succeeded, attempted
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::PageKind;

    #[test]
    fn test_outcome_roundtrip() {
        for outcome in [RunOutcome::Completed, RunOutcome::Cancelled, RunOutcome::Failed] {
            assert_eq!(RunOutcome::from_db_string(outcome.to_db_string()), Some(outcome));
        }
        assert_eq!(RunOutcome::from_db_string("running"), None);
    }

    #[test]
    fn test_dead_letters_by_kind() {
        let summary = RunSummary {
            dead_letters: vec![
                DeadLetter {
                    url: "https://eda.ru/recepty/supy/borsch-1".to_string(),
                    kind: PageKind::Recipe {
                        category_slug: "supy".to_string(),
                        recipe_id: 1,
                    },
                    attempts: 3,
                    reason: "HTTP 503".to_string(),
                },
                DeadLetter {
                    url: "https://eda.ru/recepty/supy?page=4".to_string(),
                    kind: PageKind::Listing {
                        category_slug: "supy".to_string(),
                        page: 4,
                    },
                    attempts: 1,
                    reason: "HTTP 404".to_string(),
                },
            ],
            ..RunSummary::default()
        };

        assert_eq!(summary.dead_letters_of("recipe").count(), 1);
        assert_eq!(summary.dead_letters_of("listing").count(), 1);
        assert_eq!(summary.dead_letters_of("category").count(), 0);
        assert!(!summary.is_cancelled());
    }
}
