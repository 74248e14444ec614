//! Output module for run summaries and reports
//!
//! This module handles:
//! - The end-of-run summary, including dead letters and stalled listings
//! - Rendering the discovered category tree
//! - Statistics read back from the recipe database

pub mod stats;
mod summary;
mod tree;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use summary::{print_summary, RunOutcome, RunSummary};
pub use tree::{print_category_tree, render_category_tree};
