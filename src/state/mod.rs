//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ItemState`: lifecycle of a single frontier item (pending, in flight, done, failed, dead-lettered)
//! - `ListingProgress`: pagination cursor for one category listing, with stall detection
//! - `DomainState`: per-domain request spacing used by the rate limiter

mod domain_state;
mod item_state;
mod listing;

// Re-export main types
pub use domain_state::DomainState;
pub use item_state::ItemState;
pub use listing::{ListingProgress, ListingStatus, ListingStep, StallReason, StallWarning};
