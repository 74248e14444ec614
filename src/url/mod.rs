//! URL handling module for Recipe-Harvest
//!
//! This module provides URL normalization, frontier keys, href resolution
//! and the domain allow-list used by the fetcher.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, matches_wildcard, DomainAllowList};
pub use normalize::{frontier_key, normalize_url, resolve_href};
