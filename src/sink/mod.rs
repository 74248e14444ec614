//! Sink module: destinations for finished records
//!
//! The coordinator hands every finalized `Category` and `Recipe` to a
//! [`Sink`]. Writes are idempotent on the record id (slug for categories,
//! numeric id for recipes), so a record delivered twice is stored once.
//!
//! # Implementations
//!
//! - [`MemorySink`]: ordered in-memory maps
//! - [`SqliteSink`]: rusqlite database with run bookkeeping

mod memory;
mod schema;
mod sqlite;

pub use memory::MemorySink;
pub use sqlite::SqliteSink;

use crate::model::{Category, Recipe};
use crate::output::{RunOutcome, RunSummary};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while storing records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for finalized records
#[async_trait]
pub trait Sink: Send + Sync {
    /// Stores a category, replacing any previous record with the same slug
    async fn put_category(&self, category: &Category) -> SinkResult<()>;

    /// Stores a recipe, replacing any previous record with the same id
    async fn put_recipe(&self, recipe: &Recipe) -> SinkResult<()>;

    /// Called once with the final summary of the run
    async fn finish(&self, summary: &RunSummary) -> SinkResult<()> {
        let _ = summary;
        Ok(())
    }
}

/// Represents a crawl run stored by [`SqliteSink`]
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    /// None while the run is still going
    pub outcome: Option<RunOutcome>,
    pub categories: u64,
    pub recipes_succeeded: u64,
    pub recipes_dead_lettered: u64,
    pub stalls: u64,
}
