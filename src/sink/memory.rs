use crate::model::{Category, Recipe};
use crate::output::RunSummary;
use crate::sink::{Sink, SinkError, SinkResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Keeps every record in ordered maps; used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    categories: Mutex<BTreeMap<String, Category>>,
    recipes: Mutex<BTreeMap<u64, Recipe>>,
    summary: Mutex<Option<RunSummary>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> Vec<Category> {
        lock(&self.categories).values().cloned().collect()
    }

    /// Recipes ordered by id
    pub fn recipes(&self) -> Vec<Recipe> {
        lock(&self.recipes).values().cloned().collect()
    }

    pub fn recipe(&self, id: u64) -> Option<Recipe> {
        lock(&self.recipes).get(&id).cloned()
    }

    /// Summary passed to `finish`, if the run got that far
    pub fn summary(&self) -> Option<RunSummary> {
        lock(&self.summary).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Sink for MemorySink {
    async fn put_category(&self, category: &Category) -> SinkResult<()> {
        if category.slug.is_empty() {
            return Err(SinkError::InvalidRecord("category without slug".to_string()));
        }
        lock(&self.categories).insert(category.slug.clone(), category.clone());
        Ok(())
    }

    async fn put_recipe(&self, recipe: &Recipe) -> SinkResult<()> {
        lock(&self.recipes).insert(recipe.id, recipe.clone());
        Ok(())
    }

    async fn finish(&self, summary: &RunSummary) -> SinkResult<()> {
        *lock(&self.summary) = Some(summary.clone());
        Ok(())
    }
}
