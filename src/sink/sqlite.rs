//! SQLite sink implementation
//!
//! Categories and recipes are upserted on their natural keys. Each run gets a
//! row in `runs` which `finish` closes with the final counts and the dead
//! letter list.

use crate::model::{Category, Recipe};
use crate::output::{RunOutcome, RunSummary};
use crate::sink::schema::initialize_schema;
use crate::sink::{RunRecord, Sink, SinkError, SinkResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend for crawl output
pub struct SqliteSink {
    conn: Mutex<Connection>,
    run_id: Mutex<Option<i64>>,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    pub fn open(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            run_id: Mutex::new(None),
        }
    }

    /// Records the start of a run and returns its id
    pub fn begin_run(&self, config_hash: &str) -> SinkResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, "running"],
        )?;
        let id = conn.last_insert_rowid();
        *self.run_id.lock().unwrap_or_else(|p| p.into_inner()) = Some(id);
        Ok(id)
    }

    /// Id of the run opened with [`begin_run`](Self::begin_run)
    pub fn current_run(&self) -> Option<i64> {
        *self.run_id.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn latest_run(&self) -> SinkResult<Option<RunRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status,
             categories, recipes_succeeded, recipes_dead_lettered, stalls
             FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    outcome: RunOutcome::from_db_string(&row.get::<_, String>(4)?),
                    categories: row.get::<_, i64>(5)? as u64,
                    recipes_succeeded: row.get::<_, i64>(6)? as u64,
                    recipes_dead_lettered: row.get::<_, i64>(7)? as u64,
                    stalls: row.get::<_, i64>(8)? as u64,
                })
            })
            .optional()?;

        Ok(run)
    }

    pub fn get_category(&self, slug: &str) -> SinkResult<Option<Category>> {
        let conn = self.conn();
        let category = conn
            .query_row(
                "SELECT slug, name, href, parent_slug FROM categories WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok(Category {
                        slug: row.get(0)?,
                        name: row.get(1)?,
                        href: row.get(2)?,
                        parent_slug: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    /// All categories, parents before children
    pub fn categories(&self) -> SinkResult<Vec<Category>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT slug, name, href, parent_slug FROM categories
             ORDER BY parent_slug IS NOT NULL, slug",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Category {
                slug: row.get(0)?,
                name: row.get(1)?,
                href: row.get(2)?,
                parent_slug: row.get(3)?,
            })
        })?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }

    pub fn get_recipe(&self, id: u64) -> SinkResult<Option<Recipe>> {
        let key = db_id(id)?;
        let conn = self.conn();
        let recipe = conn
            .query_row(
                "SELECT id, name, cooking_time, description, number_servings, image_src,
                 href, category_slug FROM recipes WHERE id = ?1",
                params![key],
                |row| {
                    Ok(Recipe {
                        id: row.get::<_, i64>(0)? as u64,
                        name: row.get(1)?,
                        cooking_time: row.get(2)?,
                        description: row.get(3)?,
                        number_servings: row.get(4)?,
                        image_src: row.get(5)?,
                        href: row.get(6)?,
                        category_slug: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(recipe)
    }

    pub fn count_categories(&self) -> SinkResult<u64> {
        self.count("SELECT COUNT(*) FROM categories")
    }

    pub fn count_parent_categories(&self) -> SinkResult<u64> {
        self.count("SELECT COUNT(*) FROM categories WHERE parent_slug IS NULL")
    }

    pub fn count_recipes(&self) -> SinkResult<u64> {
        self.count("SELECT COUNT(*) FROM recipes")
    }

    /// Dead letters recorded by one run
    pub fn count_dead_letters(&self, run_id: i64) -> SinkResult<u64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM dead_letters WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Recipe counts per category, largest first
    pub fn recipes_per_category(&self, limit: usize) -> SinkResult<Vec<(String, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT category_slug, COUNT(*) AS n FROM recipes
             GROUP BY category_slug ORDER BY n DESC, category_slug LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }

    fn count(&self, sql: &str) -> SinkResult<u64> {
        let conn = self.conn();
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn db_id(id: u64) -> SinkResult<i64> {
    i64::try_from(id).map_err(|_| SinkError::InvalidRecord(format!("recipe id {} out of range", id)))
}

#[async_trait]
impl Sink for SqliteSink {
    async fn put_category(&self, category: &Category) -> SinkResult<()> {
        if category.slug.is_empty() {
            return Err(SinkError::InvalidRecord("category without slug".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO categories (slug, name, href, parent_slug, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(slug) DO UPDATE SET
                name = excluded.name,
                href = excluded.href,
                parent_slug = excluded.parent_slug,
                updated_at = excluded.updated_at",
            params![
                category.slug,
                category.name,
                category.href,
                category.parent_slug,
                now
            ],
        )?;
        Ok(())
    }

    async fn put_recipe(&self, recipe: &Recipe) -> SinkResult<()> {
        let id = db_id(recipe.id)?;
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO recipes (id, name, cooking_time, description, number_servings,
                                  image_src, href, category_slug, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                cooking_time = excluded.cooking_time,
                description = excluded.description,
                number_servings = excluded.number_servings,
                image_src = excluded.image_src,
                href = excluded.href,
                category_slug = excluded.category_slug,
                updated_at = excluded.updated_at",
            params![
                id,
                recipe.name,
                recipe.cooking_time,
                recipe.description,
                recipe.number_servings,
                recipe.image_src,
                recipe.href,
                recipe.category_slug,
                now
            ],
        )?;
        Ok(())
    }

    async fn finish(&self, summary: &RunSummary) -> SinkResult<()> {
        let Some(run_id) = self.current_run() else {
            tracing::debug!("No run opened on this sink, skipping run bookkeeping");
            return Ok(());
        };

        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, categories = ?3,
             recipes_succeeded = ?4, recipes_dead_lettered = ?5, stalls = ?6
             WHERE id = ?7",
            params![
                summary.outcome.to_db_string(),
                now,
                summary.categories as i64,
                summary.recipes_succeeded as i64,
                summary.recipes_dead_lettered as i64,
                summary.stalls.len() as i64,
                run_id
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO dead_letters (run_id, url, kind, attempts, reason, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for letter in &summary.dead_letters {
                stmt.execute(params![
                    run_id,
                    letter.url,
                    letter.kind.label(),
                    letter.attempts,
                    letter.reason,
                    now
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}
