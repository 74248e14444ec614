//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the recipe database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    categories INTEGER NOT NULL DEFAULT 0,
    recipes_succeeded INTEGER NOT NULL DEFAULT 0,
    recipes_dead_lettered INTEGER NOT NULL DEFAULT 0,
    stalls INTEGER NOT NULL DEFAULT 0
);

-- Category taxonomy, keyed by slug
CREATE TABLE IF NOT EXISTS categories (
    slug TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    href TEXT NOT NULL,
    parent_slug TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_categories_parent ON categories(parent_slug);

-- Recipes, keyed by the numeric id taken from the href
CREATE TABLE IF NOT EXISTS recipes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    cooking_time TEXT NOT NULL,
    description TEXT NOT NULL,
    number_servings TEXT NOT NULL,
    image_src TEXT NOT NULL,
    href TEXT NOT NULL,
    category_slug TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recipes_category ON recipes(category_slug);

-- Items that exhausted their attempts or failed permanently
CREATE TABLE IF NOT EXISTS dead_letters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER REFERENCES runs(id),
    url TEXT NOT NULL,
    kind TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    reason TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dead_letters_run ON dead_letters(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
