//! SQLite database layer (embedded, no external dependencies)

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::Arc;
use things_core::Thing;

use super::MemoryCache;

/// Cache key for the table-existence flag. Set once and never
/// invalidated; an externally dropped table goes unnoticed until a
/// query fails.
const SCHEMA_CACHE_KEY: &str = "schema:things";

pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        if let Some(parent) = std::path::Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to SQLite database at: {}", database_path)
            })?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Throwaway database for tests. Single connection, since every
    /// SQLite in-memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Creates the `things` table if it does not exist. Idempotent.
    ///
    /// The existence check is answered from the cache when possible so
    /// repeated calls skip the `sqlite_master` lookup.
    pub async fn ensure_schema(&self, cache: &MemoryCache) -> Result<()> {
        if cache.exists(SCHEMA_CACHE_KEY) {
            return Ok(());
        }

        let existing: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'things'
            "#,
        )
        .fetch_optional(&*self.pool)
        .await
        .context("Failed to check for things table")?;

        if existing.is_none() {
            tracing::info!("Creating things table");
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS things (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL
                )
                "#,
            )
            .execute(&*self.pool)
            .await
            .context("Failed to create things table")?;
        }

        cache.set(SCHEMA_CACHE_KEY.to_string(), vec![1]);

        Ok(())
    }

    /// Inserts a row and returns it with its assigned id.
    pub async fn insert_thing(&self, name: &str) -> Result<Thing> {
        let result = sqlx::query(
            r#"
            INSERT INTO things (name) VALUES (?1)
            "#,
        )
        .bind(name)
        .execute(&*self.pool)
        .await
        .context("Failed to insert thing")?;

        Ok(Thing {
            id: result.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// Returns all rows, or only those whose name contains `filter`.
    /// The filter is matched with a parameterized LIKE; `%`, `_` and
    /// `\` in the filter are escaped so they match literally.
    pub async fn list_things(&self, filter: Option<&str>) -> Result<Vec<Thing>> {
        let rows: Vec<ThingRow> = match filter {
            Some(term) => {
                let pattern = format!("%{}%", escape_like(term));
                sqlx::query_as(
                    r#"
                    SELECT id, name FROM things WHERE name LIKE ?1 ESCAPE '\' ORDER BY id
                    "#,
                )
                .bind(pattern)
                .fetch_all(&*self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, name FROM things ORDER BY id
                    "#,
                )
                .fetch_all(&*self.pool)
                .await
            }
        }
        .context("Failed to list things")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// Helper struct for sqlx query_as
#[derive(sqlx::FromRow)]
struct ThingRow {
    id: i64,
    name: String,
}

impl From<ThingRow> for Thing {
    fn from(r: ThingRow) -> Self {
        Thing {
            id: r.id,
            name: r.name,
        }
    }
}
