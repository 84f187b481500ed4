//! Record store: validated inserts and cached reads over the things table

use crate::storage::{Database, MemoryCache};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use things_core::{sanitize_text, Thing};
use tracing::{debug, info};

/// Every list-query cache key starts with this, so one prefix delete
/// evicts the whole family.
const LIST_CACHE_PREFIX: &str = "things:list:";

/// Backstop for anything the eviction misses (e.g. rows written by
/// another process sharing the database file).
const LIST_CACHE_TTL: Duration = Duration::from_secs(60);

/// The single place inserts and lookups go through. Both the HTML
/// views and the JSON API call these methods, so validation lives here
/// and nowhere else.
pub struct ThingStore {
    db: Arc<Database>,
    cache: Arc<MemoryCache>,
}

impl ThingStore {
    pub fn new(db: Arc<Database>, cache: Arc<MemoryCache>) -> Self {
        Self { db, cache }
    }

    /// Returns all things, or only those whose name contains `filter`.
    ///
    /// Read-through cached: the key is derived from the (sanitized)
    /// filter text, so identical queries share an entry. A filter that
    /// sanitizes to nothing is the same as no filter.
    pub async fn list(&self, filter: Option<&str>) -> Result<Vec<Thing>> {
        let filter = filter.map(sanitize_text).filter(|term| !term.is_empty());
        let filter = filter.as_deref();

        let cache_key = format!("{}{}", LIST_CACHE_PREFIX, filter.unwrap_or(""));
        if let Some(data) = self.cache.get(&cache_key) {
            if let Ok(things) = serde_json::from_slice::<Vec<Thing>>(&data) {
                debug!("List cache hit for filter {:?}", filter);
                return Ok(things);
            }
        }

        let things = self.db.list_things(filter).await?;
        let payload = serde_json::to_vec(&things)?;
        self.cache.set_with_ttl(cache_key, payload, LIST_CACHE_TTL);

        Ok(things)
    }

    /// Persists a new thing and returns it.
    ///
    /// A name that sanitizes to the empty string is silently ignored
    /// (`Ok(None)`, not an error). A successful insert evicts all list
    /// cache entries so both surfaces read their own writes.
    pub async fn insert(&self, name: &str) -> Result<Option<Thing>> {
        let name = sanitize_text(name);
        if name.is_empty() {
            debug!("Ignoring insert with empty name");
            return Ok(None);
        }

        let thing = self.db.insert_thing(&name).await?;
        self.cache.delete_prefix(LIST_CACHE_PREFIX);

        info!("Inserted thing id={} name={:?}", thing.id, thing.name);
        Ok(Some(thing))
    }
}
