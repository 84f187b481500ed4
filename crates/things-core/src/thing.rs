//! The persisted entity

use serde::{Deserialize, Serialize};

/// A single stored record: an (id, name) pair.
///
/// `id` is assigned by the database on insert and never changes;
/// `name` is user-supplied and sanitized before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thing {
    pub id: i64,
    pub name: String,
}
