//! Storage layer
//!
//! Embedded SQLite for the things table, DashMap for the lookaside cache.

pub mod db;
pub mod memory;

pub use db::Database;
pub use memory::MemoryCache;
