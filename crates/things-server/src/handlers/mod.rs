//! HTTP handlers

pub mod api;
pub mod health;
pub mod pages;

pub use health::health;
