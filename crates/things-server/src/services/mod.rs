//! Business logic services

pub mod auth;
pub mod nonce;
pub mod store;

pub use auth::AuthService;
pub use nonce::NonceService;
pub use store::ThingStore;
