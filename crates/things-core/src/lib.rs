//! Things Service - Core Library
//!
//! Pure domain types shared by the server: the `Thing` entity,
//! capability names, and input sanitization. No I/O here.

pub mod capability;
pub mod sanitize;
pub mod thing;

pub use capability::Capability;
pub use sanitize::sanitize_text;
pub use thing::Thing;
