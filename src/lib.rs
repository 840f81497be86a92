//! Bookshelf Backend Library
//!
//! REST backend for a book-cataloging app: signup/login, book CRUD with
//! cover-image upload and optimization, and a one-vote-per-user rating
//! mechanism that maintains a running average.

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod media;

// Re-export commonly used types
pub use crate::api::ApiServer;
pub use crate::core::Config;
pub use crate::db::DatabaseManager;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type alias for the library
pub type Result<T> = anyhow::Result<T>;
