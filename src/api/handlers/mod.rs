pub mod books;
pub mod system;

pub use books::*;
pub use system::*;

use crate::db::repository::{BookRepository, UserRepository};
use crate::db::DatabaseManager;
use crate::media::ImageStore;
use std::sync::Arc;

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub user_repo: Arc<UserRepository>,
    pub book_repo: Arc<BookRepository>,
    pub images: Arc<ImageStore>,
    pub db: Arc<DatabaseManager>,
    pub jwt_secret: Arc<String>,
    pub token_ttl_hours: i64,
}
