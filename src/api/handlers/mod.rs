pub mod books;

pub use books::*;

use crate::core::services::BookService;
use crate::db::repository::UserRepository;
use std::sync::Arc;

/// Shared application state for handlers
#[derive(Clone)]
pub struct AppState {
    pub user_repo: Arc<UserRepository>,
    pub book_service: Arc<BookService>,
    pub jwt_secret: Arc<String>,
    pub token_ttl_hours: i64,
}
