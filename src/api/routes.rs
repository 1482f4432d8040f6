//! API routes

use crate::api::handlers::{
    best_rated_books, create_book, delete_book, get_book, list_books, rate_book, update_book,
    AppState,
};
use crate::auth::handlers::{login, signup};
use crate::auth::middleware::authenticate;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

/// Build the API routes
pub fn build_api_routes(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/books", get(list_books))
        // Registered before the :id route is matched; axum prefers the
        // literal segment.
        .route("/api/books/bestrating", get(best_rated_books))
        .route("/api/books/:id", get(get_book));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/api/books", post(create_book))
        .route("/api/books/:id", put(update_book).delete(delete_book))
        .route("/api/books/:id/rating", post(rate_book))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    // Combine public and protected routes
    public_routes.merge(protected_routes).with_state(state)
}
