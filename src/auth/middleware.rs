//! Authentication middleware

use crate::auth::jwt::validate_token;
use crate::core::error::{GrimoireError, Result};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Extension holding the authenticated caller's identity
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
}

/// Authentication middleware for protected routes.
///
/// Extracts a bearer token from the Authorization header, validates it,
/// and attaches the caller's identity to the request. Any failure
/// short-circuits with an unauthorized response.
pub async fn authenticate(
    State(state): State<crate::api::handlers::AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    use axum::http::header;

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let token = match token {
        Some(t) => t,
        None => {
            let error = GrimoireError::Authentication("Missing bearer token".to_string());
            return error.into_response();
        }
    };

    let claims = match validate_token(token, &state.jwt_secret) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
    });

    next.run(request).await
}

// Implement FromRequestParts for AuthUser to enable extraction in handlers
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = GrimoireError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| GrimoireError::Authentication("User not authenticated".to_string()))
    }
}
