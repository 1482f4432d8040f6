//! Authentication API handlers

use crate::api::handlers::AppState;
use crate::api::models::MessageResponse;
use crate::auth::jwt::generate_token;
use crate::auth::models::{LoginRequest, LoginResponse, SignupRequest};
use crate::auth::password::{hash_password, verify_password};
use crate::core::error::{GrimoireError, Result};
use crate::db::models::User;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use uuid::Uuid;

/// Handler for POST /api/auth/signup - User registration
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!(email = %req.email, "Signup attempt");

    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(GrimoireError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    // Hash password
    let password_hash = hash_password(&req.password)?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        email: req.email.trim().to_string(),
        password_hash,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    // A taken email surfaces from the repository as ConflictError
    state.user_repo.create(&user).await?;

    tracing::info!(user_id = %user.id, email = %user.email, "User registered successfully");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User created".to_string(),
        }),
    ))
}

/// Handler for POST /api/auth/login - User login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!(email = %req.email, "Login attempt");

    // Unknown email and bad password report the same outward condition
    let user = state
        .user_repo
        .find_by_email(req.email.trim())
        .await?
        .ok_or_else(|| GrimoireError::Authentication("Invalid credentials".to_string()))?;

    let is_valid = verify_password(&req.password, &user.password_hash)?;
    if !is_valid {
        tracing::warn!(email = %req.email, "Invalid password");
        return Err(GrimoireError::Authentication(
            "Invalid credentials".to_string(),
        ));
    }

    // Generate JWT token
    let token = generate_token(&user.id, &state.jwt_secret, state.token_ttl_hours)?;

    tracing::info!(user_id = %user.id, "Login successful");

    Ok(Json(LoginResponse {
        user_id: user.id,
        token,
    }))
}
