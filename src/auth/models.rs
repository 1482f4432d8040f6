//! Authentication request/response models

use serde::{Deserialize, Serialize};

/// Sign-up request
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub token: String,
}
