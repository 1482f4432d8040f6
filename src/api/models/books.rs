//! Book API request models
//!
//! Client payloads never carry identity: unknown keys such as `userId` or
//! `id` are dropped at deserialization, and ownership always comes from
//! the authenticated caller.

use serde::Deserialize;

/// Payload of the `book` multipart field on creation
#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub year: i64,
}

/// Patch payload on update; absent fields are left untouched
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i64>,
}

/// Rating submission payload
#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: Option<f64>,
}
