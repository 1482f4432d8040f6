//! Database models
//!
//! Data structures representing database records. Serialization uses the
//! camelCase field names the API clients expect.

use serde::{Deserialize, Serialize};

/// User record in the database
///
/// The password hash is never serialized to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

/// Book record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: i64,
    pub image_url: String,
    /// Identity of the creator; immutable after creation and gates
    /// update/delete.
    #[serde(rename = "userId")]
    pub owner_user_id: String,
    /// At most one entry per distinct user, in submission order
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub created_at: String,
}

/// A single grade given to a book by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub user_id: String,
    pub grade: f64,
}
