//! Database models
//!
//! Data structures representing database tables. Wire serialization keeps
//! the frontend's camelCase field names.

use serde::{Deserialize, Serialize};

/// User record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

/// A single user's grade on a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub user_id: String,
    pub grade: f64,
}

/// Book record with its embedded ratings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    /// Owner; only this user may update or delete the book
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub year: i64,
    pub genre: String,
    pub image_url: String,
    pub ratings: Vec<Rating>,
    pub average_rating: f64,
    pub created_at: String,
}
