use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// Author fields joined into every post row.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PostAuthor {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PostGroup {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author: PostAuthor,
    pub group: Option<PostGroup>,
    /// Path relative to the media root, e.g. `posts/<uuid>.png`.
    pub image: Option<String>,
}

/// Field values of a post that passed validation, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

pub mod db_operations;
