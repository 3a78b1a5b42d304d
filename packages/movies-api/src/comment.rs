//! Comment types for `GET/POST /comments`, `PUT/DELETE /comments/{commId}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user comment on a movie.
///
/// `likes` is derived (the number of like-facts recorded for the comment)
/// and is never written by clients.
///
/// ```json
/// {
///   "id": 12,
///   "user_id": 7,
///   "movie_id": 5,
///   "create_date": "2026-03-01T10:00:00Z",
///   "update_date": "2026-03-01T10:00:00Z",
///   "content": "great movie",
///   "likes": 3
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub movie_id: i64,
    pub create_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    pub content: String,
    #[serde(default)]
    pub likes: i64,
}

impl Comment {
    /// A not-yet-stored comment; storage assigns the `id`.
    pub fn new(user_id: i64, movie_id: i64, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            user_id,
            movie_id,
            create_date: now,
            update_date: now,
            content: content.into(),
            likes: 0,
        }
    }
}

/// Body of `POST /comments` and `PUT /comments/{commId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentRequest {
    pub content: String,
}

impl CommentRequest {
    /// `content` is required and must not be blank.
    pub fn is_valid(&self) -> bool {
        !self.content.trim().is_empty()
    }
}
