//! Ratings: `GET/POST/DELETE /movies/{movieId}/rating`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's rating of a movie, keyed by `(user_id, movie_id)`.
///
/// At most one rating exists per pair. `create_date` is absent only on the
/// placeholder returned for a movie the caller has never rated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rating {
    pub user_id: i64,
    pub movie_id: i64,
    pub rating: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
}

impl Rating {
    pub fn new(user_id: i64, movie_id: i64, value: i32, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            movie_id,
            rating: Some(value),
            create_date: Some(now),
        }
    }

    /// Placeholder served when the caller has not rated the movie.
    pub fn unrated(user_id: i64, movie_id: i64) -> Self {
        Self {
            user_id,
            movie_id,
            rating: Some(0),
            create_date: None,
        }
    }
}

/// Body of `POST /movies/{movieId}/rating`. `rating` is required.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RatingRequest {
    pub rating: i32,
}
