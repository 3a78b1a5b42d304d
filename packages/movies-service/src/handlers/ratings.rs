//! Per-user movie ratings.
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | GET | `/movies/{movieId}/rating` | required |
//! | POST | `/movies/{movieId}/rating` | required |
//! | DELETE | `/movies/{movieId}/rating` | required |
//! | GET | `/rating` | required |

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use movies_api::{ApiResponse, OrderBy, PaginationQuery, RatedMovie, Rating, RatingRequest};

use crate::{
    error::AppError,
    handlers::{pagination, parse_id, AppState, JsonBody},
    middleware::auth::RequireAccount,
    storage::{StorageError, RATED_ORDER_COLUMNS},
};

const RATING: &str = "rating";

/// The caller's rating, or `rating: 0` without a date when the movie was
/// never rated.
pub async fn get_rating(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(raw_id): Path<String>,
) -> Result<Json<Rating>, AppError> {
    let movie_id = parse_id(&raw_id, "movieId")?;
    match state.storage.get_rating(account.id, movie_id).await {
        Ok(rating) => Ok(Json(rating)),
        Err(StorageError::NotFound) => Ok(Json(Rating::unrated(account.id, movie_id))),
        Err(e) => Err(AppError::storage(RATING, e)),
    }
}

pub async fn rate(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(raw_id): Path<String>,
    JsonBody(body): JsonBody<RatingRequest>,
) -> Result<(StatusCode, Json<Rating>), AppError> {
    let movie_id = parse_id(&raw_id, "movieId")?;
    let rating = Rating::new(account.id, movie_id, body.rating, Utc::now());

    state
        .storage
        .add_rating(&rating)
        .await
        .map_err(|e| AppError::storage(RATING, e))?;
    Ok((StatusCode::CREATED, Json(rating)))
}

pub async fn delete_rating(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse>, AppError> {
    let movie_id = parse_id(&raw_id, "movieId")?;
    state
        .storage
        .delete_rating(account.id, movie_id)
        .await
        .map_err(|e| AppError::storage(RATING, e))?;
    Ok(Json(ApiResponse::empty()))
}

/// `GET /rating`: the caller's rated movies, newest rating first by default.
pub async fn list_rated(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Vec<RatedMovie>>, AppError> {
    let page = pagination(&page, OrderBy::desc("create_date"), RATED_ORDER_COLUMNS)?;
    let movies = state
        .storage
        .list_rated_movies(account.id, &page)
        .await
        .map_err(|e| AppError::storage(RATING, e))?;
    Ok(Json(movies))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::storage::Storage;
    use crate::test_support::{movie, TestApp};

    async fn seeded() -> TestApp {
        let app = TestApp::new();
        app.storage.add_movie(&movie(550, "Fight Club", 100)).await.unwrap();
        app.storage.add_movie(&movie(603, "The Matrix", 400)).await.unwrap();
        app
    }

    #[tokio::test]
    async fn unrated_movie_reads_as_zero() {
        let app = seeded().await;
        let (status, body) = app.request("GET", "/movies/550/rating", Some(7), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "user_id": 7, "movie_id": 550, "rating": 0 }));
    }

    #[tokio::test]
    async fn rating_is_created_and_aggregated() {
        let app = seeded().await;
        let (status, body) = app
            .request("POST", "/movies/550/rating", Some(7), Some(json!({ "rating": 8 })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["rating"], 8);
        assert_eq!(body["user_id"], 7);
        assert!(body["create_date"].is_string());

        let m = app.storage.get_movie(550).await.unwrap();
        assert_eq!((m.vote_count, m.vote_sum), (1, 0));

        // Same value again: aggregate untouched.
        app.request("POST", "/movies/550/rating", Some(7), Some(json!({ "rating": 8 }))).await;
        let m = app.storage.get_movie(550).await.unwrap();
        assert_eq!((m.vote_count, m.vote_sum), (1, 0));

        // Changed value: signed delta on vote_sum.
        app.request("POST", "/movies/550/rating", Some(7), Some(json!({ "rating": 5 }))).await;
        let m = app.storage.get_movie(550).await.unwrap();
        assert_eq!((m.vote_count, m.vote_sum), (1, -3));

        let (_, body) = app.request("GET", "/movies/550/rating", Some(7), None).await;
        assert_eq!(body["rating"], 5);
    }

    #[tokio::test]
    async fn missing_or_malformed_body_is_rejected() {
        let app = seeded().await;
        let before = app.storage.call_count();
        for body in [json!({}), json!({ "rating": "high" })] {
            let (status, resp) = app.request("POST", "/movies/550/rating", Some(7), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp, json!({ "error": "invalid request body" }));
        }
        assert_eq!(app.storage.call_count(), before);
    }

    #[tokio::test]
    async fn rating_unknown_movie_is_bad_request() {
        let app = seeded().await;
        let (status, body) = app
            .request("POST", "/movies/1/rating", Some(7), Some(json!({ "rating": 3 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("rating with given"));
    }

    #[tokio::test]
    async fn delete_then_delete_again() {
        let app = seeded().await;
        app.request("POST", "/movies/550/rating", Some(7), Some(json!({ "rating": 8 }))).await;

        let (status, body) = app.request("DELETE", "/movies/550/rating", Some(7), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));

        let (status, body) = app.request("DELETE", "/movies/550/rating", Some(7), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "rating with given identification doesn't exist" }));
    }

    #[tokio::test]
    async fn rated_movies_are_listed() {
        let app = seeded().await;
        app.request("POST", "/movies/550/rating", Some(7), Some(json!({ "rating": 8 }))).await;
        app.request("POST", "/movies/603/rating", Some(7), Some(json!({ "rating": 6 }))).await;
        app.request("POST", "/movies/603/rating", Some(8), Some(json!({ "rating": 1 }))).await;

        let (status, body) = app.request("GET", "/rating?order_by=rating%20desc", Some(7), None).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 550);
        assert_eq!(rows[0]["rating"], 8);
        assert_eq!(rows[1]["title"], "The Matrix");
        assert!(rows[1]["rate_date"].is_string());
    }
}
