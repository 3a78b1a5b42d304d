//! Movie catalog, movie likes ("favourites") and view history.
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | GET | `/movies` | none |
//! | GET | `/movies/{movieId}` | optional; records a view when present |
//! | POST | `/movies/{movieId}/like?liked=` | required |
//! | GET | `/favourites` | required |
//! | GET | `/favourites/{movieId}` | required |
//! | GET | `/history` | required |

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use movies_api::{ApiResponse, Movie, MoviePreview, OrderBy, PaginationQuery};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AppError,
    handlers::{pagination, parse_id, parse_liked, AppState, LikedQuery},
    middleware::auth::{OptionalAccount, RequireAccount},
    storage::MOVIE_ORDER_COLUMNS,
};

const MOVIE: &str = "movie";
const LIKE: &str = "like";

fn default_order() -> OrderBy {
    OrderBy::desc("revenue")
}

#[derive(Debug, Default, Deserialize)]
pub struct TitleQuery {
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /movies
// ---------------------------------------------------------------------------

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<TitleQuery>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Vec<MoviePreview>>, AppError> {
    let page = pagination(&page, default_order(), MOVIE_ORDER_COLUMNS)?;
    let title = filter.title.unwrap_or_default();

    let movies = state
        .storage
        .list_movies(&title, &page)
        .await
        .map_err(|e| AppError::storage(MOVIE, e))?;
    Ok(Json(movies))
}

// ---------------------------------------------------------------------------
// GET /movies/{movieId}
// ---------------------------------------------------------------------------

pub async fn get_movie(
    State(state): State<AppState>,
    OptionalAccount(account): OptionalAccount,
    Path(raw_id): Path<String>,
) -> Result<Json<Movie>, AppError> {
    let id = parse_id(&raw_id, "movieId")?;
    let movie = state
        .storage
        .get_movie(id)
        .await
        .map_err(|e| AppError::storage(MOVIE, e))?;

    if let Some(account) = account {
        let storage = Arc::clone(&state.storage);
        let user_id = account.id;
        // A rejected job is logged by the queue; the response does not depend on it.
        let _ = state.tasks.submit("record_view", async move {
            storage.add_recent_viewed_movie(user_id, id).await
        });
    }

    Ok(Json(movie))
}

// ---------------------------------------------------------------------------
// POST /movies/{movieId}/like
// ---------------------------------------------------------------------------

/// `liked=false` records a like, `liked=true` removes it. Clients send the
/// current state of the toggle, so the flag reads inverted.
pub async fn like(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(raw_id): Path<String>,
    Query(query): Query<LikedQuery>,
) -> Result<Json<ApiResponse>, AppError> {
    let movie_id = parse_id(&raw_id, "movieId")?;
    let liked = parse_liked(query.liked.as_deref())?;

    let result = if liked {
        state.storage.delete_movie_like(account.id, movie_id).await
    } else {
        state.storage.like_movie(account.id, movie_id).await
    };
    result.map_err(|e| AppError::storage(LIKE, e))?;

    Ok(Json(ApiResponse::empty()))
}

// ---------------------------------------------------------------------------
// GET /favourites, GET /favourites/{movieId}
// ---------------------------------------------------------------------------

pub async fn list_liked(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<MoviePreview>>>, AppError> {
    let page = pagination(&page, default_order(), MOVIE_ORDER_COLUMNS)?;
    let movies = state
        .storage
        .list_liked_movies(account.id, &page)
        .await
        .map_err(|e| AppError::storage(MOVIE, e))?;
    Ok(Json(ApiResponse::data(movies)))
}

pub async fn check_liked(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let movie_id = parse_id(&raw_id, "movieId")?;
    let liked = state
        .storage
        .check_liked(account.id, movie_id)
        .await
        .map_err(|e| AppError::storage(LIKE, e))?;
    Ok(Json(json!({ "liked": liked })))
}

// ---------------------------------------------------------------------------
// GET /history
// ---------------------------------------------------------------------------

pub async fn history(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
) -> Result<Json<Vec<MoviePreview>>, AppError> {
    let movies = state
        .storage
        .list_recent_viewed_movies(account.id)
        .await
        .map_err(|e| AppError::storage(MOVIE, e))?;
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
        app.storage.add_movie(&movie(604, "The Matrix Reloaded", 300)).await.unwrap();
        app
    }

    #[tokio::test]
    async fn list_defaults_to_revenue_desc() {
        let app = seeded().await;
        let (status, body) = app.request("GET", "/movies", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body.as_array().unwrap().iter().map(|m| m["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![603, 604, 550]);
    }

    #[tokio::test]
    async fn list_filters_by_title_and_paginates() {
        let app = seeded().await;
        let (status, body) = app
            .request("GET", "/movies?title=Matrix&order_by=title&limit=1&offset=1", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{
            "id": 604,
            "title": "The Matrix Reloaded",
            "poster_path": null,
            "release_date": null,
            "vote_average": 0.0
        }]));
    }

    #[tokio::test]
    async fn invalid_pagination_is_rejected_before_storage() {
        let app = seeded().await;
        let before = app.storage.call_count();

        for uri in ["/movies?limit=ten", "/movies?offset=-1", "/movies?order_by=overview", "/movies?order_by=title%3B%20drop"] {
            let (status, body) = app.request("GET", uri, None, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, json!({ "error": "invalid pagination query params" }));
        }
        assert_eq!(app.storage.call_count(), before);
    }

    #[tokio::test]
    async fn get_returns_requested_movie() {
        let app = seeded().await;
        let (status, body) = app.request("GET", "/movies/550", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 550);
        assert_eq!(body["genres"][0]["name"], "Drama");
    }

    #[tokio::test]
    async fn non_numeric_id_never_reaches_storage() {
        let app = seeded().await;
        let before = app.storage.call_count();
        let (status, body) = app.request("GET", "/movies/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "invalid param - movieId" }));
        assert_eq!(app.storage.call_count(), before);
    }

    #[tokio::test]
    async fn missing_movie_is_bad_request() {
        let app = seeded().await;
        let (status, body) = app.request("GET", "/movies/1", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "movie with given identification doesn't exist" }));
    }

    #[tokio::test]
    async fn storage_failure_is_internal_error() {
        let app = seeded().await;
        app.storage.fail_all(true);
        let (status, body) = app.request("GET", "/movies/550", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "storage error" }));
    }

    #[tokio::test]
    async fn viewing_with_identity_records_history() {
        let app = seeded().await;
        app.request("GET", "/movies/550", Some(7), None).await;
        app.request("GET", "/movies/603", Some(7), None).await;
        app.request("GET", "/movies/604", None, None).await;
        app.tasks.wait_idle().await;

        let (status, body) = app.request("GET", "/history", Some(7), None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = body.as_array().unwrap().iter().map(|m| m["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![603, 550]);
        assert_eq!(app.tasks.stats().succeeded, 2);
    }

    #[tokio::test]
    async fn like_flag_is_inverted() {
        let app = seeded().await;

        let (status, body) = app.request("POST", "/movies/550/like?liked=false", Some(7), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));
        assert!(app.storage.check_liked(7, 550).await.unwrap());

        let (status, _) = app.request("POST", "/movies/550/like?liked=true", Some(7), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!app.storage.check_liked(7, 550).await.unwrap());
    }

    #[tokio::test]
    async fn double_like_is_conflict_shaped_400() {
        let app = seeded().await;
        app.request("POST", "/movies/550/like?liked=false", Some(7), None).await;
        let (status, body) = app.request("POST", "/movies/550/like?liked=false", Some(7), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "like with given information already exists" }));
    }

    #[tokio::test]
    async fn unliking_absent_like_is_not_found_shaped_400() {
        let app = seeded().await;
        let (status, body) = app.request("POST", "/movies/550/like?liked=true", Some(7), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "like with given identification doesn't exist" }));
    }

    #[tokio::test]
    async fn like_requires_flag_and_identity() {
        let app = seeded().await;
        let (status, body) = app.request("POST", "/movies/550/like", Some(7), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "invalid param - liked" }));

        let (status, body) = app.request("POST", "/movies/550/like?liked=false", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "error": "invalid account headers" }));
    }

    #[tokio::test]
    async fn favourites_are_wrapped_in_data() {
        let app = seeded().await;
        app.request("POST", "/movies/550/like?liked=false", Some(7), None).await;
        app.request("POST", "/movies/603/like?liked=false", Some(7), None).await;

        let (status, body) = app.request("GET", "/favourites?order_by=id", Some(7), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["id"], 550);
        assert_eq!(body["data"][1]["id"], 603);

        let (_, body) = app.request("GET", "/favourites/603", Some(7), None).await;
        assert_eq!(body, json!({ "liked": true }));
        let (_, body) = app.request("GET", "/favourites/604", Some(7), None).await;
        assert_eq!(body, json!({ "liked": false }));
    }
}
