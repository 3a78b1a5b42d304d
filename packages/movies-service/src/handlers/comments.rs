//! Movie comments and comment likes.
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | GET | `/comments?movie_id=` | none |
//! | POST | `/comments?movie_id=` | required |
//! | PUT | `/comments/{commId}` | required, owner only |
//! | DELETE | `/comments/{commId}` | required, owner only |
//! | POST | `/comments/{commId}/like?liked=` | required |
//! | GET | `/favourites/{movieId}/comments` | required |
//!
//! Ownership is enforced by storage: editing someone else's comment looks
//! exactly like editing a comment that does not exist.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use movies_api::{
    ApiResponse, Comment, CommentRequest, InternalNotification, OrderBy, PaginationQuery,
    COMMENT_LIKE_TEMPLATE,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    handlers::{pagination, parse_id, parse_liked, AppState, JsonBody, LikedQuery},
    middleware::auth::RequireAccount,
    storage::COMMENT_ORDER_COLUMNS,
};

const COMMENT: &str = "comment";

#[derive(Debug, Default, Deserialize)]
pub struct MovieIdQuery {
    pub movie_id: Option<String>,
}

impl MovieIdQuery {
    fn resolve(&self) -> Result<i64, AppError> {
        parse_id(self.movie_id.as_deref().unwrap_or_default(), "movieId")
    }
}

fn content(body: CommentRequest) -> Result<String, AppError> {
    if !body.is_valid() {
        return Err(AppError::invalid_body());
    }
    Ok(body.content)
}

pub async fn list(
    State(state): State<AppState>,
    Query(target): Query<MovieIdQuery>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let movie_id = target.resolve()?;
    let page = pagination(&page, OrderBy::asc("create_date"), COMMENT_ORDER_COLUMNS)?;

    let comments = state
        .storage
        .list_movie_comments(movie_id, &page)
        .await
        .map_err(|e| AppError::storage(COMMENT, e))?;
    Ok(Json(comments))
}

pub async fn add(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Query(target): Query<MovieIdQuery>,
    JsonBody(body): JsonBody<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let movie_id = target.resolve()?;
    let comment = Comment::new(account.id, movie_id, content(body)?, Utc::now());

    let stored = state
        .storage
        .add_movie_comment(&comment)
        .await
        .map_err(|e| AppError::storage(COMMENT, e))?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(raw_id): Path<String>,
    JsonBody(body): JsonBody<CommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let id = parse_id(&raw_id, "commentId")?;
    let mut comment = Comment::new(account.id, 0, content(body)?, Utc::now());
    comment.id = id;

    let stored = state
        .storage
        .update_comment(&comment)
        .await
        .map_err(|e| AppError::storage(COMMENT, e))?;
    Ok(Json(stored))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse>, AppError> {
    let id = parse_id(&raw_id, "commentId")?;
    state
        .storage
        .delete_comment(id, account.id)
        .await
        .map_err(|e| AppError::storage(COMMENT, e))?;
    Ok(Json(ApiResponse::empty()))
}

/// Same inverted flag as movie likes. A new like notifies the comment's
/// author in the background.
pub async fn like(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(raw_id): Path<String>,
    Query(query): Query<LikedQuery>,
) -> Result<Json<ApiResponse>, AppError> {
    let id = parse_id(&raw_id, "commentId")?;
    let liked = parse_liked(query.liked.as_deref())?;

    if liked {
        state
            .storage
            .delete_comment_like(account.id, id)
            .await
            .map_err(|e| AppError::storage(COMMENT, e))?;
        return Ok(Json(ApiResponse::empty()));
    }

    let comment = state
        .storage
        .like_comment(account.id, id)
        .await
        .map_err(|e| AppError::storage(COMMENT, e))?;

    let notification =
        InternalNotification::comment_liked(comment.id, comment.movie_id, comment.user_id, &account.login);
    let notifier = Arc::clone(&state.notifier);
    let _ = state.tasks.submit("notify_comment_like", async move {
        notifier.send(COMMENT_LIKE_TEMPLATE, &notification).await
    });

    Ok(Json(ApiResponse::empty()))
}

/// `GET /favourites/{movieId}/comments`: ids of the caller's liked comments
/// on one movie.
pub async fn list_liked(
    State(state): State<AppState>,
    RequireAccount(account): RequireAccount,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<i64>>, AppError> {
    let movie_id = parse_id(&raw_id, "movieId")?;
    let ids = state
        .storage
        .list_liked_comments_for_movie(movie_id, account.id)
        .await
        .map_err(|e| AppError::storage(COMMENT, e))?;
    Ok(Json(ids))
}
