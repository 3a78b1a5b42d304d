//! `GET /movies/{movieId}/credits`: read-through cache over the metadata
//! provider.
//!
//! A local hit is served as is. On a miss the provider's credits are returned
//! straight away and stored by a background job; a failed store is only
//! logged, the next request simply fetches again.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use movies_api::Credit;
use tracing::debug;

use crate::{
    error::AppError,
    handlers::{parse_id, AppState},
    storage::StorageError,
};

const CREDITS: &str = "credits";

pub async fn get_credits(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Credit>, AppError> {
    let movie_id = parse_id(&raw_id, "movieId")?;

    match state.storage.get_credits(movie_id).await {
        Ok(credit) => return Ok(Json(credit)),
        Err(StorageError::NotFound) => debug!(movie_id, "credits: cache miss"),
        Err(e) => return Err(AppError::storage(CREDITS, e)),
    }

    let mut credit = state
        .metadata
        .get_credits(movie_id)
        .await
        .map_err(|e| AppError::metadata(CREDITS, e))?;
    credit.movie_id = movie_id;

    let storage = Arc::clone(&state.storage);
    let to_store = credit.clone();
    let _ = state.tasks.submit("store_credits", async move {
        storage.add_credits(&to_store).await
    });

    Ok(Json(credit))
}
