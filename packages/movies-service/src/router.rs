//! Assembles the Axum [`Router`] from all handler modules.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{comments, credits, health, movies, ratings, AppState};

/// Build the complete application router with shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::health))
        // Movies
        .route("/movies", get(movies::list))
        .route("/movies/{movieId}", get(movies::get_movie))
        .route("/movies/{movieId}/credits", get(credits::get_credits))
        .route("/movies/{movieId}/like", post(movies::like))
        .route(
            "/movies/{movieId}/rating",
            get(ratings::get_rating)
                .post(ratings::rate)
                .delete(ratings::delete_rating),
        )
        // Caller-scoped views
        .route("/favourites", get(movies::list_liked))
        .route("/favourites/{movieId}", get(movies::check_liked))
        .route("/favourites/{movieId}/comments", get(comments::list_liked))
        .route("/rating", get(ratings::list_rated))
        .route("/history", get(movies::history))
        // Comments
        .route("/comments", get(comments::list).post(comments::add))
        .route(
            "/comments/{commId}",
            put(comments::update).delete(comments::delete),
        )
        .route("/comments/{commId}/like", post(comments::like))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
