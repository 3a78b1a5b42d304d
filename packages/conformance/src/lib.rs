//! Shared helpers for the movies-service conformance test suite.
//!
//! Provides [`spawn_service`], which binds a `TcpListener` on an ephemeral
//! port and wires up an in-process service backed by `MemoryStorage`. The
//! metadata provider is a second loopback server ([`spawn_provider`]) that
//! speaks the provider's wire format, so the real HTTP client is exercised
//! end to end.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use movies_api::{Genre, Language, Movie};
use movies_service::{build_router, AppState, MemoryStorage, TaskQueue, TmdbClient};
use serde_json::json;

/// Movie ids the stub provider knows. Any other id answers 404.
pub const PROVIDER_MOVIES: [i64; 2] = [550, 603];

/// A running service and handles on its internals.
pub struct ConformanceService {
    /// e.g. `http://127.0.0.1:51234`
    pub base_url: String,
    /// The storage instance the service uses, for seeding and inspection.
    pub storage: Arc<MemoryStorage>,
    /// The service's background queue; `wait_idle` makes side effects observable.
    pub tasks: TaskQueue,
}

/// Catalog row for tests to seed with `Storage::add_movie`.
pub fn movie(id: i64, title: &str, revenue: i64) -> Movie {
    Movie {
        id,
        title: title.into(),
        revenue,
        original_language: "en".into(),
        genres: vec![Genre { id: 18, name: "Drama".into() }],
        languages: vec![Language { iso_code: "en".into(), name: "English".into() }],
        ..Default::default()
    }
}

async fn provider_credits(Path(id): Path<i64>) -> Response {
    if !PROVIDER_MOVIES.contains(&id) {
        return (StatusCode::NOT_FOUND, Json(json!({ "status_code": 34 }))).into_response();
    }
    Json(json!({
        "id": id,
        "cast": [{
            "cast_id": 4,
            "character": "The Narrator",
            "gender": 2,
            "id": 819,
            "name": "Edward Norton",
            "order": 0,
            "profile_path": "/eIkFHNlfretLS1spAcIoihKUS62.jpg"
        }],
        "crew": [{
            "department": "Directing",
            "gender": 2,
            "id": 7467,
            "job": "Director",
            "name": "David Fincher",
            "profile_path": null
        }]
    }))
    .into_response()
}

async fn provider_details(Path(id): Path<i64>) -> Response {
    if !PROVIDER_MOVIES.contains(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({ "id": id, "title": format!("movie {id}"), "release_date": "" })).into_response()
}

async fn provider_trending() -> Json<serde_json::Value> {
    let results: Vec<_> = PROVIDER_MOVIES.iter().map(|id| json!({ "id": id })).collect();
    Json(json!({ "page": 1, "results": results }))
}

/// Start a loopback metadata provider and return its base URL.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound.
pub async fn spawn_provider() -> String {
    let app = Router::new()
        .route("/movie/{id}/credits", get(provider_credits))
        .route("/movie/{id}", get(provider_details))
        .route("/trending/movie/day", get(provider_trending));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub provider error");
    });
    format!("http://{addr}")
}

/// Start an ephemeral in-process service.
///
/// The service runs in a background `tokio` task bound to an OS-assigned
/// port on `127.0.0.1`, with trusted-header authentication and notifications
/// disabled.
///
/// # Panics
///
/// Panics if a TCP listener cannot be bound or the service fails to start.
pub async fn spawn_service() -> ConformanceService {
    let provider_url = spawn_provider().await;
    let metadata = TmdbClient::new(provider_url, "conformance-key", Duration::from_secs(5))
        .expect("build provider client");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");

    let storage = Arc::new(MemoryStorage::new());
    let tasks = TaskQueue::new(4, 64);
    let state = AppState::new(storage.clone(), Arc::new(metadata), tasks.clone());
    let router = build_router(state);

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("conformance service error");
    });

    ConformanceService { base_url: format!("http://{addr}"), storage, tasks }
}
