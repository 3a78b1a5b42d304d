//! Trending movie ingestion.
//!
//! [`TrendingIngest`] pulls the provider's trending list and upserts every
//! movie into local storage. It is a single best-effort pass, repeated on an
//! interval by [`TrendingIngest::run`] when `MOVIES_INGEST_INTERVAL_SECS` is
//! non-zero.
//!
//! Errors for individual movies are **logged** and **do not stop** the pass;
//! nothing is retried until the next interval.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::storage::{Storage, StorageError};
use crate::tmdb::{MetadataClient, MetadataError};

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Movies stored with all associations.
    pub stored: usize,
    /// Movies stored, but one or more association syncs failed.
    pub partial: usize,
    /// Movies not stored at all.
    pub failed: usize,
}

pub struct TrendingIngest {
    metadata: Arc<dyn MetadataClient>,
    storage: Arc<dyn Storage>,
}

impl TrendingIngest {
    pub fn new(metadata: Arc<dyn MetadataClient>, storage: Arc<dyn Storage>) -> Self {
        Self { metadata, storage }
    }

    /// Fetch today's trending movies and upsert each one.
    ///
    /// Only a failure to fetch the trending list is an error.
    pub async fn ingest_once(&self) -> Result<IngestReport, MetadataError> {
        let movies = self.metadata.get_trending_movies().await?;
        let mut report = IngestReport::default();

        for movie in &movies {
            match self.storage.add_movie(movie).await {
                Ok(()) => report.stored += 1,
                Err(StorageError::Associations(failures)) => {
                    report.partial += 1;
                    for f in failures {
                        warn!(movie_id = movie.id, "ingest: {} sync failed: {}", f.association, f.message);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(movie_id = movie.id, "ingest: failed to store movie: {e}");
                }
            }
        }

        Ok(report)
    }

    /// Run ingestion indefinitely, sleeping `interval` between passes.
    ///
    /// This method never returns; spawn it with [`tokio::spawn`].
    pub async fn run(self, interval: Duration) {
        loop {
            match self.ingest_once().await {
                Ok(report) => info!(
                    stored = report.stored,
                    partial = report.partial,
                    failed = report.failed,
                    "ingest: trending pass finished"
                ),
                Err(e) => warn!("ingest: failed to fetch trending movies: {e}"),
            }

            tokio::time::sleep(interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::{routing::get, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    use crate::storage::memory::MemoryStorage;
    use crate::storage::Association;
    use crate::test_support::{movie, StubMetadata};
    use crate::tmdb::TmdbClient;

    async fn trending() -> Json<serde_json::Value> {
        Json(json!({ "results": [{ "id": 550 }, { "id": 13 }, { "id": 603 }] }))
    }

    async fn details(Path(id): Path<i64>) -> axum::response::Response {
        if id == 13 {
            return StatusCode::NOT_FOUND.into_response();
        }
        Json(json!({
            "id": id,
            "title": format!("movie {id}"),
            "revenue": id * 1000,
            "release_date": "1999-10-15",
            "genres": [{ "id": 18, "name": "Drama" }],
            "spoken_languages": [{ "iso_639_1": "en", "name": "English" }]
        }))
        .into_response()
    }

    /// Spawn a loopback axum server and return its base URL.
    async fn spawn_mock_server(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn trending_movies_are_stored_locally() {
        let app = Router::new()
            .route("/trending/movie/day", get(trending))
            .route("/movie/{id}", get(details));
        let base = spawn_mock_server(app).await;

        let client = TmdbClient::new(base, "k", Duration::from_secs(5)).unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let ingest = TrendingIngest::new(Arc::new(client), storage.clone());

        let report = ingest.ingest_once().await.unwrap();
        assert_eq!(report, IngestReport { stored: 2, partial: 0, failed: 0 });

        let fight_club = storage.get_movie(550).await.unwrap();
        assert_eq!(fight_club.revenue, 550_000);
        assert_eq!(fight_club.genres[0].name, "Drama");
        assert!(storage.get_movie(13).await.is_err());
    }

    #[tokio::test]
    async fn repeated_pass_upserts() {
        let metadata = StubMetadata {
            movies: vec![movie(1, "One", 10), movie(2, "Two", 20)],
            ..Default::default()
        };
        let storage = Arc::new(MemoryStorage::new());
        let ingest = TrendingIngest::new(Arc::new(metadata), storage.clone());

        ingest.ingest_once().await.unwrap();
        let report = ingest.ingest_once().await.unwrap();
        assert_eq!(report.stored, 2);
    }

    #[tokio::test]
    async fn storage_failures_are_counted() {
        let metadata = StubMetadata {
            movies: vec![movie(1, "One", 10)],
            ..Default::default()
        };
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_all(true);
        let ingest = TrendingIngest::new(Arc::new(metadata), storage);

        let report = ingest.ingest_once().await.unwrap();
        assert_eq!(report, IngestReport { stored: 0, partial: 0, failed: 1 });
    }

    #[tokio::test]
    async fn association_failures_are_partial() {
        let metadata = StubMetadata {
            movies: vec![movie(1, "One", 10), movie(2, "Two", 20)],
            ..Default::default()
        };
        let storage = Arc::new(MemoryStorage::new());
        storage.break_association(Some(Association::Genres));
        let ingest = TrendingIngest::new(Arc::new(metadata), storage.clone());

        let report = ingest.ingest_once().await.unwrap();
        assert_eq!(report, IngestReport { stored: 0, partial: 2, failed: 0 });
        let one = storage.get_movie(1).await.unwrap();
        assert_eq!(one.title, "One");
        assert!(one.genres.is_empty());
    }

    #[tokio::test]
    async fn unreachable_trending_list_is_an_error() {
        let metadata = StubMetadata::default();
        metadata.unavailable.store(true, std::sync::atomic::Ordering::SeqCst);
        let ingest = TrendingIngest::new(Arc::new(metadata), Arc::new(MemoryStorage::new()));
        assert!(matches!(ingest.ingest_once().await, Err(MetadataError::Status(503))));
    }
}
