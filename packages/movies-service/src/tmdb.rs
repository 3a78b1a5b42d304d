//! Outbound client for the third-party movie metadata provider (TMDB).
//!
//! Used for two things: read-through cache fill of credits, and trending
//! movie ingestion. There is no retry, backoff or rate limiting; every call
//! is best-effort enrichment.
//!
//! Endpoints used, all authenticated with an `api_key` query parameter:
//!
//! - `GET {base}/movie/{id}/credits`
//! - `GET {base}/movie/{id}`
//! - `GET {base}/trending/movie/day`

use std::time::Duration;

use async_trait::async_trait;
use movies_api::{Credit, Movie};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// MetadataError
// ---------------------------------------------------------------------------

/// Errors returned by a [`MetadataClient`].
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("provider returned status {0}")]
    Status(u16),

    /// The provider's body was not the expected JSON.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// MetadataClient trait
// ---------------------------------------------------------------------------

/// Source of truth for movie metadata and credits.
#[async_trait]
pub trait MetadataClient: Send + Sync + 'static {
    async fn get_credits(&self, movie_id: i64) -> Result<Credit, MetadataError>;

    async fn get_movie_details(&self, movie_id: i64) -> Result<Movie, MetadataError>;

    /// Today's trending movies, each resolved to its full details. Ids whose
    /// detail fetch fails are skipped; only a failure of the trending list
    /// itself is an error.
    async fn get_trending_movies(&self) -> Result<Vec<Movie>, MetadataError>;
}

#[derive(Debug, Deserialize)]
struct TrendingPage {
    #[serde(default)]
    results: Vec<TrendingEntry>,
}

#[derive(Debug, Deserialize)]
struct TrendingEntry {
    id: i64,
}

// ---------------------------------------------------------------------------
// TmdbClient
// ---------------------------------------------------------------------------

/// [`MetadataClient`] backed by the TMDB v3 REST API.
#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, MetadataError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Use a pre-configured `reqwest::Client`.
    pub fn with_client(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MetadataError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl MetadataClient for TmdbClient {
    async fn get_credits(&self, movie_id: i64) -> Result<Credit, MetadataError> {
        let mut credit: Credit = self.get_json(&format!("/movie/{movie_id}/credits")).await?;
        credit.movie_id = movie_id;
        Ok(credit)
    }

    async fn get_movie_details(&self, movie_id: i64) -> Result<Movie, MetadataError> {
        self.get_json(&format!("/movie/{movie_id}")).await
    }

    async fn get_trending_movies(&self) -> Result<Vec<Movie>, MetadataError> {
        let page: TrendingPage = self.get_json("/trending/movie/day").await?;
        debug!(count = page.results.len(), "tmdb: trending list fetched");

        let mut movies = Vec::with_capacity(page.results.len());
        for entry in page.results {
            match self.get_movie_details(entry.id).await {
                Ok(movie) => movies.push(movie),
                Err(e) => warn!(movie_id = entry.id, "tmdb: skipping trending movie: {e}"),
            }
        }
        Ok(movies)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::{routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    const KEY: &str = "test-key";

    fn key_ok(q: &HashMap<String, String>) -> bool {
        q.get("api_key").map(String::as_str) == Some(KEY)
    }

    async fn credits(
        Path(id): Path<i64>,
        Query(q): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        if !key_ok(&q) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        if id == 404 {
            return (StatusCode::NOT_FOUND, Json(json!({ "status_code": 34 }))).into_response();
        }
        Json(json!({
            "id": id,
            "cast": [{ "cast_id": 1, "id": 819, "name": "Edward Norton", "character": "Narrator", "order": 0 }],
            "crew": []
        }))
        .into_response()
    }

    async fn details(Path(id): Path<i64>) -> axum::response::Response {
        match id {
            2 => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            3 => "not json".into_response(),
            _ => Json(json!({ "id": id, "title": format!("movie {id}"), "release_date": "" }))
                .into_response(),
        }
    }

    async fn trending() -> Json<serde_json::Value> {
        Json(json!({ "page": 1, "results": [{ "id": 1 }, { "id": 2 }, { "id": 3 }, { "id": 4 }] }))
    }

    /// Spawn a loopback provider stub and return its base URL.
    async fn spawn_stub() -> String {
        let app = Router::new()
            .route("/3/movie/{id}/credits", get(credits))
            .route("/3/movie/{id}", get(details))
            .route("/3/trending/movie/day", get(trending));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/3/")
    }

    async fn client() -> TmdbClient {
        TmdbClient::new(spawn_stub().await, KEY, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_credits_with_api_key() {
        let c = client().await;
        let credit = c.get_credits(550).await.unwrap();
        assert_eq!(credit.id, 550);
        assert_eq!(credit.movie_id, 550);
        assert_eq!(credit.cast[0].name, "Edward Norton");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let c = client().await;
        assert!(matches!(c.get_credits(404).await, Err(MetadataError::Status(404))));

        let wrong_key = TmdbClient::new(spawn_stub().await, "nope", Duration::from_secs(5)).unwrap();
        assert!(matches!(wrong_key.get_credits(1).await, Err(MetadataError::Status(401))));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let c = client().await;
        assert!(matches!(c.get_movie_details(3).await, Err(MetadataError::Decode(_))));
    }

    #[tokio::test]
    async fn trending_skips_unresolvable_ids() {
        let c = client().await;
        let movies = c.get_trending_movies().await.unwrap();
        let ids: Vec<i64> = movies.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert!(movies[0].release_date.is_none());
    }

    #[tokio::test]
    async fn unreachable_provider_is_http_error() {
        let c = TmdbClient::new("http://127.0.0.1:1", KEY, Duration::from_secs(1)).unwrap();
        assert!(matches!(c.get_trending_movies().await, Err(MetadataError::Http(_))));
    }
}
