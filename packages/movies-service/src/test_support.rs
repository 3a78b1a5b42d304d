//! Shared fixtures for handler and job tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use movies_api::{
    Cast, Credit, Genre, InternalNotification, Language, Movie, ACCOUNT_ID_HEADER,
    ACCOUNT_LOGIN_HEADER, ACCOUNT_ROLE_HEADER,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::{
    handlers::AppState,
    notify::{Notifier, NotifyError},
    router::build_router,
    storage::memory::MemoryStorage,
    tasks::TaskQueue,
    tmdb::{MetadataClient, MetadataError},
};

pub fn movie(id: i64, title: &str, revenue: i64) -> Movie {
    Movie {
        id,
        title: title.into(),
        revenue,
        genres: vec![Genre { id: 18, name: "Drama".into() }],
        languages: vec![Language { iso_code: "en".into(), name: "English".into() }],
        ..Default::default()
    }
}

pub fn credit(movie_id: i64) -> Credit {
    Credit {
        id: movie_id * 10,
        movie_id,
        cast: vec![Cast {
            cast_id: 4,
            id: 819,
            gender: 2,
            name: "Edward Norton".into(),
            character: "The Narrator".into(),
            order: 0,
            profile_path: None,
        }],
        crew: vec![],
    }
}

// ---------------------------------------------------------------------------
// StubMetadata
// ---------------------------------------------------------------------------

/// In-process [`MetadataClient`]. Unknown ids answer 404.
#[derive(Default)]
pub struct StubMetadata {
    pub credits: HashMap<i64, Credit>,
    pub movies: Vec<Movie>,
    pub calls: AtomicUsize,
    pub unavailable: AtomicBool,
}

impl StubMetadata {
    fn enter(&self) -> Result<(), MetadataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MetadataError::Status(503));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataClient for StubMetadata {
    async fn get_credits(&self, movie_id: i64) -> Result<Credit, MetadataError> {
        self.enter()?;
        self.credits.get(&movie_id).cloned().ok_or(MetadataError::Status(404))
    }

    async fn get_movie_details(&self, movie_id: i64) -> Result<Movie, MetadataError> {
        self.enter()?;
        self.movies
            .iter()
            .find(|m| m.id == movie_id)
            .cloned()
            .ok_or(MetadataError::Status(404))
    }

    async fn get_trending_movies(&self) -> Result<Vec<Movie>, MetadataError> {
        self.enter()?;
        Ok(self.movies.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, InternalNotification)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, template: &str, notification: &InternalNotification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((template.to_string(), notification.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TestApp
// ---------------------------------------------------------------------------

/// The full router over a [`MemoryStorage`], driven in-process.
pub struct TestApp {
    pub storage: Arc<MemoryStorage>,
    pub metadata: Arc<StubMetadata>,
    pub notifier: Arc<RecordingNotifier>,
    pub tasks: TaskQueue,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_metadata(StubMetadata::default())
    }

    pub fn with_metadata(metadata: StubMetadata) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let metadata = Arc::new(metadata);
        let notifier = Arc::new(RecordingNotifier::default());
        let tasks = TaskQueue::new(4, 64);
        let state = AppState::new(storage.clone(), metadata.clone(), tasks.clone())
            .with_notifier(notifier.clone());
        Self { storage, metadata, notifier, tasks, router: build_router(state) }
    }

    /// Send a request, optionally as account `account` (login `user<id>`),
    /// and return the status with the decoded body (`Value::Null` if empty).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        account: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = account {
            builder = builder
                .header(ACCOUNT_ID_HEADER, id.to_string())
                .header(ACCOUNT_LOGIN_HEADER, format!("user{id}"))
                .header(ACCOUNT_ROLE_HEADER, "user");
        }
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }
}
