//! HTTP request handlers for all movies-service endpoints.
//!
//! Each submodule covers one resource family. Handlers are async functions
//! that receive Axum extractors and return `Result<impl IntoResponse, AppError>`.
//! They validate input before touching storage: a malformed path, query or
//! body never reaches the [`Storage`] layer.
//!
//! Side effects the caller does not wait for go through [`TaskQueue`].

pub mod comments;
pub mod credits;
pub mod health;
pub mod movies;
pub mod ratings;

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use movies_api::{OrderBy, PaginationParams, PaginationQuery};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::AppError,
    middleware::auth::{Authenticator, TrustedHeaders},
    notify::{DisabledNotifier, Notifier},
    storage::{is_sortable, Storage},
    tasks::TaskQueue,
    tmdb::MetadataClient,
};

/// Shared application state threaded through all Axum handlers via [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub metadata: Arc<dyn MetadataClient>,
    pub notifier: Arc<dyn Notifier>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Queue for fire-and-forget side effects.
    pub tasks: TaskQueue,
}

impl AppState {
    /// State with trusted-header authentication and notifications disabled.
    pub fn new(storage: Arc<dyn Storage>, metadata: Arc<dyn MetadataClient>, tasks: TaskQueue) -> Self {
        Self {
            storage,
            metadata,
            notifier: Arc::new(DisabledNotifier),
            authenticator: Arc::new(TrustedHeaders),
            tasks,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }
}

// ---------------------------------------------------------------------------
// Input helpers
// ---------------------------------------------------------------------------

/// Parse a numeric path or query id; `name` is echoed in the error.
pub(crate) fn parse_id(raw: &str, name: &str) -> Result<i64, AppError> {
    raw.trim().parse().map_err(|_| AppError::invalid_param(name))
}

/// `liked` query flag. Accepts the usual spellings of a boolean and nothing else.
pub(crate) fn parse_liked(raw: Option<&str>) -> Result<bool, AppError> {
    match raw.map(str::trim) {
        Some("1" | "t" | "T" | "true" | "TRUE" | "True") => Ok(true),
        Some("0" | "f" | "F" | "false" | "FALSE" | "False") => Ok(false),
        _ => Err(AppError::invalid_param("liked")),
    }
}

/// Resolve a pagination query against a listing's default order and
/// sortable columns.
pub(crate) fn pagination(
    query: &PaginationQuery,
    default_order: OrderBy,
    sortable: &[&str],
) -> Result<PaginationParams, AppError> {
    let params = query.resolve(default_order).map_err(|e| {
        debug!("pagination: {e}");
        AppError::invalid_pagination()
    })?;
    if !is_sortable(&params.order_by, sortable) {
        debug!(column = %params.order_by.column, "pagination: column not sortable");
        return Err(AppError::invalid_pagination());
    }
    Ok(params)
}

/// `?liked=` on like endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LikedQuery {
    pub liked: Option<String>,
}

/// JSON request body whose rejection is the envelope's "invalid request body".
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    fn from_request(req: Request, state: &S) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            match Json::<T>::from_request(req, state).await {
                Ok(Json(value)) => Ok(JsonBody(value)),
                Err(rejection) => {
                    debug!("request body rejected: {rejection}");
                    Err(AppError::invalid_body())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MOVIE_ORDER_COLUMNS;

    #[test]
    fn liked_flag_spellings() {
        assert!(parse_liked(Some("true")).unwrap());
        assert!(parse_liked(Some("1")).unwrap());
        assert!(!parse_liked(Some("False")).unwrap());
        assert!(parse_liked(Some("yes")).is_err());
        assert!(parse_liked(None).is_err());
    }

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("550", "movieId").unwrap(), 550);
        assert!(parse_id("abc", "movieId").is_err());
    }

    #[test]
    fn unsortable_column_is_rejected() {
        let query = PaginationQuery { order_by: Some("overview".into()), ..Default::default() };
        assert!(pagination(&query, OrderBy::desc("revenue"), MOVIE_ORDER_COLUMNS).is_err());

        let query = PaginationQuery::default();
        let params = pagination(&query, OrderBy::desc("revenue"), MOVIE_ORDER_COLUMNS).unwrap();
        assert_eq!(params.order_by, OrderBy::desc("revenue"));
    }
}
