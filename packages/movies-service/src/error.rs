//! Application-level error type returned by handlers.
//!
//! Every variant serialises to the [`ApiResponse`] envelope with only `error`
//! populated. Storage outcomes that the client caused (missing row, broken
//! reference, duplicate) are 400s; anything else is a 500 whose details stay
//! in the server log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use movies_api::ApiResponse;
use tracing::error;

use crate::{storage::StorageError, tmdb::MetadataError};

/// An error that a handler can return; converts directly to an HTTP response.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl AppError {
    /// A malformed path parameter, e.g. `invalid_param("movieId")`.
    pub fn invalid_param(name: &str) -> Self {
        AppError::BadRequest(format!("invalid param - {name}"))
    }

    pub fn invalid_pagination() -> Self {
        AppError::BadRequest("invalid pagination query params".into())
    }

    pub fn invalid_body() -> Self {
        AppError::BadRequest("invalid request body".into())
    }

    /// Map a storage failure for an operation on `resource`.
    pub fn storage(resource: &str, err: StorageError) -> Self {
        match err {
            StorageError::NotFound => {
                AppError::BadRequest(format!("{resource} with given identification doesn't exist"))
            }
            StorageError::MissingReference(_) => {
                AppError::BadRequest(format!("{resource} with given information doesn't exist"))
            }
            StorageError::Conflict(_) => {
                AppError::BadRequest(format!("{resource} with given information already exists"))
            }
            other => {
                error!(resource, "storage: {other}");
                AppError::Internal("storage error".into())
            }
        }
    }

    /// Map a metadata provider failure while fetching `resource`.
    pub fn metadata(resource: &str, err: MetadataError) -> Self {
        match err {
            MetadataError::Status(404) => AppError::NotFound(format!("{resource} not found")),
            other => {
                error!(resource, "metadata provider: {other}");
                AppError::Internal("api error".into())
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::BadRequest(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg) => msg,
        };
        (status, Json(ApiResponse::error(message))).into_response()
    }
}
