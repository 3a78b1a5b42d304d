//! Account authentication extractors.
//!
//! Identity is resolved by an [`Authenticator`] strategy held in
//! [`AppState`]. The shipped strategy, [`TrustedHeaders`], reads the identity
//! an upstream gateway already verified from three request headers.
//!
//! Provides two extractors:
//! - [`RequireAccount`]: requires a valid identity; returns 403 if absent or invalid.
//! - [`OptionalAccount`]: accepts requests with or without an identity.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use movies_api::{AccountInfo, ApiResponse, ACCOUNT_ID_HEADER, ACCOUNT_LOGIN_HEADER, ACCOUNT_ROLE_HEADER};
use tracing::debug;

use crate::handlers::AppState;

// ---------------------------------------------------------------------------
// Auth errors
// ---------------------------------------------------------------------------

/// An authentication failure that maps to HTTP 403.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing header {0}")]
    Missing(&'static str),

    #[error("malformed header {0}")]
    Malformed(&'static str),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        debug!("auth: {self}");
        let body = ApiResponse::error("invalid account headers");
        (StatusCode::FORBIDDEN, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Resolves the caller's identity from request headers.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AccountInfo, AuthError>;
}

/// Trusts `X-Account-Id`, `X-Account` and `X-Role` as set by the gateway.
///
/// All three must be present and non-blank; the id must be an integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedHeaders;

impl Authenticator for TrustedHeaders {
    fn authenticate(&self, headers: &HeaderMap) -> Result<AccountInfo, AuthError> {
        let id = header(headers, ACCOUNT_ID_HEADER)?
            .parse::<i64>()
            .map_err(|_| AuthError::Malformed(ACCOUNT_ID_HEADER))?;
        let login = header(headers, ACCOUNT_LOGIN_HEADER)?.to_string();
        let role = header(headers, ACCOUNT_ROLE_HEADER)?.to_string();
        Ok(AccountInfo { id, login, role })
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    let value = headers.get(name).ok_or(AuthError::Missing(name))?;
    let value = value.to_str().map_err(|_| AuthError::Malformed(name))?.trim();
    if value.is_empty() {
        return Err(AuthError::Missing(name));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// RequireAccount extractor
// ---------------------------------------------------------------------------

/// Axum extractor that requires an authenticated account.
pub struct RequireAccount(pub AccountInfo);

impl<S> FromRequestParts<S> for RequireAccount
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        async move {
            let account = app_state.authenticator.authenticate(&parts.headers)?;
            Ok(RequireAccount(account))
        }
    }
}

// ---------------------------------------------------------------------------
// OptionalAccount extractor
// ---------------------------------------------------------------------------

/// Axum extractor that yields `Some(account)` when the caller is authenticated.
pub struct OptionalAccount(pub Option<AccountInfo>);

impl<S> FromRequestParts<S> for OptionalAccount
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let app_state = AppState::from_ref(state);
        async move {
            let account = app_state.authenticator.authenticate(&parts.headers).ok();
            Ok(OptionalAccount(account))
        }
    }
}
