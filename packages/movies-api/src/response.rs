//! The JSON envelope every endpoint responds with.
//!
//! Exactly one of `data` and `error` is present on an endpoint that returns
//! something; both are omitted for bodiless successes such as deletes.
//!
//! ```json
//! { "data": { "id": 12, "content": "great movie" } }
//! { "error": "comment with given identification doesn't exist" }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T = serde_json::Value> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self { data: Some(data), error: None, meta: None }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self { data: None, error: Some(message.into()), meta: None }
    }

    /// `{}`; used for successful deletes.
    pub fn empty() -> Self {
        Self { data: None, error: None, meta: None }
    }
}
