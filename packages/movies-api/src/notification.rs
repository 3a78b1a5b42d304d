//! Payloads sent to the external notification service.
//!
//! The service is addressed as `POST {base}/internal?template={template}`
//! with an [`InternalNotification`] body.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Template name for "someone liked your comment".
pub const COMMENT_LIKE_TEMPLATE: &str = "commentLike";

/// An internal (service-to-service) notification request.
///
/// ```json
/// {
///   "resource_id": 12,
///   "resource": "comment",
///   "tag": "movie/5",
///   "recipients": [7],
///   "data": { "user": "alice" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InternalNotification {
    pub resource_id: i64,
    pub resource: String,
    pub tag: String,
    pub recipients: Vec<i64>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl InternalNotification {
    /// Notification for the author of `comment_id` that `liker` liked it.
    pub fn comment_liked(comment_id: i64, movie_id: i64, author_id: i64, liker: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert("user".to_string(), liker.to_string());
        Self {
            resource_id: comment_id,
            resource: "comment".to_string(),
            tag: format!("movie/{movie_id}"),
            recipients: vec![author_id],
            data,
        }
    }
}
