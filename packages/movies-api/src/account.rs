//! Caller identity.
//!
//! Identity is established by an upstream gateway and forwarded in three
//! trusted headers. The service never persists it.

use serde::{Deserialize, Serialize};

/// Header carrying the numeric account id.
pub const ACCOUNT_ID_HEADER: &str = "X-Account-Id";
/// Header carrying the account login.
pub const ACCOUNT_LOGIN_HEADER: &str = "X-Account";
/// Header carrying the account role.
pub const ACCOUNT_ROLE_HEADER: &str = "X-Role";

/// Per-request identity of an already-authenticated account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: i64,
    pub login: String,
    pub role: String,
}
