//! Pagination and ordering query parameters shared by every list endpoint.
//!
//! `?order_by=revenue DESC&offset=20&limit=10`
//!
//! Absent and empty values mean "use the default", and so does `limit=0`.
//! The column named by `order_by` is only checked for shape here; the
//! storage layer decides which columns are actually sortable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of rows returned when `limit` is not given.
pub const DEFAULT_LIMIT: u32 = 50;

/// Upper bound on `limit`. Larger requests are clamped.
pub const MAX_LIMIT: u32 = 500;

/// A single-column ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), descending: false }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), descending: true }
    }

    /// Parse `"column"`, `"column ASC"` or `"column DESC"`.
    ///
    /// Column names are restricted to lowercase ASCII letters, digits and
    /// underscores. The direction keyword is case-insensitive.
    pub fn parse(raw: &str) -> Result<Self, PaginationError> {
        let mut parts = raw.split_whitespace();
        let column = parts.next().ok_or(PaginationError::InvalidOrder)?;
        let descending = match parts.next() {
            None => false,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => false,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => true,
            Some(_) => return Err(PaginationError::InvalidOrder),
        };
        if parts.next().is_some() {
            return Err(PaginationError::InvalidOrder);
        }
        let valid = column
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if !valid {
            return Err(PaginationError::InvalidOrder);
        }
        Ok(Self { column: column.to_string(), descending })
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{} {}", self.column, dir)
    }
}

/// Resolved, validated pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationParams {
    pub order_by: OrderBy,
    pub offset: u32,
    pub limit: u32,
}

impl PaginationParams {
    /// Default pagination with the given ordering.
    pub fn with_order(order_by: OrderBy) -> Self {
        Self { order_by, offset: 0, limit: DEFAULT_LIMIT }
    }
}

/// Raw query string form, as extracted by the HTTP layer.
///
/// Values are kept as strings so that a malformed number can be reported as
/// a pagination error instead of a generic query rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationQuery {
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

impl PaginationQuery {
    /// Validate the query, filling in `default_order` when `order_by` is absent.
    pub fn resolve(&self, default_order: OrderBy) -> Result<PaginationParams, PaginationError> {
        let order_by = match non_empty(&self.order_by) {
            Some(raw) => OrderBy::parse(raw)?,
            None => default_order,
        };
        let offset = match non_empty(&self.offset) {
            Some(raw) => raw.parse::<u32>().map_err(|_| PaginationError::InvalidOffset)?,
            None => 0,
        };
        let limit = match non_empty(&self.limit) {
            Some(raw) => match raw.parse::<u32>().map_err(|_| PaginationError::InvalidLimit)? {
                0 => DEFAULT_LIMIT,
                n => n,
            },
            None => DEFAULT_LIMIT,
        };
        Ok(PaginationParams {
            order_by,
            offset,
            limit: limit.min(MAX_LIMIT),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationError {
    InvalidOrder,
    InvalidOffset,
    InvalidLimit,
}

impl fmt::Display for PaginationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaginationError::InvalidOrder => f.write_str("order_by must be `column [ASC|DESC]`"),
            PaginationError::InvalidOffset => f.write_str("offset must be a non-negative integer"),
            PaginationError::InvalidLimit => f.write_str("limit must be a non-negative integer"),
        }
    }
}

impl std::error::Error for PaginationError {}
