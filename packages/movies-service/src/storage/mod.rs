//! Storage abstraction layer for the movies service.
//!
//! The [`Storage`] trait is the only way handlers reach persisted data. It
//! owns every relational rule: ownership-scoped comment mutation, like-fact
//! uniqueness, the bounded view history and the rating aggregate.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStorage`] | Tests, conformance suite, ephemeral instances |
//! | [`SqliteStorage`] | Production; durable single-file database |
//!
//! [`MemoryStorage`]: memory::MemoryStorage
//! [`SqliteStorage`]: sqlite::SqliteStorage

pub mod memory;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use movies_api::{Comment, Credit, Movie, MoviePreview, OrderBy, PaginationParams, RatedMovie, Rating};

/// Number of most-recently-viewed movies kept per user.
pub const RECENT_HISTORY_LIMIT: usize = 20;

/// Sortable columns of movie listings (`/movies`, `/favourites`).
pub const MOVIE_ORDER_COLUMNS: &[&str] = &[
    "id",
    "title",
    "release_date",
    "revenue",
    "budget",
    "popularity",
    "runtime",
    "vote_average",
    "vote_count",
];

/// Sortable columns of comment listings.
pub const COMMENT_ORDER_COLUMNS: &[&str] = &["id", "create_date", "update_date", "likes"];

/// Sortable columns of the caller's rated-movie listing.
pub const RATED_ORDER_COLUMNS: &[&str] =
    &["id", "title", "release_date", "vote_average", "rating", "create_date"];

/// `true` when `order` names one of `allowed`.
pub fn is_sortable(order: &OrderBy, allowed: &[&str]) -> bool {
    allowed.contains(&order.column.as_str())
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No row matched. Also returned for ownership-scoped mutations whose
    /// `(id, user)` predicate matched nothing.
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint was violated (duplicate like, duplicate credits).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist (foreign-key violation).
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// One or more association syncs failed during movie ingestion. The
    /// movie row itself was stored.
    #[error("association sync failed: {}", describe_failures(.0))]
    Associations(Vec<AssociationFailure>),

    /// An unexpected error in the underlying storage backend.
    #[error("internal storage error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Associations
// ---------------------------------------------------------------------------

/// The many-to-many reference tables a movie links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Association {
    Genres,
    Countries,
    Companies,
    Languages,
}

impl Association {
    pub const ALL: [Association; 4] = [
        Association::Genres,
        Association::Countries,
        Association::Companies,
        Association::Languages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Association::Genres => "genres",
            Association::Countries => "countries",
            Association::Companies => "companies",
            Association::Languages => "languages",
        }
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed association sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationFailure {
    pub association: Association,
    pub message: String,
}

fn describe_failures(failures: &[AssociationFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.association, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// The persistence contract for the movies service.
///
/// All methods are `async` and return `Result<_, StorageError>`. Implementations
/// must be `Send + Sync + 'static` so they can be held in an `Arc<dyn Storage>`.
///
/// Listing operations receive pagination whose `order_by` column has already
/// been checked against the matching `*_ORDER_COLUMNS` list.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // --- Movies --------------------------------------------------------------

    /// Upsert a movie from the metadata provider, then sync its four
    /// associations concurrently.
    ///
    /// On id conflict only `budget`, `poster_path`, `backdrop_path`, `revenue`,
    /// `runtime` and `vote_average` are refreshed. Association failures are
    /// collected into [`StorageError::Associations`]; the movie row is kept.
    async fn add_movie(&self, movie: &Movie) -> Result<(), StorageError>;

    /// Full movie with associations. [`StorageError::NotFound`] if absent.
    async fn get_movie(&self, id: i64) -> Result<Movie, StorageError>;

    /// Previews whose title contains `title` (case-sensitive). An empty
    /// `title` matches every movie.
    async fn list_movies(
        &self,
        title: &str,
        page: &PaginationParams,
    ) -> Result<Vec<MoviePreview>, StorageError>;

    /// Record that `user_id` viewed `movie_id` now, then keep only the
    /// [`RECENT_HISTORY_LIMIT`] most recent views for that user.
    async fn add_recent_viewed_movie(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError>;

    /// The user's view history, most recent first.
    async fn list_recent_viewed_movies(&self, user_id: i64) -> Result<Vec<MoviePreview>, StorageError>;

    // --- Movie likes ---------------------------------------------------------

    /// [`StorageError::Conflict`] if already liked,
    /// [`StorageError::MissingReference`] if the movie does not exist.
    async fn like_movie(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError>;

    /// [`StorageError::NotFound`] if the like does not exist.
    async fn delete_movie_like(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError>;

    async fn list_liked_movies(
        &self,
        user_id: i64,
        page: &PaginationParams,
    ) -> Result<Vec<MoviePreview>, StorageError>;

    async fn check_liked(&self, user_id: i64, movie_id: i64) -> Result<bool, StorageError>;

    // --- Comments ------------------------------------------------------------

    /// Comments on a movie, each carrying its derived like count.
    async fn list_movie_comments(
        &self,
        movie_id: i64,
        page: &PaginationParams,
    ) -> Result<Vec<Comment>, StorageError>;

    /// Ids of the comments on `movie_id` that `user_id` has liked.
    async fn list_liked_comments_for_movie(
        &self,
        movie_id: i64,
        user_id: i64,
    ) -> Result<Vec<i64>, StorageError>;

    /// Store a new comment and return it with its assigned id.
    async fn add_movie_comment(&self, comment: &Comment) -> Result<Comment, StorageError>;

    /// Replace `content` and `update_date` of the comment matching
    /// `(comment.id, comment.user_id)` and return the stored result.
    async fn update_comment(&self, comment: &Comment) -> Result<Comment, StorageError>;

    /// Delete the comment matching `(id, user_id)`.
    async fn delete_comment(&self, id: i64, user_id: i64) -> Result<(), StorageError>;

    /// Like a comment and return it, so the caller can notify its author.
    async fn like_comment(&self, user_id: i64, comment_id: i64) -> Result<Comment, StorageError>;

    async fn delete_comment_like(&self, user_id: i64, comment_id: i64) -> Result<(), StorageError>;

    // --- Credits -------------------------------------------------------------

    /// [`StorageError::NotFound`] when the credits of `movie_id` are not cached.
    async fn get_credits(&self, movie_id: i64) -> Result<Credit, StorageError>;

    /// Store a credit with its full cast and crew, all or nothing.
    async fn add_credits(&self, credit: &Credit) -> Result<(), StorageError>;

    // --- Ratings -------------------------------------------------------------

    /// [`StorageError::NotFound`] when the user has not rated the movie.
    async fn get_rating(&self, user_id: i64, movie_id: i64) -> Result<Rating, StorageError>;

    /// Upsert a rating and adjust the movie's vote aggregate in one
    /// transaction.
    ///
    /// Re-submitting the stored value is a successful no-op. A first rating
    /// increments `vote_count`; a changed rating adds `new - old` to `vote_sum`.
    async fn add_rating(&self, rating: &Rating) -> Result<(), StorageError>;

    /// Delete by `(user_id, movie_id)`. The vote aggregate is left as is.
    async fn delete_rating(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError>;

    async fn list_rated_movies(
        &self,
        user_id: i64,
        page: &PaginationParams,
    ) -> Result<Vec<RatedMovie>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn association_failures_are_named() {
        let err = StorageError::Associations(vec![
            AssociationFailure { association: Association::Genres, message: "boom".into() },
            AssociationFailure { association: Association::Languages, message: "bang".into() },
        ]);
        assert_eq!(
            err.to_string(),
            "association sync failed: genres: boom; languages: bang"
        );
    }

    #[test]
    fn sortable_columns() {
        assert!(is_sortable(&OrderBy::desc("revenue"), MOVIE_ORDER_COLUMNS));
        assert!(!is_sortable(&OrderBy::asc("likes"), MOVIE_ORDER_COLUMNS));
        assert!(is_sortable(&OrderBy::asc("likes"), COMMENT_ORDER_COLUMNS));
    }
}
