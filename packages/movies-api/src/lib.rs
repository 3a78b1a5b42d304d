//! Request and response types for the movies service HTTP API.
//!
//! Successful responses carry the bare resource, except where the table
//! below says otherwise. Errors and bodiless successes use the
//! [`ApiResponse`] envelope. Endpoints that need a caller identity read it
//! from the gateway-provided headers described in [`account`].
//!
//! # Endpoints covered
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | GET | `/` | → `"healthy"` |
//! | GET | `/movies` | [`PaginationQuery`] + `title` → `[`[`MoviePreview`]`]` |
//! | GET | `/movies/{movieId}` | → [`Movie`] |
//! | GET | `/movies/{movieId}/credits` | → [`Credit`] |
//! | POST | `/movies/{movieId}/like` | `?liked=bool` → `{}` |
//! | GET | `/movies/{movieId}/rating` | → [`Rating`] |
//! | POST | `/movies/{movieId}/rating` | [`RatingRequest`] → [`Rating`] |
//! | DELETE | `/movies/{movieId}/rating` | → `{}` |
//! | GET | `/favourites` | [`PaginationQuery`] → [`ApiResponse`]`<[`[`MoviePreview`]`]>` |
//! | GET | `/favourites/{movieId}` | → `{ "liked": bool }` |
//! | GET | `/favourites/{movieId}/comments` | → `[i64]` |
//! | GET | `/rating` | [`PaginationQuery`] → `[`[`RatedMovie`]`]` |
//! | GET | `/history` | → `[`[`MoviePreview`]`]` |
//! | GET | `/comments` | `movie_id` + [`PaginationQuery`] → `[`[`Comment`]`]` |
//! | POST | `/comments` | `movie_id` + [`CommentRequest`] → [`Comment`] |
//! | PUT | `/comments/{commId}` | [`CommentRequest`] → [`Comment`] |
//! | DELETE | `/comments/{commId}` | → `{}` |
//! | POST | `/comments/{commId}/like` | `?liked=bool` → `{}` |
//!
//! Errors on every endpoint are `{ "error": "..." }`.

pub mod account;
pub mod comment;
pub mod credit;
pub mod movie;
pub mod notification;
pub mod pagination;
pub mod rating;
pub mod response;

pub use account::{AccountInfo, ACCOUNT_ID_HEADER, ACCOUNT_LOGIN_HEADER, ACCOUNT_ROLE_HEADER};
pub use comment::{Comment, CommentRequest};
pub use credit::{Cast, Credit, Crew};
pub use movie::{Company, Country, Genre, Language, Movie, MoviePreview, RatedMovie};
pub use notification::{InternalNotification, COMMENT_LIKE_TEMPLATE};
pub use pagination::{OrderBy, PaginationError, PaginationParams, PaginationQuery};
pub use rating::{Rating, RatingRequest};
pub use response::ApiResponse;
