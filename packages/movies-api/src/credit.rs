//! Credits of `GET /movies/{movieId}/credits`.
//!
//! The local copy is a cache of the metadata provider's credits document;
//! the field names follow the provider's payload so it can be decoded as-is.

use serde::{Deserialize, Serialize};

/// Cast and crew of one movie.
///
/// `movie_id` is bookkeeping for storage and is not part of the wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Credit {
    pub id: i64,
    #[serde(skip)]
    pub movie_id: i64,
    #[serde(default)]
    pub cast: Vec<Cast>,
    #[serde(default)]
    pub crew: Vec<Crew>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cast {
    pub cast_id: i64,
    pub id: i64,
    #[serde(default)]
    pub gender: i32,
    pub name: String,
    #[serde(default)]
    pub character: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Crew {
    pub id: i64,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub gender: i32,
    #[serde(default)]
    pub job: String,
    pub name: String,
    #[serde(default)]
    pub profile_path: Option<String>,
}
