//! Movie catalog types for `GET /movies`, `GET /movies/{movieId}`, `GET /favourites`.
//!
//! Movie ids are assigned by the upstream metadata provider and never
//! generated locally, so the same [`Movie`] type is used both for the
//! provider's movie-details payload (ingestion) and for the detail view
//! served to clients.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A genre definition, e.g. `{ "id": 28, "name": "Action" }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// A production country keyed by its ISO 3166-1 code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Country {
    #[serde(rename = "iso_3166_1")]
    pub code: String,
    pub name: String,
}

/// A production company.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Company {
    pub id: i64,
    pub name: String,
}

/// A spoken language keyed by its ISO 639-1 code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Language {
    #[serde(rename = "iso_639_1")]
    pub iso_code: String,
    pub name: String,
}

/// Full movie record with its many-to-many associations.
///
/// Returned by `GET /movies/{movieId}`. Also decoded directly from the
/// metadata provider's movie-details response, which is why nearly every
/// field tolerates absence and `release_date` accepts `""` and `null`.
///
/// `vote_sum` is maintained locally by the rating aggregate and is ignored
/// on ingest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: i64,
    #[serde(default)]
    pub adult: bool,
    #[serde(default)]
    pub budget: i64,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub original_language: String,
    #[serde(default)]
    pub original_title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub popularity: f32,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub revenue: i64,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub vote_count: i64,
    #[serde(default)]
    pub vote_sum: i64,
    #[serde(default, rename = "production_countries")]
    pub countries: Vec<Country>,
    #[serde(default, rename = "production_companies")]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default, rename = "spoken_languages")]
    pub languages: Vec<Language>,
}

impl Movie {
    /// Project this movie onto the reduced list-view shape.
    pub fn preview(&self) -> MoviePreview {
        MoviePreview {
            id: self.id,
            title: self.title.clone(),
            poster_path: self.poster_path.clone(),
            release_date: self.release_date,
            vote_average: self.vote_average,
        }
    }
}

/// Reduced projection of a [`Movie`] used by every list endpoint.
///
/// Never created on its own; always derived from a movie row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoviePreview {
    pub id: i64,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub vote_average: f32,
}

/// A movie preview joined with the caller's rating, as listed by `GET /rating`.
///
/// ```json
/// {
///   "id": 550,
///   "title": "Fight Club",
///   "poster_path": "/pB8BM7pdSp6B6Ih7QZ4DrQ3PmJK.jpg",
///   "release_date": "1999-10-15",
///   "vote_average": 8.4,
///   "rating": 9,
///   "rate_date": "2026-03-01T10:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatedMovie {
    #[serde(flatten)]
    pub movie: MoviePreview,
    pub rating: Option<i32>,
    pub rate_date: DateTime<Utc>,
}

/// Accepts `"YYYY-MM-DD"`, `""` and `null`; the provider uses both of the
/// latter for unreleased titles.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
