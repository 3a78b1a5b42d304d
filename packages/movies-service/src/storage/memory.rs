//! In-memory storage implementation.
//!
//! All data is held in RAM behind a [`RwLock`] and is lost when the process
//! exits. Use this for tests, the conformance suite, and ephemeral instances.
//!
//! The same relational rules as the SQLite backend are enforced by hand:
//! like-facts and ratings must reference an existing movie or comment,
//! duplicates are conflicts, and zero-row deletes are `NotFound`.
//!
//! Every trait call is counted and the store can be switched into a failing
//! mode (whole store or a single association), which lets handler tests
//! assert on storage access.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use movies_api::{
    Comment, Company, Country, Credit, Genre, Language, Movie, MoviePreview, OrderBy,
    PaginationParams, RatedMovie, Rating,
};

use super::{
    is_sortable, Association, AssociationFailure, Storage, StorageError, COMMENT_ORDER_COLUMNS,
    MOVIE_ORDER_COLUMNS, RATED_ORDER_COLUMNS, RECENT_HISTORY_LIMIT,
};

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    /// Movie rows; association vectors are kept empty here.
    movies: BTreeMap<i64, Movie>,
    genres: BTreeMap<i64, Genre>,
    countries: BTreeMap<String, Country>,
    companies: BTreeMap<i64, Company>,
    languages: BTreeMap<String, Language>,
    movie_genres: BTreeSet<(i64, i64)>,
    movie_countries: BTreeSet<(i64, String)>,
    movie_companies: BTreeSet<(i64, i64)>,
    movie_languages: BTreeSet<(i64, String)>,
    /// (user_id, movie_id)
    liked_movies: BTreeSet<(i64, i64)>,
    /// user_id → movie ids, most recent first.
    recent_views: HashMap<i64, Vec<i64>>,
    comments: BTreeMap<i64, Comment>,
    next_comment_id: i64,
    /// (user_id, comment_id)
    liked_comments: BTreeSet<(i64, i64)>,
    /// movie_id → credit
    credits: HashMap<i64, Credit>,
    /// (user_id, movie_id) → rating
    ratings: BTreeMap<(i64, i64), Rating>,
    /// Association whose join rows can never be written.
    broken_association: Option<Association>,
}

impl Inner {
    fn comment_likes(&self, comment_id: i64) -> i64 {
        self.liked_comments
            .iter()
            .filter(|(_, c)| *c == comment_id)
            .count() as i64
    }

    fn comment_with_likes(&self, comment: &Comment) -> Comment {
        Comment {
            likes: self.comment_likes(comment.id),
            ..comment.clone()
        }
    }

    fn require_movie(&self, movie_id: i64) -> Result<&Movie, StorageError> {
        self.movies
            .get(&movie_id)
            .ok_or_else(|| StorageError::MissingReference(format!("movie {movie_id}")))
    }

    /// Link `movie_id` to one association. Fails when any referenced row is
    /// unknown, mirroring a foreign-key violation.
    fn link(&mut self, kind: Association, movie: &Movie) -> Result<(), StorageError> {
        if self.broken_association == Some(kind) {
            return Err(StorageError::Internal(format!("{kind} table unavailable")));
        }
        let missing = |what: String| StorageError::MissingReference(format!("{kind} {what}"));
        match kind {
            Association::Genres => {
                if let Some(g) = movie.genres.iter().find(|g| !self.genres.contains_key(&g.id)) {
                    return Err(missing(g.id.to_string()));
                }
                for g in &movie.genres {
                    self.movie_genres.insert((movie.id, g.id));
                }
            }
            Association::Countries => {
                if let Some(c) = movie.countries.iter().find(|c| !self.countries.contains_key(&c.code)) {
                    return Err(missing(c.code.clone()));
                }
                for c in &movie.countries {
                    self.movie_countries.insert((movie.id, c.code.clone()));
                }
            }
            Association::Companies => {
                if let Some(c) = movie.companies.iter().find(|c| !self.companies.contains_key(&c.id)) {
                    return Err(missing(c.id.to_string()));
                }
                for c in &movie.companies {
                    self.movie_companies.insert((movie.id, c.id));
                }
            }
            Association::Languages => {
                if let Some(l) = movie.languages.iter().find(|l| !self.languages.contains_key(&l.iso_code)) {
                    return Err(missing(l.iso_code.clone()));
                }
                for l in &movie.languages {
                    self.movie_languages.insert((movie.id, l.iso_code.clone()));
                }
            }
        }
        Ok(())
    }

    /// Insert the reference rows of one association, ignoring existing ones.
    fn add_references(&mut self, kind: Association, movie: &Movie) {
        match kind {
            Association::Genres => {
                for g in &movie.genres {
                    self.genres.entry(g.id).or_insert_with(|| g.clone());
                }
            }
            Association::Countries => {
                for c in &movie.countries {
                    self.countries.entry(c.code.clone()).or_insert_with(|| c.clone());
                }
            }
            Association::Companies => {
                for c in &movie.companies {
                    self.companies.entry(c.id).or_insert_with(|| c.clone());
                }
            }
            Association::Languages => {
                for l in &movie.languages {
                    self.languages.entry(l.iso_code.clone()).or_insert_with(|| l.clone());
                }
            }
        }
    }

    fn previews<'a>(&'a self, ids: impl Iterator<Item = &'a i64>) -> Vec<&'a Movie> {
        ids.filter_map(|id| self.movies.get(id)).collect()
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// A sortable value extracted from a row.
#[derive(PartialEq, PartialOrd)]
enum SortKey {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Time(DateTime<Utc>),
}

fn movie_key(m: &Movie, column: &str) -> SortKey {
    match column {
        "id" => SortKey::Int(m.id),
        "title" => SortKey::Text(m.title.clone()),
        "release_date" => m
            .release_date
            .map_or(SortKey::Null, |d| SortKey::Text(d.to_string())),
        "revenue" => SortKey::Int(m.revenue),
        "budget" => SortKey::Int(m.budget),
        "popularity" => SortKey::Float(f64::from(m.popularity)),
        "runtime" => m.runtime.map_or(SortKey::Null, |r| SortKey::Int(i64::from(r))),
        "vote_average" => SortKey::Float(f64::from(m.vote_average)),
        "vote_count" => SortKey::Int(m.vote_count),
        _ => SortKey::Null,
    }
}

fn comment_key(c: &Comment, column: &str) -> SortKey {
    match column {
        "id" => SortKey::Int(c.id),
        "create_date" => SortKey::Time(c.create_date),
        "update_date" => SortKey::Time(c.update_date),
        "likes" => SortKey::Int(c.likes),
        _ => SortKey::Null,
    }
}

/// Sort by `order`, tie-breaking on `id` ascending, then apply offset/limit.
fn paginate<T>(
    mut rows: Vec<T>,
    page: &PaginationParams,
    allowed: &[&str],
    key: impl Fn(&T, &str) -> SortKey,
    id: impl Fn(&T) -> i64,
) -> Result<Vec<T>, StorageError> {
    let order: &OrderBy = &page.order_by;
    if !is_sortable(order, allowed) {
        return Err(StorageError::Internal(format!(
            "column {} is not sortable here",
            order.column
        )));
    }
    rows.sort_by(|a, b| {
        let primary = key(a, &order.column)
            .partial_cmp(&key(b, &order.column))
            .unwrap_or(Ordering::Equal);
        let primary = if order.descending { primary.reverse() } else { primary };
        primary.then_with(|| id(a).cmp(&id(b)))
    });
    Ok(rows
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect())
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`Storage`].
pub struct MemoryStorage {
    inner: RwLock<Inner>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_comment_id: 1,
                ..Default::default()
            }),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of [`Storage`] calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// When `true`, every [`Storage`] call fails with [`StorageError::Internal`].
    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    /// Make every join insert for `association` fail, leaving the other
    /// associations and the movie rows writable.
    pub fn break_association(&self, association: Option<Association>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.broken_association = association;
        }
    }

    fn enter(&self) -> Result<(), StorageError> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(StorageError::Internal("storage unavailable".into()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StorageError> {
        self.enter()?;
        self.inner
            .read()
            .map_err(|_| StorageError::Internal("lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StorageError> {
        self.enter()?;
        self.inner
            .write()
            .map_err(|_| StorageError::Internal("lock poisoned".into()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for MemoryStorage {
    // --- Movies --------------------------------------------------------------

    async fn add_movie(&self, movie: &Movie) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        match inner.movies.get_mut(&movie.id) {
            Some(existing) => {
                existing.budget = movie.budget;
                existing.poster_path = movie.poster_path.clone();
                existing.backdrop_path = movie.backdrop_path.clone();
                existing.revenue = movie.revenue;
                existing.runtime = movie.runtime;
                existing.vote_average = movie.vote_average;
            }
            None => {
                let row = Movie {
                    vote_sum: 0,
                    countries: Vec::new(),
                    companies: Vec::new(),
                    genres: Vec::new(),
                    languages: Vec::new(),
                    ..movie.clone()
                };
                inner.movies.insert(movie.id, row);
            }
        }

        let mut failures = Vec::new();
        for kind in Association::ALL {
            if inner.link(kind, movie).is_ok() {
                continue;
            }
            inner.add_references(kind, movie);
            if let Err(e) = inner.link(kind, movie) {
                failures.push(AssociationFailure {
                    association: kind,
                    message: e.to_string(),
                });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(StorageError::Associations(failures))
        }
    }

    async fn get_movie(&self, id: i64) -> Result<Movie, StorageError> {
        let inner = self.read()?;
        let mut movie = inner.movies.get(&id).cloned().ok_or(StorageError::NotFound)?;
        movie.genres = inner
            .movie_genres
            .iter()
            .filter(|(m, _)| *m == id)
            .filter_map(|(_, g)| inner.genres.get(g).cloned())
            .collect();
        movie.countries = inner
            .movie_countries
            .iter()
            .filter(|(m, _)| *m == id)
            .filter_map(|(_, c)| inner.countries.get(c).cloned())
            .collect();
        movie.companies = inner
            .movie_companies
            .iter()
            .filter(|(m, _)| *m == id)
            .filter_map(|(_, c)| inner.companies.get(c).cloned())
            .collect();
        movie.languages = inner
            .movie_languages
            .iter()
            .filter(|(m, _)| *m == id)
            .filter_map(|(_, l)| inner.languages.get(l).cloned())
            .collect();
        Ok(movie)
    }

    async fn list_movies(
        &self,
        title: &str,
        page: &PaginationParams,
    ) -> Result<Vec<MoviePreview>, StorageError> {
        let inner = self.read()?;
        let rows: Vec<&Movie> = inner
            .movies
            .values()
            .filter(|m| m.title.contains(title))
            .collect();
        let rows = paginate(rows, page, MOVIE_ORDER_COLUMNS, |m, c| movie_key(m, c), |m| m.id)?;
        Ok(rows.into_iter().map(Movie::preview).collect())
    }

    async fn add_recent_viewed_movie(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        inner.require_movie(movie_id)?;
        let views = inner.recent_views.entry(user_id).or_default();
        views.retain(|id| *id != movie_id);
        views.insert(0, movie_id);
        views.truncate(RECENT_HISTORY_LIMIT);
        Ok(())
    }

    async fn list_recent_viewed_movies(&self, user_id: i64) -> Result<Vec<MoviePreview>, StorageError> {
        let inner = self.read()?;
        let Some(views) = inner.recent_views.get(&user_id) else {
            return Ok(Vec::new());
        };
        Ok(inner.previews(views.iter()).into_iter().map(Movie::preview).collect())
    }

    // --- Movie likes ---------------------------------------------------------

    async fn like_movie(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        inner.require_movie(movie_id)?;
        if !inner.liked_movies.insert((user_id, movie_id)) {
            return Err(StorageError::Conflict(format!(
                "movie {movie_id} already liked by {user_id}"
            )));
        }
        Ok(())
    }

    async fn delete_movie_like(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        if inner.liked_movies.remove(&(user_id, movie_id)) {
            Ok(())
        } else {
            Err(StorageError::NotFound)
        }
    }

    async fn list_liked_movies(
        &self,
        user_id: i64,
        page: &PaginationParams,
    ) -> Result<Vec<MoviePreview>, StorageError> {
        let inner = self.read()?;
        let ids: Vec<i64> = inner
            .liked_movies
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, m)| *m)
            .collect();
        let rows = inner.previews(ids.iter());
        let rows = paginate(rows, page, MOVIE_ORDER_COLUMNS, |m, c| movie_key(m, c), |m| m.id)?;
        Ok(rows.into_iter().map(Movie::preview).collect())
    }

    async fn check_liked(&self, user_id: i64, movie_id: i64) -> Result<bool, StorageError> {
        let inner = self.read()?;
        Ok(inner.liked_movies.contains(&(user_id, movie_id)))
    }

    // --- Comments ------------------------------------------------------------

    async fn list_movie_comments(
        &self,
        movie_id: i64,
        page: &PaginationParams,
    ) -> Result<Vec<Comment>, StorageError> {
        let inner = self.read()?;
        let rows: Vec<Comment> = inner
            .comments
            .values()
            .filter(|c| c.movie_id == movie_id)
            .map(|c| inner.comment_with_likes(c))
            .collect();
        paginate(rows, page, COMMENT_ORDER_COLUMNS, comment_key, |c| c.id)
    }

    async fn list_liked_comments_for_movie(
        &self,
        movie_id: i64,
        user_id: i64,
    ) -> Result<Vec<i64>, StorageError> {
        let inner = self.read()?;
        Ok(inner
            .liked_comments
            .iter()
            .filter(|(u, c)| {
                *u == user_id
                    && inner.comments.get(c).is_some_and(|comment| comment.movie_id == movie_id)
            })
            .map(|(_, c)| *c)
            .collect())
    }

    async fn add_movie_comment(&self, comment: &Comment) -> Result<Comment, StorageError> {
        let mut inner = self.write()?;
        inner.require_movie(comment.movie_id)?;
        let id = inner.next_comment_id;
        inner.next_comment_id += 1;
        let stored = Comment {
            id,
            likes: 0,
            ..comment.clone()
        };
        inner.comments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_comment(&self, comment: &Comment) -> Result<Comment, StorageError> {
        let mut inner = self.write()?;
        let stored = inner
            .comments
            .get_mut(&comment.id)
            .filter(|c| c.user_id == comment.user_id)
            .ok_or(StorageError::NotFound)?;
        stored.content = comment.content.clone();
        stored.update_date = comment.update_date;
        let stored = stored.clone();
        Ok(inner.comment_with_likes(&stored))
    }

    async fn delete_comment(&self, id: i64, user_id: i64) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        let owned = inner.comments.get(&id).is_some_and(|c| c.user_id == user_id);
        if !owned {
            return Err(StorageError::NotFound);
        }
        inner.comments.remove(&id);
        inner.liked_comments.retain(|(_, c)| *c != id);
        Ok(())
    }

    async fn like_comment(&self, user_id: i64, comment_id: i64) -> Result<Comment, StorageError> {
        let mut inner = self.write()?;
        let comment = inner
            .comments
            .get(&comment_id)
            .cloned()
            .ok_or_else(|| StorageError::MissingReference(format!("comment {comment_id}")))?;
        if !inner.liked_comments.insert((user_id, comment_id)) {
            return Err(StorageError::Conflict(format!(
                "comment {comment_id} already liked by {user_id}"
            )));
        }
        Ok(inner.comment_with_likes(&comment))
    }

    async fn delete_comment_like(&self, user_id: i64, comment_id: i64) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        if inner.liked_comments.remove(&(user_id, comment_id)) {
            Ok(())
        } else {
            Err(StorageError::NotFound)
        }
    }

    // --- Credits -------------------------------------------------------------

    async fn get_credits(&self, movie_id: i64) -> Result<Credit, StorageError> {
        let inner = self.read()?;
        inner.credits.get(&movie_id).cloned().ok_or(StorageError::NotFound)
    }

    async fn add_credits(&self, credit: &Credit) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        if inner.credits.contains_key(&credit.movie_id)
            || inner.credits.values().any(|c| c.id == credit.id)
        {
            return Err(StorageError::Conflict(format!("credit {} already exists", credit.id)));
        }
        inner.credits.insert(credit.movie_id, credit.clone());
        Ok(())
    }

    // --- Ratings -------------------------------------------------------------

    async fn get_rating(&self, user_id: i64, movie_id: i64) -> Result<Rating, StorageError> {
        let inner = self.read()?;
        inner
            .ratings
            .get(&(user_id, movie_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn add_rating(&self, rating: &Rating) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        inner.require_movie(rating.movie_id)?;
        let key = (rating.user_id, rating.movie_id);
        let previous = inner.ratings.get(&key).and_then(|r| r.rating);
        if previous == rating.rating {
            return Ok(());
        }

        let stored = Rating {
            create_date: Some(rating.create_date.unwrap_or_else(Utc::now)),
            ..rating.clone()
        };
        inner.ratings.insert(key, stored);

        let movie = inner
            .movies
            .get_mut(&rating.movie_id)
            .ok_or_else(|| StorageError::MissingReference(format!("movie {}", rating.movie_id)))?;
        match previous {
            Some(old) => movie.vote_sum += i64::from(rating.rating.unwrap_or(0)) - i64::from(old),
            None => movie.vote_count += 1,
        }
        Ok(())
    }

    async fn delete_rating(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError> {
        let mut inner = self.write()?;
        inner
            .ratings
            .remove(&(user_id, movie_id))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    async fn list_rated_movies(
        &self,
        user_id: i64,
        page: &PaginationParams,
    ) -> Result<Vec<RatedMovie>, StorageError> {
        let inner = self.read()?;
        let rows: Vec<(&Movie, &Rating)> = inner
            .ratings
            .values()
            .filter(|r| r.user_id == user_id)
            .filter_map(|r| inner.movies.get(&r.movie_id).map(|m| (m, r)))
            .collect();
        let rows = paginate(
            rows,
            page,
            RATED_ORDER_COLUMNS,
            |(m, r), c| match c {
                "rating" => r.rating.map_or(SortKey::Null, |v| SortKey::Int(i64::from(v))),
                "create_date" => r.create_date.map_or(SortKey::Null, SortKey::Time),
                _ => movie_key(m, c),
            },
            |(m, _)| m.id,
        )?;
        Ok(rows
            .into_iter()
            .map(|(m, r)| RatedMovie {
                movie: m.preview(),
                rating: r.rating,
                rate_date: r.create_date.unwrap_or_else(Utc::now),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: i64, title: &str, revenue: i64) -> Movie {
        Movie {
            id,
            title: title.into(),
            revenue,
            genres: vec![Genre { id: 18, name: "Drama".into() }],
            languages: vec![Language { iso_code: "en".into(), name: "English".into() }],
            ..Default::default()
        }
    }

    async fn seeded() -> MemoryStorage {
        let s = MemoryStorage::new();
        s.add_movie(&movie(550, "Fight Club", 100)).await.unwrap();
        s.add_movie(&movie(603, "The Matrix", 400)).await.unwrap();
        s
    }

    #[tokio::test]
    async fn associations_are_resolved() {
        let s = seeded().await;
        let m = s.get_movie(550).await.unwrap();
        assert_eq!(m.genres.len(), 1);
        assert_eq!(m.languages[0].name, "English");
        assert!(m.countries.is_empty());
    }

    #[tokio::test]
    async fn counts_calls_and_fails_on_demand() {
        let s = seeded().await;
        let before = s.call_count();
        s.check_liked(1, 550).await.unwrap();
        assert_eq!(s.call_count(), before + 1);

        s.fail_all(true);
        assert!(matches!(s.get_movie(550).await, Err(StorageError::Internal(_))));
        s.fail_all(false);
        assert!(s.get_movie(550).await.is_ok());
    }

    #[tokio::test]
    async fn failed_association_keeps_movie_and_other_links() {
        let s = MemoryStorage::new();
        s.break_association(Some(Association::Languages));

        match s.add_movie(&movie(550, "Fight Club", 100)).await {
            Err(StorageError::Associations(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].association, Association::Languages);
            }
            other => panic!("expected association failure, got {other:?}"),
        }

        let m = s.get_movie(550).await.unwrap();
        assert_eq!(m.title, "Fight Club");
        assert_eq!(m.genres, vec![Genre { id: 18, name: "Drama".into() }]);
        assert!(m.languages.is_empty());

        s.break_association(None);
        s.add_movie(&movie(550, "Fight Club", 100)).await.unwrap();
        assert_eq!(s.get_movie(550).await.unwrap().languages[0].iso_code, "en");
    }

    #[tokio::test]
    async fn list_orders_and_filters() {
        let s = seeded().await;
        let page = PaginationParams::with_order(OrderBy::desc("revenue"));
        let ids: Vec<i64> = s.list_movies("", &page).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![603, 550]);
        assert_eq!(s.list_movies("Club", &page).await.unwrap().len(), 1);
        assert!(s.list_movies("club", &page).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let s = MemoryStorage::new();
        for id in 1..=(RECENT_HISTORY_LIMIT as i64 + 3) {
            s.add_movie(&Movie { id, ..Default::default() }).await.unwrap();
            s.add_recent_viewed_movie(1, id).await.unwrap();
        }
        let history = s.list_recent_viewed_movies(1).await.unwrap();
        assert_eq!(history.len(), RECENT_HISTORY_LIMIT);
        assert_eq!(history[0].id, RECENT_HISTORY_LIMIT as i64 + 3);
        assert_eq!(history.last().unwrap().id, 4);
    }

    #[tokio::test]
    async fn rating_no_op_on_same_value() {
        let s = seeded().await;
        let now = Utc::now();
        s.add_rating(&Rating::new(1, 550, 7, now)).await.unwrap();
        s.add_rating(&Rating::new(1, 550, 7, now)).await.unwrap();
        let m = s.get_movie(550).await.unwrap();
        assert_eq!((m.vote_count, m.vote_sum), (1, 0));

        s.add_rating(&Rating::new(1, 550, 10, now)).await.unwrap();
        let m = s.get_movie(550).await.unwrap();
        assert_eq!((m.vote_count, m.vote_sum), (1, 3));
    }

    #[tokio::test]
    async fn comment_ownership() {
        let s = seeded().await;
        let c = s.add_movie_comment(&Comment::new(7, 550, "hi", Utc::now())).await.unwrap();
        assert!(matches!(s.delete_comment(c.id, 8).await, Err(StorageError::NotFound)));
        s.like_comment(9, c.id).await.unwrap();
        s.delete_comment(c.id, 7).await.unwrap();
        assert!(s.list_liked_comments_for_movie(550, 9).await.unwrap().is_empty());
    }
}
