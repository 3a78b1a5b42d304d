//! SQLite-backed storage implementation.
//!
//! Uses `rusqlite` (with bundled SQLite) wrapped in an `Arc<Mutex<Connection>>`
//! to satisfy the `Send + Sync` requirements. All blocking calls are offloaded
//! to a thread-pool via `tokio::task::spawn_blocking`.
//!
//! # Schema
//!
//! - `movies` plus the `genres`, `countries`, `companies`, `languages`
//!   reference tables and their `movie_*` join tables.
//! - `liked_movies`, `liked_comments`: presence-only like-facts.
//! - `recent_views`: per-user view history, ordered by a global `seq`.
//! - `comments`
//! - `credits`, `credit_cast`, `credit_crew`: cached provider credits.
//! - `ratings`: one row per `(user_id, movie_id)`.
//!
//! Foreign keys are enforced, so constraint failures surface as
//! [`StorageError::MissingReference`] and [`StorageError::Conflict`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use movies_api::{
    Cast, Comment, Company, Country, Credit, Crew, Genre, Language, Movie, MoviePreview, OrderBy,
    PaginationParams, RatedMovie, Rating,
};
use rusqlite::types::Value;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row, Transaction};
use tokio::task::JoinSet;

use super::{
    is_sortable, Association, AssociationFailure, Storage, StorageError, COMMENT_ORDER_COLUMNS,
    MOVIE_ORDER_COLUMNS, RATED_ORDER_COLUMNS, RECENT_HISTORY_LIMIT,
};

/// Upper bound on the credit-insert and rating-update transactions.
pub const TX_DEADLINE: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS movies (
    id                INTEGER PRIMARY KEY,
    adult             INTEGER NOT NULL DEFAULT 0,
    budget            INTEGER NOT NULL DEFAULT 0,
    backdrop_path     TEXT,
    homepage          TEXT,
    imdb_id           TEXT,
    original_language TEXT NOT NULL DEFAULT '',
    original_title    TEXT NOT NULL DEFAULT '',
    overview          TEXT NOT NULL DEFAULT '',
    popularity        REAL NOT NULL DEFAULT 0,
    poster_path       TEXT,
    release_date      TEXT,
    revenue           INTEGER NOT NULL DEFAULT 0,
    runtime           INTEGER,
    status            TEXT NOT NULL DEFAULT '',
    tagline           TEXT,
    title             TEXT NOT NULL DEFAULT '',
    vote_average      REAL NOT NULL DEFAULT 0,
    vote_count        INTEGER NOT NULL DEFAULT 0,
    vote_sum          INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS genres (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS countries (
    iso_3166_1 TEXT PRIMARY KEY,
    name       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS companies (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS languages (
    iso_639_1 TEXT PRIMARY KEY,
    name      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS movie_genres (
    movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    genre_id INTEGER NOT NULL REFERENCES genres(id),
    PRIMARY KEY (movie_id, genre_id)
);
CREATE TABLE IF NOT EXISTS movie_countries (
    movie_id     INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    country_code TEXT NOT NULL REFERENCES countries(iso_3166_1),
    PRIMARY KEY (movie_id, country_code)
);
CREATE TABLE IF NOT EXISTS movie_companies (
    movie_id   INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    company_id INTEGER NOT NULL REFERENCES companies(id),
    PRIMARY KEY (movie_id, company_id)
);
CREATE TABLE IF NOT EXISTS movie_languages (
    movie_id      INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    language_code TEXT NOT NULL REFERENCES languages(iso_639_1),
    PRIMARY KEY (movie_id, language_code)
);

CREATE TABLE IF NOT EXISTS liked_movies (
    user_id  INTEGER NOT NULL,
    movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, movie_id)
);

CREATE TABLE IF NOT EXISTS recent_views (
    user_id   INTEGER NOT NULL,
    movie_id  INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    view_date TEXT NOT NULL,
    seq       INTEGER NOT NULL,
    PRIMARY KEY (user_id, movie_id)
);
CREATE INDEX IF NOT EXISTS idx_recent_views_user_seq ON recent_views(user_id, seq);

CREATE TABLE IF NOT EXISTS comments (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    movie_id    INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    create_date TEXT NOT NULL,
    update_date TEXT NOT NULL,
    content     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_movie ON comments(movie_id);

CREATE TABLE IF NOT EXISTS liked_comments (
    user_id    INTEGER NOT NULL,
    comment_id INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, comment_id)
);
CREATE INDEX IF NOT EXISTS idx_liked_comments_comment ON liked_comments(comment_id);

-- Credits are a cache of the provider's document and may precede the movie row.
CREATE TABLE IF NOT EXISTS credits (
    id       INTEGER PRIMARY KEY,
    movie_id INTEGER NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS credit_cast (
    credit_id      INTEGER NOT NULL REFERENCES credits(id) ON DELETE CASCADE,
    cast_id        INTEGER NOT NULL,
    person_id      INTEGER NOT NULL,
    gender         INTEGER NOT NULL DEFAULT 0,
    name           TEXT NOT NULL,
    character_name TEXT NOT NULL DEFAULT '',
    ord            INTEGER NOT NULL DEFAULT 0,
    profile_path   TEXT,
    PRIMARY KEY (credit_id, cast_id)
);
CREATE TABLE IF NOT EXISTS credit_crew (
    credit_id    INTEGER NOT NULL REFERENCES credits(id) ON DELETE CASCADE,
    person_id    INTEGER NOT NULL,
    department   TEXT NOT NULL DEFAULT '',
    gender       INTEGER NOT NULL DEFAULT 0,
    job          TEXT NOT NULL DEFAULT '',
    name         TEXT NOT NULL,
    profile_path TEXT
);
CREATE INDEX IF NOT EXISTS idx_credit_crew_credit ON credit_crew(credit_id);

CREATE TABLE IF NOT EXISTS ratings (
    user_id     INTEGER NOT NULL,
    movie_id    INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    rating      INTEGER,
    create_date TEXT NOT NULL,
    PRIMARY KEY (user_id, movie_id)
);
";

const MOVIE_COLUMNS: &str = "id, adult, budget, backdrop_path, homepage, imdb_id, \
    original_language, original_title, overview, popularity, poster_path, release_date, \
    revenue, runtime, status, tagline, title, vote_average, vote_count, vote_sum";

const PREVIEW_COLUMNS: &str = "m.id, m.title, m.poster_path, m.release_date, m.vote_average";

const COMMENT_SELECT: &str = "SELECT c.id, c.user_id, c.movie_id, c.create_date, c.update_date, \
    c.content, (SELECT COUNT(*) FROM liked_comments lc WHERE lc.comment_id = c.id) AS likes \
    FROM comments c";

// ---------------------------------------------------------------------------
// SqliteStorage
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`Storage`].
///
/// Holds a single database connection protected by a `Mutex`. All operations
/// run inside `spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the SQLite database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database (data is lost when dropped).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.busy_timeout(TX_DEADLINE)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StorageError::Internal(format!("task join error: {e}")))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    conn.lock()
        .map_err(|_| StorageError::Internal("connection mutex poisoned".into()))
}

/// Commit `tx` unless it has outlived [`TX_DEADLINE`]; a dropped transaction
/// rolls back.
///
/// The deadline is checked here, at commit time, not while statements run.
/// Waiting on a locked database is bounded separately by the connection's
/// `busy_timeout`.
fn commit_within_deadline(tx: Transaction<'_>, started: Instant) -> Result<(), StorageError> {
    if started.elapsed() > TX_DEADLINE {
        return Err(StorageError::Internal("transaction deadline exceeded".into()));
    }
    tx.commit().map_err(map_err)
}

// ---------------------------------------------------------------------------
// Error conversions
// ---------------------------------------------------------------------------

fn map_err(e: rusqlite::Error) -> StorageError {
    match &e {
        rusqlite::Error::QueryReturnedNoRows => StorageError::NotFound,
        rusqlite::Error::SqliteFailure(err, _) => match err.extended_code {
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StorageError::MissingReference(e.to_string()),
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                StorageError::Conflict(e.to_string())
            }
            _ => StorageError::Internal(e.to_string()),
        },
        _ => StorageError::Internal(e.to_string()),
    }
}

/// Zero affected rows on an ownership- or key-scoped mutation is `NotFound`.
fn expect_row(changed: usize) -> Result<(), StorageError> {
    if changed == 0 {
        Err(StorageError::NotFound)
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

fn order_clause(
    order: &OrderBy,
    allowed: &[&str],
    qualify: impl Fn(&str) -> String,
) -> Result<String, StorageError> {
    if !is_sortable(order, allowed) {
        return Err(StorageError::Internal(format!(
            "column {} is not sortable here",
            order.column
        )));
    }
    let dir = if order.descending { "DESC" } else { "ASC" };
    Ok(format!("{} {dir}", qualify(&order.column)))
}

fn movie_order(order: &OrderBy) -> Result<String, StorageError> {
    order_clause(order, MOVIE_ORDER_COLUMNS, |c| format!("m.{c}"))
}

fn comment_order(order: &OrderBy) -> Result<String, StorageError> {
    order_clause(order, COMMENT_ORDER_COLUMNS, |c| match c {
        "likes" => "likes".to_string(),
        _ => format!("c.{c}"),
    })
}

fn rated_order(order: &OrderBy) -> Result<String, StorageError> {
    order_clause(order, RATED_ORDER_COLUMNS, |c| match c {
        "rating" | "create_date" => format!("r.{c}"),
        _ => format!("m.{c}"),
    })
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: row.get(0)?,
        adult: row.get(1)?,
        budget: row.get(2)?,
        backdrop_path: row.get(3)?,
        homepage: row.get(4)?,
        imdb_id: row.get(5)?,
        original_language: row.get(6)?,
        original_title: row.get(7)?,
        overview: row.get(8)?,
        popularity: row.get(9)?,
        poster_path: row.get(10)?,
        release_date: row.get(11)?,
        revenue: row.get(12)?,
        runtime: row.get(13)?,
        status: row.get(14)?,
        tagline: row.get(15)?,
        title: row.get(16)?,
        vote_average: row.get(17)?,
        vote_count: row.get(18)?,
        vote_sum: row.get(19)?,
        ..Default::default()
    })
}

fn preview_from_row(row: &Row<'_>) -> rusqlite::Result<MoviePreview> {
    Ok(MoviePreview {
        id: row.get(0)?,
        title: row.get(1)?,
        poster_path: row.get(2)?,
        release_date: row.get(3)?,
        vote_average: row.get(4)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        movie_id: row.get(2)?,
        create_date: row.get(3)?,
        update_date: row.get(4)?,
        content: row.get(5)?,
        likes: row.get(6)?,
    })
}

fn fetch_comment(conn: &Connection, id: i64) -> Result<Comment, StorageError> {
    conn.query_row(
        &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
        params![id],
        comment_from_row,
    )
    .map_err(map_err)
}

fn query_all<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> Result<Vec<T>, StorageError>
where
    P: rusqlite::Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let rows = stmt.query_map(params, f).map_err(map_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(map_err)
}

// ---------------------------------------------------------------------------
// Association sync
// ---------------------------------------------------------------------------

/// `(reference insert, join insert)` statements for an association.
fn association_sql(kind: Association) -> (&'static str, &'static str) {
    match kind {
        Association::Genres => (
            "INSERT OR IGNORE INTO genres (id, name) VALUES (?1, ?2)",
            "INSERT OR IGNORE INTO movie_genres (movie_id, genre_id) VALUES (?1, ?2)",
        ),
        Association::Countries => (
            "INSERT OR IGNORE INTO countries (iso_3166_1, name) VALUES (?1, ?2)",
            "INSERT OR IGNORE INTO movie_countries (movie_id, country_code) VALUES (?1, ?2)",
        ),
        Association::Companies => (
            "INSERT OR IGNORE INTO companies (id, name) VALUES (?1, ?2)",
            "INSERT OR IGNORE INTO movie_companies (movie_id, company_id) VALUES (?1, ?2)",
        ),
        Association::Languages => (
            "INSERT OR IGNORE INTO languages (iso_639_1, name) VALUES (?1, ?2)",
            "INSERT OR IGNORE INTO movie_languages (movie_id, language_code) VALUES (?1, ?2)",
        ),
    }
}

/// `(key, name)` pairs of one association of `movie`.
fn association_rows(kind: Association, movie: &Movie) -> Vec<(Value, String)> {
    match kind {
        Association::Genres => movie
            .genres
            .iter()
            .map(|g| (Value::Integer(g.id), g.name.clone()))
            .collect(),
        Association::Countries => movie
            .countries
            .iter()
            .map(|c| (Value::Text(c.code.clone()), c.name.clone()))
            .collect(),
        Association::Companies => movie
            .companies
            .iter()
            .map(|c| (Value::Integer(c.id), c.name.clone()))
            .collect(),
        Association::Languages => movie
            .languages
            .iter()
            .map(|l| (Value::Text(l.iso_code.clone()), l.name.clone()))
            .collect(),
    }
}

fn insert_joins(
    conn: &mut Connection,
    sql: &str,
    movie_id: i64,
    rows: &[(Value, String)],
) -> Result<(), StorageError> {
    let tx = conn.transaction().map_err(map_err)?;
    {
        let mut stmt = tx.prepare(sql).map_err(map_err)?;
        for (key, _) in rows {
            stmt.execute(params![movie_id, key]).map_err(map_err)?;
        }
    }
    tx.commit().map_err(map_err)
}

fn insert_references(
    conn: &mut Connection,
    sql: &str,
    rows: &[(Value, String)],
) -> Result<(), StorageError> {
    let tx = conn.transaction().map_err(map_err)?;
    {
        let mut stmt = tx.prepare(sql).map_err(map_err)?;
        for (key, name) in rows {
            stmt.execute(params![key, name]).map_err(map_err)?;
        }
    }
    tx.commit().map_err(map_err)
}

/// Link `movie_id` to `rows`. When the join insert fails (typically an
/// unknown reference row), the reference rows are inserted and the join
/// insert is retried once.
fn sync_association(
    conn: &Mutex<Connection>,
    kind: Association,
    movie_id: i64,
    rows: &[(Value, String)],
) -> Result<(), StorageError> {
    if rows.is_empty() {
        return Ok(());
    }
    let (reference_sql, join_sql) = association_sql(kind);
    let mut conn = lock(conn)?;
    if let Err(e) = insert_joins(&mut conn, join_sql, movie_id, rows) {
        tracing::debug!(association = %kind, movie_id, error = %e, "join insert failed, adding reference rows");
        insert_references(&mut conn, reference_sql, rows)?;
        insert_joins(&mut conn, join_sql, movie_id, rows)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for SqliteStorage {
    // --- Movies --------------------------------------------------------------

    async fn add_movie(&self, movie: &Movie) -> Result<(), StorageError> {
        let m = movie.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO movies (id, adult, budget, backdrop_path, homepage, imdb_id,
                     original_language, original_title, overview, popularity, poster_path,
                     release_date, revenue, runtime, status, tagline, title, vote_average,
                     vote_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                     ?16, ?17, ?18, ?19)
                 ON CONFLICT(id) DO UPDATE SET
                     budget = excluded.budget,
                     poster_path = excluded.poster_path,
                     backdrop_path = excluded.backdrop_path,
                     revenue = excluded.revenue,
                     runtime = excluded.runtime,
                     vote_average = excluded.vote_average",
                params![
                    m.id,
                    m.adult,
                    m.budget,
                    m.backdrop_path,
                    m.homepage,
                    m.imdb_id,
                    m.original_language,
                    m.original_title,
                    m.overview,
                    m.popularity,
                    m.poster_path,
                    m.release_date,
                    m.revenue,
                    m.runtime,
                    m.status,
                    m.tagline,
                    m.title,
                    m.vote_average,
                    m.vote_count,
                ],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await?;

        let mut syncs = JoinSet::new();
        for kind in Association::ALL {
            let conn = Arc::clone(&self.conn);
            let rows = association_rows(kind, movie);
            let movie_id = movie.id;
            syncs.spawn_blocking(move || (kind, sync_association(&conn, kind, movie_id, &rows)));
        }

        let mut failures = Vec::new();
        while let Some(joined) = syncs.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((association, Err(e))) => failures.push(AssociationFailure {
                    association,
                    message: e.to_string(),
                }),
                Err(e) => return Err(StorageError::Internal(format!("task join error: {e}"))),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort_by_key(|f| f.association);
            Err(StorageError::Associations(failures))
        }
    }

    async fn get_movie(&self, id: i64) -> Result<Movie, StorageError> {
        self.with_conn(move |conn| {
            let mut movie = conn
                .query_row(
                    &format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = ?1"),
                    params![id],
                    movie_from_row,
                )
                .map_err(map_err)?;

            movie.genres = query_all(
                conn,
                "SELECT g.id, g.name FROM movie_genres mg
                 JOIN genres g ON g.id = mg.genre_id
                 WHERE mg.movie_id = ?1 ORDER BY g.id",
                params![id],
                |row| Ok(Genre { id: row.get(0)?, name: row.get(1)? }),
            )?;
            movie.countries = query_all(
                conn,
                "SELECT c.iso_3166_1, c.name FROM movie_countries mc
                 JOIN countries c ON c.iso_3166_1 = mc.country_code
                 WHERE mc.movie_id = ?1 ORDER BY c.iso_3166_1",
                params![id],
                |row| Ok(Country { code: row.get(0)?, name: row.get(1)? }),
            )?;
            movie.companies = query_all(
                conn,
                "SELECT c.id, c.name FROM movie_companies mc
                 JOIN companies c ON c.id = mc.company_id
                 WHERE mc.movie_id = ?1 ORDER BY c.id",
                params![id],
                |row| Ok(Company { id: row.get(0)?, name: row.get(1)? }),
            )?;
            movie.languages = query_all(
                conn,
                "SELECT l.iso_639_1, l.name FROM movie_languages ml
                 JOIN languages l ON l.iso_639_1 = ml.language_code
                 WHERE ml.movie_id = ?1 ORDER BY l.iso_639_1",
                params![id],
                |row| Ok(Language { iso_code: row.get(0)?, name: row.get(1)? }),
            )?;
            Ok(movie)
        })
        .await
    }

    async fn list_movies(
        &self,
        title: &str,
        page: &PaginationParams,
    ) -> Result<Vec<MoviePreview>, StorageError> {
        let order = movie_order(&page.order_by)?;
        let title = title.to_string();
        let (limit, offset) = (page.limit, page.offset);
        self.with_conn(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {PREVIEW_COLUMNS} FROM movies m
                     WHERE instr(m.title, ?1) > 0
                     ORDER BY {order}, m.id
                     LIMIT ?2 OFFSET ?3"
                ),
                params![title, limit, offset],
                preview_from_row,
            )
        })
        .await
    }

    async fn add_recent_viewed_movie(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_err)?;
            tx.execute(
                "INSERT INTO recent_views (user_id, movie_id, view_date, seq)
                 VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(seq), 0) + 1 FROM recent_views))
                 ON CONFLICT(user_id, movie_id) DO UPDATE SET
                     view_date = excluded.view_date,
                     seq = excluded.seq",
                params![user_id, movie_id, Utc::now()],
            )
            .map_err(map_err)?;
            tx.execute(
                "DELETE FROM recent_views
                 WHERE user_id = ?1 AND movie_id NOT IN (
                     SELECT movie_id FROM recent_views
                     WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2
                 )",
                params![user_id, RECENT_HISTORY_LIMIT as i64],
            )
            .map_err(map_err)?;
            tx.commit().map_err(map_err)
        })
        .await
    }

    async fn list_recent_viewed_movies(&self, user_id: i64) -> Result<Vec<MoviePreview>, StorageError> {
        self.with_conn(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {PREVIEW_COLUMNS} FROM recent_views v
                     JOIN movies m ON m.id = v.movie_id
                     WHERE v.user_id = ?1
                     ORDER BY v.seq DESC"
                ),
                params![user_id],
                preview_from_row,
            )
        })
        .await
    }

    // --- Movie likes ---------------------------------------------------------

    async fn like_movie(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO liked_movies (user_id, movie_id) VALUES (?1, ?2)",
                params![user_id, movie_id],
            )
            .map_err(map_err)?;
            Ok(())
        })
        .await
    }

    async fn delete_movie_like(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "DELETE FROM liked_movies WHERE user_id = ?1 AND movie_id = ?2",
                    params![user_id, movie_id],
                )
                .map_err(map_err)?;
            expect_row(changed)
        })
        .await
    }

    async fn list_liked_movies(
        &self,
        user_id: i64,
        page: &PaginationParams,
    ) -> Result<Vec<MoviePreview>, StorageError> {
        let order = movie_order(&page.order_by)?;
        let (limit, offset) = (page.limit, page.offset);
        self.with_conn(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {PREVIEW_COLUMNS} FROM liked_movies l
                     JOIN movies m ON m.id = l.movie_id
                     WHERE l.user_id = ?1
                     ORDER BY {order}, m.id
                     LIMIT ?2 OFFSET ?3"
                ),
                params![user_id, limit, offset],
                preview_from_row,
            )
        })
        .await
    }

    async fn check_liked(&self, user_id: i64, movie_id: i64) -> Result<bool, StorageError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM liked_movies WHERE user_id = ?1 AND movie_id = ?2)",
                params![user_id, movie_id],
                |row| row.get(0),
            )
            .map_err(map_err)
        })
        .await
    }

    // --- Comments ------------------------------------------------------------

    async fn list_movie_comments(
        &self,
        movie_id: i64,
        page: &PaginationParams,
    ) -> Result<Vec<Comment>, StorageError> {
        let order = comment_order(&page.order_by)?;
        let (limit, offset) = (page.limit, page.offset);
        self.with_conn(move |conn| {
            query_all(
                conn,
                &format!(
                    "{COMMENT_SELECT}
                     WHERE c.movie_id = ?1
                     ORDER BY {order}, c.id
                     LIMIT ?2 OFFSET ?3"
                ),
                params![movie_id, limit, offset],
                comment_from_row,
            )
        })
        .await
    }

    async fn list_liked_comments_for_movie(
        &self,
        movie_id: i64,
        user_id: i64,
    ) -> Result<Vec<i64>, StorageError> {
        self.with_conn(move |conn| {
            query_all(
                conn,
                "SELECT lc.comment_id FROM liked_comments lc
                 JOIN comments c ON c.id = lc.comment_id
                 WHERE c.movie_id = ?1 AND lc.user_id = ?2
                 ORDER BY lc.comment_id",
                params![movie_id, user_id],
                |row| row.get(0),
            )
        })
        .await
    }

    async fn add_movie_comment(&self, comment: &Comment) -> Result<Comment, StorageError> {
        let mut comment = comment.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO comments (user_id, movie_id, create_date, update_date, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    comment.user_id,
                    comment.movie_id,
                    comment.create_date,
                    comment.update_date,
                    comment.content,
                ],
            )
            .map_err(map_err)?;
            comment.id = conn.last_insert_rowid();
            comment.likes = 0;
            Ok(comment)
        })
        .await
    }

    async fn update_comment(&self, comment: &Comment) -> Result<Comment, StorageError> {
        let comment = comment.clone();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE comments SET content = ?1, update_date = ?2
                     WHERE id = ?3 AND user_id = ?4",
                    params![comment.content, comment.update_date, comment.id, comment.user_id],
                )
                .map_err(map_err)?;
            expect_row(changed)?;
            fetch_comment(conn, comment.id)
        })
        .await
    }

    async fn delete_comment(&self, id: i64, user_id: i64) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "DELETE FROM comments WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                )
                .map_err(map_err)?;
            expect_row(changed)
        })
        .await
    }

    async fn like_comment(&self, user_id: i64, comment_id: i64) -> Result<Comment, StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO liked_comments (user_id, comment_id) VALUES (?1, ?2)",
                params![user_id, comment_id],
            )
            .map_err(map_err)?;
            fetch_comment(conn, comment_id)
        })
        .await
    }

    async fn delete_comment_like(&self, user_id: i64, comment_id: i64) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "DELETE FROM liked_comments WHERE user_id = ?1 AND comment_id = ?2",
                    params![user_id, comment_id],
                )
                .map_err(map_err)?;
            expect_row(changed)
        })
        .await
    }

    // --- Credits -------------------------------------------------------------

    async fn get_credits(&self, movie_id: i64) -> Result<Credit, StorageError> {
        self.with_conn(move |conn| {
            let id: i64 = conn
                .query_row(
                    "SELECT id FROM credits WHERE movie_id = ?1",
                    params![movie_id],
                    |row| row.get(0),
                )
                .map_err(map_err)?;
            let cast = query_all(
                conn,
                "SELECT cast_id, person_id, gender, name, character_name, ord, profile_path
                 FROM credit_cast WHERE credit_id = ?1 ORDER BY ord, cast_id",
                params![id],
                |row| {
                    Ok(Cast {
                        cast_id: row.get(0)?,
                        id: row.get(1)?,
                        gender: row.get(2)?,
                        name: row.get(3)?,
                        character: row.get(4)?,
                        order: row.get(5)?,
                        profile_path: row.get(6)?,
                    })
                },
            )?;
            let crew = query_all(
                conn,
                "SELECT person_id, department, gender, job, name, profile_path
                 FROM credit_crew WHERE credit_id = ?1 ORDER BY rowid",
                params![id],
                |row| {
                    Ok(Crew {
                        id: row.get(0)?,
                        department: row.get(1)?,
                        gender: row.get(2)?,
                        job: row.get(3)?,
                        name: row.get(4)?,
                        profile_path: row.get(5)?,
                    })
                },
            )?;
            Ok(Credit { id, movie_id, cast, crew })
        })
        .await
    }

    async fn add_credits(&self, credit: &Credit) -> Result<(), StorageError> {
        let credit = credit.clone();
        self.with_conn(move |conn| {
            let started = Instant::now();
            let tx = conn.transaction().map_err(map_err)?;
            tx.execute(
                "INSERT INTO credits (id, movie_id) VALUES (?1, ?2)",
                params![credit.id, credit.movie_id],
            )
            .map_err(map_err)?;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO credit_cast (credit_id, cast_id, person_id, gender, name,
                             character_name, ord, profile_path)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )
                    .map_err(map_err)?;
                for c in &credit.cast {
                    stmt.execute(params![
                        credit.id,
                        c.cast_id,
                        c.id,
                        c.gender,
                        c.name,
                        c.character,
                        c.order,
                        c.profile_path,
                    ])
                    .map_err(map_err)?;
                }
            }
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO credit_crew (credit_id, person_id, department, gender, job,
                             name, profile_path)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )
                    .map_err(map_err)?;
                for c in &credit.crew {
                    stmt.execute(params![
                        credit.id,
                        c.id,
                        c.department,
                        c.gender,
                        c.job,
                        c.name,
                        c.profile_path,
                    ])
                    .map_err(map_err)?;
                }
            }
            commit_within_deadline(tx, started)
        })
        .await
    }

    // --- Ratings -------------------------------------------------------------

    async fn get_rating(&self, user_id: i64, movie_id: i64) -> Result<Rating, StorageError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT user_id, movie_id, rating, create_date FROM ratings
                 WHERE user_id = ?1 AND movie_id = ?2",
                params![user_id, movie_id],
                |row| {
                    Ok(Rating {
                        user_id: row.get(0)?,
                        movie_id: row.get(1)?,
                        rating: row.get(2)?,
                        create_date: Some(row.get(3)?),
                    })
                },
            )
            .map_err(map_err)
        })
        .await
    }

    async fn add_rating(&self, rating: &Rating) -> Result<(), StorageError> {
        let rating = rating.clone();
        self.with_conn(move |conn| {
            let started = Instant::now();
            let tx = conn.transaction().map_err(map_err)?;

            let previous: Option<i32> = tx
                .query_row(
                    "SELECT rating FROM ratings WHERE user_id = ?1 AND movie_id = ?2",
                    params![rating.user_id, rating.movie_id],
                    |row| row.get::<_, Option<i32>>(0),
                )
                .optional()
                .map_err(map_err)?
                .flatten();

            if previous == rating.rating {
                return Ok(());
            }

            tx.execute(
                "INSERT INTO ratings (user_id, movie_id, rating, create_date)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, movie_id) DO UPDATE SET
                     rating = excluded.rating,
                     create_date = excluded.create_date",
                params![
                    rating.user_id,
                    rating.movie_id,
                    rating.rating,
                    rating.create_date.unwrap_or_else(Utc::now),
                ],
            )
            .map_err(map_err)?;

            match previous {
                Some(old) => {
                    let delta = i64::from(rating.rating.unwrap_or(0)) - i64::from(old);
                    tx.execute(
                        "UPDATE movies SET vote_sum = vote_sum + ?1 WHERE id = ?2",
                        params![delta, rating.movie_id],
                    )
                    .map_err(map_err)?;
                }
                None => {
                    tx.execute(
                        "UPDATE movies SET vote_count = vote_count + 1 WHERE id = ?1",
                        params![rating.movie_id],
                    )
                    .map_err(map_err)?;
                }
            }

            commit_within_deadline(tx, started)
        })
        .await
    }

    async fn delete_rating(&self, user_id: i64, movie_id: i64) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "DELETE FROM ratings WHERE user_id = ?1 AND movie_id = ?2",
                    params![user_id, movie_id],
                )
                .map_err(map_err)?;
            expect_row(changed)
        })
        .await
    }

    async fn list_rated_movies(
        &self,
        user_id: i64,
        page: &PaginationParams,
    ) -> Result<Vec<RatedMovie>, StorageError> {
        let order = rated_order(&page.order_by)?;
        let (limit, offset) = (page.limit, page.offset);
        self.with_conn(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {PREVIEW_COLUMNS}, r.rating, r.create_date FROM ratings r
                     JOIN movies m ON m.id = r.movie_id
                     WHERE r.user_id = ?1
                     ORDER BY {order}, m.id
                     LIMIT ?2 OFFSET ?3"
                ),
                params![user_id, limit, offset],
                |row| {
                    Ok(RatedMovie {
                        movie: preview_from_row(row)?,
                        rating: row.get(5)?,
                        rate_date: row.get(6)?,
                    })
                },
            )
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
