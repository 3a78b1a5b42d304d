//! Public surface for the `movies-service` crate.
//!
//! Exposes the router builder, state and storage types so that external
//! crates (e.g. the conformance test suite) can spin up an in-process
//! service without spawning a subprocess.

pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod middleware;
pub mod notify;
pub mod router;
pub mod storage;
pub mod tasks;
pub mod tmdb;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ServiceConfig;
pub use handlers::AppState;
pub use router::build_router;
pub use storage::{memory::MemoryStorage, sqlite::SqliteStorage, Storage};
pub use tasks::TaskQueue;
pub use tmdb::{MetadataClient, MetadataError, TmdbClient};
