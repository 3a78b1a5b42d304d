//! Request-level cross-cutting concerns.

pub mod auth;
