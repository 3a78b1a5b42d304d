//! Service configuration, populated from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration for the movies service.
///
/// Read once at startup and passed to whoever needs it. Every variable has a
/// default, so the service starts with zero configuration (in-memory store,
/// notifications off).
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `MOVIES_BIND` | `0.0.0.0:8080` | TCP socket address to listen on |
/// | `MOVIES_RELEASE` | `false` | Release mode; quieter default log filter |
/// | `MOVIES_DB` | (absent = in-memory) | Path to the SQLite database file |
/// | `TMDB_URL` | `https://api.themoviedb.org/3` | Metadata provider base URL |
/// | `TMDB_KEY` | empty | Metadata provider API key |
/// | `TMDB_TIMEOUT_SECS` | `5` | Timeout of outbound provider requests |
/// | `NOTIFICATOR_URL` | (absent = disabled) | Notification service base URL |
/// | `MOVIES_TASK_WORKERS` | `8` | Background jobs allowed to run at once |
/// | `MOVIES_TASK_QUEUE` | `256` | Background jobs allowed to wait |
/// | `MOVIES_INGEST_INTERVAL_SECS` | `0` (disabled) | Seconds between trending ingestion rounds |
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    pub release: bool,

    /// Path to the SQLite database file.
    /// `None` means use an in-memory store (data is lost on restart).
    pub db_path: Option<String>,

    pub tmdb_url: String,
    pub tmdb_key: String,
    pub tmdb_timeout: Duration,

    /// `None` disables comment-like notifications.
    pub notificator_url: Option<String>,

    pub task_workers: usize,
    pub task_queue: usize,

    /// Zero disables trending ingestion.
    pub ingest_interval_secs: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            release: false,
            db_path: None,
            tmdb_url: "https://api.themoviedb.org/3".into(),
            tmdb_key: String::new(),
            tmdb_timeout: Duration::from_secs(5),
            notificator_url: None,
            task_workers: 8,
            task_queue: 256,
            ingest_interval_secs: 0,
        }
    }
}

impl ServiceConfig {
    /// Populate config from the process environment, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Populate config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bind_addr = match var("MOVIES_BIND") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "MOVIES_BIND",
                value: v.clone(),
                reason: "expected a socket address such as 0.0.0.0:8080",
            })?,
            None => defaults.bind_addr,
        };

        let release = match var("MOVIES_RELEASE") {
            Some(v) => parse_bool("MOVIES_RELEASE", &v)?,
            None => defaults.release,
        };

        let tmdb_timeout = match var("TMDB_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_number("TMDB_TIMEOUT_SECS", &v)?),
            None => defaults.tmdb_timeout,
        };

        let task_workers = match var("MOVIES_TASK_WORKERS") {
            Some(v) => positive("MOVIES_TASK_WORKERS", &v)?,
            None => defaults.task_workers,
        };
        let task_queue = match var("MOVIES_TASK_QUEUE") {
            Some(v) => positive("MOVIES_TASK_QUEUE", &v)?,
            None => defaults.task_queue,
        };

        let ingest_interval_secs = match var("MOVIES_INGEST_INTERVAL_SECS") {
            Some(v) => parse_number("MOVIES_INGEST_INTERVAL_SECS", &v)?,
            None => defaults.ingest_interval_secs,
        };

        Ok(Self {
            bind_addr,
            release,
            db_path: var("MOVIES_DB"),
            tmdb_url: var("TMDB_URL").unwrap_or(defaults.tmdb_url),
            tmdb_key: lookup("TMDB_KEY").unwrap_or_default(),
            tmdb_timeout,
            notificator_url: var("NOTIFICATOR_URL"),
            task_workers,
            task_queue,
            ingest_interval_secs,
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected true or false",
        }),
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: "expected a non-negative integer",
    })
}

fn positive(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected a positive integer",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn defaults_apply_to_empty_environment() {
        let config = from(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8080");
        assert!(!config.release);
        assert!(config.db_path.is_none());
        assert!(config.notificator_url.is_none());
        assert_eq!(config.tmdb_url, "https://api.themoviedb.org/3");
        assert_eq!(config.tmdb_timeout, Duration::from_secs(5));
        assert_eq!(config.task_workers, 8);
        assert_eq!(config.task_queue, 256);
        assert_eq!(config.ingest_interval_secs, 0);
    }

    #[test]
    fn values_are_read() {
        let config = from(&[
            ("MOVIES_BIND", "127.0.0.1:9000"),
            ("MOVIES_RELEASE", "TRUE"),
            ("MOVIES_DB", "/tmp/movies.db"),
            ("TMDB_KEY", "secret"),
            ("TMDB_TIMEOUT_SECS", "2"),
            ("NOTIFICATOR_URL", "http://notificator:8000"),
            ("MOVIES_TASK_WORKERS", "3"),
            ("MOVIES_INGEST_INTERVAL_SECS", "3600"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert!(config.release);
        assert_eq!(config.db_path.as_deref(), Some("/tmp/movies.db"));
        assert_eq!(config.tmdb_key, "secret");
        assert_eq!(config.tmdb_timeout, Duration::from_secs(2));
        assert_eq!(config.notificator_url.as_deref(), Some("http://notificator:8000"));
        assert_eq!(config.task_workers, 3);
        assert_eq!(config.ingest_interval_secs, 3600);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = from(&[("MOVIES_DB", "  "), ("NOTIFICATOR_URL", "")]).unwrap();
        assert!(config.db_path.is_none());
        assert!(config.notificator_url.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            from(&[("MOVIES_BIND", "localhost")]),
            Err(ConfigError::Invalid { name: "MOVIES_BIND", .. })
        ));
        assert!(matches!(
            from(&[("MOVIES_TASK_WORKERS", "0")]),
            Err(ConfigError::Invalid { name: "MOVIES_TASK_WORKERS", .. })
        ));
        assert!(matches!(
            from(&[("MOVIES_RELEASE", "maybe")]),
            Err(ConfigError::Invalid { name: "MOVIES_RELEASE", .. })
        ));
        assert!(matches!(
            from(&[("TMDB_TIMEOUT_SECS", "-1")]),
            Err(ConfigError::Invalid { name: "TMDB_TIMEOUT_SECS", .. })
        ));
    }
}
