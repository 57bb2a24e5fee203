//! Shared error type for the tracker crates
//!
//! Pipeline-level failures (source outages, unmatched airings, cover art
//! misses) live in `t2k_tracker::error`; this type covers storage, files
//! and bootstrap configuration.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Chart or notification storage failure
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading a seed file, config file or log file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bootstrap TOML missing, unreadable or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lookup by id found nothing (chart entry, rule)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Chart seed or stored row violates a chart invariant
    #[error("Invalid chart data: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "top2000.json").into();
        assert!(err.to_string().starts_with("IO error:"));
    }

    #[test]
    fn test_invalid_chart_message() {
        let err = Error::InvalidInput("duplicate position 12".into());
        assert_eq!(err.to_string(), "Invalid chart data: duplicate position 12");
    }
}
