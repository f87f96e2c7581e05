//! Unified error types for roadcache.
//!
//! Every variant renders with a stable code prefix so the host can match on
//! the code without parsing the message.

use tokio_rusqlite::rusqlite;

/// Unified error type for the cache store, the network client and the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input (e.g., empty generation label, malformed request).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A seed asset could not be fetched during install.
    #[error("SEED_FAILED: {url}: {reason}")]
    SeedFailed { url: String, reason: String },

    /// The request never produced a response (DNS, connect, reset).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// A lifecycle transition was requested from a state that does not allow it.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// The generation does not exist in the store.
    #[error("CACHE_ERROR: unknown generation {0}")]
    UnknownGeneration(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::SeedFailed { .. } => "SEED_FAILED",
            Error::Network(_) => "NETWORK_ERROR",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::UnknownGeneration(_)
            | Error::Database(_)
            | Error::MigrationFailed(_)
            | Error::CorruptEntry(_) => "CACHE_ERROR",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
