//! Error kinds surfaced by the fetch engine.

use thiserror::Error;

/// Failures a fetch request can end with.
///
/// Nothing is recovered locally: a request either succeeds with a complete
/// table or fails with one of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// A date token did not resolve against the calendar, a computed window
    /// ran past the calendar start, or the range was inverted.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// The requested field is not part of the bound collection.
    #[error("Unknown field '{dname}' in collection '{collection}'")]
    UnknownField { collection: String, dname: String },

    /// A sid seen in the store is not part of the universe.
    #[error("Sid not in universe: {0}")]
    MissingUniverseEntry(String),

    /// The underlying store failed. Never retried at this layer.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<fjall::Error> for FetchError {
    fn from(err: fjall::Error) -> Self {
        FetchError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::StoreUnavailable(format!("malformed document: {err}"))
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
