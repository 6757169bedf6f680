// File: crates/chart-prep/src/error.rs
// Summary: Error types for payload validation, configuration and the fetch collaborator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    /// A present parallel array does not match `dates` in length.
    #[error("field `{field}` has {found} entries, expected {expected}")]
    LengthMismatch { field: &'static str, expected: usize, found: usize },
    #[error("unknown period `{0}`")]
    UnknownPeriod(String),
    #[error("unknown interval `{0}`")]
    UnknownInterval(String),
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("preference store: {0}")]
    Preferences(String),
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Failure reported by the fetch collaborator. Cloneable so one in-flight
/// outcome can be handed to every caller waiting on the same key.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("data unavailable for {symbol}: {reason}")]
pub struct FetchError {
    pub symbol: String,
    pub reason: String,
}

impl FetchError {
    pub fn new(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { symbol: symbol.into(), reason: reason.into() }
    }
}

pub type Result<T, E = PrepError> = std::result::Result<T, E>;
