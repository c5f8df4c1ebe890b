//! Error types for data operations.
//!
//! This module defines [`DataError`] which covers the failures an upstream
//! call can produce, plus the terminal [`DataError::Exhausted`] reported once
//! a fetch has used up its retry budget.

use std::time::Duration;

use thiserror::Error;

use crate::period::FetchMode;

/// Errors that can occur during data operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// Network-related errors (connection failures, timeouts, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The requested symbol was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider answered but had nothing for the symbol.
    #[error("Data not available for {symbol}: {reason}")]
    DataNotAvailable {
        /// The symbol that was requested.
        symbol: String,
        /// What was missing.
        reason: String,
    },

    /// Error parsing data from a provider.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested feature is not supported.
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// Every attempt allowed by the retry budget failed.
    #[error("{mode} fetch for {symbol} failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// The symbol that was requested.
        symbol: String,
        /// Which upstream operation was attempted.
        mode: FetchMode,
        /// Number of upstream calls made.
        attempts: u32,
        /// Message of the final attempt's error.
        last_error: String,
    },

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// How long the provider asked us to wait, if it throttled us with a hint.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;
