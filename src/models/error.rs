// Data Profile Manager - Error Types
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! Shared error types.

use thiserror::Error;

/// Result type alias for profile manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for profile manager operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // Store Errors
    // ========================================
    #[error("Profile store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Malformed profile row {row_id}: {reason}")]
    MalformedRow { row_id: i64, reason: String },

    // ========================================
    // Persistence Errors
    // ========================================
    #[error("Failed to read configuration: {0}")]
    ConfigReadFailed(String),

    #[error("Failed to write configuration: {0}")]
    ConfigWriteFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new malformed row error.
    pub fn malformed_row(row_id: i64, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            row_id,
            reason: reason.into(),
        }
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from toml serialize errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigWriteFailed(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

/// Typed outcome when no profile can serve a request. Not exceptional:
/// callers treat these as valid, if unfortunate, states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("no profile satisfies the requested capabilities")]
    NoMatchingCapability,

    #[error("no capability-matching profile supports the network type")]
    NoMatchingNetworkType,

    #[error("no profile matches the current preferred set id")]
    NoMatchingSetId,
}
