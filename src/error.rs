// src/error.rs

//! Unified error handling for the leaderboard cache.
//!
//! [`AppError`] covers everything that can go wrong internally. [`ToolError`] is the
//! small closed set that query callers see and branch on.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for internal operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for tool operations.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Remote leaderboard answered with something unusable
    #[error("Source error: {0}")]
    Source(String),

    /// Snapshot store is unusable (poisoned lock, failed background write)
    #[error("Store error: {0}")]
    Store(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a source error.
    pub fn upstream(message: impl fmt::Display) -> Self {
        Self::Source(message.to_string())
    }

    /// Create a store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }
}

/// Machine-readable category of a [`ToolError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    TransientFetch,
    StoreFailure,
    NotFound,
    Validation,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::TransientFetch => "transient_fetch",
            ToolErrorKind::StoreFailure => "store_failure",
            ToolErrorKind::NotFound => "not_found",
            ToolErrorKind::Validation => "validation",
        }
    }
}

/// Error returned by query tools.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The remote leaderboard could not be fetched this time
    #[error("{0}")]
    TransientFetch(String),

    /// The snapshot store failed to read or write
    #[error("{0}")]
    StoreFailure(String),

    /// No team (or subscription) matched the request
    #[error("{0}")]
    NotFound(String),

    /// The caller supplied unusable input
    #[error("{0}")]
    Validation(String),
}

impl ToolError {
    pub fn transient_fetch(message: impl Into<String>) -> Self {
        Self::TransientFetch(message.into())
    }

    pub fn store_failure(message: impl Into<String>) -> Self {
        Self::StoreFailure(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ToolErrorKind {
        match self {
            ToolError::TransientFetch(_) => ToolErrorKind::TransientFetch,
            ToolError::StoreFailure(_) => ToolErrorKind::StoreFailure,
            ToolError::NotFound(_) => ToolErrorKind::NotFound,
            ToolError::Validation(_) => ToolErrorKind::Validation,
        }
    }
}

impl From<AppError> for ToolError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Http(_) | AppError::Source(_) | AppError::Url(_) => {
                ToolError::TransientFetch(error.to_string())
            }
            AppError::Validation(message) => ToolError::Validation(message),
            other => ToolError::StoreFailure(other.to_string()),
        }
    }
}
