//! Error types for the offline region cache.
//!
//! Every operation exposed to the UI layer reports one of these kinds as a
//! typed outcome. None of them is fatal to the process.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for offgrid.
#[derive(Debug, Error)]
pub enum OffgridError {
    // Input validation
    #[error("Invalid input for {field}: {message}")]
    InvalidInput { field: String, message: String },

    // Region lifecycle errors
    #[error("Region not found: {region_id}")]
    RegionNotFound { region_id: String },

    #[error("Region {region_id} is not ready (status: {status})")]
    RegionNotReady { region_id: String, status: String },

    #[error("Entry {entry_id} belongs to region {actual}, expected {expected}")]
    RegionMismatch {
        entry_id: String,
        expected: String,
        actual: String,
    },

    #[error("Download failed for region {region_id}: {message}")]
    DownloadFailed { region_id: String, message: String },

    #[error("Download cancelled for region {region_id}")]
    RegionCancelled { region_id: String },

    #[error("Search data build failed for region {region_id} ({source_name}): {message}")]
    PartialBuildFailure {
        region_id: String,
        source_name: String,
        message: String,
    },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    // Storage errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for offgrid operations.
pub type Result<T> = std::result::Result<T, OffgridError>;

impl From<std::io::Error> for OffgridError {
    fn from(err: std::io::Error) -> Self {
        OffgridError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for OffgridError {
    fn from(err: serde_json::Error) -> Self {
        OffgridError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for OffgridError {
    fn from(err: rusqlite::Error) -> Self {
        OffgridError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for OffgridError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OffgridError::Timeout(std::time::Duration::from_secs(0))
        } else {
            OffgridError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl OffgridError {
    /// Create an invalid-input error for a named field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        OffgridError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        OffgridError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Error used when a mutex guarding a SQLite connection is poisoned.
    pub(crate) fn lock_poisoned(what: &str) -> Self {
        OffgridError::Database {
            message: format!("Failed to acquire {} lock", what),
            source: None,
        }
    }

    /// Stable machine-readable code for the UI layer.
    ///
    /// The UI presents a generic offline/retry affordance for every kind; the
    /// code only selects the wording.
    pub fn code(&self) -> &'static str {
        match self {
            OffgridError::InvalidInput { .. } => "invalid_input",
            OffgridError::RegionNotFound { .. } => "region_not_found",
            OffgridError::RegionNotReady { .. } => "region_not_ready",
            OffgridError::RegionMismatch { .. } => "region_mismatch",
            OffgridError::DownloadFailed { .. } => "download_failed",
            OffgridError::RegionCancelled { .. } => "region_cancelled",
            OffgridError::PartialBuildFailure { .. } => "partial_build_failure",
            OffgridError::Network { .. } | OffgridError::Timeout(_) => "network",
            OffgridError::Database { .. } | OffgridError::Io { .. } => "storage",
            OffgridError::Json { .. } => "serialization",
            OffgridError::Config { .. } => "config",
            OffgridError::Other(_) => "internal",
        }
    }

    /// Check if the caller may reasonably retry the failed operation.
    ///
    /// The core itself never retries; this only informs the caller's policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OffgridError::Network { .. }
                | OffgridError::Timeout(_)
                | OffgridError::DownloadFailed { .. }
                | OffgridError::PartialBuildFailure { .. }
                | OffgridError::RegionCancelled { .. }
        )
    }
}
