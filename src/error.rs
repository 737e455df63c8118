//! Error types for loading tracks, talking to the remote service and driving a sync.
//!
//! Recoverable conditions (a bad track file, a rejected upload) are reported per item
//! by the driver. Everything that surfaces as a [`SyncError`] ends the run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to read or parse a single track file.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Errors reported by an [`ActivityService`](crate::ActivityService).
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service is throttling us and asked to come back later.
    #[error("rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// The service refused the uploaded file (duplicate, malformed payload, ...).
    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("HTTP error{}: {message}", .status_code.map(|c| format!(" {}", c)).unwrap_or_default())]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("failed to read upload file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. })
    }
}

/// Fatal errors that terminate a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Every permitted attempt was rate limited.
    #[error("upload of {path} still rate limited after {attempts} attempts")]
    RetriesExhausted {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// A retry attempt failed for a reason other than rate limiting.
    #[error("retry {attempt} of {path} failed: {source}")]
    RetryFailed {
        path: PathBuf,
        attempt: u32,
        #[source]
        source: RemoteError,
    },
}
