//! Run configuration.
//!
//! A [`SyncConfig`] is built once (normally from command-line arguments) and handed
//! to the driver, which owns it for the duration of the run.

use std::path::PathBuf;
use std::time::Duration;

/// Folder scanned for track files when nothing else is configured.
pub const DEFAULT_TRACK_FOLDER: &str = "GPX_OUT";

/// Environment variable that overrides [`DEFAULT_TRACK_FOLDER`].
pub const TRACK_FOLDER_ENV: &str = "GPX_FOLDER";

/// Thresholds for recognising a local track that already exists remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateConfig {
    /// Remote activity category that can match a local track.
    /// Default: "Run"
    pub activity_type: String,

    /// Number of most-recent remote activities fetched per check.
    /// Default: 5
    pub window: usize,

    /// Start times must differ by strictly less than this many seconds.
    /// Default: 60.0
    pub max_time_diff_secs: f64,

    /// Relative distance difference must be strictly below this fraction.
    /// Default: 0.05 (5%)
    pub max_distance_ratio: f64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            activity_type: "Run".to_string(),
            window: 5,
            max_time_diff_secs: 60.0,
            max_distance_ratio: 0.05,
        }
    }
}

/// Bounded retry for rate-limited uploads.
///
/// The wait before each retry is the interval the service asked for. Running out of
/// retries is fatal for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts allowed after the first one is rate limited.
    /// Default: 1
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

impl RetryPolicy {
    /// Total attempts, first try included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Everything one sync run needs to know.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Folder holding the `.gpx` files. Created if missing.
    pub folder: PathBuf,

    /// Ignore the remote watermark and consider every local track.
    pub force_all: bool,

    /// Delay after each candidate to stay under the service's throughput limits.
    /// Default: 1s
    pub pacing: Duration,

    /// Format hint passed along with each upload.
    /// Default: "gpx"
    pub upload_format: String,

    pub duplicate: DuplicateConfig,
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(DEFAULT_TRACK_FOLDER),
            force_all: false,
            pacing: Duration::from_secs(1),
            upload_format: "gpx".to_string(),
            duplicate: DuplicateConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Default configuration rooted at `folder`.
    pub fn with_folder(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    /// Resolve the track folder from [`TRACK_FOLDER_ENV`], falling back to the default.
    pub fn folder_from_env() -> PathBuf {
        std::env::var_os(TRACK_FOLDER_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACK_FOLDER))
    }
}
