//! # GPX Sync
//!
//! Incremental upload of local GPX tracks to Strava, skipping tracks the account
//! already has.
//!
//! This library provides:
//! - GPX loading with start time and per-segment distance
//! - Watermark-based candidate selection in start-time order
//! - Duplicate detection against recent remote activities
//! - A sequential sync driver with pacing and bounded rate-limit retry
//!
//! ## Features
//!
//! - **`http`** (default) - Strava HTTP client and the `gpx-strava-sync` binary
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use gpx_sync::{find_duplicate, DuplicateConfig, RemoteActivity};
//!
//! let start = Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 12).unwrap();
//! let remote = vec![RemoteActivity::new("Run", start, 5_020.0)];
//!
//! // Same minute, same second, 0.4% distance difference
//! let found = find_duplicate(&start, 5_000.0, &remote, &DuplicateConfig::default());
//! assert!(found.is_some());
//! ```

use std::path::PathBuf;

use chrono::{DateTime, Utc};

pub mod config;
pub mod dedup;
pub mod error;
pub mod geo_utils;
pub mod loader;
pub mod remote;
pub mod selector;
pub mod sync;

// Strava client
#[cfg(feature = "http")]
pub mod strava;

pub use config::{DuplicateConfig, RetryPolicy, SyncConfig};
pub use dedup::{find_duplicate, DuplicateDetector, DuplicateMatch};
pub use error::{RemoteError, SyncError, TrackError};
pub use loader::{load_track, load_tracks, TrackLoad};
pub use remote::{ActivityService, RemoteActivity, UploadReceipt};
pub use selector::{select_candidates, Candidate, CandidateSet, Watermark};
pub use sync::{ensure_folder, ItemOutcome, SyncDriver, SyncReport, SyncState};

#[cfg(feature = "http")]
pub use strava::StravaClient;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use gpx_sync::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A parsed local track file.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// File the track was loaded from
    pub path: PathBuf,
    /// Name of the first named `<trk>`, if any
    pub name: Option<String>,
    /// Earliest point timestamp; `None` if no point carries a time
    pub start_time: Option<DateTime<Utc>>,
    /// Total distance in meters, summed per segment
    pub distance_meters: f64,
    /// Number of track points across all segments
    pub point_count: usize,
}

// ============================================================================
// Tests
// ============================================================================
