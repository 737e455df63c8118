//! Duplicate detection against activities already on the remote service.
//!
//! A local track is treated as already uploaded when a recent remote activity of
//! the configured type passes every check, in this order:
//!
//! 1. same activity type
//! 2. same UTC start minute (`%Y-%m-%d %H:%M`)
//! 3. start times less than `max_time_diff_secs` apart
//! 4. relative distance difference below `max_distance_ratio`
//!
//! The minute comparison rejects most activities before any arithmetic. The two
//! thresholds absorb clock skew and GPS distance noise between the device that
//! recorded the file and whatever produced the remote activity.

use chrono::{DateTime, Utc};
use log::info;

use crate::config::DuplicateConfig;
use crate::error::RemoteError;
use crate::remote::{ActivityService, RemoteActivity};

const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A remote activity that matched a local track.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub activity: RemoteActivity,
    /// Matched start minute, `%Y-%m-%d %H:%M` in UTC
    pub minute: String,
    /// Absolute start time difference in seconds
    pub time_diff_secs: f64,
    /// `|local - remote| / max(remote, 1)`
    pub distance_ratio: f64,
}

/// Start time truncated to the minute, as compared by the detector.
pub fn minute_key(time: &DateTime<Utc>) -> String {
    time.format(MINUTE_FORMAT).to_string()
}

/// Relative distance difference, guarded against a zero remote distance.
pub fn distance_ratio(local_meters: f64, remote_meters: f64) -> f64 {
    (local_meters - remote_meters).abs() / remote_meters.max(1.0)
}

fn time_diff_secs(a: &DateTime<Utc>, b: &DateTime<Utc>) -> f64 {
    (a.timestamp_micros() - b.timestamp_micros()).unsigned_abs() as f64 / 1_000_000.0
}

/// Find the first activity in `activities` that duplicates the local track.
///
/// Activities are checked in the order given; the first one passing all checks wins.
pub fn find_duplicate(
    start_time: &DateTime<Utc>,
    distance_meters: f64,
    activities: &[RemoteActivity],
    config: &DuplicateConfig,
) -> Option<DuplicateMatch> {
    let local_minute = minute_key(start_time);

    for activity in activities {
        // CHECK 1: category
        if activity.activity_type != config.activity_type {
            continue;
        }

        // CHECK 2: same wall-clock minute
        let remote_minute = minute_key(&activity.start_time);
        if remote_minute != local_minute {
            continue;
        }

        // CHECK 3: start times close enough
        let time_diff = time_diff_secs(start_time, &activity.start_time);
        if time_diff >= config.max_time_diff_secs {
            continue;
        }

        // CHECK 4: distance within tolerance
        let ratio = distance_ratio(distance_meters, activity.distance_meters);
        if ratio >= config.max_distance_ratio {
            continue;
        }

        return Some(DuplicateMatch {
            activity: activity.clone(),
            minute: remote_minute,
            time_diff_secs: time_diff,
            distance_ratio: ratio,
        });
    }

    None
}

/// Checks candidates against a fresh window of remote activities.
#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    config: DuplicateConfig,
}

impl DuplicateDetector {
    pub fn new(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Query the service and report the matching activity, if any.
    ///
    /// Every call fetches the window again so uploads made earlier in the run are
    /// visible to later checks.
    pub async fn check<S: ActivityService>(
        &self,
        service: &S,
        start_time: &DateTime<Utc>,
        distance_meters: f64,
    ) -> Result<Option<DuplicateMatch>, RemoteError> {
        let activities = service.recent_activities(self.config.window).await?;
        let found = find_duplicate(start_time, distance_meters, &activities, &self.config);

        if let Some(ref m) = found {
            info!(
                "Skip duplicate: minute={}, time_diff={:.3}s, distance_diff={:.1}%",
                m.minute,
                m.time_diff_secs,
                m.distance_ratio * 100.0
            );
        }

        Ok(found)
    }
}
