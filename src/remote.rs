//! Contract between the sync driver and the remote fitness service.
//!
//! The driver only ever talks to the service through [`ActivityService`], so the
//! Strava client and in-memory test doubles are interchangeable.

use std::future::Future;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// An activity as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteActivity {
    /// Activity category, e.g. "Run" or "Ride"
    #[serde(rename = "type")]
    pub activity_type: String,
    #[serde(rename = "start_date")]
    pub start_time: DateTime<Utc>,
    /// Distance in meters
    #[serde(rename = "distance")]
    pub distance_meters: f64,
}

impl RemoteActivity {
    pub fn new(activity_type: &str, start_time: DateTime<Utc>, distance_meters: f64) -> Self {
        Self {
            activity_type: activity_type.to_string(),
            start_time,
            distance_meters,
        }
    }
}

/// Acknowledgement of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Service-side id of the upload job
    pub upload_id: u64,
    /// Status text returned with the acknowledgement
    pub status: Option<String>,
}

/// Operations the sync needs from the remote service.
///
/// Calls are awaited one at a time by the driver; implementations need not be
/// thread safe.
pub trait ActivityService {
    /// Start time of the most recent remote activity, `None` if the account is empty.
    fn latest_activity_start(
        &self,
    ) -> impl Future<Output = Result<Option<DateTime<Utc>>, RemoteError>>;

    /// Up to `limit` activities, most recent first.
    fn recent_activities(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<RemoteActivity>, RemoteError>>;

    /// Upload a track file. `format` is a hint such as "gpx".
    ///
    /// Throttling is reported as [`RemoteError::RateLimited`] and a refused file as
    /// [`RemoteError::UploadRejected`].
    fn upload_file(
        &self,
        path: &Path,
        format: &str,
    ) -> impl Future<Output = Result<UploadReceipt, RemoteError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_remote_activity_from_strava_json() {
        let json = r#"{
            "id": 11223344,
            "name": "Morning Run",
            "type": "Run",
            "sport_type": "Run",
            "start_date": "2024-05-01T06:30:00Z",
            "start_date_local": "2024-05-01T08:30:00Z",
            "distance": 5012.4,
            "elapsed_time": 1800
        }"#;

        let activity: RemoteActivity = serde_json::from_str(json).unwrap();
        assert_eq!(activity.activity_type, "Run");
        assert_eq!(
            activity.start_time,
            Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap()
        );
        assert_eq!(activity.distance_meters, 5012.4);
    }
}
