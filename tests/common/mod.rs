//! Shared helpers for driver tests: GPX fixtures and an in-memory service.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use gpx_sync::{ActivityService, RemoteActivity, RemoteError, UploadReceipt};
use tokio::time::Instant;

/// 2024-05-01 06:30:00 UTC
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).unwrap()
}

/// Write a single-segment GPX file heading north from London, one point every
/// 10 seconds and 0.001 degrees (~111m) apart.
pub fn write_track(dir: &Path, name: &str, start: DateTime<Utc>, points: usize) -> PathBuf {
    let mut trkpts = String::new();
    for i in 0..points {
        let time = start + Duration::seconds(10 * i as i64);
        trkpts.push_str(&format!(
            "      <trkpt lat=\"{:.4}\" lon=\"-0.1278\"><time>{}</time></trkpt>\n",
            51.5074 + i as f64 * 0.001,
            time.format("%Y-%m-%dT%H:%M:%SZ")
        ));
    }

    let contents = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="fixture" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>{}</name>
    <trkseg>
{}    </trkseg>
  </trk>
</gpx>
"#,
        name, trkpts
    );

    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// In-memory [`ActivityService`] that records every call.
#[derive(Default)]
pub struct MockService {
    latest: Option<DateTime<Utc>>,
    fail_latest: bool,
    activities: Vec<RemoteActivity>,
    upload_script: Mutex<VecDeque<Result<UploadReceipt, RemoteError>>>,
    uploads: Mutex<Vec<(PathBuf, Instant)>>,
    activity_queries: AtomicUsize,
    latest_queries: AtomicUsize,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latest(mut self, latest: DateTime<Utc>) -> Self {
        self.latest = Some(latest);
        self
    }

    pub fn failing_latest(mut self) -> Self {
        self.fail_latest = true;
        self
    }

    pub fn with_activities(mut self, activities: Vec<RemoteActivity>) -> Self {
        self.activities = activities;
        self
    }

    /// Results handed out by successive uploads; once exhausted, uploads succeed.
    pub fn with_upload_results(self, results: Vec<Result<UploadReceipt, RemoteError>>) -> Self {
        *self.upload_script.lock().unwrap() = results.into();
        self
    }

    /// Every upload attempt, in order, with the (paused) clock time it happened.
    pub fn uploads(&self) -> Vec<(PathBuf, Instant)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads()
            .iter()
            .map(|(p, _)| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    pub fn activity_queries(&self) -> usize {
        self.activity_queries.load(Ordering::SeqCst)
    }

    pub fn latest_queries(&self) -> usize {
        self.latest_queries.load(Ordering::SeqCst)
    }
}

impl ActivityService for MockService {
    async fn latest_activity_start(&self) -> Result<Option<DateTime<Utc>>, RemoteError> {
        self.latest_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_latest {
            return Err(RemoteError::Auth("invalid refresh token".to_string()));
        }
        Ok(self.latest)
    }

    async fn recent_activities(&self, limit: usize) -> Result<Vec<RemoteActivity>, RemoteError> {
        self.activity_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.activities.iter().take(limit).cloned().collect())
    }

    async fn upload_file(&self, path: &Path, format: &str) -> Result<UploadReceipt, RemoteError> {
        assert_eq!(format, "gpx");
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((path.to_path_buf(), Instant::now()));
        let upload_id = uploads.len() as u64;
        drop(uploads);

        match self.upload_script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(UploadReceipt {
                upload_id,
                status: Some("Your activity is still being processed.".to_string()),
            }),
        }
    }
}

pub fn accepted(upload_id: u64) -> Result<UploadReceipt, RemoteError> {
    Ok(UploadReceipt {
        upload_id,
        status: None,
    })
}

pub fn rate_limited(secs: u64) -> Result<UploadReceipt, RemoteError> {
    Err(RemoteError::RateLimited {
        retry_after: std::time::Duration::from_secs(secs),
    })
}
