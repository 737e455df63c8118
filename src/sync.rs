//! Sync driver: one sequential pass from local folder to remote service.
//!
//! ```text
//! Init ──> WatermarkResolved ──> Iterating ──> Done
//! ```
//!
//! Candidates are handled strictly one after another in ascending start time, so an
//! interrupted run resumed with a fresh watermark never skips an older track.
//! After every candidate the driver sleeps for the configured pacing interval.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::SyncConfig;
use crate::dedup::{DuplicateDetector, DuplicateMatch};
use crate::error::{RemoteError, SyncError, TrackError};
use crate::loader::load_tracks;
use crate::remote::{ActivityService, UploadReceipt};
use crate::selector::{select_candidates, Candidate, Watermark};

/// Phase of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Init,
    WatermarkResolved,
    Iterating,
    Done,
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Uploaded {
        receipt: UploadReceipt,
        /// Attempts used, first try included
        attempts: u32,
    },
    Duplicate(DuplicateMatch),
    Rejected(String),
}

/// Summary of a completed run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub watermark: Watermark,
    /// Number of candidates after watermark filtering
    pub candidates: usize,
    /// Uploaded files, in upload order
    pub uploaded: Vec<PathBuf>,
    pub duplicates: Vec<(PathBuf, DuplicateMatch)>,
    pub rejected: Vec<(PathBuf, String)>,
    /// Every rate-limit backoff slept, in order
    pub backoffs: Vec<Duration>,
    /// Track files that could not be parsed
    pub load_failures: Vec<TrackError>,
}

pub struct SyncDriver<S> {
    service: S,
    config: SyncConfig,
    detector: DuplicateDetector,
    state: SyncState,
}

impl<S: ActivityService> SyncDriver<S> {
    pub fn new(service: S, config: SyncConfig) -> Self {
        let detector = DuplicateDetector::new(config.duplicate.clone());
        Self {
            service,
            config,
            detector,
            state: SyncState::Init,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    fn transition(&mut self, next: SyncState) {
        debug!("[SyncDriver] {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run a full sync. Returns on completion or on the first fatal error.
    pub async fn run(&mut self) -> Result<SyncReport, SyncError> {
        self.state = SyncState::Init;
        ensure_folder(&self.config.folder)?;

        let watermark = self.resolve_watermark().await?;
        self.transition(SyncState::WatermarkResolved);

        info!("Need to load all gpx files maybe take some time");
        let load = load_tracks(&self.config.folder)?;
        let candidates = select_candidates(load.tracks, watermark);

        let mut report = SyncReport {
            watermark,
            candidates: candidates.len(),
            load_failures: load.failures,
            ..SyncReport::default()
        };

        info!("{} gpx files is going to upload", candidates.len());
        self.transition(SyncState::Iterating);

        for (index, candidate) in candidates.iter().enumerate() {
            debug!(
                "[SyncDriver] Candidate {}/{}: {} (start {})",
                index + 1,
                report.candidates,
                candidate.track.path.display(),
                candidate.start_time
            );

            match self.process(candidate, &mut report.backoffs).await? {
                ItemOutcome::Uploaded { .. } => {
                    report.uploaded.push(candidate.track.path.clone());
                }
                ItemOutcome::Duplicate(found) => {
                    report.duplicates.push((candidate.track.path.clone(), found));
                }
                ItemOutcome::Rejected(message) => {
                    report.rejected.push((candidate.track.path.clone(), message));
                }
            }

            tokio::time::sleep(self.config.pacing).await;
        }

        self.transition(SyncState::Done);
        info!(
            "Sync done: {} uploaded, {} duplicates skipped, {} rejected",
            report.uploaded.len(),
            report.duplicates.len(),
            report.rejected.len()
        );

        Ok(report)
    }

    /// Watermark for this run: zero when forced, otherwise the remote's latest start.
    pub async fn resolve_watermark(&self) -> Result<Watermark, RemoteError> {
        if self.config.force_all {
            info!("Uploading all tracks, ignoring last synced time");
            return Ok(Watermark::ALL);
        }

        let watermark = match self.service.latest_activity_start().await? {
            Some(start) => Watermark(start.timestamp()),
            None => Watermark::ALL,
        };
        info!("Last synced activity started at {}", watermark);
        Ok(watermark)
    }

    /// Duplicate check followed by an upload if needed.
    async fn process(
        &self,
        candidate: &Candidate,
        backoffs: &mut Vec<Duration>,
    ) -> Result<ItemOutcome, SyncError> {
        let found = self
            .detector
            .check(
                &self.service,
                &candidate.start_time,
                candidate.track.distance_meters,
            )
            .await?;

        if let Some(found) = found {
            return Ok(ItemOutcome::Duplicate(found));
        }

        self.upload_with_retry(&candidate.track.path, backoffs).await
    }

    /// Upload one file under the configured [`RetryPolicy`](crate::RetryPolicy).
    ///
    /// A rejection on the first attempt is reported as [`ItemOutcome::Rejected`].
    /// Running out of attempts, or any failure on a retry, is fatal.
    pub async fn upload_with_retry(
        &self,
        path: &Path,
        backoffs: &mut Vec<Duration>,
    ) -> Result<ItemOutcome, SyncError> {
        let max_attempts = self.config.retry.max_attempts();
        let mut attempt = 1;

        loop {
            match self
                .service
                .upload_file(path, &self.config.upload_format)
                .await
            {
                Ok(receipt) => {
                    info!(
                        "Uploaded {} (upload id {}, attempt {})",
                        path.display(),
                        receipt.upload_id,
                        attempt
                    );
                    return Ok(ItemOutcome::Uploaded {
                        receipt,
                        attempts: attempt,
                    });
                }
                Err(RemoteError::RateLimited { retry_after }) if attempt < max_attempts => {
                    warn!(
                        "Strava API rate limit hit. Retry in {} seconds",
                        retry_after.as_secs()
                    );
                    backoffs.push(retry_after);
                    tokio::time::sleep(retry_after).await;
                    attempt += 1;
                }
                Err(e @ RemoteError::RateLimited { .. }) => {
                    return Err(SyncError::RetriesExhausted {
                        path: path.to_path_buf(),
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) if attempt > 1 => {
                    return Err(SyncError::RetryFailed {
                        path: path.to_path_buf(),
                        attempt,
                        source: e,
                    });
                }
                Err(RemoteError::UploadRejected(message)) => {
                    warn!("Upload failed for {}: {}", path.display(), message);
                    return Ok(ItemOutcome::Rejected(message));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Create the track folder (and its parents) if it does not exist yet.
pub fn ensure_folder(folder: &Path) -> Result<(), SyncError> {
    if folder.exists() {
        return Ok(());
    }
    info!("Creating track folder {}", folder.display());
    fs::create_dir_all(folder).map_err(|source| SyncError::Io {
        path: folder.to_path_buf(),
        source,
    })
}
