//! Track loading: turn a folder of GPX files into [`Track`]s.
//!
//! Files are visited in file-name order so repeated runs over the same folder see
//! the tracks in the same order. A file that cannot be read or parsed is logged and
//! left out; only a failure to list the folder itself is fatal.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gpx::Gpx;
use log::{debug, info, warn};
use time::OffsetDateTime;

use crate::error::{SyncError, TrackError};
use crate::geo_utils::segmented_length;
use crate::{GpsPoint, Track};

/// File extension recognised as a track file (compared case-insensitively).
pub const TRACK_EXTENSION: &str = "gpx";

/// Result of scanning a folder.
#[derive(Debug, Default)]
pub struct TrackLoad {
    /// Successfully parsed tracks, in file-name order
    pub tracks: Vec<Track>,
    /// Files that were skipped
    pub failures: Vec<TrackError>,
}

/// Load every track file in `folder`.
pub fn load_tracks(folder: &Path) -> Result<TrackLoad, SyncError> {
    let entries = fs::read_dir(folder).map_err(|source| SyncError::Io {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_track_file(path))
        .collect();
    paths.sort();

    let mut load = TrackLoad::default();
    for path in paths {
        match load_track(&path) {
            Ok(track) => {
                debug!(
                    "[Loader] {} - {} points, {:.1}km, start {:?}",
                    path.display(),
                    track.point_count,
                    track.distance_meters / 1000.0,
                    track.start_time
                );
                load.tracks.push(track);
            }
            Err(e) => {
                warn!("Something is wrong with {}: {}", path.display(), e);
                load.failures.push(e);
            }
        }
    }

    info!(
        "[Loader] Loaded {} track files from {} ({} skipped)",
        load.tracks.len(),
        folder.display(),
        load.failures.len()
    );

    Ok(load)
}

/// Read and parse a single GPX file.
///
/// Invalid UTF-8 sequences are replaced rather than failing the whole file, and a
/// root `<gpx>` without a `version` attribute
/// is read as GPX 1.1.
pub fn load_track(path: &Path) -> Result<Track, TrackError> {
    let bytes = fs::read(path).map_err(|source| TrackError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let text = String::from_utf8_lossy(&bytes);
    let cleaned = with_default_version(&text);

    let gpx = gpx::read(cleaned.as_bytes()).map_err(|e| TrackError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(track_from_gpx(path, &gpx))
}

/// Build a [`Track`] from an already parsed document.
///
/// The start time is the earliest point timestamp anywhere in the document's
/// tracks. Distance is summed per segment.
pub fn track_from_gpx(path: &Path, gpx: &Gpx) -> Track {
    let mut start_time: Option<DateTime<Utc>> = None;
    let mut segments: Vec<Vec<GpsPoint>> = Vec::new();

    for track in &gpx.tracks {
        for segment in &track.segments {
            let mut points = Vec::with_capacity(segment.points.len());
            for pt in &segment.points {
                let coord = pt.point();
                let point = GpsPoint::new(coord.y(), coord.x());
                if point.is_valid() {
                    points.push(point);
                }

                if let Some(time) = pt.time.clone().and_then(to_utc) {
                    start_time = Some(match start_time {
                        Some(current) if current <= time => current,
                        _ => time,
                    });
                }
            }
            segments.push(points);
        }
    }

    let point_count = segments.iter().map(Vec::len).sum();
    let distance_meters = segmented_length(segments.iter().map(Vec::as_slice));

    Track {
        path: path.to_path_buf(),
        name: gpx.tracks.iter().find_map(|t| t.name.clone()),
        start_time,
        distance_meters,
        point_count,
    }
}

fn is_track_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(TRACK_EXTENSION))
}

/// Add `version="1.1"` to the root element when it has none.
fn with_default_version(text: &str) -> Cow<'_, str> {
    let Some(open) = root_tag_start(text) else {
        return Cow::Borrowed(text);
    };
    let Some(len) = text[open..].find('>') else {
        return Cow::Borrowed(text);
    };

    let tag = &text[open..open + len];
    let has_version = tag
        .split_whitespace()
        .skip(1)
        .any(|attr| attr.starts_with("version"));
    if has_version {
        return Cow::Borrowed(text);
    }

    let insert_at = open + "<gpx".len();
    let mut fixed = String::with_capacity(text.len() + 16);
    fixed.push_str(&text[..insert_at]);
    fixed.push_str(" version=\"1.1\"");
    fixed.push_str(&text[insert_at..]);
    Cow::Owned(fixed)
}

// Byte offset of `<gpx` followed by whitespace, `>` or `/`
fn root_tag_start(text: &str) -> Option<usize> {
    text.match_indices("<gpx").map(|(i, _)| i).find(|&i| {
        text[i + "<gpx".len()..]
            .chars()
            .next()
            .map_or(false, |c| c.is_whitespace() || c == '>' || c == '/')
    })
}

fn to_utc(time: gpx::Time) -> Option<DateTime<Utc>> {
    let time: OffsetDateTime = time.into();
    DateTime::from_timestamp(time.unix_timestamp(), time.nanosecond())
}
