//! Candidate selection: which loaded tracks are newer than the watermark, and in
//! what order they are processed.

use std::fmt;

use chrono::{DateTime, Utc};
use log::debug;

use crate::Track;

/// Start second of the most recent activity known to be synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Watermark(pub i64);

impl Watermark {
    /// Consider every track with a start time.
    pub const ALL: Watermark = Watermark(0);
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A track eligible for upload this run.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Start time truncated to whole seconds since epoch
    pub key: i64,
    /// Exact start time of the track
    pub start_time: DateTime<Utc>,
    pub track: Track,
}

/// Candidates in processing order: ascending start time, ties in load order.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Truncated start seconds in processing order.
    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.candidates.iter().map(|c| c.key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }
}

impl IntoIterator for CandidateSet {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Keep tracks whose truncated start second is strictly after `watermark`.
///
/// Tracks without a start time are dropped. Two tracks starting in the same second
/// are both kept; the sort is stable, so input order decides between exact ties.
pub fn select_candidates(tracks: Vec<Track>, watermark: Watermark) -> CandidateSet {
    let mut candidates: Vec<Candidate> = tracks
        .into_iter()
        .filter_map(|track| {
            let start_time = track.start_time?;
            let key = start_time.timestamp();
            if key > watermark.0 {
                Some(Candidate {
                    key,
                    start_time,
                    track,
                })
            } else {
                debug!(
                    "[Selector] {} starts at {} <= watermark {}, skipping",
                    track.path.display(),
                    key,
                    watermark
                );
                None
            }
        })
        .collect();

    candidates.sort_by_key(|c| c.start_time);

    CandidateSet { candidates }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::path::PathBuf;

    fn track(name: &str, start: Option<DateTime<Utc>>) -> Track {
        Track {
            path: PathBuf::from(name),
            name: None,
            start_time: start,
            distance_meters: 5000.0,
            point_count: 2,
        }
    }

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn names(set: &CandidateSet) -> Vec<String> {
        set.iter()
            .map(|c| c.track.path.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_untimed_tracks_never_selected() {
        let tracks = vec![track("untimed.gpx", None), track("timed.gpx", at(1_000))];

        for watermark in [Watermark::ALL, Watermark(-1), Watermark(999)] {
            let set = select_candidates(tracks.clone(), watermark);
            assert_eq!(names(&set), vec!["timed.gpx"]);
        }
    }

    #[test]
    fn test_watermark_boundary_is_exclusive() {
        let tracks = vec![
            track("before.gpx", at(999)),
            track("equal.gpx", at(1_000)),
            track("after.gpx", at(1_001)),
        ];

        let set = select_candidates(tracks, Watermark(1_000));
        assert_eq!(names(&set), vec!["after.gpx"]);
        assert!(set.keys().all(|k| k > 1_000));
    }

    #[test]
    fn test_sub_second_start_truncates_to_watermark() {
        // 1000.5s truncates to 1000, which is not after a watermark of 1000
        let start = Utc.timestamp_opt(1_000, 500_000_000).single();
        let set = select_candidates(vec![track("half.gpx", start)], Watermark(1_000));
        assert!(set.is_empty());
    }

    #[test]
    fn test_ascending_order() {
        let tracks = vec![
            track("c.gpx", at(3_000)),
            track("a.gpx", at(1_000)),
            track("b.gpx", at(2_000)),
        ];

        let set = select_candidates(tracks, Watermark::ALL);
        assert_eq!(set.keys().collect::<Vec<_>>(), vec![1_000, 2_000, 3_000]);

        let starts: Vec<_> = set.iter().map(|c| c.start_time).collect();
        assert!(starts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_same_second_keeps_both_ordered_by_exact_time() {
        let base = Utc.timestamp_opt(5_000, 0).unwrap();
        let tracks = vec![
            track("late.gpx", Some(base + Duration::milliseconds(700))),
            track("early.gpx", Some(base + Duration::milliseconds(200))),
            track("tie.gpx", Some(base + Duration::milliseconds(700))),
        ];

        let set = select_candidates(tracks, Watermark::ALL);
        assert_eq!(set.len(), 3);
        assert_eq!(names(&set), vec!["early.gpx", "late.gpx", "tie.gpx"]);
        assert!(set.keys().all(|k| k == 5_000));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let tracks = vec![
            track("x.gpx", at(2_000)),
            track("y.gpx", at(2_000)),
            track("z.gpx", at(1_500)),
        ];

        let first = names(&select_candidates(tracks.clone(), Watermark::ALL));
        let second = names(&select_candidates(tracks, Watermark::ALL));
        assert_eq!(first, second);
    }
}
