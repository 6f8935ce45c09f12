//! # Window Aggregator
//!
//! The shared primitive behind brute-force and DoS detection. Given the
//! sorted timestamps of one entity, find the clusters where `threshold`
//! events fall within `window` of each other.
//!
//! The scan is a two-pointer sweep:
//!
//! ```text
//! for end in 0..n:
//!     while ts[end] - ts[start] > window: start += 1
//!     if end - start + 1 >= threshold:
//!         emit [start, end]
//!         start = end + 1
//! ```
//!
//! Both window ends are inclusive, so a gap exactly equal to `window` still
//! counts. After a match the cluster is consumed and the scan re-arms from
//! the next event: a sustained burst yields one incident per `threshold`
//! hits, not one per sliding position.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// One cluster found by [`scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMatch {
    /// Index of the first event of the cluster in the scanned slice.
    pub first: usize,
    /// Index of the last event of the cluster in the scanned slice.
    pub last: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: usize,
}

/// Group `(key, timestamp)` pairs by key and sort each group ascending.
///
/// Input order is irrelevant. Keys come back in `Ord` order, which keeps
/// everything downstream deterministic.
pub fn index<K, I>(events: I) -> BTreeMap<K, Vec<DateTime<Utc>>>
where
    K: Ord,
    I: IntoIterator<Item = (K, DateTime<Utc>)>,
{
    let mut grouped: BTreeMap<K, Vec<DateTime<Utc>>> = BTreeMap::new();
    for (key, ts) in events {
        grouped.entry(key).or_default().push(ts);
    }
    for timestamps in grouped.values_mut() {
        timestamps.sort_unstable();
    }
    grouped
}

/// Find the non-overlapping clusters of `threshold` events within `window`.
///
/// `timestamps` must be sorted ascending (as produced by [`index`]).
/// A `threshold` of zero behaves like one; a negative window like zero.
pub fn scan(timestamps: &[DateTime<Utc>], window: Duration, threshold: usize) -> Vec<WindowMatch> {
    let threshold = threshold.max(1);
    let window = window.max(Duration::zero());
    let mut matches = Vec::new();
    if timestamps.len() < threshold {
        return matches;
    }

    let mut start = 0;
    for end in 0..timestamps.len() {
        while timestamps[end] - timestamps[start] > window {
            start += 1;
        }
        let count = end - start + 1;
        if count >= threshold {
            matches.push(WindowMatch {
                first: start,
                last: end,
                start: timestamps[start],
                end: timestamps[end],
                count,
            });
            start = end + 1;
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 25, 12, 0, 0).unwrap()
    }

    fn minutes(offsets: &[i64]) -> Vec<DateTime<Utc>> {
        offsets.iter().map(|m| base() + Duration::minutes(*m)).collect()
    }

    #[test]
    fn test_index_groups_and_sorts_per_key() {
        let t = minutes(&[3, 1, 2]);
        let grouped = index(vec![("b", t[0]), ("a", t[2]), ("b", t[1]), ("a", t[0])]);
        let keys: Vec<_> = grouped.keys().copied().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(grouped["a"], vec![t[2], t[0]]);
        assert_eq!(grouped["b"], vec![t[1], t[0]]);
    }

    #[test]
    fn test_fewer_than_threshold_no_match() {
        let ts = minutes(&[0, 1, 2, 3]);
        assert!(scan(&ts, Duration::minutes(5), 5).is_empty());
        assert!(scan(&[], Duration::minutes(5), 5).is_empty());
    }

    #[test]
    fn test_exact_threshold_single_match() {
        let ts = minutes(&[0, 1, 2, 3, 4]);
        let matches = scan(&ts, Duration::minutes(5), 5);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].first, 0);
        assert_eq!(matches[0].last, 4);
        assert_eq!(matches[0].count, 5);
        assert_eq!(matches[0].start, ts[0]);
        assert_eq!(matches[0].end, ts[4]);
    }

    #[test]
    fn test_gap_equal_to_window_is_inclusive() {
        let ts = minutes(&[0, 1, 2, 3, 5]);
        let matches = scan(&ts, Duration::minutes(5), 5);
        assert_eq!(matches.len(), 1);

        let ts = minutes(&[0, 1, 2, 3, 6]);
        assert!(scan(&ts, Duration::minutes(5), 5).is_empty());
    }

    #[test]
    fn test_two_clusters_two_matches() {
        let ts = minutes(&[0, 1, 2, 3, 4, 20, 21, 22, 23, 24]);
        let matches = scan(&ts, Duration::minutes(5), 5);
        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].first, matches[0].last), (0, 4));
        assert_eq!((matches[1].first, matches[1].last), (5, 9));
    }

    #[test]
    fn test_consume_and_restart_on_sustained_burst() {
        // 20 hits inside one minute: four consumed clusters, not sixteen
        // overlapping sliding positions.
        let ts: Vec<_> = (0..20).map(|s| base() + Duration::seconds(s * 3)).collect();
        let matches = scan(&ts, Duration::minutes(5), 5);
        assert_eq!(matches.len(), 4);
        for pair in matches.windows(2) {
            assert!(pair[0].last < pair[1].first);
        }
    }

    #[test]
    fn test_leftover_after_match_does_not_rematch() {
        let ts = minutes(&[0, 1, 2, 3, 4, 5, 6]);
        let matches = scan(&ts, Duration::minutes(5), 5);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_unsorted_duplicates_after_index() {
        let t = base();
        let grouped = index(vec![(1u8, t), (1, t), (1, t), (1, t), (1, t)]);
        let matches = scan(&grouped[&1u8], Duration::zero(), 5);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let ts = minutes(&[0, 1, 2, 3, 4, 9, 10, 30, 31, 32, 33, 34]);
        let first = scan(&ts, Duration::minutes(5), 5);
        let second = scan(&ts, Duration::minutes(5), 5);
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_threshold_treated_as_one() {
        let ts = minutes(&[0, 10]);
        assert_eq!(scan(&ts, Duration::minutes(1), 0).len(), 2);
    }

    #[test]
    fn test_negative_window_behaves_like_zero() {
        let ts = minutes(&[0, 0, 1, 2]);
        let matches = scan(&ts, Duration::seconds(-1), 2);
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].first, matches[0].last), (0, 1));
        assert!(scan(&ts, Duration::MIN, 3).is_empty());
    }
}
