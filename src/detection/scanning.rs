//! # Scanning Detector
//!
//! Measures the breadth of probing from a single source IP. Scanners walk
//! through many distinct endpoints; ordinary clients revisit a handful.
//!
//! Two signals per source:
//!
//! - **Total distinct**: how many different endpoints the source requested
//!   over the whole log. Order-independent.
//! - **Windowed distinct**: the most different endpoints requested inside
//!   any window of `window_minutes`.
//!
//! A source is a scanner if either signal reaches its threshold.
//!
//! The windowed signal has two modes. `Exact` slides a window over the
//! source's requests and keeps a reference count per endpoint, so an
//! endpoint counts once per window no matter how often it recurs.
//! `LegacyMinuteBuckets` sums per-minute distinct counts over the trailing
//! window, which counts an endpoint once per minute it appears in.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{EntityType, EventKind, Incident, IncidentKind, LogEvent, ScanningConfig, ScanningMode};

/// How many endpoints `sample_endpoints` carries.
pub const SAMPLE_SIZE: usize = 5;

/// Scanning signals for one source IP. Informational fields (`first_seen`,
/// `last_seen`, `sample_endpoints`) never affect the flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub ip: String,
    pub unique_endpoints_total: usize,

    /// Peak windowed distinct count. None when the source has no timed
    /// requests, in which case only the total signal applies.
    pub max_unique_endpoints_window: Option<usize>,
    pub window_minutes: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_scanner: bool,

    /// Most requested endpoints, ties broken by first appearance.
    pub sample_endpoints: Vec<String>,
}

/// Summaries for every source plus incidents for the flagged ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub summaries: Vec<ScanSummary>,
    pub incidents: Vec<Incident>,
}

/// The window in which the windowed signal peaked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakWindow {
    pub distinct: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

type Request<'a> = (DateTime<Utc>, &'a str);

pub fn detect(events: &[LogEvent], config: &ScanningConfig) -> ScanOutcome {
    let mut by_ip: BTreeMap<&str, Vec<Request<'_>>> = BTreeMap::new();
    for event in events {
        if event.kind != EventKind::HttpRequest || event.entity_type != EntityType::Ip {
            continue;
        }
        if let Some(endpoint) = event.endpoint.as_deref() {
            by_ip
                .entry(event.entity_key.as_str())
                .or_default()
                .push((event.timestamp, endpoint));
        }
    }

    let keyed: Vec<(&str, Vec<Request<'_>>)> = by_ip.into_iter().collect();
    let results: Vec<(ScanSummary, Option<Incident>)> = keyed
        .into_par_iter()
        .map(|(ip, mut requests)| {
            // Stable: equal timestamps keep input order for first-seen ties.
            requests.sort_by_key(|(ts, _)| *ts);
            analyze_source(ip, &requests, config)
        })
        .collect();

    let mut outcome = ScanOutcome::default();
    for (summary, incident) in results {
        outcome.summaries.push(summary);
        outcome.incidents.extend(incident);
    }

    outcome.summaries.sort_by(|a, b| {
        (Reverse(a.is_scanner), Reverse(a.unique_endpoints_total), Reverse(a.max_unique_endpoints_window))
            .cmp(&(Reverse(b.is_scanner), Reverse(b.unique_endpoints_total), Reverse(b.max_unique_endpoints_window)))
            .then_with(|| a.ip.cmp(&b.ip))
    });

    outcome
}

/// Compute both signals for one source. `requests` must be sorted by time
/// and non-empty.
fn analyze_source(ip: &str, requests: &[Request<'_>], config: &ScanningConfig) -> (ScanSummary, Option<Incident>) {
    let total = unique_endpoints(requests.iter().map(|(_, e)| *e));
    let peak = match config.mode {
        ScanningMode::Exact => max_distinct_in_window(requests, config.window()),
        ScanningMode::LegacyMinuteBuckets => legacy_minute_bucket_peak(requests, config.window_minutes),
    };
    let windowed = peak.map(|p| p.distinct);

    let first_seen = requests.first().map(|(ts, _)| *ts).unwrap_or_default();
    let last_seen = requests.last().map(|(ts, _)| *ts).unwrap_or_default();

    let window_hit = peak.filter(|p| p.distinct >= config.threshold_window);
    let total_hit = total >= config.threshold_total;

    let incident = match (window_hit, total_hit) {
        (Some(p), _) => Some(Incident {
            entity_type: EntityType::Ip,
            entity_key: ip.to_string(),
            kind: IncidentKind::Scanning,
            window_start: p.start,
            window_end: p.end,
            metric_value: p.distinct,
            threshold: config.threshold_window,
            window_secs: config.window_minutes.saturating_mul(60),
        }),
        (None, true) => Some(Incident {
            entity_type: EntityType::Ip,
            entity_key: ip.to_string(),
            kind: IncidentKind::Scanning,
            window_start: first_seen,
            window_end: last_seen,
            metric_value: total,
            threshold: config.threshold_total,
            window_secs: (last_seen - first_seen).num_seconds().max(0) as u64,
        }),
        (None, false) => None,
    };

    if incident.is_some() {
        log::debug!("Scanner {}: {} distinct total, peak window {:?}", ip, total, windowed);
    }

    let summary = ScanSummary {
        ip: ip.to_string(),
        unique_endpoints_total: total,
        max_unique_endpoints_window: windowed,
        window_minutes: config.window_minutes,
        first_seen,
        last_seen,
        is_scanner: incident.is_some(),
        sample_endpoints: sample_endpoints(requests, SAMPLE_SIZE),
    };

    (summary, incident)
}

/// Number of distinct endpoints, regardless of order.
pub fn unique_endpoints<'a>(endpoints: impl IntoIterator<Item = &'a str>) -> usize {
    endpoints.into_iter().collect::<HashSet<_>>().len()
}

/// Exact sliding-window distinct count.
///
/// Two pointers over the time-sorted requests; an endpoint's reference
/// count drops as its occurrences leave the window, and it stops counting
/// when the count reaches zero. Window ends are inclusive. Ties keep the
/// earliest peak.
pub fn max_distinct_in_window(requests: &[Request<'_>], window: Duration) -> Option<PeakWindow> {
    let window = window.max(Duration::zero());
    let mut refs: HashMap<&str, usize> = HashMap::new();
    let mut best: Option<PeakWindow> = None;
    let mut start = 0;

    for (end, (ts, endpoint)) in requests.iter().enumerate() {
        *refs.entry(*endpoint).or_insert(0) += 1;

        while *ts - requests[start].0 > window {
            let leaving = requests[start].1;
            if let Some(count) = refs.get_mut(leaving) {
                *count -= 1;
                if *count == 0 {
                    refs.remove(leaving);
                }
            }
            start += 1;
        }

        let distinct = refs.len();
        if best.map_or(true, |b| distinct > b.distinct) {
            best = Some(PeakWindow {
                distinct,
                start: requests[start].0,
                end: requests[end].0,
            });
        }
    }

    best
}

/// Legacy approximation: distinct endpoints per calendar minute, summed
/// over the trailing `window_minutes` minutes (buckets in `(t - window, t]`),
/// maximum over every bucket `t`.
pub fn legacy_minute_bucket_peak(requests: &[Request<'_>], window_minutes: u64) -> Option<PeakWindow> {
    let mut buckets: BTreeMap<i64, HashSet<&str>> = BTreeMap::new();
    for (ts, endpoint) in requests {
        buckets.entry(ts.timestamp().div_euclid(60)).or_default().insert(*endpoint);
    }
    let per_minute: Vec<(i64, usize)> = buckets.into_iter().map(|(m, set)| (m, set.len())).collect();

    let span = i64::try_from(window_minutes).unwrap_or(i64::MAX).max(1);
    let mut best: Option<PeakWindow> = None;
    let mut start = 0;
    let mut sum = 0usize;

    for (minute, distinct) in &per_minute {
        sum += distinct;
        while per_minute[start].0 <= minute.saturating_sub(span) {
            sum -= per_minute[start].1;
            start += 1;
        }
        if best.map_or(true, |b| sum > b.distinct) {
            best = Some(PeakWindow {
                distinct: sum,
                start: minute_start(per_minute[start].0),
                end: minute_start(*minute),
            });
        }
    }

    best
}

fn minute_start(minute: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(minute * 60, 0).unwrap_or_default()
}

/// Top `n` endpoints by request count; equal counts keep first-seen order.
pub fn sample_endpoints(requests: &[Request<'_>], n: usize) -> Vec<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, (_, endpoint)) in requests.iter().enumerate() {
        counts.entry(*endpoint).or_insert((0, order)).0 += 1;
    }
    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(endpoint, (count, first))| (endpoint, count, first))
        .collect();
    ranked.sort_by_key(|(_, count, first)| (Reverse(*count), *first));
    ranked.into_iter().take(n).map(|(e, _, _)| e.to_string()).collect()
}
