//! # Detection Engine Orchestrator
//!
//! Runs the three detectors over one batch of normalized events and merges
//! their incidents. The detectors are independent of each other and, within
//! each detector, every entity key is independent too: per-key scans are
//! spread over the rayon pool and concatenated back in key order, so the
//! output does not depend on scheduling.
//!
//! Within one key the scan is a monotonic sweep and stays sequential.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

pub mod brute_force;
pub mod dos;
pub mod scanning;
pub mod window;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{DetectionConfig, Entity, EntityType, Incident, IncidentKind, LogEvent};
use scanning::ScanSummary;
use window::WindowMatch;

/// Everything one detection run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Brute-force, then scanning, then DoS incidents.
    pub incidents: Vec<Incident>,

    /// Per-IP scanning signals, flagged or not, strongest first.
    pub scan_summaries: Vec<ScanSummary>,
}

impl DetectionReport {
    pub fn incidents_of(&self, kind: IncidentKind) -> impl Iterator<Item = &Incident> {
        self.incidents.iter().filter(move |i| i.kind == kind)
    }

    /// Distinct keys of one entity type that raised at least one incident of `kind`.
    pub fn flagged_keys(&self, kind: IncidentKind, entity_type: EntityType) -> BTreeSet<&str> {
        self.incidents_of(kind)
            .filter(|i| i.entity_type == entity_type)
            .map(|i| i.entity_key.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}

/// The detection engine. Holds the thresholds for one run; owns no event state.
pub struct DetectionEngine {
    config: DetectionConfig,
}

impl DetectionEngine {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Run every detector over `events`. Input order is irrelevant.
    pub fn run(&self, events: &[LogEvent]) -> DetectionReport {
        log::info!("Running detection over {} events", events.len());

        let brute_force = brute_force::detect(events, &self.config.brute_force);
        log::info!("Brute force: {} incidents", brute_force.len());

        let scanning = scanning::detect(events, &self.config.scanning);
        log::info!(
            "Scanning: {} incidents across {} sources",
            scanning.incidents.len(),
            scanning.summaries.len(),
        );

        let dos = dos::detect(events, &self.config.dos);
        log::info!("DoS: {} incidents", dos.len());

        let mut incidents = brute_force;
        incidents.extend(scanning.incidents);
        incidents.extend(dos);

        DetectionReport {
            incidents,
            scan_summaries: scanning.summaries,
        }
    }
}

/// How a detector sizes the window for one key.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WindowSpec {
    Fixed(Duration),
    /// The key's own first-to-last span.
    WholeSpan,
}

/// Scan every key of an index in parallel and turn matches into incidents.
pub(crate) fn scan_entities(
    index: BTreeMap<Entity, Vec<DateTime<Utc>>>,
    kind: IncidentKind,
    window: WindowSpec,
    threshold: usize,
) -> Vec<Incident> {
    let keyed: Vec<(Entity, Vec<DateTime<Utc>>)> = index.into_iter().collect();

    let per_key: Vec<Vec<Incident>> = keyed
        .par_iter()
        .map(|(entity, timestamps)| {
            let size = match window {
                WindowSpec::Fixed(size) => size,
                WindowSpec::WholeSpan => span(timestamps),
            };
            let matches = window::scan(timestamps, size, threshold);
            if !matches.is_empty() {
                log::debug!("{} {}: {} window(s) over threshold", kind, entity, matches.len());
            }
            matches
                .iter()
                .map(|m| incident_from_match(entity, kind, m, threshold, size))
                .collect()
        })
        .collect();

    per_key.into_iter().flatten().collect()
}

pub(crate) fn incident_from_match(
    entity: &Entity,
    kind: IncidentKind,
    m: &WindowMatch,
    threshold: usize,
    window: Duration,
) -> Incident {
    Incident {
        entity_type: entity.entity_type,
        entity_key: entity.key.clone(),
        kind,
        window_start: m.start,
        window_end: m.end,
        metric_value: m.count,
        threshold,
        window_secs: window.num_seconds().max(0) as u64,
    }
}

fn span(sorted: &[DateTime<Utc>]) -> Duration {
    match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) => *last - *first,
        _ => Duration::zero(),
    }
}
