//! # Brute-force Detector
//!
//! Clustered authentication failures. Two passes run over the same failure
//! stream, partitioned by entity type:
//!
//! - **IP pass**: one source hammering logins (default 5 failures / 5 min).
//! - **User pass**: one account under attack, possibly from rotating
//!   sources (default 8 failures / 10 min).
//!
//! No cross-key correlation is done. A spray across many IPs against one
//! account only shows up in the user pass, and vice versa. Keys with no
//! failures produce nothing.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use super::{scan_entities, window, WindowSpec};
use crate::{BruteForceConfig, EntityType, EventKind, Incident, IncidentKind, LogEvent, WindowRule};

/// Run both brute-force passes. IP incidents come first, then user incidents.
pub fn detect(events: &[LogEvent], config: &BruteForceConfig) -> Vec<Incident> {
    let mut incidents = detect_pass(events, EntityType::Ip, &config.ip);
    incidents.extend(detect_pass(events, EntityType::User, &config.user));
    incidents
}

/// One pass over the failures keyed by `entity_type`.
pub fn detect_pass(events: &[LogEvent], entity_type: EntityType, rule: &WindowRule) -> Vec<Incident> {
    let failures = events
        .iter()
        .filter(|e| e.kind == EventKind::AuthFailure && e.entity_type == entity_type)
        .map(|e| (e.entity(), e.timestamp));

    scan_entities(
        window::index(failures),
        IncidentKind::BruteForce,
        WindowSpec::Fixed(rule.window()),
        rule.threshold,
    )
}
