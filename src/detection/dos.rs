//! # DoS Detector
//!
//! Raw request volume per source IP over a short window. Same scan as
//! brute force, but over every request rather than failures only.
//!
//! The whole-file variant ("more than N requests in the log") is the same
//! algorithm with the window stretched to each source's observed span; set
//! `global = true` to get it.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use super::{scan_entities, window, WindowSpec};
use crate::{DosConfig, EntityType, EventKind, Incident, IncidentKind, LogEvent};

pub fn detect(events: &[LogEvent], config: &DosConfig) -> Vec<Incident> {
    let requests = events
        .iter()
        .filter(|e| e.kind == EventKind::HttpRequest && e.entity_type == EntityType::Ip)
        .map(|e| (e.entity(), e.timestamp));

    let size = if config.global {
        WindowSpec::WholeSpan
    } else {
        WindowSpec::Fixed(config.window())
    };

    scan_entities(window::index(requests), IncidentKind::Dos, size, config.threshold)
}
