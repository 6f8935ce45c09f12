//! # Report Generation
//!
//! Turns one analysis run into artifacts an operator can read or feed to a
//! plotting tool:
//! - `bruteforce.csv`, `scanning.csv`, `dos.csv`: one table per detector
//! - `ssh_analysis.csv`: every parsed login attempt with brute-force flags
//! - `incidents.json`: the whole [`AnalysisOutput`], pretty-printed
//! - `incident_report.txt`: one line per incident, oldest first
//! - a plain-text console summary ([`render_summary`])
//!
//! Reputation and region columns are annotations only; they are resolved
//! once when the [`AnalysisOutput`] is assembled.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

pub mod csv;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::detection::DetectionReport;
use crate::log_sources::{LoadedEvents, SourceStats};
use crate::reputation::{Blocklist, RegionTable, ReputationMatch};
use crate::{
    format_window, DetectionConfig, EntityType, EventKind, ForensicsConfig, ForensicsResult,
    IncidentKind, LogEvent, ReportConfig,
};
use self::csv::CsvTable;

pub const BRUTE_FORCE_FILE: &str = "bruteforce.csv";
pub const SCANNING_FILE: &str = "scanning.csv";
pub const DOS_FILE: &str = "dos.csv";
pub const SSH_ANALYSIS_FILE: &str = "ssh_analysis.csv";
pub const JSON_FILE: &str = "incidents.json";
pub const TEXT_REPORT_FILE: &str = "incident_report.txt";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Traffic statistics
// ---------------------------------------------------------------------------

/// Whole-input counters, independent of any detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficStats {
    pub total_requests: usize,
    /// HTTP status >= 400.
    pub errors: usize,
    /// HTTP status 300..=399.
    pub redirects: usize,
    pub auth_failures: usize,
    pub auth_successes: usize,
}

impl TrafficStats {
    /// Auth lines produce an IP-keyed and a user-keyed event; only the IP
    /// one is counted so each line counts once.
    pub fn from_events(events: &[LogEvent]) -> Self {
        let mut stats = Self::default();
        for event in events.iter().filter(|e| e.entity_type == EntityType::Ip) {
            match event.kind {
                EventKind::HttpRequest => {
                    stats.total_requests += 1;
                    match event.status {
                        Some(code) if code >= 400 => stats.errors += 1,
                        Some(300..=399) => stats.redirects += 1,
                        _ => {}
                    }
                }
                EventKind::AuthFailure => stats.auth_failures += 1,
                EventKind::AuthSuccess => stats.auth_successes += 1,
            }
        }
        stats
    }
}

// ---------------------------------------------------------------------------
// Login attempts
// ---------------------------------------------------------------------------

/// One sshd login line, reassembled from its IP-keyed and user-keyed events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthAttempt {
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub user: String,
    pub outcome: EventKind,
}

impl AuthAttempt {
    pub fn status(&self) -> &'static str {
        match self.outcome {
            EventKind::AuthSuccess => "SUCCESS",
            _ => "FAILED",
        }
    }
}

/// Pair each IP-keyed auth event with the user-keyed event the auth log
/// parser emits right after it. An IP event without its partner still
/// yields an attempt with an empty user.
pub fn auth_attempts(events: &[LogEvent]) -> Vec<AuthAttempt> {
    let is_auth = |e: &LogEvent| matches!(e.kind, EventKind::AuthFailure | EventKind::AuthSuccess);
    let mut attempts = Vec::new();
    let mut iter = events.iter().filter(|e| is_auth(*e)).peekable();

    while let Some(event) = iter.next() {
        if event.entity_type != EntityType::Ip {
            continue;
        }
        let user = match iter.peek() {
            Some(next)
                if next.entity_type == EntityType::User
                    && next.kind == event.kind
                    && next.timestamp == event.timestamp =>
            {
                let user = next.entity_key.clone();
                iter.next();
                user
            }
            _ => String::new(),
        };
        attempts.push(AuthAttempt {
            timestamp: event.timestamp,
            ip: event.entity_key.clone(),
            user,
            outcome: event.kind,
        });
    }

    attempts
}

// ---------------------------------------------------------------------------
// Analysis output
// ---------------------------------------------------------------------------

/// Everything the reporter needs from one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<SourceStats>,
    pub traffic: TrafficStats,
    /// Thresholds the run used; CSV headers and notes derive from these.
    pub detection_config: DetectionConfig,
    pub detection: DetectionReport,
    /// Flagged or summarized IPs that are on the blocklist.
    pub reputation_matches: Vec<ReputationMatch>,
    /// Region label for every IP that appears in the report.
    pub regions: BTreeMap<String, String>,
    /// Parsed login attempts, for `ssh_analysis.csv` only.
    #[serde(skip)]
    pub auth_attempts: Vec<AuthAttempt>,
}

impl AnalysisOutput {
    pub fn new(config: &ForensicsConfig, loaded: LoadedEvents, detection: DetectionReport) -> Self {
        let traffic = TrafficStats::from_events(&loaded.events);
        let auth_attempts = auth_attempts(&loaded.events);

        let ips = report_ips(&detection);
        let blocklist = Blocklist::from_config(&config.reputation);
        let reputation_matches = blocklist.check(ips.iter().map(String::as_str));
        for m in &reputation_matches {
            log::warn!("Blocklisted source in report: {} ({})", m.ip, m.reason);
        }

        let table = RegionTable::from_config(&config.reputation);
        let regions = ips
            .iter()
            .map(String::as_str)
            .chain(auth_attempts.iter().map(|a| a.ip.as_str()))
            .map(|ip| (ip.to_string(), table.region_for(ip).to_string()))
            .collect();

        Self {
            generated_at: Utc::now(),
            sources: loaded.stats,
            traffic,
            detection_config: config.detection.clone(),
            detection,
            reputation_matches,
            regions,
            auth_attempts,
        }
    }

    pub fn region(&self, ip: &str) -> &str {
        self.regions.get(ip).map(String::as_str).unwrap_or("")
    }

    pub fn reputation(&self, ip: &str) -> &str {
        self.reputation_matches
            .iter()
            .find(|m| m.ip == ip)
            .map(|m| m.reason.as_str())
            .unwrap_or("")
    }
}

/// IP keys in report order: incidents first, then scan summaries. No repeats.
fn report_ips(detection: &DetectionReport) -> Vec<String> {
    let mut ips: Vec<String> = Vec::new();
    let incident_ips = detection
        .incidents
        .iter()
        .filter(|i| i.entity_type == EntityType::Ip)
        .map(|i| i.entity_key.as_str());
    let summary_ips = detection.scan_summaries.iter().map(|s| s.ip.as_str());
    for ip in incident_ips.chain(summary_ips) {
        if !ips.iter().any(|seen| seen == ip) {
            ips.push(ip.to_string());
        }
    }
    ips
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
        }
    }

    /// Write every artifact, creating the output directory if needed.
    /// Returns the written paths in a fixed order.
    pub fn write_all(&self, output: &AnalysisOutput) -> ForensicsResult<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.output_dir)?;

        let tables = [
            (BRUTE_FORCE_FILE, brute_force_table(output)?),
            (SCANNING_FILE, scanning_table(output)?),
            (DOS_FILE, dos_table(output)?),
            (SSH_ANALYSIS_FILE, ssh_analysis_table(output)?),
        ];

        let mut written = Vec::with_capacity(tables.len() + 2);
        for (name, table) in &tables {
            let path = self.output_dir.join(name);
            table.write_to(&path)?;
            log::info!("Wrote {} rows to {}", table.len(), path.display());
            written.push(path);
        }

        let json_path = self.output_dir.join(JSON_FILE);
        std::fs::write(&json_path, serde_json::to_string_pretty(output)?)?;
        log::info!("Wrote {}", json_path.display());
        written.push(json_path);

        let text_path = self.output_dir.join(TEXT_REPORT_FILE);
        std::fs::write(&text_path, render_incident_report(output))?;
        log::info!("Wrote {}", text_path.display());
        written.push(text_path);

        Ok(written)
    }
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIME_FORMAT).to_string()
}

pub fn brute_force_table(output: &AnalysisOutput) -> ForensicsResult<CsvTable> {
    let mut table = CsvTable::new([
        "type",
        "ip",
        "user",
        "start_time",
        "end_time",
        "failed_attempts",
        "window_minutes",
        "note",
    ]);
    for incident in output.detection.incidents_of(IncidentKind::BruteForce) {
        let (ip, user) = match incident.entity_type {
            EntityType::Ip => (incident.entity_key.clone(), String::new()),
            EntityType::User => (String::new(), incident.entity_key.clone()),
        };
        table.push_row(vec![
            incident.entity_type.to_string().to_uppercase(),
            ip,
            user,
            timestamp(&incident.window_start),
            timestamp(&incident.window_end),
            incident.metric_value.to_string(),
            (incident.window_secs / 60).to_string(),
            incident.note(),
        ])?;
    }
    Ok(table)
}

pub fn scanning_table(output: &AnalysisOutput) -> ForensicsResult<CsvTable> {
    let window_column = format!(
        "max_unique_endpoints_{}min",
        output.detection_config.scanning.window_minutes
    );
    let mut table = CsvTable::new([
        "ip",
        "unique_endpoints_total",
        window_column.as_str(),
        "first_seen",
        "last_seen",
        "is_scanner",
        "sample_endpoints",
        "region",
        "reputation",
    ]);
    for summary in &output.detection.scan_summaries {
        table.push_row(vec![
            summary.ip.clone(),
            summary.unique_endpoints_total.to_string(),
            summary
                .max_unique_endpoints_window
                .map(|n| n.to_string())
                .unwrap_or_default(),
            timestamp(&summary.first_seen),
            timestamp(&summary.last_seen),
            summary.is_scanner.to_string(),
            summary.sample_endpoints.join(";"),
            output.region(&summary.ip).to_string(),
            output.reputation(&summary.ip).to_string(),
        ])?;
    }
    Ok(table)
}

pub fn dos_table(output: &AnalysisOutput) -> ForensicsResult<CsvTable> {
    let mut table = CsvTable::new([
        "ip",
        "start_time",
        "end_time",
        "requests",
        "window_seconds",
        "note",
        "region",
        "reputation",
    ]);
    for incident in output.detection.incidents_of(IncidentKind::Dos) {
        table.push_row(vec![
            incident.entity_key.clone(),
            timestamp(&incident.window_start),
            timestamp(&incident.window_end),
            incident.metric_value.to_string(),
            incident.window_secs.to_string(),
            incident.note(),
            output.region(&incident.entity_key).to_string(),
            output.reputation(&incident.entity_key).to_string(),
        ])?;
    }
    Ok(table)
}

/// Every login attempt, flagged when its IP or its user raised a
/// brute-force incident anywhere in the run.
pub fn ssh_analysis_table(output: &AnalysisOutput) -> ForensicsResult<CsvTable> {
    let detection = &output.detection;
    let flagged_ips = detection.flagged_keys(IncidentKind::BruteForce, EntityType::Ip);
    let flagged_users = detection.flagged_keys(IncidentKind::BruteForce, EntityType::User);

    let mut table = CsvTable::new([
        "timestamp",
        "ip",
        "user",
        "status",
        "bruteforce_ip",
        "bruteforce_user",
        "region",
    ]);
    for attempt in &output.auth_attempts {
        table.push_row(vec![
            timestamp(&attempt.timestamp),
            attempt.ip.clone(),
            attempt.user.clone(),
            attempt.status().to_string(),
            flagged_ips.contains(attempt.ip.as_str()).to_string(),
            flagged_users.contains(attempt.user.as_str()).to_string(),
            output.region(&attempt.ip).to_string(),
        ])?;
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Text reports
// ---------------------------------------------------------------------------

/// `incident_report.txt`: `<start> - <KIND> from <type> <key>: <note>`,
/// ordered by window start.
pub fn render_incident_report(output: &AnalysisOutput) -> String {
    let mut incidents: Vec<_> = output.detection.incidents.iter().collect();
    incidents.sort_by_key(|i| i.window_start);

    let mut out = String::new();
    if incidents.is_empty() {
        out.push_str("No incidents detected.\n");
    }
    for incident in incidents {
        let _ = writeln!(
            out,
            "{} - {} from {} {}: {}",
            timestamp(&incident.window_start),
            incident.kind,
            incident.entity_type,
            incident.entity_key,
            incident.note(),
        );
    }
    out
}

// ---------------------------------------------------------------------------
// Console summary
// ---------------------------------------------------------------------------

/// Plain-text overview of one run.
pub fn render_summary(output: &AnalysisOutput) -> String {
    let mut out = String::new();
    let detection = &output.detection;

    let _ = writeln!(out, "=== SENTINEL Forensics Report ===");
    let _ = writeln!(out, "Generated: {}", timestamp(&output.generated_at));
    let _ = writeln!(out);

    let _ = writeln!(out, "Sources:");
    if output.sources.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for source in &output.sources {
        let _ = writeln!(
            out,
            "  {} ({}): {} lines, {} parsed, {} events",
            source.name,
            source.path.display(),
            source.lines,
            source.parsed_lines,
            source.events,
        );
    }
    let _ = writeln!(out);

    let traffic = &output.traffic;
    let _ = writeln!(out, "Traffic:");
    let _ = writeln!(out, "  HTTP requests:  {}", traffic.total_requests);
    let _ = writeln!(out, "  HTTP errors:    {}", traffic.errors);
    let _ = writeln!(out, "  HTTP redirects: {}", traffic.redirects);
    let _ = writeln!(out, "  Auth failures:  {}", traffic.auth_failures);
    let _ = writeln!(out, "  Auth successes: {}", traffic.auth_successes);
    let _ = writeln!(out);

    let bf = &output.detection_config.brute_force;
    let _ = writeln!(
        out,
        "Brute force: {} incident(s) [ip: {} in {}, user: {} in {}]",
        detection.incidents_of(IncidentKind::BruteForce).count(),
        bf.ip.threshold,
        format_window(bf.ip.window_minutes.saturating_mul(60)),
        bf.user.threshold,
        format_window(bf.user.window_minutes.saturating_mul(60)),
    );
    for incident in detection.incidents_of(IncidentKind::BruteForce) {
        let _ = writeln!(
            out,
            "  {} {}: {} .. {} ({})",
            incident.entity_type,
            incident.entity_key,
            timestamp(&incident.window_start),
            timestamp(&incident.window_end),
            incident.note(),
        );
    }

    let scanners: Vec<_> = detection.scan_summaries.iter().filter(|s| s.is_scanner).collect();
    let _ = writeln!(
        out,
        "Scanning: {} scanner(s) among {} source(s)",
        scanners.len(),
        detection.scan_summaries.len(),
    );
    for summary in scanners {
        let _ = writeln!(
            out,
            "  {}: {} distinct endpoints, peak {} in {} min [{}]",
            summary.ip,
            summary.unique_endpoints_total,
            summary
                .max_unique_endpoints_window
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            summary.window_minutes,
            output.region(&summary.ip),
        );
    }

    let _ = writeln!(
        out,
        "DoS: {} incident(s)",
        detection.incidents_of(IncidentKind::Dos).count(),
    );
    for incident in detection.incidents_of(IncidentKind::Dos) {
        let _ = writeln!(
            out,
            "  {}: {} .. {} ({})",
            incident.entity_key,
            timestamp(&incident.window_start),
            timestamp(&incident.window_end),
            incident.note(),
        );
    }
    let _ = writeln!(out);

    if output.reputation_matches.is_empty() {
        let _ = writeln!(out, "Blocklist: no matches");
    } else {
        let _ = writeln!(out, "Blocklist matches:");
        for m in &output.reputation_matches {
            let _ = writeln!(out, "  {} - {}", m.ip, m.reason);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionEngine;
    use crate::Entity;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 25, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn sample_events() -> Vec<LogEvent> {
        let mut events = Vec::new();
        for i in 0..5 {
            events.push(LogEvent::auth_failure(at(i * 60), Entity::ip("192.168.1.100")));
            events.push(LogEvent::auth_failure(at(i * 60), Entity::user("admin")));
        }
        events.push(LogEvent::auth_success(at(600), Entity::ip("10.0.0.9")));
        events.push(LogEvent::auth_success(at(600), Entity::user("deploy")));
        for i in 0..5 {
            events.push(LogEvent::http_request(at(i), "203.0.113.45", "/", Some(200)));
        }
        events.push(LogEvent::http_request(at(100), "8.8.8.8", "/old", Some(301)));
        events.push(LogEvent::http_request(at(101), "8.8.8.8", "/missing,x", Some(404)));
        events
    }

    fn sample_output() -> AnalysisOutput {
        let config = ForensicsConfig::default();
        let events = sample_events();
        let detection = DetectionEngine::new(&config.detection).run(&events);
        let loaded = LoadedEvents {
            events,
            stats: Vec::new(),
        };
        AnalysisOutput::new(&config, loaded, detection)
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sentinel_forensics_report_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_traffic_stats_count_each_auth_line_once() {
        let stats = TrafficStats::from_events(&sample_events());
        assert_eq!(stats.total_requests, 7);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.redirects, 1);
        assert_eq!(stats.auth_failures, 5);
        assert_eq!(stats.auth_successes, 1);
    }

    #[test]
    fn test_output_annotates_regions_and_reputation() {
        let output = sample_output();
        assert_eq!(output.region("203.0.113.45"), "India");
        assert_eq!(output.region("192.168.1.100"), "Private Network");
        assert_eq!(output.region("8.8.8.8"), "Unknown");
        assert_eq!(output.reputation("192.168.1.100"), "Brute-force attacker");
        assert_eq!(output.reputation("203.0.113.45"), "Known malicious bot");
        assert_eq!(output.reputation("8.8.8.8"), "");
        assert_eq!(output.reputation_matches[0].ip, "192.168.1.100");
    }

    #[test]
    fn test_brute_force_table_rows() {
        let output = sample_output();
        let csv = brute_force_table(&output).unwrap().render();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "type,ip,user,start_time,end_time,failed_attempts,window_minutes,note"
        );
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "IP,192.168.1.100,,2025-08-25 10:00:00,2025-08-25 10:04:00,5,5,5 failed logins in 5 min"
        );
    }

    #[test]
    fn test_scanning_table_header_uses_window() {
        let output = sample_output();
        let csv = scanning_table(&output).unwrap().render();
        let header = csv.lines().next().unwrap();
        assert!(header.contains("max_unique_endpoints_5min"));
        // both web sources are summarized, neither is a scanner
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("\"/missing,x;/old\"") || csv.contains("\"/old;/missing,x\""));
    }

    #[test]
    fn test_dos_table_rows() {
        let output = sample_output();
        let csv = dos_table(&output).unwrap().render();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "203.0.113.45,2025-08-25 10:00:00,2025-08-25 10:00:04,5,5,5 requests in 5 s,India,Known malicious bot"
        );
    }

    #[test]
    fn test_write_all_creates_every_artifact() {
        let dir = temp_dir("write_all");
        let writer = ReportWriter::new(&ReportConfig {
            output_dir: dir.clone(),
        });
        let output = sample_output();
        let written = writer.write_all(&output).unwrap();

        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                BRUTE_FORCE_FILE,
                SCANNING_FILE,
                DOS_FILE,
                SSH_ANALYSIS_FILE,
                JSON_FILE,
                TEXT_REPORT_FILE,
            ]
        );
        assert!(written.iter().all(|p| p.exists()));

        let json = std::fs::read_to_string(dir.join(JSON_FILE)).unwrap();
        let parsed: AnalysisOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.detection.incidents.len(), output.detection.incidents.len());
        assert_eq!(parsed.traffic, output.traffic);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_auth_attempts_pair_ip_and_user_events() {
        let attempts = auth_attempts(&sample_events());
        assert_eq!(attempts.len(), 6);
        assert_eq!(attempts[0].ip, "192.168.1.100");
        assert_eq!(attempts[0].user, "admin");
        assert_eq!(attempts[0].status(), "FAILED");
        assert_eq!(attempts[5].user, "deploy");
        assert_eq!(attempts[5].status(), "SUCCESS");

        let lone = vec![LogEvent::auth_failure(at(0), Entity::ip("1.1.1.1"))];
        assert_eq!(auth_attempts(&lone)[0].user, "");
    }

    #[test]
    fn test_ssh_analysis_table_flags() {
        let output = sample_output();
        let csv = ssh_analysis_table(&output).unwrap().render();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "timestamp,ip,user,status,bruteforce_ip,bruteforce_user,region"
        );
        assert_eq!(lines.len(), 7);
        assert_eq!(
            lines[1],
            "2025-08-25 10:00:00,192.168.1.100,admin,FAILED,true,false,Private Network"
        );
        assert_eq!(
            lines[6],
            "2025-08-25 10:10:00,10.0.0.9,deploy,SUCCESS,false,false,Private Network"
        );
    }

    #[test]
    fn test_incident_report_text() {
        let text = render_incident_report(&sample_output());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "2025-08-25 10:00:00 - BRUTE_FORCE from ip 192.168.1.100: 5 failed logins in 5 min"
        );
        assert!(lines[1].contains("DOS from ip 203.0.113.45"));

        let config = ForensicsConfig::default();
        let empty = AnalysisOutput::new(&config, LoadedEvents::default(), DetectionReport::default());
        assert_eq!(render_incident_report(&empty), "No incidents detected.\n");
    }

    #[test]
    fn test_render_summary_mentions_findings() {
        let summary = render_summary(&sample_output());
        assert!(summary.contains("Brute force: 1 incident(s)"));
        assert!(summary.contains("DoS: 1 incident(s)"));
        assert!(summary.contains("192.168.1.100 - Brute-force attacker"));
        assert!(summary.contains("HTTP errors:    1"));
    }
}
