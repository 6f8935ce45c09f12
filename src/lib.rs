//! # SENTINEL Forensics - Core Library
//!
//! After-the-fact attack detection over authentication and web server logs.
//!
//! SENTINEL Forensics reads finite log files, normalizes them into
//! timestamped per-entity events, and runs three independent sliding-window
//! detectors over them:
//!
//! - **Brute force**: clustered authentication failures, keyed by source IP
//!   and, in a separate pass, by target username.
//! - **Scanning**: one source touching an unusually large number of distinct
//!   endpoints, overall or within a short window.
//! - **DoS**: abnormally high request volume from one source within seconds.
//!
//! ## Design Philosophy
//! - **Review, don't react.** No blocking, no daemon, no live tailing.
//! - Detectors are total functions: bad input means less data, never an error.
//! - Every incident is a bounded window that crossed a threshold. Overlapping
//!   windows are deduplicated during the scan, never merged afterwards.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

pub mod detection;
pub mod log_sources;
pub mod report;
pub mod reputation;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for SENTINEL Forensics.
///
/// Only the boundary (config loading, log reading, report writing) can fail.
/// The detection core never returns an error.
#[derive(Error, Debug)]
pub enum ForensicsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read log source {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type ForensicsResult<T> = Result<T, ForensicsError>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Top-level configuration for SENTINEL Forensics.
///
/// Loaded from `sentinel-forensics.toml` in the working directory or a path
/// supplied via CLI flag. Every section is optional in the file; missing
/// sections fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForensicsConfig {
    /// Detector thresholds and windows.
    pub detection: DetectionConfig,

    /// Log files to analyze.
    pub sources: SourcesConfig,

    /// Where report artifacts are written.
    pub report: ReportConfig,

    /// Static IP reputation data.
    pub reputation: ReputationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub brute_force: BruteForceConfig,
    pub scanning: ScanningConfig,
    pub dos: DosConfig,
}

/// A window size paired with the hit count that flags it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRule {
    /// Window size in minutes. Both window ends are inclusive.
    pub window_minutes: u64,

    /// Number of events inside one window that raises an incident.
    pub threshold: usize,
}

impl WindowRule {
    pub fn new(window_minutes: u64, threshold: usize) -> Self {
        Self { window_minutes, threshold }
    }

    pub fn window(&self) -> Duration {
        minutes(self.window_minutes)
    }
}

/// Brute-force detection runs two independent passes over the same
/// failure stream: one keyed by source IP, one keyed by target username.
///
/// Each rule falls back field by field to its own default, so a file may
/// set just `[detection.brute_force.ip] threshold = 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BruteForceFile")]
pub struct BruteForceConfig {
    pub ip: WindowRule,
    pub user: WindowRule,
}

/// A `WindowRule` as written in a config file, any field may be missing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WindowRuleFile {
    window_minutes: Option<u64>,
    threshold: Option<usize>,
}

impl WindowRuleFile {
    fn or(self, fallback: WindowRule) -> WindowRule {
        WindowRule {
            window_minutes: self.window_minutes.unwrap_or(fallback.window_minutes),
            threshold: self.threshold.unwrap_or(fallback.threshold),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BruteForceFile {
    ip: WindowRuleFile,
    user: WindowRuleFile,
}

impl From<BruteForceFile> for BruteForceConfig {
    fn from(file: BruteForceFile) -> Self {
        let defaults = Self::default();
        Self {
            ip: file.ip.or(defaults.ip),
            user: file.user.or(defaults.user),
        }
    }
}

impl Default for BruteForceConfig {
    fn default() -> Self {
        Self {
            ip: WindowRule::new(5, 5),
            user: WindowRule::new(10, 8),
        }
    }
}

/// How the windowed distinct-endpoint signal is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanningMode {
    /// True sliding-window distinct count.
    #[default]
    Exact,

    /// Sum of per-minute distinct counts over the trailing window.
    /// Over-counts endpoints that recur in more than one minute. Kept for
    /// reproducing numbers from older reports.
    LegacyMinuteBuckets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Flag when a source touched at least this many distinct endpoints overall.
    pub threshold_total: usize,

    /// Window size in minutes for the windowed distinct signal.
    pub window_minutes: u64,

    /// Flag when the windowed distinct signal reaches this value.
    pub threshold_window: usize,

    pub mode: ScanningMode,
}

impl ScanningConfig {
    pub fn window(&self) -> Duration {
        minutes(self.window_minutes)
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            threshold_total: 30,
            window_minutes: 5,
            threshold_window: 20,
            mode: ScanningMode::Exact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DosConfig {
    /// Window size in seconds. Ignored when `global` is set.
    pub window_secs: u64,

    /// Requests inside one window that raise an incident.
    pub threshold: usize,

    /// Global-count variant: the window is the whole observed span of each
    /// source, so a source is flagged on its total request count.
    pub global: bool,
}

impl DosConfig {
    /// Whole-file request count per IP, no time window.
    pub fn legacy_global() -> Self {
        Self {
            global: true,
            threshold: 100,
            ..Self::default()
        }
    }

    pub fn window(&self) -> Duration {
        seconds(self.window_secs)
    }
}

impl Default for DosConfig {
    fn default() -> Self {
        Self {
            window_secs: 5,
            threshold: 5,
            global: false,
        }
    }
}

/// Minutes to a chrono duration, saturating at `Duration::MAX`.
/// `validate` rejects anything that would saturate.
pub(crate) fn minutes(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_minutes)
        .unwrap_or(Duration::MAX)
}

/// Seconds to a chrono duration, saturating at `Duration::MAX`.
pub(crate) fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Largest window accepted from a config file: one year.
pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 3600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Paths to sshd auth logs (e.g., /var/log/auth.log).
    pub auth_log_paths: Vec<PathBuf>,

    /// Paths to web server access logs (Apache/Nginx common or combined format).
    pub web_log_paths: Vec<PathBuf>,

    /// Year assumed for syslog timestamps, which carry none.
    /// None = current year.
    pub syslog_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory that receives the CSV and JSON artifacts.
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistEntry {
    pub ip: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionPrefix {
    pub prefix: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Known-bad addresses with the reason they were listed.
    pub blocklist: Vec<BlocklistEntry>,

    /// IP string prefixes mapped to a region label. First match wins.
    pub regions: Vec<RegionPrefix>,

    /// Label for public addresses no prefix matches. Private ranges are
    /// always labelled "Private Network".
    pub default_region: String,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        let entry = |ip: &str, reason: &str| BlocklistEntry {
            ip: ip.to_string(),
            reason: reason.to_string(),
        };
        Self {
            blocklist: vec![
                entry("192.168.1.100", "Brute-force attacker"),
                entry("203.0.113.45", "Known malicious bot"),
                entry("10.0.0.50", "Port scanner"),
            ],
            regions: vec![RegionPrefix {
                prefix: "203.".to_string(),
                region: "India".to_string(),
            }],
            default_region: "Unknown".to_string(),
        }
    }
}

impl ForensicsConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> ForensicsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ForensicsConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default configuration to a TOML file.
    pub fn write_default(path: &Path) -> ForensicsResult<()> {
        let config = Self::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| ForensicsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would make a detector meaningless.
    pub fn validate(&self) -> ForensicsResult<()> {
        let bf = &self.detection.brute_force;
        for (name, rule) in [("brute_force.ip", bf.ip), ("brute_force.user", bf.user)] {
            if rule.threshold == 0 {
                return Err(ForensicsError::Config(format!("{}.threshold must be at least 1", name)));
            }
            check_window(&format!("{}.window_minutes", name), rule.window_minutes.checked_mul(60))?;
        }
        let scanning = &self.detection.scanning;
        if scanning.threshold_total == 0 || scanning.threshold_window == 0 {
            return Err(ForensicsError::Config(
                "scanning thresholds must be at least 1".to_string(),
            ));
        }
        check_window("scanning.window_minutes", scanning.window_minutes.checked_mul(60))?;
        let dos = &self.detection.dos;
        if dos.threshold == 0 {
            return Err(ForensicsError::Config("dos.threshold must be at least 1".to_string()));
        }
        check_window("dos.window_secs", Some(dos.window_secs))?;
        Ok(())
    }
}

fn check_window(name: &str, secs: Option<u64>) -> ForensicsResult<()> {
    match secs {
        Some(secs) if secs <= MAX_WINDOW_SECS => Ok(()),
        _ => Err(ForensicsError::Config(format!(
            "{} exceeds the maximum window of {} seconds",
            name, MAX_WINDOW_SECS
        ))),
    }
}

// ---------------------------------------------------------------------------
// Core Types
// ---------------------------------------------------------------------------

/// What an entity key identifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Ip,
    User,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Ip => write!(f, "ip"),
            EntityType::User => write!(f, "user"),
        }
    }
}

/// Composite grouping key. An IP string and a username never collide,
/// even when they happen to be spelled the same.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: EntityType,
    pub key: String,
}

impl Entity {
    pub fn ip(key: impl Into<String>) -> Self {
        Self { entity_type: EntityType::Ip, key: key.into() }
    }

    pub fn user(key: impl Into<String>) -> Self {
        Self { entity_type: EntityType::User, key: key.into() }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.key)
    }
}

/// Classification of normalized events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    AuthFailure,
    AuthSuccess,
    HttpRequest,
}

/// A single normalized event.
///
/// This is the atomic unit of observation. Log sources produce these;
/// the detectors consume them. Events with a missing timestamp or an empty
/// key never get this far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub entity_key: String,
    pub entity_type: EntityType,
    pub kind: EventKind,

    /// Requested path. Present only for `HttpRequest`.
    pub endpoint: Option<String>,

    /// HTTP status code. Present only for `HttpRequest`; not used by detection.
    pub status: Option<u16>,
}

impl LogEvent {
    pub fn auth_failure(timestamp: DateTime<Utc>, entity: Entity) -> Self {
        Self::auth(timestamp, entity, EventKind::AuthFailure)
    }

    pub fn auth_success(timestamp: DateTime<Utc>, entity: Entity) -> Self {
        Self::auth(timestamp, entity, EventKind::AuthSuccess)
    }

    fn auth(timestamp: DateTime<Utc>, entity: Entity, kind: EventKind) -> Self {
        Self {
            timestamp,
            entity_key: entity.key,
            entity_type: entity.entity_type,
            kind,
            endpoint: None,
            status: None,
        }
    }

    /// A web request from `ip`. Requests are always keyed by source IP.
    pub fn http_request(
        timestamp: DateTime<Utc>,
        ip: impl Into<String>,
        endpoint: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self {
            timestamp,
            entity_key: ip.into(),
            entity_type: EntityType::Ip,
            kind: EventKind::HttpRequest,
            endpoint: Some(endpoint.into()),
            status,
        }
    }

    pub fn entity(&self) -> Entity {
        Entity {
            entity_type: self.entity_type,
            key: self.entity_key.clone(),
        }
    }
}

/// Which detector raised an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentKind {
    BruteForce,
    Scanning,
    Dos,
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentKind::BruteForce => write!(f, "BRUTE_FORCE"),
            IncidentKind::Scanning => write!(f, "SCANNING"),
            IncidentKind::Dos => write!(f, "DOS"),
        }
    }
}

/// A bounded window in which one entity crossed a detector threshold.
///
/// Incidents are never mutated or merged after a detector emits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub entity_type: EntityType,
    pub entity_key: String,
    pub kind: IncidentKind,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,

    /// The count or cardinality that triggered the flag.
    pub metric_value: usize,
    pub threshold: usize,

    /// Window size in seconds.
    pub window_secs: u64,
}

impl Incident {
    /// Human-readable one-liner for reports.
    pub fn note(&self) -> String {
        let window = format_window(self.window_secs);
        match (self.kind, self.entity_type) {
            (IncidentKind::BruteForce, EntityType::Ip) => {
                format!("{} failed logins in {}", self.metric_value, window)
            }
            (IncidentKind::BruteForce, EntityType::User) => {
                format!("{} failed logins for user in {}", self.metric_value, window)
            }
            (IncidentKind::Scanning, _) => {
                format!("{} distinct endpoints in {}", self.metric_value, window)
            }
            (IncidentKind::Dos, _) => format!("{} requests in {}", self.metric_value, window),
        }
    }
}

/// "5 min" for whole minutes, "45 s" otherwise.
pub fn format_window(secs: u64) -> String {
    if secs >= 60 && secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{} s", secs)
    }
}
