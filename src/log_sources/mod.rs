//! Log source abstraction layer for SENTINEL Forensics.
//!
//! Each source turns raw lines of one log format into normalized
//! [`LogEvent`]s. The registry reads every configured file once, front to
//! back; lines that don't parse are counted and dropped, never fatal.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

pub mod auth_log;
pub mod web_log;

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::{ForensicsError, ForensicsResult, LogEvent, SourcesConfig};

pub trait LogSource: Send + Sync {
    fn name(&self) -> &str;

    /// Normalize one raw line. Unrecognized or malformed lines yield nothing;
    /// one line may yield several events (e.g. IP-keyed and user-keyed).
    fn parse_line(&self, line: &str) -> Vec<LogEvent>;

    fn path(&self) -> &Path;
}

/// Per-file counters, reported alongside the analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub name: String,
    pub path: PathBuf,
    pub lines: usize,
    pub parsed_lines: usize,
    pub events: usize,
}

/// Everything read from the registered sources.
#[derive(Debug, Clone, Default)]
pub struct LoadedEvents {
    pub events: Vec<LogEvent>,
    pub stats: Vec<SourceStats>,
}

pub struct LogSourceRegistry {
    sources: Vec<Box<dyn LogSource>>,
}

impl LogSourceRegistry {
    pub fn new(config: &SourcesConfig) -> Self {
        let mut registry = Self::empty();
        for path in &config.auth_log_paths {
            registry.register(Box::new(auth_log::AuthLogSource::new(path.clone(), config.syslog_year)));
        }
        for (i, path) in config.web_log_paths.iter().enumerate() {
            let name = if config.web_log_paths.len() == 1 {
                "web-access".to_string()
            } else {
                format!("web-access-{}", i)
            };
            registry.register(Box::new(web_log::WebLogSource::new(path.clone(), &name)));
        }
        registry
    }

    pub fn empty() -> Self {
        Self { sources: Vec::new() }
    }

    pub fn register(&mut self, source: Box<dyn LogSource>) {
        log::info!("Registered log source: {} -> {}", source.name(), source.path().display());
        self.sources.push(source);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Read every registered file once and normalize its lines.
    ///
    /// A file that cannot be opened or read aborts the load; malformed lines
    /// inside a readable file are skipped.
    pub fn load_all(&self) -> ForensicsResult<LoadedEvents> {
        let mut loaded = LoadedEvents::default();

        for source in &self.sources {
            let lines = read_lines(source.path())?;
            let mut stats = SourceStats {
                name: source.name().to_string(),
                path: source.path().to_path_buf(),
                lines: lines.len(),
                ..SourceStats::default()
            };

            for (number, line) in &lines {
                let events = source.parse_line(line);
                if events.is_empty() {
                    log::debug!("{}:{}: unrecognized line skipped", source.name(), number);
                    continue;
                }
                stats.parsed_lines += 1;
                stats.events += events.len();
                loaded.events.extend(events);
            }

            log::info!(
                "{}: {} lines, {} parsed, {} events",
                stats.name,
                stats.lines,
                stats.parsed_lines,
                stats.events,
            );
            if stats.lines > 0 && stats.parsed_lines == 0 {
                log::warn!("No recognizable lines in {}", stats.path.display());
            }
            loaded.stats.push(stats);
        }

        Ok(loaded)
    }
}

impl Default for LogSourceRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

/// Read non-empty lines with their 1-based line numbers. Invalid UTF-8 is
/// replaced rather than rejected, so one corrupt line doesn't hide the rest
/// of the file.
fn read_lines(path: &Path) -> ForensicsResult<Vec<(usize, String)>> {
    let source_err = |source| ForensicsError::SourceRead {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(source_err)?;
    let reader = BufReader::new(file);

    let mut lines = Vec::new();
    for (index, chunk) in reader.split(b'\n').enumerate() {
        let bytes = chunk.map_err(source_err)?;
        let line = String::from_utf8_lossy(&bytes);
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if !trimmed.is_empty() {
            lines.push((index + 1, trimmed.to_string()));
        }
    }
    Ok(lines)
}

/// Three-letter English month abbreviation to month number.
pub(crate) fn month_number(month: &str) -> Option<u32> {
    let n = match month {
        "Jan" => 1, "Feb" => 2, "Mar" => 3, "Apr" => 4,
        "May" => 5, "Jun" => 6, "Jul" => 7, "Aug" => 8,
        "Sep" => 9, "Oct" => 10, "Nov" => 11, "Dec" => 12,
        _ => return None,
    };
    Some(n)
}
