//! Parser for Apache/Nginx access logs, common and combined formats.
//!
//! Format: `IP - - [DD/Mon/YYYY:HH:MM:SS +ZZZZ] "METHOD /path HTTP/x.x" status size ["referer" "user-agent"]`
//!
//! The protocol part of the request line is optional; anything after the
//! size field is ignored.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use crate::log_sources::{month_number, LogSource};
use crate::LogEvent;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static RE_ACCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\S+) \S+ \S+ \[([^\]]+)\] "([A-Z]+) (\S+)(?: [^"]*)?" (\d{3}) (\S+)"#)
        .expect("regex")
});

static RE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})/([A-Z][a-z]{2})/(\d{4}):(\d{2}):(\d{2}):(\d{2}) ([+-]\d{4})$")
        .expect("regex")
});

pub struct WebLogSource {
    path: PathBuf,
    name: String,
}

impl WebLogSource {
    pub fn new(path: PathBuf, name: &str) -> Self {
        Self { path, name: name.to_string() }
    }
}

impl LogSource for WebLogSource {
    fn name(&self) -> &str { &self.name }

    fn parse_line(&self, line: &str) -> Vec<LogEvent> {
        parse_access_line(line).into_iter().collect()
    }

    fn path(&self) -> &Path { &self.path }
}

fn parse_access_line(line: &str) -> Option<LogEvent> {
    let caps = RE_ACCESS.captures(line)?;
    let source_ip: IpAddr = caps.get(1)?.as_str().parse().ok()?;
    let timestamp = parse_access_timestamp(caps.get(2)?.as_str())?;
    let endpoint = caps.get(4)?.as_str();
    let status: u16 = caps.get(5)?.as_str().parse().ok()?;

    Some(LogEvent::http_request(timestamp, source_ip.to_string(), endpoint, Some(status)))
}

fn parse_access_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let caps = RE_TIMESTAMP.captures(ts)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_number(caps.get(2)?.as_str())?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    let hour: u32 = caps.get(4)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(5)?.as_str().parse().ok()?;
    let second: u32 = caps.get(6)?.as_str().parse().ok()?;
    let tz_str = caps.get(7)?.as_str();
    let tz_sign: i32 = if tz_str.starts_with('-') { -1 } else { 1 };
    let tz_hours: i32 = tz_str[1..3].parse().ok()?;
    let tz_minutes: i32 = tz_str[3..5].parse().ok()?;
    let tz_offset_seconds = tz_sign * (tz_hours * 3600 + tz_minutes * 60);
    let naive = chrono::NaiveDateTime::new(
        chrono::NaiveDate::from_ymd_opt(year, month, day)?,
        chrono::NaiveTime::from_hms_opt(hour, minute, second)?,
    );
    let fixed_offset = chrono::FixedOffset::east_opt(tz_offset_seconds)?;
    let dt = fixed_offset.from_local_datetime(&naive).single()?;
    Some(dt.with_timezone(&Utc))
}
