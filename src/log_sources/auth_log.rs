//! Parser for Linux `/var/log/auth.log` (and `/var/log/secure` on RHEL).
//!
//! Handles sshd password authentication. Every recognized line yields two
//! events: one keyed by source IP and one keyed by the target username, so
//! the brute-force detector can run its IP and user passes over one stream.
//!
//! Design: string matching first, regex only when needed for IP/user extraction.
//! A `parse_line` call on a non-matching line costs almost nothing.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use crate::log_sources::{month_number, LogSource};
use crate::{Entity, LogEvent};
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use regex::Regex;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Compiled regexes (compiled once, used forever)
// ---------------------------------------------------------------------------

/// "Failed password for [invalid user ]<user> from <ip> port <port> ssh2"
static RE_FAILED_PASSWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Failed password for (?:invalid user )?(\S+) from (\S+)").expect("regex")
});

/// "Accepted password for <user> from <ip> port <port> ssh2"
/// Also "Accepted publickey for ..."
static RE_ACCEPTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Accepted (?:password|publickey) for (\S+) from (\S+)").expect("regex")
});

/// Syslog timestamp header: "Mon DD HH:MM:SS hostname process[PID]:"
static RE_SYSLOG_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([A-Z][a-z]{2})\s+(\d{1,2})\s+(\d{2}:\d{2}:\d{2})\s+(\S+)\s+(\S+?)(?:\[(\d+)\])?:\s+(.*)$",
    )
    .expect("regex")
});

// ---------------------------------------------------------------------------
// AuthLogSource
// ---------------------------------------------------------------------------

pub struct AuthLogSource {
    path: PathBuf,
    /// Syslog lines carry no year. None = current year.
    year: Option<i32>,
}

impl AuthLogSource {
    pub fn new(path: PathBuf, year: Option<i32>) -> Self {
        Self { path, year }
    }
}

impl LogSource for AuthLogSource {
    fn name(&self) -> &str {
        "auth.log"
    }

    fn parse_line(&self, line: &str) -> Vec<LogEvent> {
        // Quick reject: only sshd password outcomes matter.
        if !line.contains("sshd") || !(line.contains("Failed password") || line.contains("Accepted ")) {
            return Vec::new();
        }
        self.parse_sshd(line).unwrap_or_default()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl AuthLogSource {
    fn parse_sshd(&self, line: &str) -> Option<Vec<LogEvent>> {
        let header = RE_SYSLOG_HEADER.captures(line)?;
        let month_str = header.get(1)?.as_str();
        let day_str = header.get(2)?.as_str();
        let time_str = header.get(3)?.as_str();
        let process = header.get(5)?.as_str();
        let message = header.get(7)?.as_str();

        if !process.starts_with("sshd") {
            return None;
        }

        let year = self.year.unwrap_or_else(|| Utc::now().year());
        let timestamp = parse_syslog_timestamp(year, month_str, day_str, time_str)?;

        if let Some(caps) = RE_FAILED_PASSWORD.captures(message) {
            let (user, ip) = user_and_ip(caps.get(1)?.as_str(), caps.get(2)?.as_str())?;
            return Some(vec![
                LogEvent::auth_failure(timestamp, Entity::ip(ip)),
                LogEvent::auth_failure(timestamp, Entity::user(user)),
            ]);
        }

        if let Some(caps) = RE_ACCEPTED.captures(message) {
            let (user, ip) = user_and_ip(caps.get(1)?.as_str(), caps.get(2)?.as_str())?;
            return Some(vec![
                LogEvent::auth_success(timestamp, Entity::ip(ip)),
                LogEvent::auth_success(timestamp, Entity::user(user)),
            ]);
        }

        None
    }
}

/// Validate the captured pair; the IP is returned in canonical form.
fn user_and_ip(user: &str, ip: &str) -> Option<(String, String)> {
    if user.is_empty() {
        return None;
    }
    let ip: IpAddr = ip.parse().ok()?;
    Some((user.to_string(), ip.to_string()))
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

fn parse_syslog_timestamp(year: i32, month: &str, day: &str, time: &str) -> Option<DateTime<Utc>> {
    let month_num = month_number(month)?;
    let day_num: u32 = day.trim().parse().ok()?;
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 3 { return None; }
    let hour: u32 = parts[0].parse().ok()?;
    let minute: u32 = parts[1].parse().ok()?;
    let second: u32 = parts[2].parse().ok()?;
    let naive = NaiveDateTime::new(
        chrono::NaiveDate::from_ymd_opt(year, month_num, day_num)?,
        chrono::NaiveTime::from_hms_opt(hour, minute, second)?,
    );
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityType, EventKind};
    use chrono::{TimeZone, Timelike};

    fn source() -> AuthLogSource {
        AuthLogSource::new(PathBuf::from("/var/log/auth.log"), Some(2025))
    }

    #[test]
    fn test_failed_password_yields_ip_and_user_events() {
        let line = "Jan  5 14:23:01 webserver sshd[12345]: Failed password for admin from 192.168.1.100 port 54321 ssh2";
        let events = source().parse_line(line);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == EventKind::AuthFailure));
        assert_eq!(events[0].entity(), Entity::ip("192.168.1.100"));
        assert_eq!(events[1].entity(), Entity::user("admin"));
        assert_eq!(events[0].timestamp, Utc.with_ymd_and_hms(2025, 1, 5, 14, 23, 1).unwrap());
    }

    #[test]
    fn test_failed_password_invalid_user() {
        let line = "Feb 12 03:44:55 prod sshd[9999]: Failed password for invalid user oracle from 10.0.0.5 port 22222 ssh2";
        let events = source().parse_line(line);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].entity_key, "oracle");
        assert_eq!(events[1].entity_type, EntityType::User);
    }

    #[test]
    fn test_accepted_password_and_publickey() {
        let line = "Mar  1 08:00:00 bastion sshd[1111]: Accepted password for deploy from 172.16.0.50 port 60000 ssh2";
        let events = source().parse_line(line);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == EventKind::AuthSuccess));

        let line = "Apr 15 12:30:00 server sshd[2222]: Accepted publickey for git from 192.168.10.1 port 44444 ssh2";
        let events = source().parse_line(line);
        assert_eq!(events[1].entity_key, "git");
        assert_eq!(events[0].timestamp.hour(), 12);
    }

    #[test]
    fn test_ipv6_source() {
        let line = "May 20 16:45:30 fw sshd[3333]: Failed password for root from 2001:db8::1 port 12345 ssh2";
        let events = source().parse_line(line);
        assert_eq!(events[0].entity_key, "2001:db8::1");
    }

    #[test]
    fn test_non_password_sshd_lines_ignored() {
        let lines = [
            "Sep  5 18:00:00 web sshd[7777]: Connection closed by 192.168.1.1 port 50000 [preauth]",
            "May 20 16:45:30 firewall sshd[3333]: Invalid user testuser from 203.0.113.50 port 12345",
            "Nov  1 12:00:00 server kernel: [12345.678] eth0: link up",
            "Nov  1 12:00:00 server sudo: Failed password for root from 1.2.3.4 port 22 ssh2",
        ];
        for line in lines {
            assert!(source().parse_line(line).is_empty(), "{}", line);
        }
    }

    #[test]
    fn test_garbage_returns_nothing() {
        assert!(source().parse_line("").is_empty());
        assert!(source().parse_line("not a log line at all").is_empty());
        assert!(source().parse_line("sshd Failed password but no structure").is_empty());
    }

    #[test]
    fn test_malformed_ip_or_date_returns_nothing() {
        let line = "Dec 25 00:00:00 box sshd[9999]: Failed password for root from 999.999.999.999 port 22 ssh2";
        assert!(source().parse_line(line).is_empty());
        let line = "Feb 30 00:00:00 box sshd[9999]: Failed password for root from 1.2.3.4 port 22 ssh2";
        assert!(source().parse_line(line).is_empty());
    }

    #[test]
    fn test_name_and_path() {
        let s = source();
        assert_eq!(s.name(), "auth.log");
        assert_eq!(s.path(), Path::new("/var/log/auth.log"));
    }
}
