//! # IP Reputation
//!
//! Static context for flagged sources: a configured blocklist of known-bad
//! addresses, and a trivial region label from IP string prefixes. Neither
//! affects detection; both annotate reports.
//!
//! Addresses are compared in canonical `IpAddr` form where they parse, so
//! `::ffff:0:1` style spelling differences don't cause misses.
//!
//! Copyright (c) 2026 CIPS Corps. All rights reserved.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use crate::ReputationConfig;

/// Label used for RFC 1918 / loopback / link-local sources.
pub const PRIVATE_NETWORK: &str = "Private Network";

/// A flagged address that is also on the blocklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationMatch {
    pub ip: String,
    pub reason: String,
}

/// Known-bad addresses keyed by canonical form.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    entries: HashMap<String, String>,
}

impl Blocklist {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(ip, reason)| (canonical(ip), reason.to_string()))
            .collect();
        Self { entries }
    }

    pub fn from_config(config: &ReputationConfig) -> Self {
        Self::new(config.blocklist.iter().map(|e| (e.ip.as_str(), e.reason.as_str())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reason(&self, ip: &str) -> Option<&str> {
        self.entries.get(&canonical(ip)).map(String::as_str)
    }

    /// Blocklisted addresses among `ips`, in input order, each reported once.
    pub fn check<'a>(&self, ips: impl IntoIterator<Item = &'a str>) -> Vec<ReputationMatch> {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();
        for ip in ips {
            let key = canonical(ip);
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(reason) = self.entries.get(&key) {
                matches.push(ReputationMatch {
                    ip: ip.to_string(),
                    reason: reason.clone(),
                });
            }
        }
        matches
    }
}

/// Lookup result for one address, as printed by `check-ips`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpVerdict {
    pub ip: String,
    pub region: String,
    pub reason: Option<String>,
}

/// One verdict per input address, duplicates and alternate spellings
/// included, each resolved independently.
pub fn classify<'a>(
    ips: impl IntoIterator<Item = &'a str>,
    blocklist: &Blocklist,
    regions: &RegionTable,
) -> Vec<IpVerdict> {
    ips.into_iter()
        .map(|ip| IpVerdict {
            ip: ip.to_string(),
            region: regions.region_for(ip).to_string(),
            reason: blocklist.reason(ip).map(str::to_string),
        })
        .collect()
}

/// Prefix-based region labels. Deliberately crude.
#[derive(Debug, Clone)]
pub struct RegionTable {
    prefixes: Vec<(String, String)>,
    default_region: String,
}

impl RegionTable {
    pub fn from_config(config: &ReputationConfig) -> Self {
        Self {
            prefixes: config
                .regions
                .iter()
                .map(|r| (r.prefix.clone(), r.region.clone()))
                .collect(),
            default_region: config.default_region.clone(),
        }
    }

    /// First configured prefix wins; unmatched private addresses are
    /// labelled [`PRIVATE_NETWORK`], everything else gets the default.
    pub fn region_for(&self, ip: &str) -> &str {
        if let Some((_, region)) = self.prefixes.iter().find(|(prefix, _)| ip.starts_with(prefix.as_str())) {
            return region;
        }
        match ip.parse::<IpAddr>() {
            Ok(addr) if is_private_ip(&addr) => PRIVATE_NETWORK,
            _ => &self.default_region,
        }
    }
}

/// Check if an IP address is in a private/reserved range.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()             // 127.0.0.0/8
                || v4.is_private()        // 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16
                || v4.is_link_local()     // 169.254.0.0/16
                || v4.is_unspecified()    // 0.0.0.0
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

fn canonical(ip: &str) -> String {
    ip.trim()
        .parse::<IpAddr>()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| ip.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlocklistEntry, RegionPrefix, ReputationConfig};

    #[test]
    fn test_default_blocklist_matches_in_input_order() {
        let blocklist = Blocklist::from_config(&ReputationConfig::default());
        assert_eq!(blocklist.len(), 3);
        let matches = blocklist.check(["10.0.0.50", "8.8.8.8", "192.168.1.100", "10.0.0.50"]);
        assert_eq!(
            matches,
            vec![
                ReputationMatch { ip: "10.0.0.50".into(), reason: "Port scanner".into() },
                ReputationMatch { ip: "192.168.1.100".into(), reason: "Brute-force attacker".into() },
            ]
        );
    }

    #[test]
    fn test_canonical_comparison() {
        let blocklist = Blocklist::new([("2001:db8:0:0:0:0:0:1", "v6 bot")]);
        assert_eq!(blocklist.reason("2001:db8::1"), Some("v6 bot"));
        assert_eq!(blocklist.reason(" 2001:db8::1 "), Some("v6 bot"));
        assert!(blocklist.reason("2001:db8::2").is_none());
    }

    #[test]
    fn test_classify_resolves_every_spelling() {
        let blocklist = Blocklist::new([("2001:db8:0:0:0:0:0:1", "v6 bot")]);
        let regions = RegionTable::from_config(&ReputationConfig::default());
        let ips = ["2001:db8:0:0:0:0:0:1", "2001:db8::1", "8.8.8.8"];

        assert_eq!(blocklist.check(ips).len(), 1);
        let verdicts = classify(ips, &blocklist, &regions);
        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0].reason.as_deref(), Some("v6 bot"));
        assert_eq!(verdicts[1].reason.as_deref(), Some("v6 bot"));
        assert_eq!(verdicts[2].reason, None);
        assert_eq!(verdicts[2].region, "Unknown");
    }

    #[test]
    fn test_empty_blocklist() {
        let blocklist = Blocklist::default();
        assert!(blocklist.is_empty());
        assert!(blocklist.check(["1.2.3.4"]).is_empty());
    }

    #[test]
    fn test_region_prefix_then_private_then_default() {
        let table = RegionTable::from_config(&ReputationConfig::default());
        assert_eq!(table.region_for("203.0.113.45"), "India");
        assert_eq!(table.region_for("192.168.1.5"), PRIVATE_NETWORK);
        assert_eq!(table.region_for("8.8.8.8"), "Unknown");
    }

    #[test]
    fn test_first_prefix_wins() {
        let config = ReputationConfig {
            blocklist: vec![BlocklistEntry { ip: "1.1.1.1".into(), reason: "x".into() }],
            regions: vec![
                RegionPrefix { prefix: "10.1.".into(), region: "Lab".into() },
                RegionPrefix { prefix: "10.".into(), region: "Corp".into() },
            ],
            default_region: "Elsewhere".into(),
        };
        let table = RegionTable::from_config(&config);
        assert_eq!(table.region_for("10.1.2.3"), "Lab");
        assert_eq!(table.region_for("10.9.2.3"), "Corp");
        assert_eq!(table.region_for("9.9.9.9"), "Elsewhere");
    }

    #[test]
    fn test_private_ip_detection() {
        assert!(is_private_ip(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"172.16.4.4".parse().unwrap()));
        assert!(!is_private_ip(&"203.0.113.1".parse().unwrap()));
        assert!(is_private_ip(&"::1".parse().unwrap()));
    }
}
