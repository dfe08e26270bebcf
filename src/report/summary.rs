use crate::error::{HostsyncError, Result};
use crate::model::NormalizedHost;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OS family by lowercase substring, first match wins
const OS_FAMILIES: &[(&str, &str)] = &[
    ("amazon linux", "Linux"),
    ("linux", "Linux"),
    ("windows", "Windows"),
    ("mac", "macOS"),
    ("darwin", "macOS"),
    ("ubuntu", "Ubuntu"),
    ("centos", "CentOS"),
    ("red hat", "Red Hat"),
    ("rhel", "Red Hat"),
];

/// Aggregate counts over the persisted host set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSummary {
    pub total_hosts: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_os: BTreeMap<String, usize>,
    pub old_hosts: usize,
    pub recent_hosts: usize,
}

impl HostSummary {
    /// Summarize `hosts`. A host is old when its `last_seen` is missing,
    /// unparseable, or earlier than `now - stale_after_days`.
    pub fn from_hosts(
        hosts: &[NormalizedHost],
        now: DateTime<Utc>,
        stale_after_days: i64,
    ) -> Result<Self> {
        let threshold = Duration::try_days(stale_after_days)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| HostsyncError::InvalidConfigValue {
                path: "report.stale_after_days".to_string(),
                message: format!("{} days is outside the supported date range", stale_after_days),
            })?;
        let mut summary = HostSummary {
            total_hosts: hosts.len(),
            ..Default::default()
        };

        for host in hosts {
            let source = host
                .source
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            *summary.by_source.entry(source).or_default() += 1;

            let family = os_family(host.os.as_deref());
            *summary.by_os.entry(family.to_string()).or_default() += 1;

            match host.last_seen.as_deref().and_then(parse_last_seen) {
                Some(seen) if seen >= threshold => summary.recent_hosts += 1,
                _ => summary.old_hosts += 1,
            }
        }

        Ok(summary)
    }
}

/// Chart label for a raw OS string
pub fn os_family(os: Option<&str>) -> &'static str {
    let os = match os {
        Some(os) if !os.is_empty() => os.to_lowercase(),
        _ => return "Unknown",
    };

    OS_FAMILIES
        .iter()
        .find(|(needle, _)| os.contains(needle))
        .map(|(_, family)| *family)
        .unwrap_or("Other")
}

/// Accepts `YYYY-MM-DDTHH:MM:SS` (taken as UTC) or RFC 3339
pub fn parse_last_seen(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
