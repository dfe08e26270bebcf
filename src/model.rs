//! Host record types shared by the fetch, processing and storage layers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw record as returned by an upstream source, one JSON object per host
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Key under which the source tag is attached to raw records
pub const SOURCE_KEY: &str = "source";

/// Upstream system a record originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Qualys,
    Crowdstrike,
}

impl SourceTag {
    pub const ALL: [SourceTag; 2] = [SourceTag::Qualys, SourceTag::Crowdstrike];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Qualys => "qualys",
            SourceTag::Crowdstrike => "crowdstrike",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qualys" => Ok(SourceTag::Qualys),
            "crowdstrike" => Ok(SourceTag::Crowdstrike),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// Host record in the common shape produced by normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedHost {
    pub source: Option<SourceTag>,
    pub hostname: Option<String>,
    pub ip: Option<String>,
    pub os: Option<String>,
    /// ISO-8601 timestamp string, kept exactly as the source reported it
    pub last_seen: Option<String>,
}

impl NormalizedHost {
    /// Convenience constructor for a host identified by ip and hostname
    pub fn with_identity(ip: Option<&str>, hostname: Option<&str>) -> Self {
        Self {
            ip: ip.map(str::to_string),
            hostname: hostname.map(str::to_string),
            ..Default::default()
        }
    }

    /// Display label used in log lines
    pub fn label(&self) -> String {
        format!(
            "{} ({})",
            self.hostname.as_deref().unwrap_or("Unknown"),
            self.ip.as_deref().unwrap_or("Unknown")
        )
    }
}

/// Attach the source tag to a raw record, overwriting any existing tag
pub fn tag_record(record: &mut RawRecord, tag: SourceTag) {
    record.insert(
        SOURCE_KEY.to_string(),
        serde_json::Value::String(tag.as_str().to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_tag_round_trips_through_str() {
        for tag in SourceTag::ALL {
            assert_eq!(tag.as_str().parse::<SourceTag>().unwrap(), tag);
        }
        assert!("nessus".parse::<SourceTag>().is_err());
    }

    #[test]
    fn test_source_tag_serializes_lowercase() {
        let json = serde_json::to_string(&SourceTag::Crowdstrike).unwrap();
        assert_eq!(json, "\"crowdstrike\"");
    }

    #[test]
    fn test_tag_record_overwrites() {
        let mut record = RawRecord::new();
        record.insert("source".to_string(), "stale".into());
        tag_record(&mut record, SourceTag::Qualys);
        assert_eq!(record["source"], "qualys");
    }
}
