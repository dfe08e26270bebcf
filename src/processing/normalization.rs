//! Maps source-specific host records onto [`NormalizedHost`]

use crate::model::{NormalizedHost, RawRecord, SourceTag, SOURCE_KEY};
use serde_json::Value;

/// Field names that mark an untagged record as coming from CrowdStrike
const CROWDSTRIKE_MARKERS: [&str; 2] = ["platform_name", "platform_id"];

/// Candidate raw field names for each normalized field, in priority order
struct FieldMap {
    hostname: &'static [&'static str],
    ip: &'static [&'static str],
    os: &'static [&'static str],
    last_seen: &'static [&'static str],
}

const QUALYS_FIELDS: FieldMap = FieldMap {
    hostname: &["name", "hostname"],
    ip: &["address", "ip"],
    os: &["os"],
    last_seen: &["modified", "lastSeen"],
};

const CROWDSTRIKE_FIELDS: FieldMap = FieldMap {
    hostname: &["hostname"],
    ip: &["local_ip", "ip"],
    os: &["platform_name", "os"],
    last_seen: &["last_seen", "lastSeenDate"],
};

fn field_map(tag: SourceTag) -> &'static FieldMap {
    match tag {
        SourceTag::Qualys => &QUALYS_FIELDS,
        SourceTag::Crowdstrike => &CROWDSTRIKE_FIELDS,
    }
}

/// Normalizes raw records from every source into one shape
#[derive(Debug, Default, Clone)]
pub struct HostNormalizer;

impl HostNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Partition by source, then map each bucket. Output is source-major:
    /// every Qualys host precedes every CrowdStrike host, each bucket in input order.
    pub fn process(&self, records: Vec<RawRecord>) -> Vec<NormalizedHost> {
        let mut qualys = Vec::new();
        let mut crowdstrike = Vec::new();

        for record in records {
            match detect_source(&record) {
                Some(SourceTag::Qualys) => qualys.push(record),
                Some(SourceTag::Crowdstrike) => crowdstrike.push(record),
                None => {
                    tracing::warn!(
                        "Dropping host with unrecognized source tag: {:?}",
                        record.get(SOURCE_KEY)
                    );
                }
            }
        }

        tracing::debug!(
            "Normalizing {} qualys and {} crowdstrike hosts",
            qualys.len(),
            crowdstrike.len()
        );

        qualys
            .iter()
            .map(|record| normalize_record(SourceTag::Qualys, record))
            .chain(
                crowdstrike
                    .iter()
                    .map(|record| normalize_record(SourceTag::Crowdstrike, record)),
            )
            .collect()
    }
}

/// Source bucket for a record. An explicit tag wins; untagged records are
/// sniffed by field presence and default to Qualys. A tag naming neither
/// source yields `None`.
pub fn detect_source(record: &RawRecord) -> Option<SourceTag> {
    match record.get(SOURCE_KEY) {
        Some(tag) => tag.as_str().and_then(|tag| tag.parse().ok()),
        None => {
            if CROWDSTRIKE_MARKERS.iter().any(|key| record.contains_key(*key)) {
                Some(SourceTag::Crowdstrike)
            } else {
                Some(SourceTag::Qualys)
            }
        }
    }
}

/// Map one record with the given source's field map
pub fn normalize_record(tag: SourceTag, record: &RawRecord) -> NormalizedHost {
    let fields = field_map(tag);
    NormalizedHost {
        source: Some(tag),
        hostname: first_present(record, fields.hostname),
        ip: first_present(record, fields.ip),
        os: first_present(record, fields.os),
        last_seen: first_present(record, fields.last_seen),
    }
}

/// First candidate holding a usable scalar. Null, empty strings, zero,
/// `false`, arrays and objects are skipped.
fn first_present(record: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}
