//! Host deduplication by derived identity key

use crate::model::NormalizedHost;
use std::collections::HashSet;
use std::fmt;

/// Identity of a host for deduplication purposes. Never stored.
///
/// A one-element key carries either the ip or the hostname; the two compare
/// by value, so an ip-only host and a hostname-only host holding the same
/// text share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    IpHostname(String, String),
    Single(String),
}

impl IdentityKey {
    /// Derive the key by priority: (ip, hostname), then ip, then hostname.
    /// Returns `None` when the host has neither.
    pub fn derive(host: &NormalizedHost) -> Option<Self> {
        let ip = present(&host.ip);
        let hostname = present(&host.hostname);

        match (ip, hostname) {
            (Some(ip), Some(hostname)) => {
                Some(IdentityKey::IpHostname(ip.to_string(), hostname.to_string()))
            }
            (Some(ip), None) => Some(IdentityKey::Single(ip.to_string())),
            (None, Some(hostname)) => Some(IdentityKey::Single(hostname.to_string())),
            (None, None) => None,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::IpHostname(ip, hostname) => write!(f, "({}, {})", ip, hostname),
            IdentityKey::Single(value) => write!(f, "({},)", value),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Counts from one deduplication pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub input: usize,
    pub kept: usize,
    pub duplicates: usize,
    pub identityless: usize,
    /// Keys of dropped hosts, in the order they were dropped
    pub duplicate_keys: Vec<IdentityKey>,
}

/// First-seen-wins deduplicator.
///
/// Later duplicates are discarded wholesale even when they carry fields the
/// kept record lacks; no merging happens here. Hosts without ip and hostname
/// cannot collide and are always kept.
#[derive(Debug, Default, Clone)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, hosts: Vec<NormalizedHost>) -> Vec<NormalizedHost> {
        self.process_with_stats(hosts).0
    }

    /// Deduplicate, returning the unique hosts in first-occurrence order
    pub fn process_with_stats(&self, hosts: Vec<NormalizedHost>) -> (Vec<NormalizedHost>, DedupStats) {
        let mut stats = DedupStats {
            input: hosts.len(),
            ..Default::default()
        };

        if hosts.is_empty() {
            tracing::info!("No data to deduplicate");
            return (Vec::new(), stats);
        }

        tracing::info!("Starting deduplication of {} hosts", hosts.len());

        let mut seen: HashSet<IdentityKey> = HashSet::new();
        let mut unique = Vec::with_capacity(hosts.len());

        for host in hosts {
            match IdentityKey::derive(&host) {
                None => {
                    tracing::warn!("Host without IP and hostname: {:?}", host);
                    stats.identityless += 1;
                    unique.push(host);
                }
                Some(key) => {
                    if seen.contains(&key) {
                        tracing::debug!("Duplicate host found: {}", host.label());
                        stats.duplicates += 1;
                        stats.duplicate_keys.push(key);
                    } else {
                        seen.insert(key);
                        unique.push(host);
                    }
                }
            }
        }

        stats.kept = unique.len();

        tracing::info!(
            "Deduplication completed: {} -> {} hosts ({} duplicates removed)",
            stats.input,
            stats.kept,
            stats.duplicates
        );

        if !stats.duplicate_keys.is_empty() {
            let keys: Vec<String> = stats.duplicate_keys.iter().map(|k| k.to_string()).collect();
            tracing::info!("Duplicate keys: {}", keys.join(", "));
        }

        (unique, stats)
    }
}
