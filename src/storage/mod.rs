//! Storage layer for hostsync
//!
//! Unique hosts are upserted into a SQLite table keyed by `(ip, hostname)`.
//! The store is opened once per process and handed to the pipeline.

pub mod database;

use crate::error::Result;
use crate::model::NormalizedHost;
use rusqlite::{params, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};

pub use database::{Database, DbPool, DbStats};

/// Outcome counts of one upsert call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl UpsertStats {
    /// Hosts that were inserted or modified
    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

/// Destination for deduplicated hosts
pub trait HostSink {
    /// Insert or update each host by its `(ip, hostname)` pair
    fn upsert(&self, hosts: &[NormalizedHost]) -> Result<UpsertStats>;

    /// Every persisted host, in insertion order
    fn all_hosts(&self) -> Result<Vec<NormalizedHost>>;
}

enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// SQLite-backed host store
pub struct SqliteHostStore {
    database: Database,
    path: PathBuf,
    batch_size: usize,
}

impl SqliteHostStore {
    /// Open the store, creating the database file and schema if needed
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let database = Database::new(path)?;
        tracing::info!("Opened host store at {}", path.display());

        Ok(Self {
            database,
            path: path.to_path_buf(),
            batch_size: batch_size.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> Result<DbStats> {
        self.database.stats()
    }

    /// Release the connection pool
    pub fn close(self) {
        tracing::info!("Closed host store at {}", self.path.display());
    }

    fn upsert_one(tx: &Transaction<'_>, host: &NormalizedHost, now: &str) -> Result<UpsertOutcome> {
        let ip_key = host.ip.as_deref().unwrap_or("");
        let hostname_key = host.hostname.as_deref().unwrap_or("");
        let source = host.source.map(|s| s.as_str());

        let existing: Option<StoredFields> = tx
            .query_row(
                "SELECT ip, hostname, source, os, last_seen FROM hosts
                 WHERE ip_key = ?1 AND hostname_key = ?2",
                params![ip_key, hostname_key],
                |row| {
                    Ok(StoredFields {
                        ip: row.get(0)?,
                        hostname: row.get(1)?,
                        source: row.get(2)?,
                        os: row.get(3)?,
                        last_seen: row.get(4)?,
                    })
                },
            )
            .optional()?;

        match existing {
            None => {
                tx.execute(
                    "INSERT INTO hosts
                     (ip_key, hostname_key, ip, hostname, source, os, last_seen, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                    params![
                        ip_key,
                        hostname_key,
                        host.ip,
                        host.hostname,
                        source,
                        host.os,
                        host.last_seen,
                        now
                    ],
                )?;
                Ok(UpsertOutcome::Created)
            }
            Some(stored) if stored.matches(host) => Ok(UpsertOutcome::Unchanged),
            Some(_) => {
                tx.execute(
                    "UPDATE hosts
                     SET ip = ?3, hostname = ?4, source = ?5, os = ?6, last_seen = ?7, updated_at = ?8
                     WHERE ip_key = ?1 AND hostname_key = ?2",
                    params![
                        ip_key,
                        hostname_key,
                        host.ip,
                        host.hostname,
                        source,
                        host.os,
                        host.last_seen,
                        now
                    ],
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }
}

struct StoredFields {
    ip: Option<String>,
    hostname: Option<String>,
    source: Option<String>,
    os: Option<String>,
    last_seen: Option<String>,
}

impl StoredFields {
    fn matches(&self, host: &NormalizedHost) -> bool {
        self.ip == host.ip
            && self.hostname == host.hostname
            && self.source.as_deref() == host.source.map(|s| s.as_str())
            && self.os == host.os
            && self.last_seen == host.last_seen
    }
}

impl HostSink for SqliteHostStore {
    fn upsert(&self, hosts: &[NormalizedHost]) -> Result<UpsertStats> {
        let mut stats = UpsertStats::default();

        if hosts.is_empty() {
            tracing::info!("No data to save");
            return Ok(stats);
        }

        tracing::info!("Saving {} hosts to {}", hosts.len(), self.path.display());

        let mut conn = self.database.get_conn()?;
        let now = chrono::Utc::now().to_rfc3339();

        for batch in hosts.chunks(self.batch_size) {
            let tx = conn.transaction()?;
            for host in batch {
                match Self::upsert_one(&tx, host, &now)? {
                    UpsertOutcome::Created => {
                        tracing::debug!("Created host: {}", host.label());
                        stats.created += 1;
                    }
                    UpsertOutcome::Updated => {
                        tracing::debug!("Updated host: {}", host.label());
                        stats.updated += 1;
                    }
                    UpsertOutcome::Unchanged => {
                        tracing::debug!("Host already exists (no changes): {}", host.label());
                        stats.unchanged += 1;
                    }
                }
            }
            tx.commit()?;
        }

        tracing::info!(
            "Stored hosts: {} created, {} updated, {} unchanged",
            stats.created,
            stats.updated,
            stats.unchanged
        );

        Ok(stats)
    }

    fn all_hosts(&self) -> Result<Vec<NormalizedHost>> {
        let conn = self.database.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT source, hostname, ip, os, last_seen FROM hosts ORDER BY rowid",
        )?;

        let hosts = stmt
            .query_map([], |row| {
                let source: Option<String> = row.get(0)?;
                Ok(NormalizedHost {
                    source: source.and_then(|s| s.parse().ok()),
                    hostname: row.get(1)?,
                    ip: row.get(2)?,
                    os: row.get(3)?,
                    last_seen: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceTag;
    use tempfile::TempDir;

    fn host(ip: Option<&str>, hostname: Option<&str>, os: &str) -> NormalizedHost {
        NormalizedHost {
            source: Some(SourceTag::Qualys),
            os: Some(os.to_string()),
            ..NormalizedHost::with_identity(ip, hostname)
        }
    }

    fn open(dir: &TempDir, batch_size: usize) -> SqliteHostStore {
        SqliteHostStore::open(&dir.path().join("hosts.sqlite"), batch_size).unwrap()
    }

    #[test]
    fn test_upsert_creates_then_reports_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 100);
        let hosts = vec![
            host(Some("10.0.0.1"), Some("a"), "Linux"),
            host(Some("10.0.0.2"), Some("b"), "Windows"),
        ];

        let first = store.upsert(&hosts).unwrap();
        let second = store.upsert(&hosts).unwrap();

        assert_eq!(first.created, 2);
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.written(), 0);
        assert_eq!(store.all_hosts().unwrap(), hosts);
    }

    #[test]
    fn test_changed_fields_update_in_place() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 100);
        store
            .upsert(&[host(Some("10.0.0.1"), Some("a"), "Linux")])
            .unwrap();

        let stats = store
            .upsert(&[host(Some("10.0.0.1"), Some("a"), "Ubuntu 22.04")])
            .unwrap();

        assert_eq!(stats.updated, 1);
        let stored = store.all_hosts().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].os.as_deref(), Some("Ubuntu 22.04"));
    }

    #[test]
    fn test_hosts_without_identity_share_one_row() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 100);

        store
            .upsert(&[host(None, None, "Linux"), host(None, None, "Windows")])
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.host_count, 1);
        assert_eq!(stats.identityless_count, 1);
        assert_eq!(store.all_hosts().unwrap()[0].os.as_deref(), Some("Windows"));
    }

    #[test]
    fn test_small_batches_store_everything() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 2);
        let hosts: Vec<_> = (1..=5)
            .map(|i| host(Some(&format!("10.0.0.{}", i)), None, "Linux"))
            .collect();

        let stats = store.upsert(&hosts).unwrap();

        assert_eq!(stats.created, 5);
        assert_eq!(store.stats().unwrap().host_count, 5);
    }

    #[test]
    fn test_empty_upsert_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 100);

        assert_eq!(store.upsert(&[]).unwrap(), UpsertStats::default());
        assert!(store.all_hosts().unwrap().is_empty());
    }

    #[test]
    fn test_data_survives_close_and_reopen() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, 100);
        store
            .upsert(&[host(Some("10.0.0.1"), Some("a"), "Linux")])
            .unwrap();
        store.close();

        let reopened = open(&dir, 100);
        assert_eq!(reopened.path(), dir.path().join("hosts.sqlite"));
        assert_eq!(reopened.all_hosts().unwrap().len(), 1);
    }
}
