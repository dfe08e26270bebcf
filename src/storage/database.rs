//! SQLite database management with migrations

use crate::error::{HostsyncError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database file and bring its schema up to date
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HostsyncError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        // The pipeline is sequential; a small pool is plenty.
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| HostsyncError::Pool(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };

        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| HostsyncError::Pool(format!("Failed to get connection: {}", e)))
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let host_count: i64 = conn.query_row("SELECT COUNT(*) FROM hosts", [], |row| row.get(0))?;

        let identityless_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM hosts WHERE ip_key = '' AND hostname_key = ''",
            [],
            |row| row.get(0),
        )?;

        Ok(DbStats {
            host_count: host_count as usize,
            identityless_count: identityless_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub host_count: usize,
    pub identityless_count: usize,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: hosts keyed by (ip, hostname). Absent values are stored
    // as '' in the key columns so that hosts missing them still upsert onto
    // one row.
    r#"
    CREATE TABLE hosts (
        ip_key TEXT NOT NULL,
        hostname_key TEXT NOT NULL,
        ip TEXT,
        hostname TEXT,
        source TEXT,
        os TEXT,
        last_seen TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (ip_key, hostname_key)
    );

    CREATE INDEX idx_hosts_source ON hosts(source);
    CREATE INDEX idx_hosts_last_seen ON hosts(last_seen);
    "#,
];
