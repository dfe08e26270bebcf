//! hostsync - host inventory ETL
//!
//! Pulls host records from the Qualys and CrowdStrike inventory APIs,
//! normalizes them into one shape, drops duplicates, upserts the result into
//! a local SQLite store and renders summary charts.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod pipeline;
pub mod processing;
pub mod report;
pub mod storage;

pub use error::{HostsyncError, Result};
