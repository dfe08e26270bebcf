//! Transform stage: normalization then deduplication

mod deduplication;
mod normalization;

pub use deduplication::{DedupStats, Deduplicator, IdentityKey};
pub use normalization::{detect_source, normalize_record, HostNormalizer};
