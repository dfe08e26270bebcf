//! Paginated fetch of host records from the upstream sources
//!
//! The upstream API pages with `skip`/`limit` query parameters. Past the last
//! valid page with an even page size it answers with a server error instead
//! of an empty page; [`FetchClient`] recognizes that signal and recovers the
//! final record with a single `limit=1` probe.

mod client;
mod http;

pub use client::{is_exhaustion_signal, FetchClient, FetchState, FALLBACK_PAGE_SIZE};
pub use http::HttpTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Status and body of one page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Server-internal-error class
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// A request that never produced an HTTP response
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct TransportFailure {
    pub message: String,
    pub timed_out: bool,
}

impl TransportFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }
}

/// Issues a single page request against an endpoint
#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn post_page(
        &self,
        endpoint: &str,
        token: &str,
        skip: usize,
        limit: usize,
    ) -> std::result::Result<PageResponse, TransportFailure>;
}
