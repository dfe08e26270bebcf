use crate::config::{ApiConfig, SourceConfig};
use crate::error::{HostsyncError, Result};
use crate::fetch::{PageResponse, PageTransport};
use crate::model::{tag_record, RawRecord, SourceTag};

/// Page size of the one-shot probe issued after the exhaustion signal
pub const FALLBACK_PAGE_SIZE: usize = 1;

/// Error body fragments the API uses to say a skip/limit pair ran past the end.
/// Matched as literal, case-insensitive substrings.
const EXHAUSTION_SIGNALS: [&str; 2] = ["invalid skip/limit combo", ">number of hosts"];

/// Whether an error body is the API's pagination exhaustion signal
pub fn is_exhaustion_signal(body: &str) -> bool {
    let body = body.to_lowercase();
    EXHAUSTION_SIGNALS
        .iter()
        .any(|signal| body.contains(signal))
}

/// Position of the fetch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Requesting a normal page at `skip`
    Paging { skip: usize },
    /// Normal paging hit the exhaustion signal at `skip`; one `limit=1` request left
    ExhaustionProbe { skip: usize },
    Done,
}

/// Fetches every record of one source
pub struct FetchClient<T> {
    tag: SourceTag,
    display_name: String,
    endpoint: String,
    token_env: String,
    token: Option<String>,
    page_size: usize,
    transport: T,
}

impl<T: PageTransport> FetchClient<T> {
    /// Create a client, reading the API token from the configured environment variable
    pub fn new(api: &ApiConfig, source: &SourceConfig, transport: T) -> Self {
        let token = std::env::var(&api.token_env)
            .ok()
            .filter(|token| !token.is_empty());
        Self::with_token(api, source, transport, token)
    }

    /// Create a client with an explicit token
    pub fn with_token(
        api: &ApiConfig,
        source: &SourceConfig,
        transport: T,
        token: Option<String>,
    ) -> Self {
        Self {
            tag: source.tag,
            display_name: source.display_name.clone(),
            endpoint: source.endpoint(&api.base_url),
            token_env: api.token_env.clone(),
            token,
            page_size: api.page_size,
            transport,
        }
    }

    pub fn tag(&self) -> SourceTag {
        self.tag
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch all pages, tagging every record with this client's source
    pub async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| HostsyncError::MissingCredential {
                env_var: self.token_env.clone(),
            })?;

        tracing::info!("Starting data fetch from {}", self.display_name);

        let mut records = Vec::new();
        let mut requests = 0usize;
        let mut state = FetchState::Paging { skip: 0 };

        loop {
            state = match state {
                FetchState::Paging { skip } => {
                    requests += 1;
                    self.fetch_page(token, skip, &mut records).await?
                }
                FetchState::ExhaustionProbe { skip } => {
                    requests += 1;
                    self.probe_final_page(token, skip, &mut records).await?
                }
                FetchState::Done => break,
            };
        }

        tracing::info!(
            "Completed data fetch from {}: {} total hosts in {} requests",
            self.display_name,
            records.len(),
            requests
        );

        Ok(records)
    }

    async fn fetch_page(
        &self,
        token: &str,
        skip: usize,
        records: &mut Vec<RawRecord>,
    ) -> Result<FetchState> {
        tracing::debug!(
            "Fetching page from {} (skip={}, limit={})",
            self.tag,
            skip,
            self.page_size
        );

        let response = self.send(token, skip, self.page_size, records.len()).await?;

        if response.is_ok() {
            let page = self.decode(&response.body, records.len())?;
            let count = page.len();
            tracing::debug!("Got {} hosts from {} (skip={})", count, self.tag, skip);

            if count == 0 {
                tracing::debug!("No more hosts from {}", self.tag);
                return Ok(FetchState::Done);
            }

            self.append(page, records);

            if count < self.page_size {
                tracing::debug!(
                    "Got fewer hosts than limit ({} < {}), ending pagination",
                    count,
                    self.page_size
                );
                return Ok(FetchState::Done);
            }

            return Ok(FetchState::Paging {
                skip: skip + self.page_size,
            });
        }

        if response.is_server_error() && is_exhaustion_signal(&response.body) {
            if self.page_size > FALLBACK_PAGE_SIZE {
                tracing::debug!(
                    "API returned pagination end for {} at skip={}, probing with limit={}",
                    self.tag,
                    skip,
                    FALLBACK_PAGE_SIZE
                );
                return Ok(FetchState::ExhaustionProbe { skip });
            }

            tracing::debug!("API returned pagination end for {} at skip={}", self.tag, skip);
            return Ok(FetchState::Done);
        }

        Err(self.upstream_error(response, records.len()))
    }

    async fn probe_final_page(
        &self,
        token: &str,
        skip: usize,
        records: &mut Vec<RawRecord>,
    ) -> Result<FetchState> {
        let response = self
            .send(token, skip, FALLBACK_PAGE_SIZE, records.len())
            .await?;

        if !response.is_ok() {
            tracing::debug!(
                "Final page probe for {} returned HTTP {}, nothing to add",
                self.tag,
                response.status
            );
            return Ok(FetchState::Done);
        }

        let page = self.decode(&response.body, records.len())?;
        if page.is_empty() {
            tracing::debug!("Final page probe for {} returned no hosts", self.tag);
        } else {
            tracing::debug!("Retrieved final host from {}", self.tag);
            self.append(page, records);
        }

        Ok(FetchState::Done)
    }

    async fn send(
        &self,
        token: &str,
        skip: usize,
        limit: usize,
        fetched: usize,
    ) -> Result<PageResponse> {
        self.transport
            .post_page(&self.endpoint, token, skip, limit)
            .await
            .map_err(|e| {
                tracing::error!("Error fetching data from {}: {}", self.tag, e);
                HostsyncError::Transport {
                    source_name: self.tag.to_string(),
                    fetched,
                    message: if e.timed_out {
                        format!("request timed out: {}", e.message)
                    } else {
                        e.message
                    },
                }
            })
    }

    fn decode(&self, body: &str, fetched: usize) -> Result<Vec<RawRecord>> {
        serde_json::from_str(body).map_err(|e| HostsyncError::Decode {
            source_name: self.tag.to_string(),
            fetched,
            source: e,
        })
    }

    fn append(&self, page: Vec<RawRecord>, records: &mut Vec<RawRecord>) {
        records.extend(page.into_iter().map(|mut record| {
            tag_record(&mut record, self.tag);
            record
        }));
    }

    fn upstream_error(&self, response: PageResponse, fetched: usize) -> HostsyncError {
        tracing::error!(
            "API error from {}: {} - {}",
            self.tag,
            response.status,
            response.body
        );
        HostsyncError::Upstream {
            source_name: self.tag.to_string(),
            status: response.status,
            body: response.body,
            fetched,
        }
    }
}
