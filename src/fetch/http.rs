use crate::config::ApiConfig;
use crate::error::{HostsyncError, Result};
use crate::fetch::{PageResponse, PageTransport, TransportFailure};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;

/// reqwest-backed transport: empty-body POST with `skip`/`limit` query params
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    token_header: HeaderName,
}

impl HttpTransport {
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| HostsyncError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let token_header = HeaderName::from_bytes(api.token_header.as_bytes()).map_err(|e| {
            HostsyncError::InvalidConfigValue {
                path: "api.token_header".to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            client,
            token_header,
        })
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    async fn post_page(
        &self,
        endpoint: &str,
        token: &str,
        skip: usize,
        limit: usize,
    ) -> std::result::Result<PageResponse, TransportFailure> {
        let token = HeaderValue::from_str(token)
            .map_err(|e| TransportFailure::new(format!("invalid token header value: {}", e)))?;

        let response = self
            .client
            .post(endpoint)
            .query(&[("skip", skip), ("limit", limit)])
            .header(self.token_header.clone(), token)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .body("")
            .send()
            .await
            .map_err(to_failure)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(to_failure)?;

        Ok(PageResponse { status, body })
    }
}

fn to_failure(e: reqwest::Error) -> TransportFailure {
    TransportFailure {
        timed_out: e.is_timeout(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_rejects_invalid_header_name() {
        let mut api = Config::default().api;
        api.token_header = "bad header".to_string();
        assert!(HttpTransport::new(&api).is_err());
    }

    #[test]
    fn test_builds_from_default_config() {
        let api = Config::default().api;
        assert!(HttpTransport::new(&api).is_ok());
    }
}
