//! In-process stand-in for the host inventory API
#![allow(dead_code)]

use async_trait::async_trait;
use hostsync::config::{ApiConfig, Config, SourceConfig};
use hostsync::fetch::{FetchClient, PageResponse, PageTransport, TransportFailure};
use hostsync::model::SourceTag;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "test-token";

/// Serves fixed host lists per endpoint and reproduces the API's paging quirk:
/// a `limit > 1` page that runs past the end of the data is answered with a
/// 500 instead of a short page.
#[derive(Clone, Default)]
pub struct FakeApi {
    hosts: Arc<HashMap<String, Vec<Value>>>,
    failures: Arc<HashMap<String, PageResponse>>,
    calls: Arc<Mutex<Vec<(String, usize, usize)>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts(mut self, endpoint: &str, hosts: Vec<Value>) -> Self {
        Arc::make_mut(&mut self.hosts).insert(endpoint.to_string(), hosts);
        self
    }

    /// Answer every request to `endpoint` past its data with `response`
    pub fn failing_with(mut self, endpoint: &str, response: PageResponse) -> Self {
        Arc::make_mut(&mut self.failures).insert(endpoint.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<(String, usize, usize)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<(usize, usize)> {
        self.calls()
            .into_iter()
            .filter(|(e, _, _)| e == endpoint)
            .map(|(_, skip, limit)| (skip, limit))
            .collect()
    }
}

#[async_trait]
impl PageTransport for FakeApi {
    async fn post_page(
        &self,
        endpoint: &str,
        token: &str,
        skip: usize,
        limit: usize,
    ) -> Result<PageResponse, TransportFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), skip, limit));

        if token != TOKEN {
            return Ok(PageResponse::new(401, "unauthorized"));
        }

        let Some(hosts) = self.hosts.get(endpoint) else {
            return Err(TransportFailure::new(format!("connection refused: {}", endpoint)));
        };

        let total = hosts.len();
        if skip + limit > total && (limit > 1 || skip >= total) {
            if let Some(failure) = self.failures.get(endpoint) {
                return Ok(failure.clone());
            }
        }
        if limit > 1 && skip + limit > total {
            let body = if skip >= total {
                r#"{"detail": "Invalid skip/limit combo"}"#.to_string()
            } else {
                format!(r#"{{"detail": "skip+limit >number of hosts ({})"}}"#, total)
            };
            return Ok(PageResponse::new(500, body));
        }

        let page: Vec<Value> = hosts.iter().skip(skip).take(limit).cloned().collect();
        Ok(PageResponse::new(200, serde_json::to_string(&page).unwrap()))
    }
}

pub fn endpoint(config: &Config, tag: SourceTag) -> String {
    config.source(tag).unwrap().endpoint(&config.api.base_url)
}

pub fn client(api: &ApiConfig, source: &SourceConfig, transport: FakeApi) -> FetchClient<FakeApi> {
    FetchClient::with_token(api, source, transport, Some(TOKEN.to_string()))
}

pub fn clients(config: &Config, transport: &FakeApi) -> Vec<FetchClient<FakeApi>> {
    config
        .enabled_sources()
        .map(|source| client(&config.api, source, transport.clone()))
        .collect()
}

pub fn qualys_hosts(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            serde_json::json!({
                "id": i,
                "name": format!("q-host-{}", i),
                "address": format!("10.0.0.{}", i),
                "os": "Windows Server 2019",
                "modified": "2024-01-15T10:00:00",
            })
        })
        .collect()
}

pub fn crowdstrike_hosts(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            serde_json::json!({
                "device_id": format!("cs-{}", i),
                "hostname": format!("cs-host-{}", i),
                "local_ip": format!("10.1.0.{}", i),
                "platform_name": "Linux",
                "last_seen": "2024-02-01T08:30:00Z",
            })
        })
        .collect()
}
