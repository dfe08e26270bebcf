mod common;

use common::{clients, crowdstrike_hosts, endpoint, qualys_hosts, FakeApi};
use hostsync::config::Config;
use hostsync::error::Phase;
use hostsync::fetch::{FetchClient, PageResponse};
use hostsync::model::{NormalizedHost, SourceTag};
use hostsync::pipeline::HostPipeline;
use hostsync::report::{ChartRenderer, HostSummary, FRESHNESS_CHART, OS_CHART, SOURCE_CHART, SUMMARY_FILE};
use hostsync::storage::{HostSink, SqliteHostStore, UpsertStats};
use hostsync::HostsyncError;
use serde_json::json;
use tempfile::TempDir;

fn fake_api(config: &Config) -> FakeApi {
    // The last CrowdStrike host is the same machine as the first Qualys host
    let mut crowdstrike = crowdstrike_hosts(2);
    crowdstrike.push(json!({
        "device_id": "cs-dup",
        "hostname": "q-host-0",
        "local_ip": "10.0.0.0",
        "platform_name": "Windows",
        "last_seen": "2024-03-01T00:00:00Z",
    }));

    FakeApi::new()
        .with_hosts(&endpoint(config, SourceTag::Qualys), qualys_hosts(3))
        .with_hosts(&endpoint(config, SourceTag::Crowdstrike), crowdstrike)
}

#[tokio::test]
async fn test_full_pipeline_run() {
    let temp = TempDir::new().unwrap();
    let config = Config::default();
    let api = fake_api(&config);
    let store = SqliteHostStore::open(&temp.path().join("hosts.sqlite"), 2).unwrap();
    let charts_dir = temp.path().join("charts");

    let report = HostPipeline::new(clients(&config, &api), &store)
        .with_renderer(ChartRenderer::new(&charts_dir, 30), 30)
        .run()
        .await
        .unwrap();

    assert_eq!(
        report.fetched,
        vec![(SourceTag::Qualys, 3), (SourceTag::Crowdstrike, 3)]
    );
    assert_eq!(report.total_fetched(), 6);
    assert_eq!(report.normalized, 6);
    assert_eq!(report.unique(), 5);
    assert_eq!(report.dedup.duplicates, 1);
    assert_eq!(
        report.upsert,
        UpsertStats {
            created: 5,
            updated: 0,
            unchanged: 0
        }
    );

    // First occurrence wins: the Qualys record survives
    let hosts = store.all_hosts().unwrap();
    assert_eq!(hosts.len(), 5);
    let shared = hosts
        .iter()
        .find(|h| h.hostname.as_deref() == Some("q-host-0"))
        .unwrap();
    assert_eq!(shared.source, Some(SourceTag::Qualys));
    assert_eq!(shared.os.as_deref(), Some("Windows Server 2019"));

    let summary = report.summary.unwrap();
    assert_eq!(summary.total_hosts, 5);
    assert_eq!(summary.by_source["qualys"], 3);
    assert_eq!(summary.by_source["crowdstrike"], 2);
    assert_eq!(summary.old_hosts + summary.recent_hosts, 5);

    for name in [OS_CHART, FRESHNESS_CHART, SOURCE_CHART, SUMMARY_FILE] {
        assert!(charts_dir.join(name).exists(), "{} should exist", name);
    }
    let written: HostSummary =
        serde_json::from_str(&std::fs::read_to_string(charts_dir.join(SUMMARY_FILE)).unwrap())
            .unwrap();
    assert_eq!(written, summary);
}

#[tokio::test]
async fn test_second_run_leaves_store_unchanged() {
    let temp = TempDir::new().unwrap();
    let config = Config::default();
    let api = fake_api(&config);
    let store = SqliteHostStore::open(&temp.path().join("hosts.sqlite"), 100).unwrap();

    HostPipeline::new(clients(&config, &api), &store)
        .run()
        .await
        .unwrap();
    let report = HostPipeline::new(clients(&config, &api), &store)
        .run()
        .await
        .unwrap();

    assert_eq!(report.upsert.created, 0);
    assert_eq!(report.upsert.unchanged, 5);
    assert!(report.summary.is_none());
    assert!(report.charts.is_empty());
    assert_eq!(store.stats().unwrap().host_count, 5);
}

#[tokio::test]
async fn test_upstream_failure_reports_extract_phase_and_progress() {
    let temp = TempDir::new().unwrap();
    let config = Config::default();
    let crowdstrike = endpoint(&config, SourceTag::Crowdstrike);
    let api = fake_api(&config).failing_with(&crowdstrike, PageResponse::new(500, "boom"));
    let store = SqliteHostStore::open(&temp.path().join("hosts.sqlite"), 100).unwrap();

    let err = HostPipeline::new(clients(&config, &api), &store)
        .run()
        .await
        .unwrap_err();

    match &err {
        HostsyncError::Phase {
            phase, accumulated, ..
        } => {
            assert_eq!(*phase, Phase::Extract);
            // 3 Qualys records plus the first full CrowdStrike page
            assert_eq!(*accumulated, 5);
        }
        other => panic!("expected phase error, got {:?}", other),
    }
    assert!(err.is_upstream_error());
    assert!(err.to_string().contains("extract"));

    // Nothing is loaded from a failed run
    assert!(store.all_hosts().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_credential_aborts_before_any_request() {
    let temp = TempDir::new().unwrap();
    let config = Config::default();
    let api = fake_api(&config);
    let store = SqliteHostStore::open(&temp.path().join("hosts.sqlite"), 100).unwrap();
    let fetchers = config
        .enabled_sources()
        .map(|source| FetchClient::with_token(&config.api, source, api.clone(), None))
        .collect();

    let err = HostPipeline::new(fetchers, &store).run().await.unwrap_err();

    assert!(err.is_config_error());
    assert!(matches!(
        err,
        HostsyncError::Phase {
            phase: Phase::Extract,
            accumulated: 0,
            ..
        }
    ));
    assert!(api.calls().is_empty());
}

struct BrokenSink;

impl HostSink for BrokenSink {
    fn upsert(&self, _hosts: &[NormalizedHost]) -> hostsync::Result<UpsertStats> {
        Err(HostsyncError::Pool("database is gone".to_string()))
    }

    fn all_hosts(&self) -> hostsync::Result<Vec<NormalizedHost>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_sink_failure_reports_load_phase() {
    let config = Config::default();
    let api = fake_api(&config);

    let err = HostPipeline::new(clients(&config, &api), &BrokenSink)
        .run()
        .await
        .unwrap_err();

    match err {
        HostsyncError::Phase {
            phase,
            accumulated,
            source,
        } => {
            assert_eq!(phase, Phase::Load);
            assert_eq!(accumulated, 5);
            assert!(matches!(*source, HostsyncError::Pool(_)));
        }
        other => panic!("expected phase error, got {:?}", other),
    }
}
