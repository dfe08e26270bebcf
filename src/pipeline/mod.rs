//! Host processing pipeline
//!
//! Extract → Transform → Load → Visualize, strictly in sequence. Sources are
//! fetched one after another in configuration order, so the concatenated
//! record list is source-major before it reaches the normalizer.

use crate::error::{HostsyncError, Phase, Result};
use crate::fetch::{FetchClient, PageTransport};
use crate::model::{NormalizedHost, RawRecord, SourceTag};
use crate::processing::{DedupStats, Deduplicator, HostNormalizer};
use crate::report::{ChartRenderer, HostSummary};
use crate::storage::{HostSink, UpsertStats};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// What a successful run did
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Records fetched per source, in fetch order
    pub fetched: Vec<(SourceTag, usize)>,
    pub normalized: usize,
    pub dedup: DedupStats,
    pub upsert: UpsertStats,
    pub summary: Option<HostSummary>,
    pub charts: Vec<PathBuf>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn total_fetched(&self) -> usize {
        self.fetched.iter().map(|(_, count)| count).sum()
    }

    pub fn unique(&self) -> usize {
        self.dedup.kept
    }
}

/// Wires the fetch clients, processors, sink and chart renderer together
pub struct HostPipeline<'a, T, S> {
    fetchers: Vec<FetchClient<T>>,
    normalizer: HostNormalizer,
    deduplicator: Deduplicator,
    sink: &'a S,
    renderer: Option<ChartRenderer>,
    stale_after_days: i64,
}

impl<'a, T, S> HostPipeline<'a, T, S>
where
    T: PageTransport,
    S: HostSink,
{
    pub fn new(fetchers: Vec<FetchClient<T>>, sink: &'a S) -> Self {
        Self {
            fetchers,
            normalizer: HostNormalizer::new(),
            deduplicator: Deduplicator::new(),
            sink,
            renderer: None,
            stale_after_days: 30,
        }
    }

    /// Render charts from the persisted host set after loading
    pub fn with_renderer(mut self, renderer: ChartRenderer, stale_after_days: i64) -> Self {
        self.renderer = Some(renderer);
        self.stale_after_days = stale_after_days;
        self
    }

    /// Execute the complete pipeline. Any failure aborts the run.
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!("Starting host processing pipeline (run {})", run_id);

        tracing::info!("[EXTRACT] Fetching data from all sources");
        let (records, fetched) = self.extract().await?;
        tracing::info!("[EXTRACT] Completed - {} hosts fetched", records.len());

        tracing::info!("[TRANSFORM] Normalizing and deduplicating hosts");
        let (unique, normalized, dedup) = self.transform(records);
        tracing::info!("[TRANSFORM] Completed - {} unique hosts", unique.len());

        tracing::info!("[LOAD] Storing hosts");
        let upsert = self.sink.upsert(&unique).map_err(|e| HostsyncError::Phase {
            phase: Phase::Load,
            accumulated: unique.len(),
            source: Box::new(e),
        })?;
        tracing::info!("[LOAD] Completed - {} hosts written", upsert.written());

        let (summary, charts) = match &self.renderer {
            Some(renderer) => {
                tracing::info!("[VISUALIZE] Generating charts and statistics");
                let (summary, charts) =
                    self.visualize(renderer).map_err(|e| HostsyncError::Phase {
                        phase: Phase::Visualize,
                        accumulated: unique.len(),
                        source: Box::new(e),
                    })?;
                tracing::info!("[VISUALIZE] Completed - {} files written", charts.len());
                (Some(summary), charts)
            }
            None => (None, Vec::new()),
        };

        let elapsed = started.elapsed();
        tracing::info!(
            "Pipeline completed successfully in {:.2}s (run {})",
            elapsed.as_secs_f64(),
            run_id
        );

        Ok(RunReport {
            run_id,
            fetched,
            normalized,
            dedup,
            upsert,
            summary,
            charts,
            elapsed,
        })
    }

    /// Fetch every source in order and concatenate the results
    async fn extract(&self) -> Result<(Vec<RawRecord>, Vec<(SourceTag, usize)>)> {
        let mut all = Vec::new();
        let mut fetched = Vec::with_capacity(self.fetchers.len());

        for fetcher in &self.fetchers {
            tracing::info!("Fetching data from {}", fetcher.display_name());
            tracing::debug!("Endpoint: {}", fetcher.endpoint());
            let records = fetcher.fetch().await.map_err(|e| HostsyncError::Phase {
                phase: Phase::Extract,
                accumulated: all.len() + fetched_before_failure(&e),
                source: Box::new(e),
            })?;
            tracing::debug!("Fetched {} hosts from {}", records.len(), fetcher.display_name());
            fetched.push((fetcher.tag(), records.len()));
            all.extend(records);
        }

        Ok((all, fetched))
    }

    fn transform(&self, records: Vec<RawRecord>) -> (Vec<NormalizedHost>, usize, DedupStats) {
        tracing::info!("Normalizing host data");
        let normalized = self.normalizer.process(records);
        let count = normalized.len();

        tracing::info!("Deduplicating hosts");
        let (unique, stats) = self.deduplicator.process_with_stats(normalized);
        (unique, count, stats)
    }

    fn visualize(&self, renderer: &ChartRenderer) -> Result<(HostSummary, Vec<PathBuf>)> {
        let hosts = self.sink.all_hosts()?;
        let summary =
            HostSummary::from_hosts(&hosts, chrono::Utc::now(), self.stale_after_days)?;
        tracing::info!(
            "Generated stats: {} hosts, {} old, {} recent",
            summary.total_hosts,
            summary.old_hosts,
            summary.recent_hosts
        );
        let charts = renderer.render(&summary)?;
        Ok((summary, charts))
    }
}

fn fetched_before_failure(err: &HostsyncError) -> usize {
    match err {
        HostsyncError::Transport { fetched, .. }
        | HostsyncError::Upstream { fetched, .. }
        | HostsyncError::Decode { fetched, .. } => *fetched,
        _ => 0,
    }
}
