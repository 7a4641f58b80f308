//! One collection cycle against a Tdarr server.
//!
//! A cycle walks `FetchAggregate -> ParseScores -> (LegacyParse | CacheCheck
//! -> FanOut) -> FetchNodes -> AssembleMetrics`. Failures in the aggregate
//! fetch, score parsing, node fetch or metric assembly abort the cycle and
//! yield a snapshot holding only the collector error. Failures of a single
//! library fetch or a single resource value only drop that data point.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::cache::{CacheEntry, StatsCache};
use crate::client::{RequestClient, RoundTrip, DEFAULT_BACKOFF};
use crate::error::TdarrError;
use crate::fanout;
use crate::metrics::{Scores, Snapshot};
use crate::tdarr::models::{Envelope, PieRequest, PieStat, PieStatsResponse, StatsRequest};
use crate::tdarr::normalizer::{self, WireShape};
use crate::tdarr::{AggregateStats, GroupInfo, GroupStat, NodeInventory, ALL_LIBRARIES_NAME};

pub const DEFAULT_METRICS_PATH: &str = "/api/v2/cruddb";
pub const DEFAULT_NODE_PATH: &str = "/api/v2/get-nodes";
pub const DEFAULT_PIES_PATH: &str = "/api/v2/stats/get-pies";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Everything the collector needs to reach one Tdarr server.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub base_url: Url,
    /// Value of the `tdarr_instance` label.
    pub instance: String,
    pub api_key: Option<String>,
    pub verify_ssl: bool,
    pub http_timeout: Duration,
    pub metrics_path: String,
    pub node_path: String,
    pub pies_path: String,
    pub max_concurrency: usize,
    pub retry_backoff: Vec<Duration>,
}

impl CollectorConfig {
    /// Defaults for every field except the server URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            instance: base_url.to_string(),
            base_url,
            api_key: None,
            verify_ssl: true,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            node_path: DEFAULT_NODE_PATH.to_string(),
            pies_path: DEFAULT_PIES_PATH.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry_backoff: DEFAULT_BACKOFF.to_vec(),
        }
    }
}

/// Position in the collection cycle, used for logging and abort reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    FetchAggregate,
    ParseScores,
    LegacyParse,
    CacheCheck,
    FanOut,
    FetchNodes,
    AssembleMetrics,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::FetchAggregate => "fetch_aggregate",
            CycleStage::ParseScores => "parse_scores",
            CycleStage::LegacyParse => "legacy_parse",
            CycleStage::CacheCheck => "cache_check",
            CycleStage::FanOut => "fan_out",
            CycleStage::FetchNodes => "fetch_nodes",
            CycleStage::AssembleMetrics => "assemble_metrics",
        };
        f.write_str(name)
    }
}

/// Which library path a cycle took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibrarySource {
    #[default]
    None,
    Legacy,
    Cache,
    FanOut,
}

/// Summary of one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub aborted_at: Option<CycleStage>,
    pub library_source: LibrarySource,
    pub libraries: usize,
    /// Jobs handed to the fan-out pool.
    pub library_fetches: usize,
    pub failed_library_fetches: usize,
    pub shape_errors: usize,
    pub nodes: usize,
    pub workers: usize,
}

struct Aborted {
    stage: CycleStage,
    reason: String,
}

impl Aborted {
    fn at(stage: CycleStage, error: impl fmt::Display) -> Self {
        Self {
            stage,
            reason: error.to_string(),
        }
    }
}

/// Produces metric snapshots for one Tdarr server.
pub struct TdarrCollector<T = reqwest::Client> {
    client: Arc<RequestClient<T>>,
    cache: Arc<StatsCache>,
    instance: String,
    metrics_path: String,
    node_path: String,
    pies_path: String,
    max_concurrency: usize,
}

impl TdarrCollector<reqwest::Client> {
    pub fn new(config: CollectorConfig, cache: Arc<StatsCache>) -> Result<Self, TdarrError> {
        let client = RequestClient::build(
            config.base_url.clone(),
            config.api_key.clone(),
            config.verify_ssl,
            config.http_timeout,
            config.retry_backoff.clone(),
        )?;
        Ok(Self::with_client(client, config, cache))
    }
}

impl<T: RoundTrip + 'static> TdarrCollector<T> {
    pub fn with_client(
        client: RequestClient<T>,
        config: CollectorConfig,
        cache: Arc<StatsCache>,
    ) -> Self {
        Self {
            client: Arc::new(client),
            cache,
            instance: config.instance,
            metrics_path: config.metrics_path,
            node_path: config.node_path,
            pies_path: config.pies_path,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn cache(&self) -> &Arc<StatsCache> {
        &self.cache
    }

    /// Runs one full cycle.
    pub async fn collect(&self) -> Snapshot {
        self.collect_with_report().await.0
    }

    /// Runs one full cycle and reports what it did.
    #[instrument(skip(self), fields(instance = %self.instance))]
    pub async fn collect_with_report(&self) -> (Snapshot, CycleReport) {
        let mut report = CycleReport::default();
        match self.run_cycle(&mut report).await {
            Ok(snapshot) => {
                info!(
                    libraries = report.libraries,
                    nodes = report.nodes,
                    workers = report.workers,
                    "Collection cycle complete"
                );
                (snapshot, report)
            }
            Err(aborted) => {
                error!(stage = %aborted.stage, error = %aborted.reason, "Collection cycle aborted");
                report.aborted_at = Some(aborted.stage);
                (Snapshot::aborted(&self.instance, &aborted.reason), report)
            }
        }
    }

    async fn run_cycle(&self, report: &mut CycleReport) -> Result<Snapshot, Aborted> {
        debug!(stage = %CycleStage::FetchAggregate, "Fetching server statistics");
        let mut stats: AggregateStats = self
            .client
            .post(&self.metrics_path, &Envelope::new(StatsRequest::statistics()))
            .await
            .map_err(|e| Aborted::at(CycleStage::FetchAggregate, e))?;

        let scores = parse_scores(&stats).map_err(|e| Aborted::at(CycleStage::ParseScores, e))?;

        let groups = match WireShape::resolve(stats.pies.take()) {
            WireShape::Legacy(rows) => {
                debug!(stage = %CycleStage::LegacyParse, rows = rows.len(), "Parsing legacy pie rows");
                let parsed = normalizer::parse_legacy(&rows);
                report.library_source = LibrarySource::Legacy;
                report.shape_errors = parsed.shape_errors.len();
                parsed.stats
            }
            WireShape::Keyed => self.keyed_groups(report).await,
        };
        report.libraries = groups.len();

        debug!(stage = %CycleStage::FetchNodes, "Fetching node inventory");
        let nodes: NodeInventory = self
            .client
            .get(&self.node_path, &[])
            .await
            .map_err(|e| Aborted::at(CycleStage::FetchNodes, e))?;
        report.nodes = nodes.len();
        report.workers = nodes.values().map(|node| node.workers.len()).sum();

        debug!(stage = %CycleStage::AssembleMetrics, "Assembling metrics");
        Snapshot::assemble(&self.instance, &stats, scores, &groups, &nodes)
            .map_err(|e| Aborted::at(CycleStage::AssembleMetrics, e))
    }

    /// Library stats from the cache when the all-libraries file count is
    /// unchanged, otherwise from a fresh fan-out.
    async fn keyed_groups(&self, report: &mut CycleReport) -> Vec<GroupStat> {
        debug!(stage = %CycleStage::CacheCheck, "Checking all-libraries file count");
        let observed = match fetch_pie_stat(&self.client, &self.pies_path, "").await {
            Ok(stat) => Some(stat.total_files as i64),
            Err(e) => {
                warn!(error = %e, "Failed to fetch all-libraries totals, treating cache as stale");
                None
            }
        };
        if let Some(total_files) = observed {
            if let Some(cached) = self.cache.lookup(total_files).await {
                debug!(total_files, libraries = cached.len(), "Library stats cache hit");
                report.library_source = LibrarySource::Cache;
                return cached;
            }
        }

        let inventory: Vec<GroupInfo> = match self
            .client
            .post(
                &self.metrics_path,
                &Envelope::new(StatsRequest::library_inventory()),
            )
            .await
        {
            Ok(inventory) => inventory,
            Err(e) => {
                error!(error = %e, "Failed to fetch library inventory, skipping library metrics");
                return Vec::new();
            }
        };

        let mut jobs = inventory;
        jobs.push(GroupInfo {
            group_id: String::new(),
            group_name: ALL_LIBRARIES_NAME.to_string(),
        });
        report.library_fetches = jobs.len();
        report.library_source = LibrarySource::FanOut;

        debug!(
            stage = %CycleStage::FanOut,
            jobs = jobs.len(),
            max_concurrency = self.max_concurrency,
            "Fetching per-library stats"
        );
        let client = Arc::clone(&self.client);
        let path = self.pies_path.clone();
        let result = fanout::run(jobs, self.max_concurrency, move |info: GroupInfo| {
            let client = Arc::clone(&client);
            let path = path.clone();
            async move {
                let stat = fetch_pie_stat(&client, &path, &info.group_id).await?;
                Ok(normalizer::from_pie_stat(&info, stat))
            }
        })
        .await;
        report.failed_library_fetches = result.failures;

        if result.is_complete() {
            let total_files = observed.or_else(|| {
                result
                    .stats
                    .iter()
                    .find(|stat| stat.group_id == normalizer::ALL_LIBRARIES_ID)
                    .map(|stat| stat.total_files as i64)
            });
            if let Some(total_files) = total_files {
                self.cache
                    .write(CacheEntry {
                        total_files,
                        group_stats: result.stats.clone(),
                    })
                    .await;
                debug!(total_files, "Library stats cache updated");
            }
        } else {
            warn!(
                failures = result.failures,
                "Incomplete library fan-out, cache left unchanged"
            );
        }
        result.stats
    }
}

fn parse_scores(stats: &AggregateStats) -> Result<Scores, TdarrError> {
    let tdarr_score = TdarrError::parse_f64("tdarrScore", &stats.tdarr_score).inspect_err(|e| {
        error!(tdarr_score = %stats.tdarr_score, error = %e, "Failed to convert tdarr score to float");
    })?;
    let health_check_score = TdarrError::parse_f64("healthCheckScore", &stats.health_check_score)
        .inspect_err(|e| {
            error!(health_check_score = %stats.health_check_score, error = %e, "Failed to convert health check score to float");
        })?;
    Ok(Scores {
        tdarr_score,
        health_check_score,
    })
}

async fn fetch_pie_stat<T: RoundTrip>(
    client: &RequestClient<T>,
    path: &str,
    library_id: &str,
) -> Result<PieStat, TdarrError> {
    let request = Envelope::new(PieRequest {
        library_id: library_id.to_string(),
    });
    let response: PieStatsResponse = client.post(path, &request).await?;
    Ok(response.pie_stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_config_defaults() {
        let config = CollectorConfig::new(Url::parse("http://tdarr.local:8265").unwrap());
        assert_eq!(config.metrics_path, "/api/v2/cruddb");
        assert_eq!(config.node_path, "/api/v2/get-nodes");
        assert_eq!(config.pies_path, "/api/v2/stats/get-pies");
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.retry_backoff, DEFAULT_BACKOFF.to_vec());
        assert!(config.verify_ssl);
    }

    #[test]
    fn test_parse_scores() {
        let stats = AggregateStats {
            tdarr_score: "57.3".into(),
            health_check_score: " 100 ".into(),
            ..Default::default()
        };
        let scores = parse_scores(&stats).unwrap();
        assert_eq!(scores.tdarr_score, 57.3);
        assert_eq!(scores.health_check_score, 100.0);

        let stats = AggregateStats {
            tdarr_score: "n/a".into(),
            health_check_score: "1".into(),
            ..Default::default()
        };
        assert!(matches!(
            parse_scores(&stats),
            Err(TdarrError::Parse { field: "tdarrScore", .. })
        ));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(CycleStage::ParseScores.to_string(), "parse_scores");
        assert_eq!(CycleStage::FetchNodes.to_string(), "fetch_nodes");
    }
}
