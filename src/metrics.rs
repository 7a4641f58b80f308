//! Prometheus metric families exported for one Tdarr instance.
//!
//! Every collection cycle builds its own [`Registry`] so that concurrent
//! scrapes never observe each other's label sets. All families carry the
//! constant `tdarr_instance` label.

use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::error::TdarrError;
use crate::tdarr::normalizer::{breakdown_label, clean_transcode_status};
use crate::tdarr::{AggregateStats, GroupStat, NodeInventory, NodeSnapshot, PieSlice, WorkerSnapshot};

pub const METRIC_PREFIX: &str = "tdarr";
pub const INSTANCE_LABEL: &str = "tdarr_instance";

const LIBRARY_LABELS: [&str; 2] = ["library_name", "library_id"];
const NODE_LABELS: [&str; 2] = ["node_id", "node_name"];

/// Stable identity of a worker for its numeric progress series.
const WORKER_GAUGE_LABELS: [&str; 4] = ["node_id", "node_name", "worker_id", "worker_type"];

const NODE_INFO_LABELS: [&str; 14] = [
    "node_id",
    "node_name",
    "gpu_select",
    "node_priority",
    "node_pid",
    "node_paused",
    "node_gpu_health_check_limit",
    "node_cpu_health_check_limit",
    "node_gpu_transcode_limit",
    "node_cpu_transcode_limit",
    "node_health_check_gpu_queue",
    "node_health_check_cpu_queue",
    "node_transcode_gpu_queue",
    "node_transcode_cpu_queue",
];

const WORKER_FLOW_LABELS: [&str; 18] = [
    "node_id",
    "node_name",
    "worker_id",
    "worker_type",
    "worker_status",
    "worker_status_ts",
    "worker_idle",
    "worker_file",
    "worker_original_file_size_gb",
    "worker_fps",
    "worker_eta",
    "worker_percentage",
    "worker_connected",
    "worker_pid",
    "worker_job_start_ts",
    "worker_job_process_start_ts",
    "worker_output_size_gb",
    "worker_est_size_gb",
];

const WORKER_LABELS: [&str; 20] = [
    "node_id",
    "node_name",
    "worker_id",
    "worker_type",
    "worker_status",
    "worker_status_ts",
    "worker_idle",
    "worker_file",
    "worker_original_file_size_gb",
    "worker_fps",
    "worker_eta",
    "worker_percentage",
    "worker_connected",
    "worker_pid",
    "worker_job_start_ts",
    "worker_job_process_start_ts",
    "worker_plugin_id",
    "worker_plugin_position",
    "worker_output_size_gb",
    "worker_est_size_gb",
];

/// Parsed headline scores of the statistics document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub tdarr_score: f64,
    pub health_check_score: f64,
}

fn opts(name: &str, help: &str, instance: &str) -> Opts {
    Opts::new(format!("{METRIC_PREFIX}_{name}"), help).const_label(INSTANCE_LABEL, instance)
}

/// All families of a successful cycle.
#[derive(Clone)]
pub struct TdarrMetrics {
    // ========== Server Aggregate ==========
    pub files_total: Gauge,
    pub transcodes_total: Gauge,
    pub health_checks_total: Gauge,
    pub size_diff_gb: Gauge,
    pub score_pct: Gauge,
    pub health_check_score_pct: Gauge,
    pub avg_num_streams: Gauge,
    pub stream_stats_duration: GaugeVec, // labels: stat_type
    pub stream_stats_bit_rate: GaugeVec, // labels: stat_type
    pub stream_stats_num_frames: GaugeVec, // labels: stat_type

    // ========== Library ==========
    pub library_files_total: GaugeVec,
    pub library_transcodes_total: GaugeVec,
    pub library_health_checks_total: GaugeVec,
    pub library_size_diff_gb: GaugeVec,
    pub library_transcodes: GaugeVec,        // + status
    pub library_health_checks: GaugeVec,     // + status
    pub library_video_codecs: GaugeVec,      // + codec
    pub library_video_containers: GaugeVec,  // + container_type
    pub library_video_resolutions: GaugeVec, // + resolution
    pub library_audio_codecs: GaugeVec,      // + codec
    pub library_audio_containers: GaugeVec,  // + container_type

    // ========== Node ==========
    pub node_info: GaugeVec,
    pub node_uptime_seconds: GaugeVec,
    pub node_heap_used_mb: GaugeVec,
    pub node_heap_total_mb: GaugeVec,
    pub node_host_cpu_percent: GaugeVec,
    pub node_host_mem_used_gb: GaugeVec,
    pub node_host_mem_total_gb: GaugeVec,
    pub node_worker_info: GaugeVec,
    pub node_worker_flow_info: GaugeVec,
    pub node_worker_fps: GaugeVec,
    pub node_worker_percentage: GaugeVec,
    pub node_worker_original_file_size_gb: GaugeVec,
    pub node_worker_output_size_gb: GaugeVec,
    pub node_worker_est_size_gb: GaugeVec,
}

impl TdarrMetrics {
    /// Creates and registers all families with `registry`.
    pub fn new(registry: &Registry, instance: &str) -> prometheus::Result<Self> {
        let gauge = |name: &str, help: &str| Gauge::with_opts(opts(name, help, instance));
        let vec = |name: &str, help: &str, labels: &[&str]| {
            GaugeVec::new(opts(name, help, instance), labels)
        };
        let library = |name: &str, help: &str, extra: Option<&str>| {
            let mut labels = LIBRARY_LABELS.to_vec();
            labels.extend(extra);
            GaugeVec::new(opts(name, help, instance), &labels)
        };
        let node = |name: &str, help: &str| GaugeVec::new(opts(name, help, instance), &NODE_LABELS);
        let worker = |name: &str, help: &str| {
            GaugeVec::new(opts(name, help, instance), &WORKER_GAUGE_LABELS)
        };

        let metrics = Self {
            files_total: gauge(
                "files_total",
                "Tdarr total file count - includes files in ignore lists within each library",
            )?,
            transcodes_total: gauge(
                "transcodes_total",
                "Tdarr total transcode count for all libraries",
            )?,
            health_checks_total: gauge(
                "health_checks_total",
                "Tdarr total health check count for all libraries",
            )?,
            size_diff_gb: gauge("size_diff_gb", "Tdarr size difference (+/-) in GB")?,
            score_pct: gauge(
                "score_pct",
                "Tdarr score percentage - how much of your library is being handled by tdarr",
            )?,
            health_check_score_pct: gauge(
                "health_check_score_pct",
                "Tdarr health check score percentage - how much of your library has been health checked",
            )?,
            avg_num_streams: gauge("avg_num_streams", "Tdarr average number of streams in video")?,
            stream_stats_duration: vec(
                "stream_stats_duration",
                "Tdarr stream stats duration",
                &["stat_type"],
            )?,
            stream_stats_bit_rate: vec(
                "stream_stats_bit_rate",
                "Tdarr stream stats bit rate",
                &["stat_type"],
            )?,
            stream_stats_num_frames: vec(
                "stream_stats_num_frames",
                "Tdarr stream stats number of frames",
                &["stat_type"],
            )?,

            library_files_total: library("library_files_total", "Tdarr total files in library", None)?,
            library_transcodes_total: library(
                "library_transcodes_total",
                "Tdarr total transcodes for library",
                None,
            )?,
            library_health_checks_total: library(
                "library_health_checks_total",
                "Tdarr total health checks for library",
                None,
            )?,
            library_size_diff_gb: library(
                "library_size_diff_gb",
                "Tdarr size difference (+/-) in GB for library",
                None,
            )?,
            library_transcodes: library(
                "library_transcodes",
                "Tdarr transcodes for library by status",
                Some("status"),
            )?,
            library_health_checks: library(
                "library_health_checks",
                "Tdarr health checks for library by status",
                Some("status"),
            )?,
            library_video_codecs: library(
                "library_video_codecs",
                "Tdarr video codecs for library by type",
                Some("codec"),
            )?,
            library_video_containers: library(
                "library_video_containers",
                "Tdarr video containers for library by type",
                Some("container_type"),
            )?,
            library_video_resolutions: library(
                "library_video_resolutions",
                "Tdarr video resolutions for library by type",
                Some("resolution"),
            )?,
            library_audio_codecs: library(
                "library_audio_codecs",
                "Tdarr audio codecs for library by type",
                Some("codec"),
            )?,
            library_audio_containers: library(
                "library_audio_containers",
                "Tdarr audio containers for library by type",
                Some("container_type"),
            )?,

            node_info: vec("node_info", "Tdarr node info", &NODE_INFO_LABELS)?,
            node_uptime_seconds: node("node_uptime_seconds", "Tdarr node uptime in seconds")?,
            node_heap_used_mb: node("node_heap_used_mb", "Tdarr node heap used in MB")?,
            node_heap_total_mb: node("node_heap_total_mb", "Tdarr node heap total in MB")?,
            node_host_cpu_percent: node("node_host_cpu_percent", "Tdarr node cpu percent used")?,
            node_host_mem_used_gb: node(
                "node_host_mem_used_gb",
                "Memory used in GB for host that Tdarr node is running on",
            )?,
            node_host_mem_total_gb: node(
                "node_host_mem_total_gb",
                "Total memory in GB for host that Tdarr node is running on",
            )?,
            node_worker_info: vec("node_worker_info", "Tdarr node worker info", &WORKER_LABELS)?,
            node_worker_flow_info: vec(
                "node_worker_flow_info",
                "Tdarr node worker flow process info",
                &WORKER_FLOW_LABELS,
            )?,
            node_worker_fps: worker("node_worker_fps", "Tdarr node worker frames per second")?,
            node_worker_percentage: worker(
                "node_worker_percentage",
                "Tdarr node worker progress percentage",
            )?,
            node_worker_original_file_size_gb: worker(
                "node_worker_original_file_size_gb",
                "Tdarr node worker original file size in GB",
            )?,
            node_worker_output_size_gb: worker(
                "node_worker_output_size_gb",
                "Tdarr node worker output file size in GB",
            )?,
            node_worker_est_size_gb: worker(
                "node_worker_est_size_gb",
                "Tdarr node worker estimated final size in GB",
            )?,
        };

        // ========== Register Server Aggregate ==========
        registry.register(Box::new(metrics.files_total.clone()))?;
        registry.register(Box::new(metrics.transcodes_total.clone()))?;
        registry.register(Box::new(metrics.health_checks_total.clone()))?;
        registry.register(Box::new(metrics.size_diff_gb.clone()))?;
        registry.register(Box::new(metrics.score_pct.clone()))?;
        registry.register(Box::new(metrics.health_check_score_pct.clone()))?;
        registry.register(Box::new(metrics.avg_num_streams.clone()))?;
        registry.register(Box::new(metrics.stream_stats_duration.clone()))?;
        registry.register(Box::new(metrics.stream_stats_bit_rate.clone()))?;
        registry.register(Box::new(metrics.stream_stats_num_frames.clone()))?;

        // ========== Register Library ==========
        registry.register(Box::new(metrics.library_files_total.clone()))?;
        registry.register(Box::new(metrics.library_transcodes_total.clone()))?;
        registry.register(Box::new(metrics.library_health_checks_total.clone()))?;
        registry.register(Box::new(metrics.library_size_diff_gb.clone()))?;
        registry.register(Box::new(metrics.library_transcodes.clone()))?;
        registry.register(Box::new(metrics.library_health_checks.clone()))?;
        registry.register(Box::new(metrics.library_video_codecs.clone()))?;
        registry.register(Box::new(metrics.library_video_containers.clone()))?;
        registry.register(Box::new(metrics.library_video_resolutions.clone()))?;
        registry.register(Box::new(metrics.library_audio_codecs.clone()))?;
        registry.register(Box::new(metrics.library_audio_containers.clone()))?;

        // ========== Register Node ==========
        registry.register(Box::new(metrics.node_info.clone()))?;
        registry.register(Box::new(metrics.node_uptime_seconds.clone()))?;
        registry.register(Box::new(metrics.node_heap_used_mb.clone()))?;
        registry.register(Box::new(metrics.node_heap_total_mb.clone()))?;
        registry.register(Box::new(metrics.node_host_cpu_percent.clone()))?;
        registry.register(Box::new(metrics.node_host_mem_used_gb.clone()))?;
        registry.register(Box::new(metrics.node_host_mem_total_gb.clone()))?;
        registry.register(Box::new(metrics.node_worker_info.clone()))?;
        registry.register(Box::new(metrics.node_worker_flow_info.clone()))?;
        registry.register(Box::new(metrics.node_worker_fps.clone()))?;
        registry.register(Box::new(metrics.node_worker_percentage.clone()))?;
        registry.register(Box::new(metrics.node_worker_original_file_size_gb.clone()))?;
        registry.register(Box::new(metrics.node_worker_output_size_gb.clone()))?;
        registry.register(Box::new(metrics.node_worker_est_size_gb.clone()))?;

        Ok(metrics)
    }

    pub fn record_aggregate(&self, stats: &AggregateStats, scores: Scores) {
        self.files_total.set(stats.total_file_count);
        self.transcodes_total.set(stats.total_transcode_count);
        self.health_checks_total.set(stats.total_health_check_count);
        self.size_diff_gb.set(stats.size_diff_gb);
        self.score_pct.set(scores.tdarr_score);
        self.health_check_score_pct.set(scores.health_check_score);
        self.avg_num_streams.set(stats.avg_num_streams);

        let streams = &stats.stream_stats;
        for (family, stat) in [
            (&self.stream_stats_duration, streams.duration),
            (&self.stream_stats_bit_rate, streams.bit_rate),
            (&self.stream_stats_num_frames, streams.num_frames),
        ] {
            family.with_label_values(&["average"]).set(stat.average);
            family.with_label_values(&["highest"]).set(stat.highest);
            family.with_label_values(&["total"]).set(stat.total);
        }
    }

    pub fn record_library(&self, stat: &GroupStat) {
        let name = stat.group_name.as_str();
        let id = stat.group_id.as_str();
        self.library_files_total
            .with_label_values(&[name, id])
            .set(stat.total_files);
        self.library_transcodes_total
            .with_label_values(&[name, id])
            .set(stat.total_transcode_count);
        self.library_health_checks_total
            .with_label_values(&[name, id])
            .set(stat.total_health_check_count);
        self.library_size_diff_gb
            .with_label_values(&[name, id])
            .set(stat.size_diff_gb);

        let breakdown = |family: &GaugeVec, slices: &[PieSlice], label: fn(&str) -> String| {
            for slice in slices {
                let value = label(&slice.name);
                family
                    .with_label_values(&[name, id, value.as_str()])
                    .set(slice.value);
            }
        };
        breakdown(&self.library_transcodes, &stat.status.transcode, clean_transcode_status);
        breakdown(&self.library_health_checks, &stat.status.health_check, breakdown_label);
        breakdown(&self.library_video_codecs, &stat.video.codecs, breakdown_label);
        breakdown(&self.library_video_containers, &stat.video.containers, breakdown_label);
        breakdown(&self.library_video_resolutions, &stat.video.resolutions, breakdown_label);
        breakdown(&self.library_audio_codecs, &stat.audio.codecs, breakdown_label);
        breakdown(&self.library_audio_containers, &stat.audio.containers, breakdown_label);
    }

    pub fn record_node(&self, node: &NodeSnapshot) {
        let limits = &node.worker_limits;
        let queues = &node.queue_lengths;
        let info = [
            node.id.clone(),
            node.name.clone(),
            node.gpu_select.clone(),
            node.priority.to_string(),
            node.config.pid.to_string(),
            node.paused.to_string(),
            limits.health_check_gpu.to_string(),
            limits.health_check_cpu.to_string(),
            limits.transcode_gpu.to_string(),
            limits.transcode_cpu.to_string(),
            queues.health_check_gpu.to_string(),
            queues.health_check_cpu.to_string(),
            queues.transcode_gpu.to_string(),
            queues.transcode_cpu.to_string(),
        ];
        self.node_info.with_label_values(&as_refs(&info)).set(1.0);

        let labels = [node.id.as_str(), node.name.as_str()];
        let process = &node.resource_stats.process;
        let host = &node.resource_stats.os;
        self.node_uptime_seconds
            .with_label_values(&labels)
            .set(process.uptime);

        for (family, field, raw) in [
            (&self.node_heap_used_mb, "heapUsedMB", &process.heap_used_mb),
            (&self.node_heap_total_mb, "heapTotalMB", &process.heap_total_mb),
            (&self.node_host_cpu_percent, "cpuPerc", &host.cpu_percent),
            (&self.node_host_mem_used_gb, "memUsedGB", &host.mem_used_gb),
            (&self.node_host_mem_total_gb, "memTotalGB", &host.mem_total_gb),
        ] {
            match TdarrError::parse_f64(field, raw) {
                Ok(value) => family.with_label_values(&labels).set(value),
                Err(e) => warn!(node_id = %node.id, error = %e, "Skipping node resource metric"),
            }
        }

        for worker in node.workers.values() {
            self.record_worker(node, worker);
        }
    }

    fn record_worker(&self, node: &NodeSnapshot, worker: &WorkerSnapshot) {
        let identity = [
            node.id.as_str(),
            node.name.as_str(),
            worker.id.as_str(),
            worker.worker_type.as_str(),
        ];
        self.node_worker_fps
            .with_label_values(&identity)
            .set(worker.fps);
        self.node_worker_percentage
            .with_label_values(&identity)
            .set(worker.percentage);
        self.node_worker_original_file_size_gb
            .with_label_values(&identity)
            .set(worker.original_file_size_gb);
        self.node_worker_output_size_gb
            .with_label_values(&identity)
            .set(worker.output_file_size_gb);
        self.node_worker_est_size_gb
            .with_label_values(&identity)
            .set(worker.est_size_gb);

        let mut labels = vec![
            node.id.clone(),
            node.name.clone(),
            worker.id.clone(),
            worker.worker_type.clone(),
            worker.status.clone(),
            worker.status_timestamp.to_string(),
            worker.idle.to_string(),
            worker.file.clone(),
            worker.original_file_size_gb.to_string(),
            worker.fps.to_string(),
            worker.eta.clone(),
            worker.percentage.to_string(),
            worker.process.connected.to_string(),
            worker.process.pid.to_string(),
            worker.job.start_time.to_string(),
            worker.start_time.to_string(),
        ];

        if worker.is_flow_worker {
            labels.push(worker.output_file_size_gb.to_string());
            labels.push(worker.est_size_gb.to_string());
            self.node_worker_flow_info
                .with_label_values(&as_refs(&labels))
                .set(1.0);
        } else {
            let plugin = worker.last_plugin_details.clone().unwrap_or_default();
            labels.push(plugin.id);
            labels.push(plugin.position_number);
            labels.push(worker.output_file_size_gb.to_string());
            labels.push(worker.est_size_gb.to_string());
            self.node_worker_info
                .with_label_values(&as_refs(&labels))
                .set(1.0);
        }
    }
}

fn as_refs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

/// Metric value set produced by one collection cycle.
pub struct Snapshot {
    registry: Registry,
    error: Option<String>,
}

impl Snapshot {
    /// Maps the cycle's inputs onto the full family set.
    pub fn assemble(
        instance: &str,
        stats: &AggregateStats,
        scores: Scores,
        groups: &[GroupStat],
        nodes: &NodeInventory,
    ) -> prometheus::Result<Self> {
        let registry = Registry::new();
        let metrics = TdarrMetrics::new(&registry, instance)?;
        metrics.record_aggregate(stats, scores);
        for group in groups {
            metrics.record_library(group);
        }
        for node in nodes.values() {
            metrics.record_node(node);
        }
        Ok(Self {
            registry,
            error: None,
        })
    }

    /// A snapshot holding only `tdarr_collector_error`.
    pub fn aborted(instance: &str, error: &str) -> Self {
        let registry = Registry::new();
        let family = GaugeVec::new(
            opts("collector_error", "Error while collecting metrics", instance),
            &["error"],
        )
        .and_then(|family| {
            registry.register(Box::new(family.clone()))?;
            Ok(family)
        });
        match family {
            Ok(family) => family.with_label_values(&[error]).set(1.0),
            Err(e) => warn!(error = %e, "Failed to register collector error metric"),
        }
        Self {
            registry,
            error: Some(error.to_string()),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    /// Error text of an aborted cycle.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Number of samples across all families.
    pub fn sample_count(&self) -> prometheus::Result<usize> {
        Ok(self
            .encode()?
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .count())
    }

    /// Prometheus text exposition of the snapshot.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tdarr::models::{PluginDetails, StatusBreakdown};
    use crate::tdarr::ALL_LIBRARIES_ID;

    const INSTANCE: &str = "http://tdarr.local:8265";

    fn stats() -> AggregateStats {
        AggregateStats {
            total_file_count: 100.0,
            total_transcode_count: 40.0,
            total_health_check_count: 60.0,
            size_diff_gb: -12.5,
            ..Default::default()
        }
    }

    fn scores() -> Scores {
        Scores {
            tdarr_score: 57.3,
            health_check_score: 99.0,
        }
    }

    #[test]
    fn test_aggregate_families_carry_instance_label() {
        let snapshot =
            Snapshot::assemble(INSTANCE, &stats(), scores(), &[], &NodeInventory::default()).unwrap();
        let text = snapshot.encode().unwrap();
        assert!(text.contains("tdarr_files_total{tdarr_instance=\"http://tdarr.local:8265\"} 100"));
        assert!(text.contains("tdarr_score_pct{tdarr_instance=\"http://tdarr.local:8265\"} 57.3"));
        assert!(text.contains("tdarr_stream_stats_bit_rate{stat_type=\"highest\""));
        assert!(!text.contains("tdarr_collector_error"));
        assert!(!snapshot.is_aborted());
    }

    #[test]
    fn test_library_breakdown_labels() {
        let group = GroupStat {
            group_name: "Movies".into(),
            group_id: "lib-1".into(),
            total_files: 10.0,
            status: StatusBreakdown {
                transcode: vec![
                    PieSlice::new("Transcode Success ", 3.0),
                    PieSlice::new("Ignored", 1.0),
                ],
                health_check: vec![PieSlice::new("Success", 6.0)],
            },
            ..Default::default()
        };
        let snapshot =
            Snapshot::assemble(INSTANCE, &stats(), scores(), &[group], &NodeInventory::default())
                .unwrap();
        let text = snapshot.encode().unwrap();
        assert!(text.contains("library_id=\"lib-1\",library_name=\"Movies\",status=\"success\""));
        assert!(text.contains("status=\"ignored\""));
        assert!(!text.contains("Transcode"));
    }

    #[test]
    fn test_aborted_snapshot_has_only_error_family() {
        let snapshot = Snapshot::aborted(INSTANCE, "received server error status code 500");
        let text = snapshot.encode().unwrap();
        assert_eq!(snapshot.sample_count().unwrap(), 1);
        assert!(text.contains(
            "tdarr_collector_error{error=\"received server error status code 500\",tdarr_instance=\"http://tdarr.local:8265\"} 1"
        ));
        assert!(snapshot.is_aborted());
    }

    #[test]
    fn test_unparsable_resource_string_skips_only_that_gauge() {
        let mut node = NodeSnapshot {
            id: "n1".into(),
            name: "node-1".into(),
            ..Default::default()
        };
        node.resource_stats.process.heap_used_mb = "12.5".into();
        node.resource_stats.process.heap_total_mb = "n/a".into();
        node.resource_stats.os.cpu_percent = "3".into();
        node.resource_stats.os.mem_used_gb = "1.5".into();
        node.resource_stats.os.mem_total_gb = "8".into();

        let mut nodes = NodeInventory::default();
        nodes.insert(node.id.clone(), node);
        let text = Snapshot::assemble(INSTANCE, &stats(), scores(), &[], &nodes)
            .unwrap()
            .encode()
            .unwrap();
        assert!(text.contains("tdarr_node_heap_used_mb{node_id=\"n1\""));
        assert!(!text.contains("tdarr_node_heap_total_mb{"));
        assert!(text.contains("tdarr_node_host_mem_total_gb{node_id=\"n1\""));
        assert!(text.contains("tdarr_node_info{"));
    }

    #[test]
    fn test_flow_and_plugin_workers_use_separate_families() {
        let mut node = NodeSnapshot {
            id: "n1".into(),
            name: "node-1".into(),
            ..Default::default()
        };
        node.workers.insert(
            "flow".into(),
            WorkerSnapshot {
                id: "flow".into(),
                is_flow_worker: true,
                ..Default::default()
            },
        );
        node.workers.insert(
            "classic".into(),
            WorkerSnapshot {
                id: "classic".into(),
                last_plugin_details: Some(PluginDetails {
                    id: "Tdarr_Plugin_MC93".into(),
                    position_number: "2".into(),
                }),
                ..Default::default()
            },
        );
        let mut nodes = NodeInventory::default();
        nodes.insert(node.id.clone(), node);

        let text = Snapshot::assemble(INSTANCE, &stats(), scores(), &[], &nodes)
            .unwrap()
            .encode()
            .unwrap();
        let samples = |name: &str| -> Vec<String> {
            text.lines()
                .filter(|line| line.starts_with(&format!("{name}{{")))
                .map(str::to_string)
                .collect()
        };

        let flow = samples("tdarr_node_worker_flow_info");
        assert_eq!(flow.len(), 1);
        assert!(flow[0].contains("worker_id=\"flow\""));
        assert!(!flow[0].contains("worker_plugin"));

        let classic = samples("tdarr_node_worker_info");
        assert_eq!(classic.len(), 1);
        assert!(classic[0].contains("worker_plugin_id=\"Tdarr_Plugin_MC93\""));
        assert!(classic[0].contains("worker_plugin_position=\"2\""));
    }

    #[test]
    fn test_worker_progress_is_exported_as_values() {
        let mut node = NodeSnapshot {
            id: "n1".into(),
            name: "node-1".into(),
            ..Default::default()
        };
        node.workers.insert(
            "w1".into(),
            WorkerSnapshot {
                id: "w1".into(),
                worker_type: "transcodegpu".into(),
                fps: 48.0,
                percentage: 37.5,
                original_file_size_gb: 4.25,
                output_file_size_gb: 1.5,
                est_size_gb: 3.0,
                ..Default::default()
            },
        );
        let mut nodes = NodeInventory::default();
        nodes.insert(node.id.clone(), node);

        let text = Snapshot::assemble(INSTANCE, &stats(), scores(), &[], &nodes)
            .unwrap()
            .encode()
            .unwrap();
        let sample = |name: &str| -> String {
            let found: Vec<&str> = text
                .lines()
                .filter(|line| line.starts_with(&format!("{name}{{")))
                .collect();
            assert_eq!(found.len(), 1, "{name}");
            found[0].to_string()
        };

        let fps = sample("tdarr_node_worker_fps");
        assert!(fps.contains("worker_id=\"w1\""));
        assert!(fps.contains("worker_type=\"transcodegpu\""));
        assert!(!fps.contains("worker_status"));
        assert!(fps.ends_with(" 48"));
        assert!(sample("tdarr_node_worker_percentage").ends_with(" 37.5"));
        assert!(sample("tdarr_node_worker_original_file_size_gb").ends_with(" 4.25"));
        assert!(sample("tdarr_node_worker_output_size_gb").ends_with(" 1.5"));
        assert!(sample("tdarr_node_worker_est_size_gb").ends_with(" 3"));
    }

    #[test]
    fn test_all_libraries_row_is_its_own_series() {
        let groups = [
            GroupStat {
                group_name: "All".into(),
                group_id: ALL_LIBRARIES_ID.into(),
                total_files: 30.0,
                ..Default::default()
            },
            GroupStat {
                group_name: "All".into(),
                group_id: "lib-all-named".into(),
                total_files: 30.0,
                ..Default::default()
            },
        ];
        let text =
            Snapshot::assemble(INSTANCE, &stats(), scores(), &groups, &NodeInventory::default())
                .unwrap()
                .encode()
                .unwrap();
        let files = text
            .lines()
            .filter(|line| line.starts_with("tdarr_library_files_total{"))
            .count();
        assert_eq!(files, 2);
        assert!(text.contains("library_id=\"all_libraries\""));
    }
}
