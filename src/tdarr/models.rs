//! Wire types exchanged with the Tdarr server and the canonical per-library
//! record every wire shape is normalized into.

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Query descriptor for the RPC-style `cruddb` endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsRequest {
    pub collection: String,
    pub mode: String,
    #[serde(rename = "docID")]
    pub doc_id: String,
    #[serde(rename = "obj")]
    pub object: serde_json::Map<String, serde_json::Value>,
}

impl StatsRequest {
    fn new(collection: &str, mode: &str, doc_id: &str) -> Self {
        Self {
            collection: collection.to_string(),
            mode: mode.to_string(),
            doc_id: doc_id.to_string(),
            object: serde_json::Map::new(),
        }
    }

    /// Server-wide statistics document.
    pub fn statistics() -> Self {
        Self::new("StatisticsJSONDB", "getById", "statistics")
    }

    /// Every configured library.
    pub fn library_inventory() -> Self {
        Self::new("LibrarySettingsJSONDB", "getAll", "")
    }
}

/// `{"data": ...}` envelope wrapped around every POST payload.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Per-library breakdown query for the `get-pies` endpoint. An empty id
/// asks for the all-libraries totals.
#[derive(Debug, Clone, Serialize)]
pub struct PieRequest {
    #[serde(rename = "libraryId")]
    pub library_id: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamStat {
    pub average: f64,
    pub highest: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamStats {
    pub duration: StreamStat,
    pub bit_rate: StreamStat,
    #[serde(rename = "nb_frames")]
    pub num_frames: StreamStat,
}

/// Server-wide statistics document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_file_count: f64,
    pub total_transcode_count: f64,
    pub total_health_check_count: f64,
    #[serde(rename = "sizeDiff")]
    pub size_diff_gb: f64,
    /// Positional per-library rows, only present on older servers.
    pub pies: Option<serde_json::Value>,
    #[serde(deserialize_with = "lenient_string")]
    pub tdarr_score: String,
    #[serde(deserialize_with = "lenient_string")]
    pub health_check_score: String,
    #[serde(rename = "avgNumberOfStreamsInVideo")]
    pub avg_num_streams: f64,
    pub stream_stats: StreamStats,
}

/// One configured library, as returned by the inventory query.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GroupInfo {
    #[serde(rename = "_id")]
    pub group_id: String,
    #[serde(rename = "name")]
    pub group_name: String,
}

/// A labeled bucket of a categorical breakdown.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PieSlice {
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    pub value: f64,
}

impl PieSlice {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub transcode: Vec<PieSlice>,
    pub health_check: Vec<PieSlice>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoBreakdown {
    pub codecs: Vec<PieSlice>,
    pub containers: Vec<PieSlice>,
    pub resolutions: Vec<PieSlice>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioBreakdown {
    pub codecs: Vec<PieSlice>,
    pub containers: Vec<PieSlice>,
}

/// Keyed per-library statistics from the `get-pies` endpoint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PieStat {
    pub total_files: f64,
    pub total_transcode_count: f64,
    #[serde(rename = "sizeDiff")]
    pub size_diff_gb: f64,
    pub total_health_check_count: f64,
    pub status: StatusBreakdown,
    pub video: VideoBreakdown,
    pub audio: AudioBreakdown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PieStatsResponse {
    pub pie_stats: PieStat,
}

/// Canonical per-library statistics, identical for both wire shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStat {
    pub group_name: String,
    /// Already normalized; never the literal `all`.
    pub group_id: String,
    pub total_files: f64,
    pub total_transcode_count: f64,
    pub size_diff_gb: f64,
    pub total_health_check_count: f64,
    pub status: StatusBreakdown,
    pub video: VideoBreakdown,
    pub audio: AudioBreakdown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    #[serde(rename = "serverIP", deserialize_with = "lenient_string")]
    pub server_ip: String,
    #[serde(rename = "serverPort", deserialize_with = "lenient_string")]
    pub server_port: String,
    #[serde(rename = "processPid")]
    pub pid: i64,
}

/// Worker limits and queue lengths share this layout.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct NodeJobs {
    #[serde(rename = "healthcheckcpu")]
    pub health_check_cpu: i64,
    #[serde(rename = "healthcheckgpu")]
    pub health_check_gpu: i64,
    #[serde(rename = "transcodecpu")]
    pub transcode_cpu: i64,
    #[serde(rename = "transcodegpu")]
    pub transcode_gpu: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessStats {
    pub uptime: f64,
    #[serde(rename = "heapUsedMB", deserialize_with = "lenient_string")]
    pub heap_used_mb: String,
    #[serde(rename = "heapTotalMB", deserialize_with = "lenient_string")]
    pub heap_total_mb: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostStats {
    #[serde(rename = "cpuPerc", deserialize_with = "lenient_string")]
    pub cpu_percent: String,
    #[serde(rename = "memUsedGB", deserialize_with = "lenient_string")]
    pub mem_used_gb: String,
    #[serde(rename = "memTotalGB", deserialize_with = "lenient_string")]
    pub mem_total_gb: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceStats {
    pub process: ProcessStats,
    pub os: HostStats,
}

/// One processing node and its current workers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeSnapshot {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "nodeName")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub remote_address: String,
    pub config: NodeConfig,
    #[serde(deserialize_with = "lenient_string")]
    pub gpu_select: String,
    #[serde(rename = "nodePaused")]
    pub paused: bool,
    pub priority: i64,
    pub worker_limits: NodeJobs,
    pub queue_lengths: NodeJobs,
    #[serde(rename = "resStats")]
    pub resource_stats: ResourceStats,
    pub workers: HashMap<String, WorkerSnapshot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerJob {
    #[serde(rename = "start")]
    pub start_time: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerProcess {
    pub connected: bool,
    pub pid: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginDetails {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(rename = "number", deserialize_with = "lenient_string")]
    pub position_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerSnapshot {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "workerType", deserialize_with = "lenient_string")]
    pub worker_type: String,
    #[serde(rename = "isFlowWorker")]
    pub is_flow_worker: bool,
    pub idle: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub file: String,
    #[serde(rename = "originalfileSizeInGbytes")]
    pub original_file_size_gb: f64,
    pub percentage: f64,
    pub fps: f64,
    #[serde(rename = "ETA", deserialize_with = "lenient_string")]
    pub eta: String,
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(rename = "statusTs")]
    pub status_timestamp: i64,
    pub job: WorkerJob,
    pub process: WorkerProcess,
    #[serde(rename = "lastPluginDetails")]
    pub last_plugin_details: Option<PluginDetails>,
    /// Start of the current plugin step.
    #[serde(rename = "startTime")]
    pub start_time: i64,
    #[serde(rename = "outputFileSizeInGbytes")]
    pub output_file_size_gb: f64,
    #[serde(rename = "estSize")]
    pub est_size_gb: f64,
}

/// Node inventory keyed by node id.
pub type NodeInventory = HashMap<String, NodeSnapshot>;

/// Accepts a string, a number, a bool or null where a string is expected.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}
