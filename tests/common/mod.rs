//! Shared fixtures for integration tests: an in-process fake Tdarr server
//! bound to an ephemeral port.

#![allow(dead_code)]

use ahash::AHashMap as HashMap;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tdarr_exporter::CollectorConfig;
use tokio::net::TcpListener;
use url::Url;

/// Serves `app` on 127.0.0.1 and returns its base URL.
pub async fn spawn(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// Backoff short enough to keep retry tests fast.
pub fn short_backoff() -> Vec<Duration> {
    vec![Duration::from_millis(10), Duration::from_millis(10)]
}

pub fn collector_config(base_url: Url) -> CollectorConfig {
    let mut config = CollectorConfig::new(base_url);
    config.retry_backoff = short_backoff();
    config.http_timeout = Duration::from_secs(5);
    config
}

/// Statistics document; `pies` selects the legacy or keyed shape.
pub fn statistics(pies: Option<Value>, tdarr_score: &str) -> Value {
    let mut doc = json!({
        "totalFileCount": 30,
        "totalTranscodeCount": 12,
        "totalHealthCheckCount": 25,
        "sizeDiff": -4.5,
        "tdarrScore": tdarr_score,
        "healthCheckScore": "98.2",
        "avgNumberOfStreamsInVideo": 2.5,
        "streamStats": {
            "duration": {"average": 1800.0, "highest": 7200.0, "total": 54000.0},
            "bit_rate": {"average": 4000000.0, "highest": 9000000.0, "total": 120000000.0},
            "nb_frames": {"average": 43000.0, "highest": 170000.0, "total": 1290000.0}
        }
    });
    if let Some(pies) = pies {
        doc["pies"] = pies;
    }
    doc
}

/// Legacy positional row for one library.
pub fn legacy_row(name: &str, id: &str, files: u64) -> Value {
    json!([
        name, id, files, 4, 1.5, 6,
        [{"name": "Transcode success", "value": 3}, {"name": "Not required", "value": 1}],
        [{"name": "Success", "value": 6}],
        [{"name": "HEVC", "value": 7}, {"name": "H264", "value": 3}],
        [{"name": "MKV", "value": 8}],
        [{"name": "1080p", "value": 9}],
        [{"name": "AAC", "value": 10}],
        [{"name": "MKV", "value": 10}]
    ])
}

/// Keyed `pieStats` body for one library.
pub fn pie_stat(files: u64) -> Value {
    json!({
        "totalFiles": files,
        "totalTranscodeCount": 2,
        "sizeDiff": 0.5,
        "totalHealthCheckCount": 3,
        "status": {
            "transcode": [{"name": "Transcode success", "value": 2}],
            "healthCheck": [{"name": "Success", "value": 3}]
        },
        "video": {
            "codecs": [{"name": "HEVC", "value": files}],
            "containers": [{"name": "MKV", "value": files}],
            "resolutions": [{"name": "4KUHD", "value": files}]
        },
        "audio": {
            "codecs": [{"name": "EAC3", "value": files}],
            "containers": [{"name": "MKV", "value": files}]
        }
    })
}

/// One node with a classic worker and a flow worker.
pub fn nodes() -> Value {
    json!({
        "node-1": {
            "_id": "node-1",
            "nodeName": "alpha",
            "remoteAddress": "10.0.0.2",
            "config": {"serverIP": "10.0.0.1", "serverPort": "8266", "processPid": 4242},
            "gpuSelect": "-",
            "nodePaused": false,
            "priority": 1,
            "workerLimits": {"healthcheckcpu": 1, "healthcheckgpu": 0, "transcodecpu": 2, "transcodegpu": 1},
            "queueLengths": {"healthcheckcpu": 0, "healthcheckgpu": 0, "transcodecpu": 5, "transcodegpu": 3},
            "resStats": {
                "process": {"uptime": 3600, "heapUsedMB": "120.5", "heapTotalMB": "256"},
                "os": {"cpuPerc": "12.5", "memUsedGB": "3.2", "memTotalGB": "16"}
            },
            "workers": {
                "classic": {
                    "_id": "classic",
                    "workerType": "transcodecpu",
                    "isFlowWorker": false,
                    "idle": false,
                    "file": "/media/movie.mkv",
                    "originalfileSizeInGbytes": 4.2,
                    "percentage": 37.5,
                    "fps": 48,
                    "ETA": "0:10:00",
                    "status": "Processing",
                    "statusTs": 1700000000,
                    "job": {"start": 1699999000},
                    "process": {"connected": true, "pid": 5151},
                    "lastPluginDetails": {"id": "Tdarr_Plugin_MC93", "number": "2"},
                    "startTime": 1699999500
                },
                "flow": {
                    "_id": "flow",
                    "workerType": "transcodegpu",
                    "isFlowWorker": true,
                    "idle": false,
                    "file": "/media/show.mkv",
                    "status": "Processing",
                    "process": {"connected": true, "pid": 6161},
                    "outputFileSizeInGbytes": 1.1,
                    "estSize": 2.0
                }
            }
        }
    })
}

/// Programmable fake of the Tdarr API with request bookkeeping.
#[derive(Default)]
pub struct FakeTdarr {
    pub stats: Mutex<Value>,
    pub inventory: Mutex<Value>,
    /// Keyed pie bodies by requested library id.
    pub pies: Mutex<HashMap<String, Value>>,
    pub nodes: Mutex<Value>,
    /// When set, the node endpoint answers with this status.
    pub nodes_status: Mutex<Option<StatusCode>>,
    /// Library ids in the order their pie stats were requested.
    pub pie_requests: Mutex<Vec<String>>,
    pub inventory_requests: Mutex<usize>,
}

impl FakeTdarr {
    pub fn new(stats: Value) -> Arc<Self> {
        Arc::new(Self {
            stats: Mutex::new(stats),
            inventory: Mutex::new(json!([])),
            nodes: Mutex::new(nodes()),
            ..Default::default()
        })
    }

    pub fn with_libraries(stats: Value, libraries: &[(&str, &str, u64)], all_files: u64) -> Arc<Self> {
        let fake = Self::new(stats);
        let inventory: Vec<Value> = libraries
            .iter()
            .map(|(id, name, _)| json!({"_id": id, "name": name}))
            .collect();
        *fake.inventory.lock().unwrap() = Value::Array(inventory);
        {
            let mut pies = fake.pies.lock().unwrap();
            for (id, _, files) in libraries {
                pies.insert(id.to_string(), pie_stat(*files));
            }
            pies.insert(String::new(), pie_stat(all_files));
        }
        fake
    }

    pub fn pie_requests(&self) -> Vec<String> {
        self.pie_requests.lock().unwrap().clone()
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/api/v2/cruddb", post(cruddb))
            .route("/api/v2/stats/get-pies", post(get_pies))
            .route("/api/v2/get-nodes", get(get_nodes))
            .with_state(Arc::clone(self))
    }

    pub async fn serve(self: &Arc<Self>) -> Url {
        spawn(self.router()).await
    }
}

async fn cruddb(State(fake): State<Arc<FakeTdarr>>, Json(body): Json<Value>) -> Response {
    match body["data"]["collection"].as_str() {
        Some("StatisticsJSONDB") => Json(fake.stats.lock().unwrap().clone()).into_response(),
        Some("LibrarySettingsJSONDB") => {
            *fake.inventory_requests.lock().unwrap() += 1;
            Json(fake.inventory.lock().unwrap().clone()).into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn get_pies(State(fake): State<Arc<FakeTdarr>>, Json(body): Json<Value>) -> Response {
    let id = body["data"]["libraryId"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    fake.pie_requests.lock().unwrap().push(id.clone());
    let stat = fake.pies.lock().unwrap().get(&id).cloned();
    match stat {
        Some(stat) => Json(json!({ "pieStats": stat })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_nodes(State(fake): State<Arc<FakeTdarr>>) -> Response {
    if let Some(status) = *fake.nodes_status.lock().unwrap() {
        return status.into_response();
    }
    Json(fake.nodes.lock().unwrap().clone()).into_response()
}

/// Sample lines of one family in a text exposition.
pub fn samples(text: &str, family: &str) -> Vec<String> {
    let prefix = format!("{family}{{");
    text.lines()
        .filter(|line| line.starts_with(&prefix))
        .map(str::to_string)
        .collect()
}
