//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use prometheus::{CounterVec, Gauge, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;
use tdarr_exporter::TdarrCollector;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    pub collector: TdarrCollector,
    /// Exporter telemetry, appended to every scrape after the Tdarr snapshot.
    pub registry: Registry,
    pub scrape_duration: Gauge,
    pub scrape_requests: CounterVec,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(collector: TdarrCollector, config: Arc<Config>) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let scrape_duration = Gauge::new(
            "tdarr_scrape_duration_seconds",
            "Time spent collecting and encoding the last scrape",
        )?;
        let scrape_requests = CounterVec::new(
            Opts::new(
                "tdarr_scrape_requests_total",
                "Scrape requests served, by HTTP status code",
            ),
            &["code"],
        )?;

        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(scrape_requests.clone()))?;

        Ok(Self {
            collector,
            registry,
            scrape_duration,
            scrape_requests,
            config,
            start_time: Instant::now(),
        })
    }
}
