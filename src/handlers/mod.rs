//! HTTP endpoint handlers for the exporter.
//!
//! - `/`: landing page
//! - metrics path: Prometheus exposition of one collection cycle
//! - `/healthz`: liveness check

pub mod health;
pub mod metrics;
pub mod root;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
