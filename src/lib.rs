//! Tdarr statistics collection and normalization.
//!
//! The library polls a Tdarr server's internal API and turns the result into
//! a Prometheus metric snapshot:
//!
//! - [`client`]: retrying transport and authenticated JSON requests
//! - [`tdarr`]: wire models and the legacy/keyed shape normalizer
//! - [`cache`]: last-known per-library statistics
//! - [`fanout`]: bounded worker pool for per-library fetches
//! - [`collector`]: the per-scrape collection cycle
//! - [`metrics`]: metric families and text encoding
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tdarr_exporter::{CollectorConfig, StatsCache, TdarrCollector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CollectorConfig::new(url::Url::parse("http://tdarr.local:8265")?);
//! let collector = TdarrCollector::new(config, Arc::new(StatsCache::new()))?;
//!
//! let snapshot = collector.collect().await;
//! println!("{}", snapshot.encode()?);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod collector;
pub mod error;
pub mod fanout;
pub mod metrics;
pub mod tdarr;

pub use cache::{CacheEntry, StatsCache};
pub use collector::{CollectorConfig, CycleReport, CycleStage, LibrarySource, TdarrCollector};
pub use error::{ShapeError, TdarrError};
pub use metrics::Snapshot;
