//! Tdarr API data model and shape normalization.

pub mod models;
pub mod normalizer;

pub use models::{AggregateStats, GroupInfo, GroupStat, NodeInventory, NodeSnapshot, PieSlice, WorkerSnapshot};
pub use normalizer::{WireShape, ALL_LIBRARIES_ID, ALL_LIBRARIES_NAME};
