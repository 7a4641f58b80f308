//! Last-known per-library statistics.
//!
//! `StatsCache` keeps the result of the most recent complete fan-out together
//! with the all-libraries file count observed at that time. The collector
//! compares that count with a fresh one before deciding to fan out again.

use tokio::sync::RwLock;

use crate::tdarr::GroupStat;

/// Snapshot stored after a complete fan-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    pub total_files: i64,
    pub group_stats: Vec<GroupStat>,
}

/// Process-lifetime cache shared by concurrent scrapes.
#[derive(Debug, Default)]
pub struct StatsCache {
    entry: RwLock<Option<CacheEntry>>,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current entry, `None` until the first write.
    pub async fn read(&self) -> Option<CacheEntry> {
        self.entry.read().await.clone()
    }

    /// Replaces the whole entry.
    pub async fn write(&self, entry: CacheEntry) {
        *self.entry.write().await = Some(entry);
    }

    /// Cached stats when the stored file count equals `total_files`.
    pub async fn lookup(&self, total_files: i64) -> Option<Vec<GroupStat>> {
        let guard = self.entry.read().await;
        guard
            .as_ref()
            .filter(|entry| entry.total_files == total_files)
            .map(|entry| entry.group_stats.clone())
    }
}
