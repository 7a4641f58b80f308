//! Bounded worker pool for per-library fetches.
//!
//! All jobs are queued and the queue is closed before the workers start.
//! Each worker pulls from the shared queue until it is drained, then exits.
//! Results are only read after every worker has been joined.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::TdarrError;
use crate::tdarr::{GroupInfo, GroupStat};

/// Outcome of one fan-out run.
#[derive(Debug, Default)]
pub struct FanOut {
    /// Successful results, in job order.
    pub stats: Vec<GroupStat>,
    /// Jobs whose fetch failed and were left out of `stats`.
    pub failures: usize,
}

impl FanOut {
    pub fn is_complete(&self) -> bool {
        self.failures == 0
    }
}

type Job = (usize, GroupInfo);
type JobResult = (usize, Result<GroupStat, TdarrError>);

/// Runs `fetch` for every job on at most `max_concurrency` workers.
pub async fn run<F, Fut>(jobs: Vec<GroupInfo>, max_concurrency: usize, fetch: F) -> FanOut
where
    F: Fn(GroupInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<GroupStat, TdarrError>> + Send + 'static,
{
    let job_count = jobs.len();
    if job_count == 0 {
        return FanOut::default();
    }
    let workers = max_concurrency.clamp(1, job_count);

    let (job_tx, job_rx) = mpsc::channel::<Job>(job_count);
    for job in jobs.into_iter().enumerate() {
        // Capacity equals the job count, so this never waits.
        if job_tx.send(job).await.is_err() {
            break;
        }
    }
    drop(job_tx);

    let queue = Arc::new(Mutex::new(job_rx));
    let fetch = Arc::new(fetch);
    let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(job_count);

    let mut pool = JoinSet::new();
    for worker_id in 0..workers {
        let queue = Arc::clone(&queue);
        let fetch = Arc::clone(&fetch);
        let result_tx = result_tx.clone();
        pool.spawn(async move {
            loop {
                let next = queue.lock().await.recv().await;
                let Some((index, info)) = next else { break };
                debug!(worker_id, library_id = %info.group_id, "Fetching library stats");
                let result = (*fetch)(info).await;
                if result_tx.send((index, result)).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Fan-out worker terminated abnormally");
        }
    }

    let mut collected = Vec::with_capacity(job_count);
    while let Some(item) = result_rx.recv().await {
        collected.push(item);
    }
    collected.sort_by_key(|(index, _)| *index);

    // Jobs lost with an aborted worker never reach the result queue.
    let mut out = FanOut {
        stats: Vec::with_capacity(collected.len()),
        failures: job_count - collected.len(),
    };
    for (index, result) in collected {
        match result {
            Ok(stat) => out.stats.push(stat),
            Err(e) => {
                warn!(job = index, error = %e, "Library fetch failed, omitting it from this cycle");
                out.failures += 1;
            }
        }
    }
    out
}
