use ds_statsd::metric;
use thiserror::Error;

use crate::config::CollectOrgsConfig;
use crate::context::{TaskContext, TimeoutError};
use crate::queue::{JobKind, QueueError, TaskQueue};
use crate::stats::{StatsError, StatsSource};
use crate::statsd::{TaskCounters, TaskTimers};

/// Work done by an organization scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectProgress {
    /// Pages of organizations fetched.
    pub pages: usize,
    /// Organizations fetched.
    pub orgs: usize,
    /// Batches dispatched.
    pub batches: usize,
    /// Jobs enqueued.
    pub jobs: usize,
}

/// An error that aborted an organization scan.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The scan ran out of time. Jobs dispatched until then stay enqueued.
    #[error("organization scan timed out after enqueuing {} jobs", progress.jobs)]
    Timeout {
        /// Work done before the timeout.
        progress: CollectProgress,
        /// The exceeded budget.
        #[source]
        source: TimeoutError,
    },

    /// Active organizations could not be fetched.
    #[error("failed to fetch active organizations")]
    Stats(#[from] StatsError),

    /// A job could not be enqueued.
    #[error("failed to enqueue job")]
    Queue(#[from] QueueError),
}

/// Enqueues one job of every kind in `kinds` for each organization in the batch.
async fn dispatch<Q>(
    queue: &Q,
    batch: &mut Vec<u64>,
    kinds: &[JobKind],
    progress: &mut CollectProgress,
) -> Result<(), QueueError>
where
    Q: TaskQueue + ?Sized,
{
    if batch.is_empty() {
        return Ok(());
    }

    for org_id in batch.drain(..) {
        for kind in kinds {
            queue.enqueue(kind.job(org_id)).await?;
            metric!(counter(TaskCounters::JobsEnqueued) += 1, job = kind.name());
            progress.jobs += 1;
        }
    }

    progress.batches += 1;
    Ok(())
}

/// Scans all active organizations and enqueues jobs for them in batches.
///
/// The time budget of `context` is checked before every page. On timeout, organizations fetched
/// so far are still dispatched, then the scan stops and reports its progress.
pub async fn collect_orgs<St, Q>(
    context: &mut TaskContext,
    stats: &St,
    queue: &Q,
    config: &CollectOrgsConfig,
    kinds: &[JobKind],
) -> Result<CollectProgress, CollectError>
where
    St: StatsSource + ?Sized,
    Q: TaskQueue + ?Sized,
{
    let start = std::time::Instant::now();
    let batch_size = config.batch_size.max(1);

    let mut progress = CollectProgress::default();
    let mut batch = Vec::with_capacity(batch_size);
    let mut cursor = None;

    loop {
        if let Err(error) = context.check() {
            dispatch(queue, &mut batch, kinds, &mut progress).await?;

            ds_log::warn!(
                task = context.name(),
                pages = progress.pages,
                orgs = progress.orgs,
                jobs = progress.jobs,
                elapsed = ?error.elapsed,
                "organization scan timed out"
            );
            metric!(counter(TaskCounters::Timeout) += 1, task = context.name());

            return Err(CollectError::Timeout {
                progress,
                source: error,
            });
        }

        let page = stats.active_orgs(cursor, config.page_size).await?;
        progress.pages += 1;
        progress.orgs += page.org_ids.len();

        for org_id in page.org_ids {
            batch.push(org_id);
            if batch.len() >= batch_size {
                dispatch(queue, &mut batch, kinds, &mut progress).await?;
            }
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    dispatch(queue, &mut batch, kinds, &mut progress).await?;
    context.complete();

    ds_log::info!(
        pages = progress.pages,
        orgs = progress.orgs,
        batches = progress.batches,
        jobs = progress.jobs,
        "organization scan completed"
    );
    metric!(timer(TaskTimers::CollectOrgsDuration) = start.elapsed());

    Ok(progress)
}
