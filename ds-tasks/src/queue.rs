use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// The kind of work to run for an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Recompute the sliding window sample rates.
    SlidingWindowOrg,
    /// Rebalance the sample rates of low volume projects.
    BoostLowVolumeProjects,
    /// Recompute and publish the rules of every project.
    RecalculateRules,
}

impl JobKind {
    /// Creates a job of this kind for an organization.
    pub fn job(self, org_id: u64) -> Job {
        Job { kind: self, org_id }
    }

    /// Returns the name of this job kind, used in logs and metrics.
    pub fn name(self) -> &'static str {
        match self {
            Self::SlidingWindowOrg => "sliding_window_org",
            Self::BoostLowVolumeProjects => "boost_low_volume_projects_org",
            Self::RecalculateRules => "recalculate_rules_org",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit of work for a single organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    /// What to run.
    pub kind: JobKind,
    /// The organization to run it for.
    pub org_id: u64,
}

/// An error returned by a [`TaskQueue`].
#[derive(Debug, Error)]
pub enum QueueError {
    /// The consumer of the queue is gone.
    #[error("task queue is closed")]
    Closed,
}

/// An asynchronous task queue.
///
/// Enqueued jobs run independently of the producer, so one slow organization cannot hold up the
/// others.
pub trait TaskQueue: Send + Sync {
    /// Hands a job to the queue.
    fn enqueue(&self, job: Job) -> impl Future<Output = Result<(), QueueError>> + Send;
}

/// A [`TaskQueue`] backed by an unbounded tokio channel.
///
/// Enqueueing never waits for the worker, so a scan is never held up by slow jobs. The number of
/// queued jobs is bounded by the number of scanned organizations.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl ChannelQueue {
    /// Creates a queue and the receiving end consumed by a worker.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TaskQueue for ChannelQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.tx.send(job).map_err(|_| QueueError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_queue() {
        let (queue, mut rx) = ChannelQueue::new();
        queue
            .enqueue(JobKind::RecalculateRules.job(1))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(Job {
                kind: JobKind::RecalculateRules,
                org_id: 1
            })
        );

        drop(rx);
        assert!(matches!(
            queue.enqueue(JobKind::SlidingWindowOrg.job(2)).await,
            Err(QueueError::Closed)
        ));
    }
}
