use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ds_biases::{BiasRegistry, RulePublisher};
use ds_cache::KeyValueStore;
use ds_statsd::metric;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use crate::boost_low_volume::boost_low_volume_projects_org;
use crate::collect_orgs::{CollectError, CollectProgress, collect_orgs};
use crate::config::{SamplingSettings, TaskConfig};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::queue::{ChannelQueue, Job, JobKind};
use crate::recalculate_rules::recalculate_rules_org;
use crate::sliding_window::sliding_window_org;
use crate::stats::StatsSource;
use crate::statsd::{TaskCounters, TaskTimers};

/// Everything a worker needs to run jobs.
#[derive(Debug)]
pub struct WorkerState<St, S, P> {
    /// Source of ingestion statistics.
    pub stats: St,
    /// The sampling cache.
    pub store: S,
    /// Sink of the generated rules.
    pub publisher: P,
    /// Biases available to rule generation.
    pub registry: BiasRegistry,
    /// Task budgets and windows.
    pub tasks: TaskConfig,
    /// Sampling targets.
    pub sampling: SamplingSettings,
}

/// Jobs processed by [`Worker::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Jobs that finished successfully.
    pub succeeded: usize,
    /// Jobs that failed or panicked.
    pub failed: usize,
}

/// Result of a full scheduling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    /// Work done by the organization scan.
    pub progress: CollectProgress,
    /// Whether the organization scan ran out of time.
    pub timed_out: bool,
    /// Jobs run for the scanned organizations.
    pub jobs: WorkerSummary,
}

/// Runs per-organization jobs concurrently.
///
/// Cloning a worker is cheap, clones share their state.
#[derive(Debug)]
pub struct Worker<St, S, P> {
    state: Arc<WorkerState<St, S, P>>,
}

impl<St, S, P> Clone for Worker<St, S, P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<St, S, P> Worker<St, S, P>
where
    St: StatsSource,
    S: KeyValueStore,
    P: RulePublisher,
{
    /// Creates a worker.
    pub fn new(state: WorkerState<St, S, P>) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Returns the shared state.
    pub fn state(&self) -> &WorkerState<St, S, P> {
        &self.state
    }

    /// Runs a single job with its own time budget.
    pub async fn run_job(&self, job: Job) -> Result<(), TaskError> {
        let start = Instant::now();
        let state = &*self.state;
        let now = Utc::now();

        let result = match job.kind {
            JobKind::SlidingWindowOrg => {
                let config = &state.tasks.sliding_window;
                let mut context = TaskContext::new(job.kind.name(), config.max_duration());
                sliding_window_org(
                    &mut context,
                    &state.stats,
                    &state.store,
                    &state.sampling,
                    config,
                    job.org_id,
                    now,
                )
                .await
                .map(drop)
            }
            JobKind::BoostLowVolumeProjects => {
                let config = &state.tasks.boost_low_volume_projects;
                let mut context = TaskContext::new(job.kind.name(), config.max_duration());
                boost_low_volume_projects_org(
                    &mut context,
                    &state.stats,
                    &state.store,
                    &state.sampling,
                    config,
                    job.org_id,
                    now,
                )
                .await
                .map(drop)
            }
            JobKind::RecalculateRules => {
                let max_duration = state.tasks.recalculate_rules_max_duration();
                let mut context = TaskContext::new(job.kind.name(), max_duration);
                recalculate_rules_org(
                    &mut context,
                    &state.stats,
                    &state.store,
                    &state.publisher,
                    &state.registry,
                    &state.sampling,
                    job.org_id,
                    now,
                )
                .await
                .map(|outcome| {
                    ds_log::debug!(
                        org_id = job.org_id,
                        published = outcome.published,
                        failed = outcome.failed,
                        "recalculated sampling rules"
                    );
                })
            }
        };

        if let Err(TaskError::Timeout(_)) = result {
            metric!(counter(TaskCounters::Timeout) += 1, task = job.kind.name());
        }

        metric!(
            timer(TaskTimers::JobDuration) = start.elapsed(),
            job = job.kind.name(),
            outcome = if result.is_ok() { "success" } else { "failure" },
        );

        result
    }

    /// Runs jobs from `rx` until the sending side is closed and all jobs finished.
    ///
    /// At most `concurrency` jobs from the task configuration run at the same time. A failing job
    /// does not affect the others.
    pub async fn run(&self, mut rx: mpsc::UnboundedReceiver<Job>) -> WorkerSummary
    where
        St: 'static,
        S: 'static,
        P: 'static,
    {
        let concurrency = self.state.tasks.concurrency.max(1);
        let mut jobs = JoinSet::new();
        let mut summary = WorkerSummary::default();

        while let Some(job) = rx.recv().await {
            while jobs.len() >= concurrency {
                if let Some(result) = jobs.join_next().await {
                    record(&mut summary, result);
                }
            }

            let worker = self.clone();
            jobs.spawn(async move { (job, worker.run_job(job).await) });
        }

        while let Some(result) = jobs.join_next().await {
            record(&mut summary, result);
        }

        summary
    }

    /// Scans all active organizations and runs jobs of the given kinds for each of them.
    ///
    /// Jobs start while the scan is still in progress. The scan never waits for running jobs, so
    /// its budget only covers paging through organizations. A scan that runs out of time still
    /// runs the jobs it dispatched.
    pub async fn run_cycle(&self, kinds: &[JobKind]) -> Result<CycleSummary, CollectError>
    where
        St: 'static,
        S: 'static,
        P: 'static,
    {
        let state = &*self.state;
        let config = &state.tasks.collect_orgs;
        let (queue, rx) = ChannelQueue::new();

        let scan = async move {
            let mut context = TaskContext::new("collect_orgs", config.max_duration());
            // The queue is dropped at the end of the scan, which lets the worker finish.
            collect_orgs(&mut context, &state.stats, &queue, config, kinds).await
        };

        let (scan, jobs) = tokio::join!(scan, self.run(rx));
        let (progress, timed_out) = match scan {
            Ok(progress) => (progress, false),
            Err(CollectError::Timeout { progress, .. }) => (progress, true),
            Err(error) => return Err(error),
        };

        ds_log::info!(
            orgs = progress.orgs,
            timed_out,
            succeeded = jobs.succeeded,
            failed = jobs.failed,
            "dynamic sampling cycle finished"
        );

        Ok(CycleSummary {
            progress,
            timed_out,
            jobs,
        })
    }
}

fn record(summary: &mut WorkerSummary, result: Result<(Job, Result<(), TaskError>), JoinError>) {
    match result {
        Ok((_, Ok(()))) => summary.succeeded += 1,
        Ok((job, Err(error))) => {
            ds_log::error!(
                job = job.kind.name(),
                org_id = job.org_id,
                error = &error as &dyn std::error::Error,
                "dynamic sampling job failed"
            );
            summary.failed += 1;
        }
        Err(error) => {
            ds_log::error!(
                error = &error as &dyn std::error::Error,
                "dynamic sampling job panicked"
            );
            summary.failed += 1;
        }
    }
}
