use ds_statsd::{CounterMetric, TimerMetric};

pub enum TaskTimers {
    /// Duration of a single job.
    ///
    /// This metric is tagged with:
    ///  - `job`: The job kind, for example `sliding_window_org`.
    ///  - `outcome`: `success` or `failure`.
    JobDuration,

    /// Duration of a full organization scan.
    CollectOrgsDuration,
}

impl TimerMetric for TaskTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::JobDuration => "tasks.job.duration",
            Self::CollectOrgsDuration => "tasks.collect_orgs.duration",
        }
    }
}

pub enum TaskCounters {
    /// Jobs handed to the task queue.
    ///
    /// This metric is tagged with:
    ///  - `job`: The job kind.
    JobsEnqueued,

    /// A task exceeded its time budget.
    ///
    /// This metric is tagged with:
    ///  - `task`: The task name.
    Timeout,

    /// Projects whose rules could not be published.
    PublishFailed,
}

impl CounterMetric for TaskCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::JobsEnqueued => "tasks.jobs_enqueued",
            Self::Timeout => "tasks.timeout",
            Self::PublishFailed => "tasks.publish_failed",
        }
    }
}
