use ds_cache::StoreError;
use thiserror::Error;

use crate::context::TimeoutError;
use crate::stats::StatsError;

/// An error that failed a per-organization job.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The job ran out of time.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// Statistics could not be fetched.
    #[error("failed to fetch statistics")]
    Stats(#[from] StatsError),

    /// The cache could not be written.
    #[error("failed to write cache")]
    Store(#[from] StoreError),
}
