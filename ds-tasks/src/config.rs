use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of the organization scan that dispatches jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectOrgsConfig {
    /// Number of organizations fetched per page.
    pub page_size: usize,
    /// Maximum number of organizations per dispatched batch.
    pub batch_size: usize,
    /// Time budget of one scan, in seconds.
    pub max_duration: u64,
}

impl CollectOrgsConfig {
    /// Returns the time budget of one scan.
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration)
    }
}

impl Default for CollectOrgsConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            batch_size: 25,
            max_duration: 20 * 60,
        }
    }
}

/// Configuration of a task working on a window of project volumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowTaskConfig {
    /// Size of the volume window in hours.
    pub window_hours: u32,
    /// Time budget of one job, in seconds.
    #[serde(default = "default_job_duration")]
    pub max_duration: u64,
}

fn default_job_duration() -> u64 {
    5 * 60
}

impl WindowTaskConfig {
    fn with_window(window_hours: u32) -> Self {
        Self {
            window_hours,
            max_duration: default_job_duration(),
        }
    }

    /// Returns the volume window.
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.window_hours) * 3600)
    }

    /// Returns the time budget of one job.
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration)
    }
}

/// Configuration of all dynamic sampling tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// The organization scan.
    pub collect_orgs: CollectOrgsConfig,
    /// The per-organization sliding window task.
    pub sliding_window: WindowTaskConfig,
    /// The per-organization low volume project rebalancing.
    pub boost_low_volume_projects: WindowTaskConfig,
    /// Time budget of recomputing the rules of one organization, in seconds.
    pub recalculate_rules_max_duration: u64,
    /// Maximum number of jobs running at the same time.
    pub concurrency: usize,
}

impl TaskConfig {
    /// Returns the time budget of recomputing the rules of one organization.
    pub fn recalculate_rules_max_duration(&self) -> Duration {
        Duration::from_secs(self.recalculate_rules_max_duration)
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            collect_orgs: CollectOrgsConfig::default(),
            sliding_window: WindowTaskConfig::with_window(24),
            boost_low_volume_projects: WindowTaskConfig::with_window(1),
            recalculate_rules_max_duration: default_job_duration(),
            concurrency: 8,
        }
    }
}

/// A sample rate that applies from a monthly volume on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRateTier {
    /// The smallest extrapolated monthly volume of this tier.
    pub volume: u64,
    /// The target sample rate of organizations in this tier.
    pub sample_rate: f64,
}

/// Target sample rates by extrapolated monthly volume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleRateTiers(pub Vec<SampleRateTier>);

impl SampleRateTiers {
    /// Returns the sample rate of the highest tier reached by `monthly_volume`.
    pub fn sample_rate_for(&self, monthly_volume: u64) -> Option<f64> {
        self.0
            .iter()
            .filter(|tier| tier.volume <= monthly_volume)
            .max_by_key(|tier| tier.volume)
            .map(|tier| tier.sample_rate)
    }
}

/// Sampling targets shared by the tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    /// Sample rate used when no better information is available.
    pub default_sample_rate: f64,
    /// Target sample rates by extrapolated monthly volume.
    pub tiers: SampleRateTiers,
    /// How strongly rebalancing moves project rates away from the target, from 0 to 1.
    pub rebalance_intensity: f64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            default_sample_rate: 1.0,
            tiers: SampleRateTiers::default(),
            rebalance_intensity: 1.0,
        }
    }
}
