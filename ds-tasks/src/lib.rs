//! Periodic tasks that keep the dynamic sampling caches and rules up to date.
//!
//! A scheduling cycle starts with [`collect_orgs`], which pages through all organizations with
//! recent ingestion and hands one [`Job`] per organization and task to a [`TaskQueue`]. A
//! [`Worker`] consumes the queue and runs the jobs concurrently:
//!
//!  - [`sliding_window_org`] distributes the organization's target sample rate over its projects
//!    using a day of volume and stores the result in the sliding window cache.
//!  - [`boost_low_volume_projects_org`] does the same over the last hour, so that projects with
//!    little traffic are sampled at a higher rate.
//!  - [`recalculate_rules_org`] regenerates the rules of every project and publishes them.
//!
//! Releases are boosted outside of the cycle: whoever sees a release for the first time, usually
//! the ingestion hook, hands it to [`boost_observed_releases`], which records it through
//! [`LatestReleaseBooster`](ds_cache::boosted_releases::LatestReleaseBooster). The tasks only read
//! the boosted releases when generating rules.
//!
//! Every task runs within a time budget tracked by a [`TaskContext`]. A task that exceeds its
//! budget stops at the next checkpoint and keeps what it has written so far.
#![warn(missing_docs)]

mod boost_low_volume;
mod boost_releases;
mod collect_orgs;
mod config;
mod context;
mod error;
mod queue;
mod recalculate_rules;
mod sliding_window;
mod statsd;
mod stats;
mod worker;

pub mod rebalancing;

pub use self::boost_low_volume::*;
pub use self::boost_releases::*;
pub use self::collect_orgs::*;
pub use self::config::*;
pub use self::context::*;
pub use self::error::*;
pub use self::queue::*;
pub use self::recalculate_rules::*;
pub use self::sliding_window::*;
pub use self::stats::*;
pub use self::worker::*;
