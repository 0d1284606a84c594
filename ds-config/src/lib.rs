//! Configuration for the dynamic sampling worker.
//!
//! The worker reads `config.yml` from a config folder. All sections are optional:
//!
//! ```yaml
//! logging:
//!   level: debug
//! metrics:
//!   statsd: 127.0.0.1:8126
//! redis: redis://127.0.0.1:6379
//! tasks:
//!   collect_orgs:
//!     batch_size: 50
//! sampling:
//!   default_sample_rate: 0.25
//! ```
//!
//! Selected values can be overridden from the command line or the environment through
//! [`OverridableConfig`].
#![warn(missing_docs)]

mod config;

pub use self::config::*;
