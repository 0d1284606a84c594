//! Rolling-window caches of the dynamic sampling engine.
//!
//! All state shared between sampling tasks lives in a key/value store with TTL support, abstracted
//! by [`KeyValueStore`]. Production deployments use [`RedisStore`], tests use [`MemoryStore`].
//!
//! Three independent caches are built on top of the store:
//!
//!  - [boosted releases](boosted_releases): per project, the releases that were recently observed
//!    for the first time and are sampled at a higher rate for an hour.
//!  - [sliding window](sliding_window): per organization, the sample rate of each project computed
//!    from a rolling window of ingested volume.
//!  - [low volume projects](low_volume): per organization, the rebalanced sample rate of each
//!    project so that low volume projects retain more of their data.
//!
//! Every key embeds the project or organization that owns it, see [`keys`]. Readers of these
//! caches are best-effort: a missing or corrupt entry degrades to a default, it never fails the
//! rule computation.
#![warn(missing_docs)]

pub mod boosted_releases;
pub mod keys;
pub mod low_volume;
pub mod sliding_window;

mod redis;
mod statsd;
mod store;

pub use self::redis::*;
pub use self::store::*;
