//! Redis connections for the dynamic sampling caches.
//!
//! [`RedisConfig`] describes where the caches live: one node or a cluster. [`AsyncRedisPool`]
//! hands out pooled connections for either topology behind a single
//! [`ConnectionLike`](redis::aio::ConnectionLike) type.
#![warn(missing_docs)]

mod config;
mod pool;

pub use self::config::*;
pub use self::pool::*;
