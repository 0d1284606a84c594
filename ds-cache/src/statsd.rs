use ds_statsd::{CounterMetric, TimerMetric};

pub enum CacheTimers {
    /// Amount of time a single Redis command or pipeline took.
    ///
    /// This metric is tagged with:
    ///  - `command`: The Redis command, for example `hset_all`.
    RedisCommand,
}

impl TimerMetric for CacheTimers {
    fn name(&self) -> &'static str {
        match self {
            Self::RedisCommand => "cache.redis.command",
        }
    }
}

pub enum CacheCounters {
    /// A cache entry could not be parsed and was treated as missing.
    ///
    /// This metric is tagged with:
    ///  - `cache`: The affected cache, for example `boosted_releases`.
    InvalidEntry,

    /// A release was observed for the first time and boosted.
    ReleaseBoosted,

    /// Boosting a release was skipped because another worker held the lock.
    BoostLockContended,
}

impl CounterMetric for CacheCounters {
    fn name(&self) -> &'static str {
        match self {
            Self::InvalidEntry => "cache.invalid_entry",
            Self::ReleaseBoosted => "cache.release_boosted",
            Self::BoostLockContended => "cache.boost_lock_contended",
        }
    }
}
