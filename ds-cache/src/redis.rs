use std::time::Duration;

use ds_redis::redis::{self, FromRedisValue};
use ds_redis::{AsyncRedisPool, RedisError};
use ds_statsd::metric;

use crate::statsd::CacheTimers;
use crate::store::{KeyValueStore, StoreError};

/// A [`KeyValueStore`] backed by a Redis instance or cluster.
///
/// Every operation checks out a connection from the pool and returns it when done.
#[derive(Debug, Clone)]
pub struct RedisStore {
    pool: AsyncRedisPool,
}

impl RedisStore {
    /// Creates a store on top of an existing connection pool.
    pub fn new(pool: AsyncRedisPool) -> Self {
        Self { pool }
    }

    async fn query<T: FromRedisValue>(
        &self,
        command: &'static str,
        cmd: redis::Cmd,
    ) -> Result<T, StoreError> {
        let start = std::time::Instant::now();
        let mut connection = self.pool.get_connection().await?;
        let result = cmd
            .query_async::<T>(&mut connection)
            .await
            .map_err(RedisError::from);
        metric!(timer(CacheTimers::RedisCommand) = start.elapsed(), command = command);
        Ok(result?)
    }
}

/// Redis expiry has second granularity, sub-second TTLs are rounded up.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 { secs + 1 } else { secs }
}

impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query("get", cmd).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(ttl_secs(ttl));
        self.query("set", cmd).await
    }

    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl));

        // Redis replies `OK` when the key was set and nil otherwise.
        let reply: Option<String> = self.query("set_nx", cmd).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        self.query("del", cmd).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut cmd = redis::cmd("HGET");
        cmd.arg(key).arg(field);
        self.query("hget", cmd).await
    }

    async fn hset_all(
        &self,
        key: &str,
        fields: Vec<(String, String)>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !fields.is_empty() {
            pipe.hset_multiple(key, &fields).ignore();
            if let Some(ttl) = ttl {
                let mut expire = redis::cmd("EXPIRE");
                expire.arg(key).arg(ttl_secs(ttl));
                pipe.add_command(expire).ignore();
            }
        }

        let start = std::time::Instant::now();
        let mut connection = self.pool.get_connection().await?;
        let result = pipe
            .query_async::<()>(&mut connection)
            .await
            .map_err(RedisError::from);
        metric!(timer(CacheTimers::RedisCommand) = start.elapsed(), command = "hset_all");
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_rounds_up() {
        assert_eq!(ttl_secs(Duration::from_secs(10)), 10);
        assert_eq!(ttl_secs(Duration::from_millis(10_500)), 11);
        assert_eq!(ttl_secs(Duration::from_millis(1)), 1);
    }
}
