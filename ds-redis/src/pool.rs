use std::fmt;

use deadpool::managed::{BuildError, PoolError};
use deadpool_redis::redis::{Cmd, Pipeline, RedisFuture, Value};
use deadpool_redis::{Runtime, cluster};
use thiserror::Error;

use crate::config::RedisConfig;

pub use deadpool_redis::redis;

/// An error talking to the cache backend.
#[derive(Debug, Error)]
pub enum RedisError {
    /// A command failed.
    #[error("failed to communicate with redis")]
    Redis(#[from] redis::RedisError),

    /// No connection could be checked out in time.
    #[error("failed to get a redis connection")]
    Pool(#[source] PoolError<redis::RedisError>),

    /// The pool could not be built.
    #[error("failed to create redis pool")]
    CreatePool(#[from] BuildError),

    /// The connection url is invalid.
    #[error("invalid redis configuration")]
    Config(#[from] deadpool_redis::ConfigError),

    /// Neither a server nor cluster nodes are configured.
    #[error("redis configuration names no server")]
    NoServer,
}

/// A pool of connections to a single node or a cluster.
#[derive(Clone)]
pub enum AsyncRedisPool {
    /// Connections to a cluster.
    Cluster(cluster::Pool),
    /// Connections to a single node.
    Single(deadpool_redis::Pool),
}

impl AsyncRedisPool {
    /// Builds a pool for the configured topology.
    ///
    /// No connection is opened until the first checkout.
    pub fn from_config(config: &RedisConfig) -> Result<Self, RedisError> {
        let max_size = config.max_connections() as usize;
        let wait_timeout = Some(config.connection_timeout());

        if let Some(nodes) = config.cluster_nodes() {
            let pool = cluster::Config::from_urls(nodes.to_vec())
                .builder()?
                .max_size(max_size)
                .wait_timeout(wait_timeout)
                .runtime(Runtime::Tokio1)
                .build()?;
            return Ok(Self::Cluster(pool));
        }

        let server = config.server().ok_or(RedisError::NoServer)?;
        let pool = deadpool_redis::Config::from_url(server)
            .builder()?
            .max_size(max_size)
            .wait_timeout(wait_timeout)
            .runtime(Runtime::Tokio1)
            .build()?;
        Ok(Self::Single(pool))
    }

    /// Checks out a connection. It returns to the pool when dropped.
    pub async fn get_connection(&self) -> Result<AsyncRedisConnection, RedisError> {
        Ok(match self {
            Self::Cluster(pool) => {
                AsyncRedisConnection::Cluster(pool.get().await.map_err(RedisError::Pool)?)
            }
            Self::Single(pool) => {
                AsyncRedisConnection::Single(pool.get().await.map_err(RedisError::Pool)?)
            }
        })
    }
}

impl fmt::Debug for AsyncRedisPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster(pool) => write!(f, "AsyncRedisPool::Cluster({:?})", pool.status()),
            Self::Single(pool) => write!(f, "AsyncRedisPool::Single({:?})", pool.status()),
        }
    }
}

/// A pooled connection to a single node or a cluster.
pub enum AsyncRedisConnection {
    /// A cluster connection.
    Cluster(cluster::Connection),
    /// A single node connection.
    Single(deadpool_redis::Connection),
}

impl redis::aio::ConnectionLike for AsyncRedisConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            Self::Cluster(conn) => conn.req_packed_command(cmd),
            Self::Single(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        pipeline: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            Self::Cluster(conn) => conn.req_packed_commands(pipeline, offset, count),
            Self::Single(conn) => conn.req_packed_commands(pipeline, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            Self::Cluster(conn) => conn.get_db(),
            Self::Single(conn) => conn.get_db(),
        }
    }
}
