use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_connections() -> u32 {
    24
}

fn default_connection_timeout() -> u64 {
    5
}

/// Connection settings for a node or a cluster, with pool limits.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct PooledRedisConfig {
    /// The `redis://` url of a single node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// The `redis://` urls of cluster nodes. Takes precedence over `server`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_nodes: Vec<String>,

    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds a cache operation waits for a free connection.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

/// Where the sampling caches are stored.
///
/// Either a plain url or a map with pool settings:
///
/// ```yaml
/// redis: redis://127.0.0.1:6379
/// ---
/// redis:
///   cluster_nodes: [redis://10.0.0.1:6379, redis://10.0.0.2:6379]
///   max_connections: 8
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
pub enum RedisConfig {
    /// A single node with default pool settings.
    Single(String),
    /// A node or cluster with explicit pool settings.
    Pooled(PooledRedisConfig),
}

impl RedisConfig {
    /// Returns the cluster nodes, or `None` for a single node.
    pub fn cluster_nodes(&self) -> Option<&[String]> {
        match self {
            Self::Pooled(config) if !config.cluster_nodes.is_empty() => {
                Some(config.cluster_nodes.as_slice())
            }
            _ => None,
        }
    }

    /// Returns the url of the single node, if configured.
    pub fn server(&self) -> Option<&str> {
        match self {
            Self::Single(server) => Some(server),
            Self::Pooled(config) => config.server.as_deref(),
        }
    }

    /// Maximum number of pooled connections.
    pub fn max_connections(&self) -> u32 {
        match self {
            Self::Single(_) => default_max_connections(),
            Self::Pooled(config) => config.max_connections,
        }
    }

    /// How long a cache operation waits for a free connection.
    pub fn connection_timeout(&self) -> Duration {
        let secs = match self {
            Self::Single(_) => default_connection_timeout(),
            Self::Pooled(config) => config.connection_timeout,
        };
        Duration::from_secs(secs)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::Single("redis://127.0.0.1:6379".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_url() {
        let config: RedisConfig = serde_yaml::from_str("redis://127.0.0.1:6379").unwrap();

        assert_eq!(config, RedisConfig::default());
        assert_eq!(config.server(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.cluster_nodes(), None);
        assert_eq!(config.max_connections(), 24);
        assert_eq!(config.connection_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_pooled_node() {
        let yaml = r#"
server: redis://10.0.0.1:6379
max_connections: 4
"#;
        let config: RedisConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.server(), Some("redis://10.0.0.1:6379"));
        assert_eq!(config.cluster_nodes(), None);
        assert_eq!(config.max_connections(), 4);
        assert_eq!(config.connection_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_cluster() {
        let yaml = r#"
cluster_nodes:
  - redis://10.0.0.1:6379
  - redis://10.0.0.2:6379
connection_timeout: 1
"#;
        let config: RedisConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.cluster_nodes().map(<[_]>::len), Some(2));
        assert_eq!(config.server(), None);
        assert_eq!(config.connection_timeout(), Duration::from_secs(1));
    }
}
