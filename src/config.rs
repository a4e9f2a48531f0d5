//! `serde`-deserialisable configuration, one struct per component, each
//! with a `Default` impl built from private `default_*()` functions
//! referenced via `#[serde(default = "...")]` — the reference
//! implementation's `ZookeeperConfig` idiom (§4.K).

use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Coordination-service connection settings.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct ZkConfig {
    /// Comma-separated coordination-service endpoint list.
    #[serde(default = "ZkConfig::default_ensemble")]
    pub ensemble: String,

    /// Root znode under which `clusterprops.json`, `collections/*` and
    /// `live_nodes` are found.
    #[serde(default = "ZkConfig::default_root")]
    pub root: String,

    /// Session timeout, in seconds.
    #[serde(default = "ZkConfig::default_session_timeout")]
    pub session_timeout: u64,

    /// Initial reconnect backoff, in milliseconds; doubles on each
    /// consecutive failure and resets on success.
    #[serde(default = "ZkConfig::default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
}

impl Default for ZkConfig {
    fn default() -> ZkConfig {
        ZkConfig {
            ensemble: ZkConfig::default_ensemble(),
            root: ZkConfig::default_root(),
            session_timeout: ZkConfig::default_session_timeout(),
            reconnect_backoff_ms: ZkConfig::default_reconnect_backoff_ms(),
        }
    }
}

impl ZkConfig {
    fn default_ensemble() -> String {
        "localhost:2181".into()
    }
    fn default_root() -> String {
        "/solr".into()
    }
    fn default_session_timeout() -> u64 {
        1
    }
    fn default_reconnect_backoff_ms() -> u64 {
        500
    }
}

/// Node-selection policy choice.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterPolicy {
    RoundRobin,
    Adaptive,
}

impl Default for RouterPolicy {
    fn default() -> RouterPolicy {
        RouterPolicy::RoundRobin
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub policy: RouterPolicy,

    /// Ring-buffer size for the adaptive policy's per-URI history.
    #[serde(default = "RouterConfig::default_recency")]
    pub recency: usize,
}

impl Default for RouterConfig {
    fn default() -> RouterConfig {
        RouterConfig {
            policy: RouterPolicy::default(),
            recency: RouterConfig::default_recency(),
        }
    }
}

impl RouterConfig {
    fn default_recency() -> usize {
        16
    }
}

/// HTTP transport settings.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "HttpConfig::default_connect_timeout")]
    pub connect_timeout: u64,

    #[serde(default = "HttpConfig::default_read_timeout")]
    pub read_timeout: u64,

    #[serde(default = "HttpConfig::default_write_timeout")]
    pub write_timeout: u64,

    /// Maximum idle connections kept open per host.
    #[serde(default = "HttpConfig::default_idle_pool_size")]
    pub idle_pool_size: usize,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> HttpConfig {
        HttpConfig {
            connect_timeout: HttpConfig::default_connect_timeout(),
            read_timeout: HttpConfig::default_read_timeout(),
            write_timeout: HttpConfig::default_write_timeout(),
            idle_pool_size: HttpConfig::default_idle_pool_size(),
            user: None,
            password: None,
        }
    }
}

impl HttpConfig {
    fn default_connect_timeout() -> u64 {
        5
    }
    fn default_read_timeout() -> u64 {
        20
    }
    fn default_write_timeout() -> u64 {
        30
    }
    fn default_idle_pool_size() -> usize {
        10
    }
}

/// Retrier budget.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_retries")]
    pub retries: u32,

    /// Initial backoff, in milliseconds; doubles on each failed attempt.
    #[serde(default = "RetryConfig::default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> RetryConfig {
        RetryConfig {
            retries: RetryConfig::default_retries(),
            backoff_ms: RetryConfig::default_backoff_ms(),
        }
    }
}

impl RetryConfig {
    fn default_retries() -> u32 {
        3
    }
    fn default_backoff_ms() -> u64 {
        100
    }
}

/// Top-level configuration, flattening/nesting the per-component structs
/// the way the reference implementation's `coordinator::Config` nests its
/// backend configuration.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub zookeeper: ZkConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Collection this client serves.
    #[serde(default)]
    pub collection: String,

    /// Minimum acknowledged replication factor demanded per write.
    #[serde(default = "Config::default_min_rf")]
    pub min_rf: u32,
}

impl Config {
    fn default_min_rf() -> u32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_from_empty_document_using_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.zookeeper.ensemble, "localhost:2181");
        assert_eq!(config.router.policy, RouterPolicy::RoundRobin);
        assert_eq!(config.http.read_timeout, 20);
        assert_eq!(config.retry.retries, 3);
        assert_eq!(config.min_rf, 1);
    }

    #[test]
    fn config_overrides_only_the_fields_given() {
        let config: Config = serde_json::from_str(r#"{"router":{"policy":"adaptive","recency":4}}"#).unwrap();
        assert_eq!(config.router.policy, RouterPolicy::Adaptive);
        assert_eq!(config.router.recency, 4);
        assert_eq!(config.http.connect_timeout, 5);
    }
}
