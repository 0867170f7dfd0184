use serde::Deserialize;
use serde::Serialize;

/// Zookeeper distributed coordination configuration options.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZookeeperConfig {
    /// Background cleaner configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Zookeeper ensemble connection string (`host:port[,host:port...][/chroot]`).
    #[serde(default = "ZookeeperConfig::default_ensemble")]
    pub ensemble: String,

    /// Session (re)connection retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Zookeeper session timeout (in seconds).
    #[serde(default = "ZookeeperConfig::default_timeout")]
    pub timeout: u64,
}

impl Default for ZookeeperConfig {
    fn default() -> ZookeeperConfig {
        ZookeeperConfig {
            cleanup: CleanupConfig::default(),
            ensemble: ZookeeperConfig::default_ensemble(),
            retry: RetryConfig::default(),
            timeout: ZookeeperConfig::default_timeout(),
        }
    }
}

impl ZookeeperConfig {
    fn default_ensemble() -> String {
        "localhost:2181/zkcoord".into()
    }

    fn default_timeout() -> u64 {
        10
    }
}

impl ZookeeperConfig {
    /// List of `host:port` servers in the ensemble, without the chroot.
    pub fn hosts(&self) -> Vec<String> {
        let servers = match self.ensemble.find('/') {
            None => self.ensemble.as_str(),
            Some(index) => &self.ensemble[..index],
        };
        servers
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Zookeeper background cleaner options.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    /// Seconds to wait between cleanup cycles.
    #[serde(default = "CleanupConfig::default_interval")]
    pub interval: u64,

    /// Maximum number of nodes to delete in a single cleanup cycle.
    #[serde(default = "CleanupConfig::default_limit")]
    pub limit: usize,

    /// Number of cycles before the cleaner election is re-run (0 to never re-run).
    #[serde(default = "CleanupConfig::default_term")]
    pub term: u64,
}

impl Default for CleanupConfig {
    fn default() -> CleanupConfig {
        CleanupConfig {
            interval: CleanupConfig::default_interval(),
            limit: CleanupConfig::default_limit(),
            term: CleanupConfig::default_term(),
        }
    }
}

impl CleanupConfig {
    fn default_interval() -> u64 {
        3600
    }

    fn default_limit() -> usize {
        1000
    }

    fn default_term() -> u64 {
        24
    }
}

/// Exponential backoff options used when a zookeeper session needs to be (re)established.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Base delay (in milliseconds) between attempts, scaled up at each retry.
    #[serde(default = "RetryConfig::default_base_sleep_ms")]
    pub base_sleep_ms: u64,

    /// Maximum number of retries after the first failed attempt.
    #[serde(default = "RetryConfig::default_max_retries")]
    pub max_retries: u32,

    /// Upper bound (in milliseconds) to the delay between attempts.
    #[serde(default = "RetryConfig::default_max_sleep_ms")]
    pub max_sleep_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> RetryConfig {
        RetryConfig {
            base_sleep_ms: RetryConfig::default_base_sleep_ms(),
            max_retries: RetryConfig::default_max_retries(),
            max_sleep_ms: RetryConfig::default_max_sleep_ms(),
        }
    }
}

impl RetryConfig {
    fn default_base_sleep_ms() -> u64 {
        1000
    }

    fn default_max_retries() -> u32 {
        3
    }

    fn default_max_sleep_ms() -> u64 {
        30_000
    }
}

#[cfg(test)]
mod tests {
    use super::ZookeeperConfig;

    fn config(ensemble: &str) -> ZookeeperConfig {
        ZookeeperConfig {
            ensemble: ensemble.into(),
            ..ZookeeperConfig::default()
        }
    }

    #[test]
    fn hosts_strip_chroot() {
        let hosts = config("localhost:2181/zkcoord").hosts();
        assert_eq!(hosts, vec!["localhost:2181".to_string()]);
    }

    #[test]
    fn hosts_without_chroot() {
        let hosts = config("zk1:2181, zk2:2181,zk3:2181").hosts();
        assert_eq!(hosts, vec!["zk1:2181", "zk2:2181", "zk3:2181"]);
    }

    #[test]
    fn hosts_skip_empty_entries() {
        let hosts = config("zk1:2181,,/chroot/nested").hosts();
        assert_eq!(hosts, vec!["zk1:2181"]);
    }
}
