//! Helpers for tests that need a running zookeeper ensemble.
//!
//! These tests are `#[ignore]`d by default; run them with `cargo test -- --ignored`
//! after pointing `ZKCOORD_TEST_ENSEMBLE` at a disposable ensemble.
use std::sync::Arc;

use slog::o;
use slog::Discard;
use slog::Logger;

use super::super::super::config::RetryConfig;
use super::super::super::config::ZookeeperConfig;
use super::super::super::NodeId;
use super::client::Client;

const ENSEMBLE_VAR: &str = "ZKCOORD_TEST_ENSEMBLE";
const ENSEMBLE_DEFAULT: &str = "localhost:2181/zkcoord-tests";

pub fn config() -> ZookeeperConfig {
    let ensemble = std::env::var(ENSEMBLE_VAR).unwrap_or_else(|_| ENSEMBLE_DEFAULT.to_string());
    ZookeeperConfig {
        ensemble,
        retry: RetryConfig {
            base_sleep_ms: 100,
            max_retries: 1,
            max_sleep_ms: 500,
        },
        ..ZookeeperConfig::default()
    }
}

/// Open a new session against the test ensemble.
pub fn client() -> Arc<Client> {
    let client = Client::new(config(), Some(&NodeId::new()), logger())
        .expect("unable to connect to the test ensemble");
    Arc::new(client)
}

pub fn logger() -> Logger {
    Logger::root(Discard, o!())
}

/// Key that no other test run will collide with.
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, NodeId::new())
}
