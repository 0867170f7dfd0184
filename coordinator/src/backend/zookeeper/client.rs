use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use failure::ResultExt;
use sha2::Digest;
use sha2::Sha256;
use slog::debug;
use slog::error;
use slog::info;
use slog::warn;
use slog::Logger;

use zookeeper::Acl;
use zookeeper::CreateMode;
use zookeeper::Stat;
use zookeeper::WatchedEvent;
use zookeeper::ZkError;
use zookeeper::ZkResult;
use zookeeper::ZkState;
use zookeeper::ZooKeeper;

use zkcoord_util_failure::failure_info;

use super::super::super::config::ZookeeperConfig;
use super::super::super::ErrorKind;
use super::super::super::NodeId;
use super::super::super::Result;
use super::constants::PREFIX_ELECTION;
use super::constants::PREFIX_LOCK;
use super::constants::PREFIX_NODE;
use super::constants::PREFIX_SEQUENCE;
use super::metrics::ZOO_CONNECTION_COUNT;
use super::metrics::ZOO_CONNECTION_RETRY;
use super::metrics::ZOO_OP_DURATION;
use super::metrics::ZOO_OP_ERRORS_COUNT;
use super::metrics::ZOO_TIMEOUTS_COUNT;
use super::retry::ExponentialBackoff;

/// Length of the hash prefix used to shard znodes below a root.
const SHARD_PREFIX_LEN: usize = 4;

/// Wrapper around a `ZooKeeper` session to handle [re]connection requests.
pub struct Client {
    config: ZookeeperConfig,
    logger: Logger,
    registry: Option<Registration>,
    retry: ExponentialBackoff,
    session: Mutex<Session>,
}

impl Client {
    /// Connect to the ensemble, registering `node_id` (if any) in the nodes registry.
    pub fn new(config: ZookeeperConfig, node_id: Option<&NodeId>, logger: Logger) -> Result<Client> {
        let registry = match node_id {
            None => None,
            Some(node_id) => {
                let payload = serde_json::to_vec(node_id).context(ErrorKind::Encode("node id"))?;
                let path = Client::path_from_hash(PREFIX_NODE, &node_id.to_string());
                Some(Registration { path, payload })
            }
        };
        let retry = ExponentialBackoff::new(&config.retry);
        let session = Client::connect_with_retry(&config, registry.as_ref(), &retry, &logger)?;
        Ok(Client {
            config,
            logger,
            registry,
            retry,
            session: Mutex::new(session),
        })
    }

    /// Parent of `path`, `/` for top level znodes.
    pub fn container_path(path: &str) -> String {
        match path.rfind('/') {
            None | Some(0) => "/".to_string(),
            Some(index) => path[..index].to_string(),
        }
    }

    /// Hash a user provided key so it can be used as a znode name.
    pub fn hash_from_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Create an empty persistent znode at `path` unless one is already there.
    ///
    /// Persistent rather than container znodes so Zookeeper 3.4 ensembles work too;
    /// the background cleaner removes them once empty.
    pub fn mkcontainer(keeper: &ZooKeeper, path: &str) -> Result<()> {
        Client::create_persistent(keeper, path, "container creation")
    }

    /// Shard `hash` below `root` using its first `SHARD_PREFIX_LEN` characters.
    ///
    /// # Panics
    /// If `hash` is shorter than `SHARD_PREFIX_LEN`.
    pub fn path_from_hash(root: &str, hash: &str) -> String {
        assert!(
            hash.len() >= SHARD_PREFIX_LEN,
            "Client::path_from_hash hash must have at least {} characters",
            SHARD_PREFIX_LEN,
        );
        let (shard, _) = hash.split_at(SHARD_PREFIX_LEN);
        format!("{}/{}/{}", root, shard, hash)
    }

    /// Return the full path for the given key, after hashing it.
    pub fn path_from_key(root: &str, key: &str) -> String {
        let hash = Client::hash_from_key(key);
        Client::path_from_hash(root, &hash)
    }
}

impl Client {
    /// Handle to a live session, reconnecting first if the last one was closed.
    pub fn get(&self) -> Result<Arc<ZooKeeper>> {
        let mut session = self.session.lock().expect("zookeeper session lock was poisoned");
        if session.closed() {
            let registry = self.registry.as_ref();
            *session = Client::connect_with_retry(&self.config, registry, &self.retry, &self.logger)?;
        }
        Ok(Arc::clone(&session.keeper))
    }
}

/// Instrumented wrappers around `ZooKeeper` operations.
impl Client {
    pub fn create(
        keeper: &ZooKeeper,
        path: &str,
        data: Vec<u8>,
        acl: Vec<Acl>,
        mode: CreateMode,
    ) -> ZkResult<String> {
        Client::observe("create", || keeper.create(path, data, acl, mode))
    }

    pub fn delete(keeper: &ZooKeeper, path: &str, version: Option<i32>) -> ZkResult<()> {
        Client::observe("delete", || keeper.delete(path, version))
    }

    pub fn exists(keeper: &ZooKeeper, path: &str, watch: bool) -> ZkResult<Option<Stat>> {
        Client::observe("exists", || keeper.exists(path, watch))
    }

    pub fn exists_w<W>(keeper: &ZooKeeper, path: &str, watcher: W) -> ZkResult<Option<Stat>>
    where
        W: Fn(WatchedEvent) + Send + 'static,
    {
        Client::observe("exists", || keeper.exists_w(path, watcher))
    }

    pub fn get_children(keeper: &ZooKeeper, path: &str, watch: bool) -> ZkResult<Vec<String>> {
        Client::observe("get_children", || keeper.get_children(path, watch))
    }

    pub fn get_children_w<W>(keeper: &ZooKeeper, path: &str, watcher: W) -> ZkResult<Vec<String>>
    where
        W: Fn(WatchedEvent) + Send + 'static,
    {
        Client::observe("get_children", || keeper.get_children_w(path, watcher))
    }

    pub fn get_data(keeper: &ZooKeeper, path: &str, watch: bool) -> ZkResult<(Vec<u8>, Stat)> {
        Client::observe("get_data", || keeper.get_data(path, watch))
    }

    fn observe<T, F>(operation: &str, call: F) -> ZkResult<T>
    where
        F: FnOnce() -> ZkResult<T>,
    {
        let outcome = ZOO_OP_DURATION
            .with_label_values(&[operation])
            .observe_closure_duration(call);
        match outcome {
            Err(ZkError::OperationTimeout) => {
                ZOO_OP_ERRORS_COUNT.with_label_values(&[operation]).inc();
                ZOO_TIMEOUTS_COUNT.inc();
            }
            Err(_) => ZOO_OP_ERRORS_COUNT.with_label_values(&[operation]).inc(),
            Ok(_) => (),
        };
        outcome
    }
}

impl Client {
    /// Establish a new session, retrying with backoff on failure.
    fn connect_with_retry(
        config: &ZookeeperConfig,
        registry: Option<&Registration>,
        retry: &ExponentialBackoff,
        logger: &Logger,
    ) -> Result<Session> {
        let mut attempt = 0;
        loop {
            let error = match Client::connect(config, registry, logger) {
                Ok(session) => return Ok(session),
                Err(error) => error,
            };
            let delay = match retry.sleep_for(attempt) {
                Some(delay) => delay,
                None => return Err(error),
            };
            ZOO_CONNECTION_RETRY.inc();
            warn!(
                logger, "Zookeeper session attempt failed, retrying";
                "attempt" => attempt + 1,
                "delay_ms" => delay.as_millis() as u64,
                failure_info(&error),
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }

    /// Open a session, prepare the root layout and register this node in it.
    fn connect(
        config: &ZookeeperConfig,
        registry: Option<&Registration>,
        logger: &Logger,
    ) -> Result<Session> {
        info!(logger, "Initiating new zookeeper session"; "ensemble" => &config.ensemble);
        let timeout = Duration::from_secs(config.timeout);
        let keeper =
            ZooKeeper::connect(&config.ensemble, timeout, |_| {}).context(ErrorKind::BackendConnect)?;
        ZOO_CONNECTION_COUNT.inc();

        for root in &["/", PREFIX_NODE, PREFIX_ELECTION, PREFIX_LOCK, PREFIX_SEQUENCE] {
            let missing = Client::exists(&keeper, root, false)
                .with_context(|_| ErrorKind::Backend("path check"))?
                .is_none();
            if missing {
                info!(logger, "Creating coordination root"; "path" => *root);
                Client::create_persistent(&keeper, root, "path creation")?;
            }
        }
        if let Some(registry) = registry {
            registry.register(&keeper)?;
            debug!(logger, "Registered node for debugging"; "path" => &registry.path);
        }

        let closed = Arc::new(AtomicBool::new(false));
        let on_close = Arc::clone(&closed);
        let logger = logger.clone();
        keeper.add_listener(move |state| {
            if Client::log_state(&logger, state) {
                on_close.store(true, Ordering::Relaxed);
            }
        });
        Ok(Session {
            closed,
            keeper: Arc::new(keeper),
        })
    }

    /// Log a session state change, returning `true` once the session is gone for good.
    fn log_state(logger: &Logger, state: ZkState) -> bool {
        match state {
            ZkState::Closed => {
                warn!(logger, "Zookeeper session closed, a new one will be opened on next use");
                return true;
            }
            ZkState::AuthFailed => error!(logger, "Zookeeper rejected the session credentials"),
            ZkState::Connected => info!(logger, "Zookeeper session connected"),
            ZkState::ConnectedReadOnly => {
                warn!(logger, "Zookeeper session connected to a read-only server")
            }
            ZkState::Connecting => debug!(logger, "Zookeeper session (re)connecting"),
            other => debug!(logger, "Zookeeper session state changed"; "state" => ?other),
        };
        false
    }

    fn create_persistent(keeper: &ZooKeeper, path: &str, operation: &'static str) -> Result<()> {
        let acl = Acl::open_unsafe().clone();
        match Client::create(keeper, path, Vec::new(), acl, CreateMode::Persistent) {
            Ok(_) | Err(ZkError::NodeExists) => Ok(()),
            Err(error) => Err(error)
                .context(ErrorKind::Backend(operation))
                .map_err(Into::into),
        }
    }
}

/// A `ZooKeeper` handle flagged once its session closes.
struct Session {
    closed: Arc<AtomicBool>,
    keeper: Arc<ZooKeeper>,
}

impl Session {
    fn closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Ephemeral znode advertising this process under `/nodes`.
struct Registration {
    path: String,
    payload: Vec<u8>,
}

impl Registration {
    /// Create the ephemeral znode, adding its shard container on first use.
    fn register(&self, keeper: &ZooKeeper) -> Result<()> {
        let attempt = || {
            let acl = Acl::read_unsafe().clone();
            let payload = self.payload.clone();
            Client::create(keeper, &self.path, payload, acl, CreateMode::Ephemeral)
        };
        let outcome = match attempt() {
            Err(ZkError::NoNode) => {
                Client::mkcontainer(keeper, &Client::container_path(&self.path))?;
                attempt()
            }
            outcome => outcome,
        };
        outcome
            .map(|_| ())
            .context(ErrorKind::Backend("node registration"))
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::Client;

    #[test]
    fn container_path() {
        assert_eq!(Client::container_path("/a/b/c"), "/a/b");
        assert_eq!(Client::container_path("/a"), "/");
        assert_eq!(Client::container_path("a"), "/");
    }

    #[test]
    fn hash_is_sha256_hex() {
        let hash = Client::hash_from_key("test");
        assert_eq!(
            hash,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn path_from_hash_uses_prefix() {
        let path = Client::path_from_hash("/nodes", "abcdef0123");
        assert_eq!(path, "/nodes/abcd/abcdef0123");
    }

    #[test]
    #[should_panic(expected = "must have at least 4 characters")]
    fn path_from_short_hash_panics() {
        Client::path_from_hash("/nodes", "abc");
    }

    #[test]
    fn path_from_key_hashes() {
        let path = Client::path_from_key("/locks", "test");
        assert_eq!(
            path,
            "/locks/9f86/9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }
}
