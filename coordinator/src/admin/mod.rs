use std::sync::Arc;

use slog::Logger;

use super::backend;
use super::backend::BackendAdmin;
use super::BackendConfig;
use super::Config;
use super::NodeId;
use super::Result;

mod election;
mod lock;

pub use self::election::Election;
pub use self::lock::NonBlockingLock;

/// Elections known to the coordinator.
pub type Elections = Listing<Election>;

/// Nodes registered with the coordinator.
pub type Nodes = Listing<NodeId>;

/// Non-blocking locks currently held.
pub type NonBlockingLocks = Listing<NonBlockingLock>;

/// Operator access to the coordinator: inspect and override elections and locks.
///
/// Admin sessions do not register a node of their own.
#[derive(Clone)]
pub struct Admin(Arc<dyn BackendAdmin>);

impl Admin {
    pub fn new(config: Config, logger: Logger) -> Result<Admin> {
        let backend = match config.backend {
            BackendConfig::Zookeeper(zookeeper) => Arc::new(
                backend::zookeeper::ZookeeperAdmin::new(zookeeper, logger)?,
            ),
        };
        Ok(Admin(backend))
    }

    /// Internal method to create an `Admin` from the given backend.
    pub(crate) fn with_backend(backend: Arc<dyn BackendAdmin>) -> Admin {
        Admin(backend)
    }
}

impl Admin {
    /// Find an election by name.
    pub fn election(&self, name: &str) -> Result<Election> {
        self.0.election(name)
    }

    /// Iterate over registered elections.
    pub fn elections(&self) -> Elections {
        self.0.elections()
    }

    /// Iterate over registered nodes.
    pub fn nodes(&self) -> Nodes {
        self.0.nodes()
    }

    /// Model a non-blocking lock.
    pub fn non_blocking_lock(&self, lock: &str) -> Result<NonBlockingLock> {
        self.0.non_blocking_lock(lock)
    }

    /// Iterate over held non-blocking locks.
    pub fn non_blocking_locks(&self) -> NonBlockingLocks {
        self.0.non_blocking_locks()
    }

    /// Version information about the coordination system.
    pub fn version(&self) -> Result<String> {
        self.0.version()
    }
}

/// Items listed by the coordinator, fetched lazily so each one may fail on its own.
pub struct Listing<T>(Box<dyn Iterator<Item = Result<T>>>);

impl<T> Listing<T> {
    pub(crate) fn new<I>(items: I) -> Listing<T>
    where
        I: Iterator<Item = Result<T>> + 'static,
    {
        Listing(Box::new(items))
    }
}

impl<T> Iterator for Listing<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock::MockCoordinator;

    #[test]
    fn lists_registered_node() {
        let mock = MockCoordinator::default();
        let nodes: Vec<_> = mock.admin().nodes().map(Result::unwrap).collect();
        assert_eq!(nodes, vec![mock.node_id.clone()]);
    }

    #[test]
    fn version() {
        let mock = MockCoordinator::default();
        assert_eq!(mock.admin().version().unwrap(), "Mock coordinator");
    }
}
