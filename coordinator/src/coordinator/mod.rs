use std::sync::Arc;

use slog::Logger;

use super::backend;
use super::backend::Backend;
use super::BackendConfig;
use super::Config;
use super::NodeId;
use super::Result;

mod election;
mod leader;
mod lock;
mod looping_election;
mod sequence;

pub use self::election::Election;
pub use self::election::ElectionStatus;
pub use self::election::ElectionWatch;
pub use self::leader::LeaderElectionOpts;
pub use self::leader::LeaderElectionService;
pub use self::leader::LeadershipListener;
pub use self::lock::NonBlockingLock;
pub use self::lock::NonBlockingLockWatcher;
pub use self::looping_election::LoopingElection;
pub use self::looping_election::LoopingElectionControl;
pub use self::looping_election::LoopingElectionLogic;
pub use self::looping_election::LoopingElectionOpts;
pub use self::looping_election::ShutdownReceiver;
pub use self::looping_election::ShutdownSender;
pub use self::sequence::Sequence;
pub use self::sequence::SequenceId;

/// Interface to access distributed coordination services.
#[derive(Clone)]
pub struct Coordinator(Arc<dyn Backend>);

impl Coordinator {
    pub fn new(config: Config, logger: Logger) -> Result<Coordinator> {
        let node_id = {
            let mut node = NodeId::new();
            node.extra(config.node_attributes);
            node
        };
        let backend = match config.backend {
            BackendConfig::Zookeeper(zookeeper) => Arc::new(
                backend::zookeeper::Zookeeper::new(node_id, zookeeper, logger)?,
            ),
        };
        Ok(Coordinator(backend))
    }

    /// Internal method to create a `Coordinator` from the given backend.
    pub(crate) fn with_backend(backend: Arc<dyn Backend>) -> Coordinator {
        Coordinator(backend)
    }
}

impl Coordinator {
    /// Return an `Election` object to run for (and manage) the named election.
    pub fn election<S: Into<String>>(&self, name: S) -> Election {
        self.0.election(name.into())
    }

    /// Join the named election in the background and notify `listener` of leadership changes.
    ///
    /// See `LeaderElectionService` for details.
    pub fn leader_service<S, L>(
        &self,
        name: S,
        listener: L,
        opts: LeaderElectionOpts,
        logger: Logger,
    ) -> Result<LeaderElectionService>
    where
        S: Into<String>,
        L: LeadershipListener + 'static,
    {
        LeaderElectionService::start(self.clone(), name.into(), listener, opts, logger)
    }

    /// Get the ID of the current node.
    pub fn node_id(&self) -> &NodeId {
        self.0.node_id()
    }

    /// Return a non-blocking lock that can be acquired/released as needed.
    ///
    /// If a lock is already held by a process (including the current process)
    /// any acquire operation will fail.
    /// Only locks that are currently held can be released.
    ///
    /// Locks are automatically released if the process that holds them crashes
    /// (or is no longer able to talk to the coordination system).
    ///
    /// If a lock is lost (the coordinator is no longer reachable or thinks we no longer
    /// hold the lock for any reason) the state is changed and applications can check this.
    pub fn non_blocking_lock<S: Into<String>>(&self, lock: S) -> NonBlockingLock {
        self.0.non_blocking_lock(lock.into())
    }

    /// Return the named `Sequence` to generate cluster-wide increasing IDs.
    pub fn sequence<S: Into<String>>(&self, name: S) -> Sequence {
        self.0.sequence(name.into())
    }
}
