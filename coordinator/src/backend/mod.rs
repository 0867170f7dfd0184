use super::admin::Election as AdminElection;
use super::admin::Elections;
use super::admin::Nodes;
use super::admin::NonBlockingLock as AdminNonBlockingLock;
use super::admin::NonBlockingLocks;
use super::coordinator::Election;
use super::coordinator::ElectionStatus;
use super::coordinator::ElectionWatch;
use super::coordinator::NonBlockingLock;
use super::coordinator::NonBlockingLockWatcher;
use super::coordinator::Sequence;
use super::NodeId;
use super::Result;

pub mod zookeeper;

/// Distributed coordination backend interface.
pub trait Backend: Send + Sync {
    /// Return an election with the given name.
    fn election(&self, name: String) -> Election;

    /// Return a non-blocking lock that can be acquired/released as needed.
    fn non_blocking_lock(&self, lock: String) -> NonBlockingLock;

    /// Get the ID of the current node.
    fn node_id(&self) -> &NodeId;

    /// Return a sequence that generates monotonically increasing IDs.
    fn sequence(&self, name: String) -> Sequence;
}

/// Distributed coordination admin backend interface.
pub trait BackendAdmin: Send + Sync {
    /// Find an election by name.
    fn election(&self, name: &str) -> Result<AdminElection>;

    /// Iterate over registered elections.
    fn elections(&self) -> Elections;

    /// Iterate over registered nodes.
    fn nodes(&self) -> Nodes;

    /// Find a non-blocking lock by name.
    fn non_blocking_lock(&self, lock: &str) -> Result<AdminNonBlockingLock>;

    /// Iterate over held non-blocking locks.
    fn non_blocking_locks(&self) -> NonBlockingLocks;

    /// Version information about the coordination system.
    fn version(&self) -> Result<String>;
}

/// Backend specific election admin behaviours.
pub trait ElectionAdminBehaviour {
    /// Fetch the `NodeId` of the primary for this election, if a primary is elected.
    fn primary(&self) -> Result<Option<NodeId>>;

    /// The number of secondary nodes waiting to take over if needed.
    fn secondaries_count(&self) -> Result<usize>;

    /// Strip the current primary of its role and forces a new election.
    fn step_down(&self) -> Result<bool>;
}

/// Backend specific election behaviours.
pub trait ElectionBehaviour: Send {
    /// Run for election.
    fn run(&mut self) -> Result<()>;

    /// Check the current election status.
    fn status(&self) -> ElectionStatus;

    /// Relinquish primary role, if primary, and remove itself from the election.
    fn step_down(&mut self) -> Result<()>;

    /// Step down from the election when the `Election` is dropped.
    fn step_down_on_drop(&mut self);

    /// Watch the election for changes.
    fn watch(&self) -> ElectionWatch;
}

/// Backend specific non-blocking lock admin behaviours.
pub trait NonBlockingLockAdminBehaviour {
    /// Attempt to release a non-blocking lock held by someone else.
    fn force_release(&mut self) -> Result<()>;

    /// Return the NodeId that owns a lock.
    fn owner(&self) -> Result<NodeId>;
}

/// Backend specific non-blocking lock behaviours.
pub trait NonBlockingLockBehaviour: Send {
    /// Attempt to acquire a non-blocking lock.
    fn acquire(&mut self) -> Result<()>;

    /// Lightweight check if the lock is held by us.
    fn check(&self) -> bool {
        self.watch().inspect()
    }

    /// Attempt to release a non-blocking lock.
    fn release(&mut self) -> Result<()>;

    /// Attempt to release a non-blocking lock when it is dropped.
    fn release_on_drop(&mut self);

    /// Return a `NonBlockingLockWatcher` that is kept in sync with the state of the lock.
    ///
    ///   * A `true` value indicates the lock is held.
    ///   * A `false` value indicates the lock is NOT held.
    fn watch(&self) -> NonBlockingLockWatcher;
}

/// Backend specific sequence behaviours.
pub trait SequenceBehaviour: Send + Sync {
    /// Generate the next value in the sequence.
    fn next(&self) -> Result<u64>;
}
