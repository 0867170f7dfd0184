//! In-memory coordinator for tests.
//!
//! A `MockCoordinator` hands out `Coordinator` and `Admin` instances backed by the same state
//! so tests can drive and inspect elections, locks and sequences directly.
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use super::coordinator::ElectionStatus;
use super::Admin;
use super::Coordinator;
use super::ErrorKind;
use super::NodeId;
use super::Result;

mod admin;
mod backend;

use self::admin::MockAdmin;
use self::backend::MockBackend;

/// In-memory stand-in for a coordination service.
#[derive(Default)]
pub struct MockCoordinator {
    pub node_id: NodeId,
    state: Arc<MockState>,
}

impl MockCoordinator {
    /// Return an `Admin` interface to the mock state.
    pub fn admin(&self) -> Admin {
        Admin::with_backend(Arc::new(MockAdmin {
            node_id: self.node_id.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    /// Return a `Coordinator` interface to the mock state.
    pub fn mock(&self) -> Coordinator {
        Coordinator::with_backend(Arc::new(MockBackend {
            node_id: self.node_id.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    /// Access the named election, creating it if needed.
    pub fn election(&self, name: &str) -> MockElection {
        self.state.election(name)
    }

    /// Access the named lock, creating it if needed.
    pub fn non_blocking_lock(&self, name: &str) -> MockNonBlockingLock {
        self.state.non_blocking_lock(name, &self.node_id)
    }

    /// Next value the named sequence will generate.
    pub fn sequence(&self, name: &str) -> u64 {
        let sequences = self.state.sequences.lock().expect("mock sequences lock poisoned");
        sequences.get(name).copied().unwrap_or(0)
    }
}

/// Elections, locks and sequences shared by every handle of a `MockCoordinator`.
#[derive(Default)]
struct MockState {
    elections: Mutex<HashMap<String, MockElection>>,
    nblocks: Mutex<HashMap<String, MockNonBlockingLock>>,
    sequences: Mutex<HashMap<String, u64>>,
}

impl MockState {
    fn election(&self, name: &str) -> MockElection {
        let mut elections = self.elections.lock().expect("mock elections lock poisoned");
        elections
            .entry(name.to_string())
            .or_insert_with(|| MockElection::new(name.to_string()))
            .clone()
    }

    fn non_blocking_lock(&self, name: &str, owner: &NodeId) -> MockNonBlockingLock {
        let mut nblocks = self.nblocks.lock().expect("mock locks lock poisoned");
        nblocks
            .entry(name.to_string())
            .or_insert_with(|| MockNonBlockingLock::new(name.to_string(), owner.clone()))
            .clone()
    }
}

/// Shared state of a mock election.
///
/// Running the election makes the candidate primary if `primary` is set and secondary otherwise.
#[derive(Clone)]
pub struct MockElection {
    pub name: String,
    pub primary: Arc<Mutex<Option<NodeId>>>,
    pub secondaries: Arc<Mutex<Vec<NodeId>>>,
    pub status: Arc<Mutex<ElectionStatus>>,
    watch: Arc<AtomicBool>,
}

impl MockElection {
    pub fn new(name: String) -> MockElection {
        MockElection {
            name,
            primary: Arc::new(Mutex::new(None)),
            secondaries: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(ElectionStatus::NotCandidate)),
            watch: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the election status, keeping watchers in sync.
    pub fn set_status(&self, status: ElectionStatus) {
        self.watch.store(status.is_primary(), Ordering::Relaxed);
        *self.status.lock().expect("MockElection::status lock poisoned") = status;
    }
}

/// Shared state of a mock non-blocking lock.
#[derive(Clone)]
pub struct MockNonBlockingLock {
    pub locked: Arc<AtomicBool>,
    pub name: String,
    pub owner: NodeId,
}

impl MockNonBlockingLock {
    pub fn new(name: String, owner: NodeId) -> MockNonBlockingLock {
        MockNonBlockingLock {
            locked: Arc::new(AtomicBool::new(false)),
            name,
            owner,
        }
    }

    /// Mark the lock as held, failing if it already is.
    pub fn acquire(&self) -> Result<()> {
        if self.locked.swap(true, Ordering::Relaxed) {
            return Err(ErrorKind::LockHeld(self.name.clone(), self.owner.clone()).into());
        }
        Ok(())
    }

    pub fn locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Mark the lock as free, failing if it was not held.
    pub fn release(&self) -> Result<()> {
        if !self.locked.swap(false, Ordering::Relaxed) {
            return Err(ErrorKind::LockNotHeld(self.name.clone(), self.owner.clone()).into());
        }
        Ok(())
    }
}
