use std::sync::Arc;

use super::super::backend::Backend;
use super::super::backend::ElectionBehaviour;
use super::super::backend::NonBlockingLockBehaviour;
use super::super::backend::SequenceBehaviour;
use super::super::coordinator::Election;
use super::super::coordinator::ElectionStatus;
use super::super::coordinator::ElectionWatch;
use super::super::coordinator::NonBlockingLock;
use super::super::coordinator::NonBlockingLockWatcher;
use super::super::coordinator::Sequence;
use super::super::ErrorKind;
use super::super::NodeId;
use super::super::Result;
use super::MockElection;
use super::MockNonBlockingLock;
use super::MockState;

/// `Backend` handing out behaviours over the shared `MockState`.
pub struct MockBackend {
    pub node_id: NodeId,
    pub(super) state: Arc<MockState>,
}

impl Backend for MockBackend {
    fn election(&self, name: String) -> Election {
        let behaviour = self.state.election(&name);
        Election::new(name, Box::new(behaviour))
    }

    fn non_blocking_lock(&self, lock: String) -> NonBlockingLock {
        let behaviour = MockNBL {
            held: false,
            lock: lock.clone(),
            node_id: self.node_id.clone(),
            state: Arc::clone(&self.state),
        };
        NonBlockingLock::new(lock, Box::new(behaviour))
    }

    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    fn sequence(&self, name: String) -> Sequence {
        let behaviour = MockSequence {
            name: name.clone(),
            state: Arc::clone(&self.state),
        };
        Sequence::new(name, Arc::new(behaviour))
    }
}

impl ElectionBehaviour for MockElection {
    fn run(&mut self) -> Result<()> {
        if self.status().is_candidate() {
            return Err(ErrorKind::ElectionRunning(self.name.clone()).into());
        }
        let primary = self
            .primary
            .lock()
            .expect("MockElection::primary lock poisoned")
            .is_some();
        if primary {
            self.set_status(ElectionStatus::Primary);
        } else {
            self.set_status(ElectionStatus::Secondary);
        }
        Ok(())
    }

    fn status(&self) -> ElectionStatus {
        self.status
            .lock()
            .expect("MockElection::status lock poisoned")
            .clone()
    }

    fn step_down(&mut self) -> Result<()> {
        self.set_status(ElectionStatus::NotCandidate);
        Ok(())
    }

    fn step_down_on_drop(&mut self) {
        self.set_status(ElectionStatus::NotCandidate);
    }

    fn watch(&self) -> ElectionWatch {
        ElectionWatch::new(Arc::clone(&self.watch))
    }
}

/// Handle on a mock lock; only the handle that acquired it may release it.
struct MockNBL {
    held: bool,
    lock: String,
    node_id: NodeId,
    state: Arc<MockState>,
}

impl MockNBL {
    fn shared(&self) -> MockNonBlockingLock {
        self.state.non_blocking_lock(&self.lock, &self.node_id)
    }
}

impl NonBlockingLockBehaviour for MockNBL {
    fn acquire(&mut self) -> Result<()> {
        self.shared().acquire()?;
        self.held = true;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        let shared = self.shared();
        let held = std::mem::replace(&mut self.held, false);
        if held && shared.locked() {
            return shared.release();
        }
        Err(ErrorKind::LockNotHeld(self.lock.clone(), shared.owner).into())
    }

    fn release_on_drop(&mut self) {
        if self.held {
            let _ = self.release();
        }
    }

    fn watch(&self) -> NonBlockingLockWatcher {
        NonBlockingLockWatcher::new(Arc::clone(&self.shared().locked))
    }
}

/// Sequence counting up from 0.
struct MockSequence {
    name: String,
    state: Arc<MockState>,
}

impl SequenceBehaviour for MockSequence {
    fn next(&self) -> Result<u64> {
        let mut sequences = self.state.sequences.lock().expect("mock sequences lock poisoned");
        let counter = sequences.entry(self.name.clone()).or_insert(0);
        let id = *counter;
        *counter = id
            .checked_add(1)
            .ok_or_else(|| ErrorKind::SequenceExhausted(self.name.clone()))?;
        Ok(id)
    }
}
