use std::sync::Arc;

use super::super::admin::Election;
use super::super::admin::Elections;
use super::super::admin::Nodes;
use super::super::admin::NonBlockingLock;
use super::super::admin::NonBlockingLocks;
use super::super::backend::BackendAdmin;
use super::super::backend::ElectionAdminBehaviour;
use super::super::backend::NonBlockingLockAdminBehaviour;
use super::super::coordinator::ElectionStatus;
use super::super::ErrorKind;
use super::super::NodeId;
use super::super::Result;
use super::MockElection;
use super::MockNonBlockingLock;
use super::MockState;

/// `BackendAdmin` inspecting the shared `MockState`.
pub struct MockAdmin {
    pub node_id: NodeId,
    pub(super) state: Arc<MockState>,
}

impl MockAdmin {
    fn election_view(name: &str, election: &MockElection) -> Election {
        Election::new(name.to_string(), Box::new(MockElectionAdmin(election.clone())))
    }

    fn lock_view(lock: &MockNonBlockingLock) -> NonBlockingLock {
        NonBlockingLock::new(lock.name.clone(), Box::new(MockNBLAdmin(lock.clone())))
    }
}

impl BackendAdmin for MockAdmin {
    fn election(&self, name: &str) -> Result<Election> {
        let elections = self.state.elections.lock().expect("mock elections lock poisoned");
        elections
            .get(name)
            .map(|election| MockAdmin::election_view(name, election))
            .ok_or_else(|| ErrorKind::ElectionNotFound(name.to_string()).into())
    }

    fn elections(&self) -> Elections {
        let elections = self.state.elections.lock().expect("mock elections lock poisoned");
        let views: Vec<Result<Election>> = elections
            .iter()
            .map(|(name, election)| Ok(MockAdmin::election_view(name, election)))
            .collect();
        Elections::new(views.into_iter())
    }

    fn nodes(&self) -> Nodes {
        Nodes::new(std::iter::once(Ok(self.node_id.clone())))
    }

    fn non_blocking_lock(&self, lock: &str) -> Result<NonBlockingLock> {
        let nblocks = self.state.nblocks.lock().expect("mock locks lock poisoned");
        nblocks
            .get(lock)
            .filter(|held| held.locked())
            .map(MockAdmin::lock_view)
            .ok_or_else(|| ErrorKind::LockNotFound(lock.to_string()).into())
    }

    fn non_blocking_locks(&self) -> NonBlockingLocks {
        let nblocks = self.state.nblocks.lock().expect("mock locks lock poisoned");
        let views: Vec<Result<NonBlockingLock>> = nblocks
            .values()
            .filter(|held| held.locked())
            .map(|held| Ok(MockAdmin::lock_view(held)))
            .collect();
        NonBlockingLocks::new(views.into_iter())
    }

    fn version(&self) -> Result<String> {
        Ok("Mock coordinator".into())
    }
}

/// Election admin over the shared mock state.
struct MockElectionAdmin(MockElection);

impl ElectionAdminBehaviour for MockElectionAdmin {
    fn primary(&self) -> Result<Option<NodeId>> {
        let primary = self
            .0
            .primary
            .lock()
            .expect("MockElection::primary lock poisoned")
            .clone();
        Ok(primary)
    }

    fn secondaries_count(&self) -> Result<usize> {
        let secondaries = self
            .0
            .secondaries
            .lock()
            .expect("MockElection::secondaries lock poisoned");
        Ok(secondaries.len())
    }

    fn step_down(&self) -> Result<bool> {
        let primary = self
            .0
            .primary
            .lock()
            .expect("MockElection::primary lock poisoned")
            .take();
        if primary.is_none() {
            return Ok(false);
        }
        let is_primary = self
            .0
            .status
            .lock()
            .expect("MockElection::status lock poisoned")
            .is_primary();
        if is_primary {
            self.0.set_status(ElectionStatus::Secondary);
        }
        Ok(true)
    }
}

/// Lock admin over the shared mock state.
struct MockNBLAdmin(MockNonBlockingLock);

impl NonBlockingLockAdminBehaviour for MockNBLAdmin {
    fn force_release(&mut self) -> Result<()> {
        // Releasing a lock someone else already dropped is fine.
        let _ = self.0.release();
        Ok(())
    }

    fn owner(&self) -> Result<NodeId> {
        Ok(self.0.owner.clone())
    }
}
