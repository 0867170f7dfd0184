use super::super::backend::NonBlockingLockAdminBehaviour;
use super::super::NodeId;
use super::super::Result;

/// A held non-blocking lock as seen by operators.
pub struct NonBlockingLock {
    behaviour: Box<dyn NonBlockingLockAdminBehaviour>,
    name: String,
}

impl NonBlockingLock {
    pub(crate) fn new(name: String, behaviour: Box<dyn NonBlockingLockAdminBehaviour>) -> Self {
        NonBlockingLock { behaviour, name }
    }

    /// Take the lock away from its holder, who then sees it as lost.
    pub fn force_release(&mut self) -> Result<()> {
        self.behaviour.force_release()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node holding the lock.
    pub fn owner(&self) -> Result<NodeId> {
        self.behaviour.owner()
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::mock::MockCoordinator;
    use super::super::super::ErrorKind;

    const LOCK: &str = "reports/nightly";

    #[test]
    fn force_release_frees_holder() {
        let mock = MockCoordinator::default();
        let mut held = mock.mock().non_blocking_lock(LOCK);
        held.acquire().unwrap();

        let admin = mock.admin();
        let mut locks: Vec<_> = admin.non_blocking_locks().collect::<Result<_, _>>().unwrap();
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].name(), LOCK);
        locks[0].force_release().unwrap();
        assert!(!held.check());
        assert_eq!(admin.non_blocking_locks().count(), 0);
    }

    #[test]
    fn free_lock_is_not_found() {
        let mock = MockCoordinator::default();
        let error = mock.admin().non_blocking_lock(LOCK).err().unwrap();
        assert_eq!(error.kind(), &ErrorKind::LockNotFound(LOCK.into()));
    }

    #[test]
    fn reports_owner() {
        let mock = MockCoordinator::default();
        let coordinator = mock.mock();
        let mut held = coordinator.non_blocking_lock(LOCK);
        held.acquire().unwrap();
        let lock = mock.admin().non_blocking_lock(LOCK).unwrap();
        assert_eq!(lock.name(), LOCK);
        assert_eq!(&lock.owner().unwrap(), coordinator.node_id());
    }
}
