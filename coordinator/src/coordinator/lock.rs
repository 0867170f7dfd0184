use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::super::backend::NonBlockingLockBehaviour;
use super::super::metrics::tally;
use super::super::metrics::NB_LOCK_ACQUIRE_FAIL;
use super::super::metrics::NB_LOCK_ACQUIRE_TOTAL;
use super::super::metrics::NB_LOCK_RELEASE_FAIL;
use super::super::metrics::NB_LOCK_RELEASE_TOTAL;
use super::super::Result;

/// Cluster-wide mutual exclusion that fails instead of waiting.
///
/// Acquiring a lock someone already holds, this handle included, is an error.
/// The lock is released when the handle is dropped or the holder's session ends,
/// so losing contact with the coordinator also means losing the lock.
pub struct NonBlockingLock {
    inner: Box<dyn NonBlockingLockBehaviour>,
    name: String,
}

impl NonBlockingLock {
    pub(crate) fn new<S>(name: S, inner: Box<dyn NonBlockingLockBehaviour>) -> NonBlockingLock
    where
        S: Into<String>,
    {
        NonBlockingLock {
            inner,
            name: name.into(),
        }
    }

    /// Take the lock or fail with `ErrorKind::LockHeld`.
    pub fn acquire(&mut self) -> Result<()> {
        let acquired = self.inner.acquire();
        tally(&NB_LOCK_ACQUIRE_TOTAL, &NB_LOCK_ACQUIRE_FAIL, acquired)
    }

    /// Whether this handle currently holds the lock, without asking the coordinator.
    pub fn check(&self) -> bool {
        self.inner.check()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Give the lock up, failing with `ErrorKind::LockNotHeld` if this handle does not hold it.
    pub fn release(&mut self) -> Result<()> {
        let released = self.inner.release();
        tally(&NB_LOCK_RELEASE_TOTAL, &NB_LOCK_RELEASE_FAIL, released)
    }

    /// Flag that tracks whether the lock is held, for code that must stop when it is lost.
    pub fn watch(&self) -> NonBlockingLockWatcher {
        self.inner.watch()
    }
}

impl Drop for NonBlockingLock {
    fn drop(&mut self) {
        self.inner.release_on_drop();
    }
}

/// Shared view of a lock's held state, see `NonBlockingLock::watch`.
#[derive(Clone)]
pub struct NonBlockingLockWatcher(Arc<AtomicBool>);

impl NonBlockingLockWatcher {
    pub(crate) fn new(held: Arc<AtomicBool>) -> NonBlockingLockWatcher {
        NonBlockingLockWatcher(held)
    }

    /// `true` while the lock is held.
    pub fn inspect(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
