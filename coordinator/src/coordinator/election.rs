use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::super::backend::ElectionBehaviour;
use super::super::metrics::tally;
use super::super::metrics::ELECTION_RUN_FAIL;
use super::super::metrics::ELECTION_RUN_TOTAL;
use super::super::metrics::ELECTION_STEPDOWN_FAIL;
use super::super::metrics::ELECTION_STEPDOWN_TOTAL;
use super::super::Result;

/// Election for a single primary with secondaries ready to take over.
pub struct Election {
    inner: Box<dyn ElectionBehaviour>,
    name: String,
}

impl Election {
    pub(crate) fn new<S>(name: S, inner: Box<dyn ElectionBehaviour>) -> Self
    where
        S: Into<String>,
    {
        Election {
            inner,
            name: name.into(),
        }
    }
}

impl Election {
    /// Name of this election.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run for election.
    pub fn run(&mut self) -> Result<()> {
        tally(&ELECTION_RUN_TOTAL, &ELECTION_RUN_FAIL, self.inner.run())
    }

    /// Check the current election status.
    pub fn status(&self) -> ElectionStatus {
        self.inner.status()
    }

    /// Relinquish primary role, if primary, and remove itself from the election.
    pub fn step_down(&mut self) -> Result<()> {
        let outcome = self.inner.step_down();
        tally(&ELECTION_STEPDOWN_TOTAL, &ELECTION_STEPDOWN_FAIL, outcome)
    }

    /// Watch the election for changes.
    pub fn watch(&self) -> ElectionWatch {
        self.inner.watch()
    }
}

impl Drop for Election {
    fn drop(&mut self) {
        self.inner.step_down_on_drop()
    }
}

/// Status of a `Election` instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ElectionStatus {
    /// The election instnace is not a candidate for the `Election`.
    NotCandidate,

    /// The election is currently in progress.
    InProgress,

    /// This election instance is the primary for the `Election`.
    Primary,

    /// This election instance is a secondary.
    Secondary,

    /// This election instance was terminated by the coordinator.
    ///
    /// The reason the election instance was terminated (connection lost,
    /// instance de-registered, ...) is stored in the `String` payload.
    Terminated(String),
}

impl ElectionStatus {
    /// Check if the election is a candidate (primary or secondary) or not.
    pub fn is_candidate(&self) -> bool {
        matches!(self, ElectionStatus::Primary | ElectionStatus::Secondary)
    }

    /// Check if the election is primary.
    pub fn is_primary(&self) -> bool {
        matches!(self, ElectionStatus::Primary)
    }
}

/// Lightweight election watcher to check the status for changes.
#[derive(Clone)]
pub struct ElectionWatch(Arc<AtomicBool>);

impl ElectionWatch {
    pub(crate) fn new(inner: Arc<AtomicBool>) -> Self {
        ElectionWatch(inner)
    }

    /// Check if the election is (still) the primary.
    pub fn is_primary(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::mock::MockCoordinator;
    use super::super::super::NodeId;
    use super::ElectionStatus;

    fn mock_coordinator() -> MockCoordinator {
        MockCoordinator::default()
    }

    #[test]
    fn new_election_is_not_candidate() {
        let mock = mock_coordinator();
        let election = mock.mock().election("test");
        assert_eq!(election.name(), "test");
        assert_eq!(election.status(), ElectionStatus::NotCandidate);
        assert!(!election.watch().is_primary());
    }

    #[test]
    fn run_becomes_primary_when_elected() {
        let mock = mock_coordinator();
        let mock_election = mock.election("test");
        *mock_election.primary.lock().unwrap() = Some(NodeId::new());
        let mut election = mock.mock().election("test");
        election.run().unwrap();
        assert!(election.status().is_primary());
        assert!(election.watch().is_primary());
    }

    #[test]
    fn run_becomes_secondary_otherwise() {
        let mock = mock_coordinator();
        let mut election = mock.mock().election("test");
        election.run().unwrap();
        let status = election.status();
        assert_eq!(status, ElectionStatus::Secondary);
        assert!(status.is_candidate());
        assert!(!status.is_primary());
        assert!(!election.watch().is_primary());
    }

    #[test]
    fn step_down_leaves_election() {
        let mock = mock_coordinator();
        let mock_election = mock.election("test");
        *mock_election.primary.lock().unwrap() = Some(NodeId::new());
        let mut election = mock.mock().election("test");
        election.run().unwrap();
        let watch = election.watch();
        assert!(watch.is_primary());
        election.step_down().unwrap();
        assert_eq!(election.status(), ElectionStatus::NotCandidate);
        assert!(!watch.is_primary());
    }

    #[test]
    fn drop_steps_down() {
        let mock = mock_coordinator();
        let mock_election = mock.election("test");
        {
            let mut election = mock.mock().election("test");
            election.run().unwrap();
            assert_eq!(election.status(), ElectionStatus::Secondary);
        }
        let status = mock_election.status.lock().unwrap().clone();
        assert_eq!(status, ElectionStatus::NotCandidate);
    }

    #[test]
    fn terminated_is_not_candidate() {
        let status = ElectionStatus::Terminated("session lost".into());
        assert!(!status.is_candidate());
        assert!(!status.is_primary());
    }
}
