use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use super::super::backend::SequenceBehaviour;
use super::super::metrics::tally;
use super::super::metrics::SEQUENCE_NEXT_FAIL;
use super::super::metrics::SEQUENCE_NEXT_TOTAL;
use super::super::Result;

/// Cluster-wide generator of increasing IDs.
///
/// IDs returned by the same named sequence are unique and strictly increasing
/// across all processes using the same coordinator.
#[derive(Clone)]
pub struct Sequence {
    behaviour: Arc<dyn SequenceBehaviour>,
    name: String,
}

impl Sequence {
    pub(crate) fn new<S>(name: S, behaviour: Arc<dyn SequenceBehaviour>) -> Sequence
    where
        S: Into<String>,
    {
        Sequence {
            behaviour,
            name: name.into(),
        }
    }

    /// Generate the next ID in the sequence.
    pub fn generate(&self) -> Result<SequenceId> {
        let next = self.behaviour.next().map(SequenceId);
        tally(&SEQUENCE_NEXT_TOTAL, &SEQUENCE_NEXT_FAIL, next)
    }

    /// Name of the sequence.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// ID generated by a `Sequence`.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct SequenceId(u64);

impl SequenceId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<SequenceId> for u64 {
    fn from(id: SequenceId) -> u64 {
        id.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:010}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::mock::MockCoordinator;
    use super::SequenceId;

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(SequenceId(42).to_string(), "0000000042");
        assert_eq!(SequenceId(12345678901).to_string(), "12345678901");
    }

    #[test]
    fn ids_increase() {
        let mock = MockCoordinator::default();
        let sequence = mock.mock().sequence("ids");
        assert_eq!(sequence.name(), "ids");
        let first = sequence.generate().unwrap();
        let second = sequence.generate().unwrap();
        let third = mock.mock().sequence("ids").generate().unwrap();
        assert!(first < second);
        assert!(second < third);
        assert_eq!(first.value(), 0);
        assert_eq!(u64::from(third), 2);
    }

    #[test]
    fn sequences_are_independent() {
        let mock = MockCoordinator::default();
        let coordinator = mock.mock();
        let ids = coordinator.sequence("ids");
        let other = coordinator.sequence("other");
        ids.generate().unwrap();
        ids.generate().unwrap();
        assert_eq!(other.generate().unwrap().value(), 0);
        assert_eq!(mock.sequence("ids"), 2);
    }
}
