use super::super::backend::ElectionAdminBehaviour;
use super::super::NodeId;
use super::super::Result;

/// An election as seen by operators, who can inspect it and depose its primary.
pub struct Election {
    behaviour: Box<dyn ElectionAdminBehaviour>,
    name: String,
}

impl Election {
    pub(crate) fn new(name: String, behaviour: Box<dyn ElectionAdminBehaviour>) -> Election {
        Election { behaviour, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node currently holding the primary role, `None` between terms.
    pub fn primary(&self) -> Result<Option<NodeId>> {
        self.behaviour.primary()
    }

    /// Candidates queued behind the primary.
    pub fn secondaries_count(&self) -> Result<usize> {
        self.behaviour.secondaries_count()
    }

    /// Remove the primary's candidacy so the next candidate takes over.
    ///
    /// `Ok(false)` means there was no primary to remove.
    pub fn step_down(&self) -> Result<bool> {
        self.behaviour.step_down()
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::mock::MockCoordinator;
    use super::super::super::ErrorKind;
    use super::super::super::NodeId;

    /// Mock with an "orders" election led by a fresh node and followed by `followers` nodes.
    fn orders(followers: usize) -> (MockCoordinator, NodeId) {
        let mock = MockCoordinator::default();
        let leader = NodeId::new();
        let election = mock.election("orders");
        *election.primary.lock().unwrap() = Some(leader.clone());
        election
            .secondaries
            .lock()
            .unwrap()
            .extend((0..followers).map(|_| NodeId::new()));
        (mock, leader)
    }

    #[test]
    fn unknown_election_is_reported() {
        let mock = MockCoordinator::default();
        let error = mock.admin().election("billing").err().unwrap();
        assert_eq!(error.kind(), &ErrorKind::ElectionNotFound("billing".into()));
    }

    #[test]
    fn listing_includes_every_election() {
        let (mock, _) = orders(0);
        mock.election("billing");
        let mut names: Vec<String> = mock
            .admin()
            .elections()
            .map(|election| election.unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["billing", "orders"]);
    }

    #[test]
    fn reports_primary_and_followers() {
        let (mock, leader) = orders(2);
        let election = mock.admin().election("orders").unwrap();
        assert_eq!(election.name(), "orders");
        assert_eq!(election.primary().unwrap(), Some(leader));
        assert_eq!(election.secondaries_count().unwrap(), 2);
    }

    #[test]
    fn step_down_only_once() {
        let (mock, _) = orders(0);
        let election = mock.admin().election("orders").unwrap();
        assert!(election.step_down().unwrap());
        assert_eq!(election.primary().unwrap(), None);
        assert!(!election.step_down().unwrap());
    }
}
