use std::sync::Arc;

use failure::ResultExt;
use zookeeper::ZkError;

use super::super::super::super::admin::Election;
use super::super::super::super::ErrorKind;
use super::super::super::super::NodeId;
use super::super::super::super::Result;
use super::super::super::ElectionAdminBehaviour;
use super::super::client::Client;
use super::super::ElectionCandidateInfo;
use super::super::ElectionInfo;
use super::children;
use super::read_json;

/// Zookeeper election as seen by administrators.
pub struct ZooKeeperElectionAdmin {
    client: Arc<Client>,
    path: String,
}

impl ZooKeeperElectionAdmin {
    /// Model the election rooted at `path`, `None` if it does not exist.
    pub fn load(client: &Arc<Client>, path: &str) -> Result<Option<Election>> {
        let keeper = client.get()?;
        let info: Option<ElectionInfo> =
            read_json(&keeper, path, "election info fetch", "election information")?;
        let election = info.map(|info| {
            let behaviour = ZooKeeperElectionAdmin {
                client: Arc::clone(client),
                path: path.to_string(),
            };
            Election::new(info.name, Box::new(behaviour))
        });
        Ok(election)
    }

    /// Current candidates of the election, sorted by sequence.
    fn ballot(&self) -> Result<Ballot> {
        let keeper = self.client.get()?;
        let candidates = children(&keeper, &self.path, "election candidates lookup")?;
        Ok(Ballot::new(candidates))
    }
}

impl ElectionAdminBehaviour for ZooKeeperElectionAdmin {
    fn primary(&self) -> Result<Option<NodeId>> {
        let primary = match self.ballot()?.primary() {
            None => return Ok(None),
            Some(primary) => format!("{}/{}", self.path, primary),
        };
        let keeper = self.client.get()?;
        let info: Option<ElectionCandidateInfo> = read_json(
            &keeper,
            &primary,
            "election primary lookup",
            "election candidate information",
        )?;
        Ok(info.map(|info| info.owner))
    }

    fn secondaries_count(&self) -> Result<usize> {
        Ok(self.ballot()?.secondaries())
    }

    fn step_down(&self) -> Result<bool> {
        let primary = match self.ballot()?.primary() {
            None => return Ok(false),
            Some(primary) => format!("{}/{}", self.path, primary),
        };
        let keeper = self.client.get()?;
        match Client::delete(&keeper, &primary, None) {
            Ok(()) => Ok(true),
            Err(ZkError::NoNode) => Ok(false),
            Err(error) => Err(error)
                .with_context(|_| ErrorKind::Backend("election step-down"))
                .map_err(Into::into),
        }
    }
}

/// Candidate znode names of an election in primary-first order.
struct Ballot(Vec<String>);

impl Ballot {
    fn new(mut candidates: Vec<String>) -> Ballot {
        candidates.sort();
        Ballot(candidates)
    }

    fn primary(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    fn secondaries(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use zookeeper::Acl;
    use zookeeper::CreateMode;

    use super::super::super::super::super::NodeId;
    use super::super::super::client::Client;
    use super::super::super::constants::PREFIX_ELECTION;
    use super::super::super::testing;
    use super::super::super::ElectionCandidateInfo;
    use super::super::super::ElectionInfo;
    use super::Ballot;
    use super::ZooKeeperElectionAdmin;

    fn ballot(names: &[&str]) -> Ballot {
        Ballot::new(names.iter().map(|name| name.to_string()).collect())
    }

    #[test]
    fn lowest_sequence_is_primary() {
        let ballot = ballot(&["candidate-0000000012", "candidate-0000000003", "candidate-0000000007"]);
        assert_eq!(ballot.primary(), Some("candidate-0000000003"));
        assert_eq!(ballot.secondaries(), 2);
    }

    #[test]
    fn empty_ballot() {
        let ballot = ballot(&[]);
        assert_eq!(ballot.primary(), None);
        assert_eq!(ballot.secondaries(), 0);
    }

    #[test]
    #[ignore]
    fn live_step_down_removes_primary_candidate() {
        let name = testing::unique("admin-election");
        let client = testing::client();
        let keeper = client.get().unwrap();
        let path = format!("{}/{}", PREFIX_ELECTION, Client::hash_from_key(&name));
        let info = serde_json::to_vec(&ElectionInfo { name: name.clone() }).unwrap();
        Client::create(&keeper, &path, info, Acl::open_unsafe().clone(), CreateMode::Persistent)
            .unwrap();
        let owners = vec![NodeId::new(), NodeId::new()];
        for owner in &owners {
            let candidate = ElectionCandidateInfo {
                owner: owner.clone(),
            };
            Client::create(
                &keeper,
                &format!("{}/candidate-", path),
                serde_json::to_vec(&candidate).unwrap(),
                Acl::open_unsafe().clone(),
                CreateMode::EphemeralSequential,
            )
            .unwrap();
        }

        let admin = ZooKeeperElectionAdmin::load(&client, &path)
            .unwrap()
            .expect("election not found");
        assert_eq!(admin.name(), name.as_str());
        assert_eq!(admin.primary().unwrap(), Some(owners[0].clone()));
        assert_eq!(admin.secondaries_count().unwrap(), 1);

        assert!(admin.step_down().unwrap());
        assert_eq!(admin.primary().unwrap(), Some(owners[1].clone()));
        assert_eq!(admin.secondaries_count().unwrap(), 0);
        assert!(admin.step_down().unwrap());
        assert!(!admin.step_down().unwrap());
    }
}
