use std::sync::Arc;

use failure::ResultExt;
use slog::debug;
use slog::warn;
use slog::Logger;

use zookeeper::Acl;
use zookeeper::CreateMode;
use zookeeper::ZkError;
use zookeeper::ZooKeeper;

use zkcoord_util_failure::failure_info;

use super::super::super::super::ErrorKind;
use super::super::super::super::Result;
use super::super::super::SequenceBehaviour;
use super::super::client::Client;
use super::super::constants::PREFIX_SEQUENCE;
use super::super::SequenceInfo;

const SEQUENCE_CHILD_PREFIX: &str = "id-";

/// Zookeeper sequence behaviour.
///
/// IDs are the counter zookeeper appends to persistent sequential children
/// of `/sequences/<hash>`. Each child is deleted as soon as it is created.
pub struct ZookeeperSequence {
    client: Arc<Client>,
    logger: Logger,
    name: String,
    path_child: String,
    path_sequence: String,
    payload: SequenceInfo,
}

impl ZookeeperSequence {
    pub fn new(client: Arc<Client>, name: &str, logger: Logger) -> ZookeeperSequence {
        let path_sequence = format!("{}/{}", PREFIX_SEQUENCE, Client::hash_from_key(name));
        let path_child = format!("{}/{}", path_sequence, SEQUENCE_CHILD_PREFIX);
        ZookeeperSequence {
            client,
            logger,
            name: name.to_string(),
            path_child,
            path_sequence,
            payload: SequenceInfo {
                name: name.to_string(),
            },
        }
    }
}

impl ZookeeperSequence {
    /// Create the sequence znode that parents generated IDs.
    fn create_sequence(&self, keeper: &ZooKeeper) -> Result<()> {
        let data = serde_json::to_vec(&self.payload)
            .with_context(|_| ErrorKind::Encode("zookeeper sequence"))?;
        let result = Client::create(
            keeper,
            &self.path_sequence,
            data,
            Acl::open_unsafe().clone(),
            CreateMode::Persistent,
        );
        match result {
            Ok(_) | Err(ZkError::NodeExists) => Ok(()),
            Err(error) => Err(error)
                .with_context(|_| ErrorKind::Backend("sequence creation"))
                .map_err(Into::into),
        }
    }

    fn create_child(&self, keeper: &ZooKeeper) -> ::std::result::Result<String, ZkError> {
        Client::create(
            keeper,
            &self.path_child,
            Vec::new(),
            Acl::open_unsafe().clone(),
            CreateMode::PersistentSequential,
        )
    }
}

impl SequenceBehaviour for ZookeeperSequence {
    fn next(&self) -> Result<u64> {
        let keeper = self.client.get()?;
        let child = match self.create_child(&keeper) {
            Ok(child) => child,
            Err(ZkError::NoNode) => {
                debug!(self.logger, "Creating sequence znode"; "sequence" => &self.name);
                self.create_sequence(&keeper)?;
                self.create_child(&keeper)
                    .with_context(|_| ErrorKind::Backend("sequence id creation"))?
            }
            Err(error) => {
                return Err(error)
                    .with_context(|_| ErrorKind::Backend("sequence id creation"))
                    .map_err(Into::into);
            }
        };

        // The ID is allocated once the child exists, a failed delete only leaves garbage behind.
        match Client::delete(&keeper, &child, None) {
            Ok(()) | Err(ZkError::NoNode) => (),
            Err(error) => warn!(
                self.logger, "Failed to delete sequence ID znode";
                "sequence" => &self.name,
                "znode" => &child,
                failure_info(&error),
            ),
        };
        parse_sequence_id(&self.name, &child)
    }
}

/// Extract the zookeeper counter from the path of a sequential child.
///
/// The counter is a signed 32 bits integer: once it overflows the sequence is exhausted.
fn parse_sequence_id(name: &str, path: &str) -> Result<u64> {
    let suffix = match path.rfind(SEQUENCE_CHILD_PREFIX) {
        Some(index) => &path[index + SEQUENCE_CHILD_PREFIX.len()..],
        None => return Err(ErrorKind::Decode("zookeeper sequence id").into()),
    };
    let id = suffix
        .parse::<i64>()
        .with_context(|_| ErrorKind::Decode("zookeeper sequence id"))?;
    if id < 0 {
        return Err(ErrorKind::SequenceExhausted(name.to_string()).into());
    }
    Ok(id as u64)
}

#[cfg(test)]
mod tests {
    use super::super::super::super::super::ErrorKind;
    use super::super::super::super::SequenceBehaviour;
    use super::super::super::testing;
    use super::parse_sequence_id;
    use super::ZookeeperSequence;

    #[test]
    fn parse_id() {
        let id = parse_sequence_id("test", "/sequences/abcd/id-0000000042").unwrap();
        assert_eq!(id, 42);
    }

    #[test]
    fn parse_id_uses_last_prefix() {
        let id = parse_sequence_id("test", "/sequences/id-abcd/id-0000001000").unwrap();
        assert_eq!(id, 1000);
    }

    #[test]
    fn parse_exhausted() {
        let error = parse_sequence_id("test", "/sequences/abcd/id--2147483648").unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::SequenceExhausted("test".into()));
    }

    #[test]
    fn parse_invalid() {
        let error = parse_sequence_id("test", "/sequences/abcd/id-abc").unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::Decode("zookeeper sequence id"));
        let error = parse_sequence_id("test", "/sequences/abcd/other").unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::Decode("zookeeper sequence id"));
    }

    #[test]
    #[ignore]
    fn live_ids_strictly_increase() {
        let name = testing::unique("sequence");
        let client = testing::client();
        let sequence = ZookeeperSequence::new(client, &name, testing::logger());
        let mut ids: Vec<u64> = (0..5).map(|_| sequence.next().unwrap()).collect();

        // A second handle shares the same counter.
        let other = ZookeeperSequence::new(testing::client(), &name, testing::logger());
        ids.push(other.next().unwrap());
        assert_eq!(ids[0], 0);
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "ids not increasing: {:?}", ids);
        }
    }
}
