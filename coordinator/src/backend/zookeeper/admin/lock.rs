use std::sync::Arc;

use failure::ResultExt;
use zookeeper::ZkError;

use super::super::super::super::admin::NonBlockingLock;
use super::super::super::super::ErrorKind;
use super::super::super::super::NodeId;
use super::super::super::super::Result;
use super::super::super::NonBlockingLockAdminBehaviour;
use super::super::client::Client;
use super::super::NBLockInfo;
use super::read_json;

/// Zookeeper lock as seen by administrators.
pub struct ZookeeperNBLBehaviour {
    client: Arc<Client>,
    owner: NodeId,
    path: String,
}

impl ZookeeperNBLBehaviour {
    /// Model the lock stored at `path`, `None` if it is not held.
    pub fn load(client: &Arc<Client>, path: &str) -> Result<Option<NonBlockingLock>> {
        let keeper = client.get()?;
        let info: Option<NBLockInfo> =
            read_json(&keeper, path, "non-blocking lock lookup", "lock info")?;
        let lock = info.map(|info| {
            let behaviour = ZookeeperNBLBehaviour {
                client: Arc::clone(client),
                owner: info.owner,
                path: path.to_string(),
            };
            NonBlockingLock::new(info.name, Box::new(behaviour))
        });
        Ok(lock)
    }
}

impl NonBlockingLockAdminBehaviour for ZookeeperNBLBehaviour {
    fn force_release(&mut self) -> Result<()> {
        let keeper = self.client.get()?;
        match Client::delete(&keeper, &self.path, None) {
            Ok(()) | Err(ZkError::NoNode) => Ok(()),
            Err(error) => Err(error)
                .with_context(|_| ErrorKind::Backend("force-releasing lock"))
                .map_err(Into::into),
        }
    }

    fn owner(&self) -> Result<NodeId> {
        Ok(self.owner.clone())
    }
}
