use std::sync::Arc;
use std::time::Duration;

use failure::ResultExt;
use serde::de::DeserializeOwned;
use slog::debug;
use slog::Logger;
use zookeeper::ZkError;
use zookeeper::ZooKeeper;

use zkcoord_util_failure::failure_info;

use super::super::super::admin::Election;
use super::super::super::admin::Elections;
use super::super::super::admin::Nodes;
use super::super::super::admin::NonBlockingLock;
use super::super::super::admin::NonBlockingLocks;
use super::super::super::config::ZookeeperConfig;
use super::super::super::ErrorKind;
use super::super::super::NodeId;
use super::super::super::Result;
use super::super::BackendAdmin;
use super::client::Client;
use super::constants::PREFIX_ELECTION;
use super::constants::PREFIX_LOCK;
use super::constants::PREFIX_NODE;
use super::probe;

mod election;
mod lock;

use self::election::ZooKeeperElectionAdmin;
use self::lock::ZookeeperNBLBehaviour;

const VERSION_NOT_REPORTED: &str = "Zookeeper (version not reported)";

/// Admin backend for zookeeper distributed coordination.
pub struct ZookeeperAdmin {
    client: Arc<Client>,
    config: ZookeeperConfig,
    logger: Logger,
}

impl ZookeeperAdmin {
    pub fn new(config: ZookeeperConfig, logger: Logger) -> Result<ZookeeperAdmin> {
        let client = Arc::new(Client::new(config.clone(), None, logger.clone())?);
        Ok(ZookeeperAdmin {
            client,
            config,
            logger,
        })
    }
}

impl BackendAdmin for ZookeeperAdmin {
    fn election(&self, name: &str) -> Result<Election> {
        let path = format!("{}/{}", PREFIX_ELECTION, Client::hash_from_key(name));
        ZooKeeperElectionAdmin::load(&self.client, &path)?
            .ok_or_else(|| ErrorKind::ElectionNotFound(name.to_string()).into())
    }

    fn elections(&self) -> Elections {
        Elections::new(ZnodeListing::new(
            Arc::clone(&self.client),
            |keeper| {
                let elections = children(keeper, PREFIX_ELECTION, "elections listing")?;
                let paths = elections
                    .into_iter()
                    .map(|election| format!("{}/{}", PREFIX_ELECTION, election));
                Ok(paths.collect())
            },
            ZooKeeperElectionAdmin::load,
        ))
    }

    fn nodes(&self) -> Nodes {
        Nodes::new(ZnodeListing::new(
            Arc::clone(&self.client),
            |keeper| grandchildren(keeper, PREFIX_NODE, "nodes listing"),
            |client, path| {
                let keeper = client.get()?;
                read_json::<NodeId>(&keeper, path, "node read", "node info")
            },
        ))
    }

    fn non_blocking_lock(&self, lock: &str) -> Result<NonBlockingLock> {
        let path = Client::path_from_key(PREFIX_LOCK, lock);
        ZookeeperNBLBehaviour::load(&self.client, &path)?
            .ok_or_else(|| ErrorKind::LockNotFound(lock.to_string()).into())
    }

    fn non_blocking_locks(&self) -> NonBlockingLocks {
        NonBlockingLocks::new(ZnodeListing::new(
            Arc::clone(&self.client),
            |keeper| grandchildren(keeper, PREFIX_LOCK, "locks listing"),
            ZookeeperNBLBehaviour::load,
        ))
    }

    fn version(&self) -> Result<String> {
        let timeout = Duration::from_secs(self.config.timeout);
        for host in self.config.hosts() {
            match probe::stat(&host, timeout) {
                Ok(stats) => return Ok(format!("Zookeeper {}", stats.version)),
                Err(error) => debug!(
                    self.logger, "Unable to fetch zookeeper version";
                    "server" => &host,
                    failure_info(&error),
                ),
            };
        }
        Ok(VERSION_NOT_REPORTED.into())
    }
}

/// Lists the znode paths to iterate over.
type Lister = fn(&ZooKeeper) -> Result<Vec<String>>;

/// Turns a listed path into an item, `None` if the znode vanished since the listing.
type Resolver<T> = fn(&Arc<Client>, &str) -> Result<Option<T>>;

/// Iterator that lists znodes on first use and resolves them one at a time.
///
/// A failed listing is reported once and ends the iteration.
struct ZnodeListing<T> {
    client: Arc<Client>,
    lister: Lister,
    pending: Option<std::vec::IntoIter<String>>,
    resolver: Resolver<T>,
}

impl<T> ZnodeListing<T> {
    fn new(client: Arc<Client>, lister: Lister, resolver: Resolver<T>) -> ZnodeListing<T> {
        ZnodeListing {
            client,
            lister,
            pending: None,
            resolver,
        }
    }
}

impl<T> Iterator for ZnodeListing<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_none() {
            let lister = self.lister;
            let listed = self.client.get().and_then(|keeper| lister(&keeper));
            let (paths, error) = match listed {
                Ok(paths) => (paths, None),
                Err(error) => (Vec::new(), Some(error)),
            };
            self.pending = Some(paths.into_iter());
            if let Some(error) = error {
                return Some(Err(error));
            }
        }
        let pending = self.pending.as_mut()?;
        for path in pending {
            match (self.resolver)(&self.client, &path) {
                Ok(None) => continue,
                Ok(Some(item)) => return Some(Ok(item)),
                Err(error) => return Some(Err(error)),
            };
        }
        None
    }
}

/// Children of `path`, empty if `path` does not exist.
fn children(keeper: &ZooKeeper, path: &str, operation: &'static str) -> Result<Vec<String>> {
    match Client::get_children(keeper, path, false) {
        Ok(children) => Ok(children),
        Err(ZkError::NoNode) => Ok(Vec::new()),
        Err(error) => Err(error)
            .with_context(|_| ErrorKind::Backend(operation))
            .map_err(Into::into),
    }
}

/// Full paths of the znodes two levels below `root` (`<root>/<prefix>/<hash>`).
fn grandchildren(keeper: &ZooKeeper, root: &str, operation: &'static str) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for prefix in children(keeper, root, operation)? {
        let parent = format!("{}/{}", root, prefix);
        for child in children(keeper, &parent, operation)? {
            paths.push(format!("{}/{}", parent, child));
        }
    }
    Ok(paths)
}

/// Read and decode the JSON payload of a znode, `None` if it does not exist.
fn read_json<T: DeserializeOwned>(
    keeper: &ZooKeeper,
    path: &str,
    operation: &'static str,
    payload: &'static str,
) -> Result<Option<T>> {
    let data = match Client::get_data(keeper, path, false) {
        Ok((data, _)) => data,
        Err(ZkError::NoNode) => return Ok(None),
        Err(error) => {
            return Err(error)
                .with_context(|_| ErrorKind::Backend(operation))
                .map_err(Into::into);
        }
    };
    let value = serde_json::from_slice(&data).with_context(|_| ErrorKind::Decode(payload))?;
    Ok(Some(value))
}
