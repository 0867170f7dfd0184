use std::sync::Arc;

use slog::info;
use slog::Logger;

use super::super::super::config::ZookeeperConfig;
use super::super::super::coordinator::Election;
use super::super::super::coordinator::NonBlockingLock;
use super::super::super::coordinator::Sequence;
use super::super::super::NodeId;
use super::super::super::Result;
use super::super::Backend;
use super::client::Client;

mod cleaner;
mod election;
mod lock;
mod sequence;

use self::cleaner::Cleaner;
use self::election::ZookeeperElection;
use self::lock::ZookeeperNBLock;
use self::sequence::ZookeeperSequence;

/// Zookeeper-backed distributed coordination.
pub struct Zookeeper {
    // Background thread to clean unused nodes.
    _cleaner: Cleaner,
    client: Arc<Client>,
    logger: Logger,
    node_id: NodeId,
}

impl Zookeeper {
    pub fn new(node_id: NodeId, config: ZookeeperConfig, logger: Logger) -> Result<Zookeeper> {
        let client = Arc::new(Client::new(config.clone(), Some(&node_id), logger.clone())?);
        let cleaner = Cleaner::new(
            Arc::clone(&client),
            config,
            node_id.clone(),
            logger.clone(),
        )?;
        info!(logger, "Zookeeper coordinator ready"; "node_id" => %node_id);
        Ok(Zookeeper {
            _cleaner: cleaner,
            client,
            logger,
            node_id,
        })
    }
}

impl Backend for Zookeeper {
    fn election(&self, name: String) -> Election {
        let behaviour = ZookeeperElection::new(
            Arc::clone(&self.client),
            &name,
            self.node_id.clone(),
            self.logger.clone(),
        );
        Election::new(name, Box::new(behaviour))
    }

    fn non_blocking_lock(&self, lock: String) -> NonBlockingLock {
        let behaviour = ZookeeperNBLock::new(
            Arc::clone(&self.client),
            lock.clone(),
            self.node_id.clone(),
            self.logger.clone(),
        );
        NonBlockingLock::new(lock, Box::new(behaviour))
    }

    fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    fn sequence(&self, name: String) -> Sequence {
        let behaviour = ZookeeperSequence::new(Arc::clone(&self.client), &name, self.logger.clone());
        Sequence::new(name, Arc::new(behaviour))
    }
}
