use std::sync::Arc;
use std::thread::Builder;
use std::thread::JoinHandle;
use std::time::Duration;

use failure::ResultExt;
use slog::debug;
use slog::error;
use slog::info;
use slog::Logger;
use zookeeper::ZkError;
use zookeeper::ZooKeeper;

use zkcoord_util_failure::failure_info;

use super::super::super::super::config::ZookeeperConfig;
use super::super::super::super::coordinator::Election;
use super::super::super::super::coordinator::ElectionWatch;
use super::super::super::super::coordinator::LoopingElection;
use super::super::super::super::coordinator::LoopingElectionControl;
use super::super::super::super::coordinator::LoopingElectionLogic;
use super::super::super::super::coordinator::LoopingElectionOpts;
use super::super::super::super::coordinator::ShutdownReceiver;
use super::super::super::super::coordinator::ShutdownSender;
use super::super::super::super::Error;
use super::super::super::super::ErrorKind;
use super::super::super::super::NodeId;
use super::super::super::super::Result;
use super::super::client::Client;
use super::super::constants::PREFIX_ELECTION;
use super::super::constants::PREFIX_LOCK;
use super::super::constants::PREFIX_NODE;
use super::super::metrics::ZOO_CLEANUP_COUNT;
use super::election::ZookeeperElection;

const CLEANER_ELECTION: &str = "zookeeper-cleaner";

/// Roots swept for empty znodes. Sequences are left alone: deleting one resets its counter.
const SWEPT_ROOTS: [&str; 3] = [PREFIX_ELECTION, PREFIX_LOCK, PREFIX_NODE];

/// Thread removing empty election, lock and node containers.
///
/// Every coordinator runs one but only the primary of the `zookeeper-cleaner` election
/// deletes anything.
pub struct Cleaner {
    logger: Logger,
    shutdown: ShutdownSender,
    thread: Option<JoinHandle<()>>,
}

impl Cleaner {
    pub fn new(
        client: Arc<Client>,
        config: ZookeeperConfig,
        node_id: NodeId,
        logger: Logger,
    ) -> Result<Cleaner> {
        let (shutdown, receiver) = LoopingElectionOpts::shutdown_channel();
        let thread_logger = logger.clone();
        let thread = Builder::new()
            .name("zkcoord:zookeeper:cleaner".into())
            .spawn(move || {
                let sweeper = Sweeper {
                    client,
                    limit: config.cleanup.limit,
                    logger: thread_logger,
                };
                sweeper.elect(&config, node_id, receiver).loop_forever();
            })
            .with_context(|_| ErrorKind::SpawnThread("zookeeper cleaner"))?;
        Ok(Cleaner {
            logger,
            shutdown,
            thread: Some(thread),
        })
    }
}

impl Drop for Cleaner {
    fn drop(&mut self) {
        self.shutdown.request();
        let panicked = self.thread.take().map(JoinHandle::join);
        if let Some(Err(error)) = panicked {
            error!(self.logger, "Zookeeper cleaner thread panicked"; "error" => ?error);
        }
    }
}

/// Deletes empty znodes while primary of the cleaner election.
struct Sweeper {
    client: Arc<Client>,
    limit: usize,
    logger: Logger,
}

impl Sweeper {
    /// Wrap the sweeper in the loop that keeps it running for the cleaner election.
    fn elect(
        self,
        config: &ZookeeperConfig,
        node_id: NodeId,
        shutdown: ShutdownReceiver,
    ) -> LoopingElection {
        let logger = self.logger.clone();
        let candidate = ZookeeperElection::new(
            Arc::clone(&self.client),
            CLEANER_ELECTION,
            node_id,
            logger.clone(),
        );
        let election = Election::new(CLEANER_ELECTION, Box::new(candidate));
        let mut opts = LoopingElectionOpts::new(election, self)
            .loop_delay(Duration::from_secs(config.cleanup.interval))
            .shutdown_receiver(shutdown);
        if config.cleanup.term > 0 {
            opts = opts.election_term(config.cleanup.term);
        }
        LoopingElection::new(opts, logger)
    }

    /// Sweep every root, deleting at most `limit` znodes overall.
    fn cycle(&self, primary: &ElectionWatch) -> Result<usize> {
        let keeper = self.client.get()?;
        let mut budget = self.limit;
        for root in SWEPT_ROOTS.iter() {
            if budget == 0 {
                info!(self.logger, "Cleanup limit reached, resuming next cycle");
                break;
            }
            budget -= self.sweep(&keeper, root, budget, primary)?;
        }
        Ok(self.limit - budget)
    }

    /// Delete up to `budget` empty children of `parent`, returning how many went.
    fn sweep(
        &self,
        keeper: &ZooKeeper,
        parent: &str,
        budget: usize,
        primary: &ElectionWatch,
    ) -> Result<usize> {
        let children = Client::get_children(keeper, parent, false)
            .with_context(|_| ErrorKind::Backend("children lookup"))?;
        let mut deleted = 0;
        for child in children {
            if deleted == budget {
                break;
            }
            let path = format!("{}/{}", parent, child);
            if delete_if_empty(keeper, &path, primary)? {
                debug!(self.logger, "Deleted empty znode"; "znode" => &path);
                ZOO_CLEANUP_COUNT.inc();
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

impl LoopingElectionLogic for Sweeper {
    fn handle_error(&self, error: Error) -> LoopingElectionControl {
        error!(self.logger, "Zookeeper cleanup cycle failed"; failure_info(&error));
        LoopingElectionControl::Continue
    }

    fn primary(&self, election: &Election) -> Result<LoopingElectionControl> {
        let deleted = self.cycle(&election.watch())?;
        info!(self.logger, "Zookeeper cleanup cycle done"; "deleted" => deleted);
        Ok(LoopingElectionControl::Proceed)
    }

    fn secondary(&self, _: &Election) -> Result<LoopingElectionControl> {
        debug!(self.logger, "Skipping cleanup, another node is the cleaner");
        Ok(LoopingElectionControl::Proceed)
    }
}

/// Delete `path` if it has no children, `false` when it was busy or already gone.
///
/// The delete is pinned to the version seen by the lookup so znodes that
/// changed in between are left alone.
fn delete_if_empty(keeper: &ZooKeeper, path: &str, primary: &ElectionWatch) -> Result<bool> {
    let stat = match Client::exists(keeper, path, false) {
        Ok(Some(stat)) if stat.num_children == 0 => stat,
        Ok(_) | Err(ZkError::NoNode) => return Ok(false),
        Err(error) => {
            return Err(error)
                .with_context(|_| ErrorKind::Backend("node lookup"))
                .map_err(Into::into);
        }
    };
    ensure_primary(primary)?;
    match Client::delete(keeper, path, Some(stat.version)) {
        Ok(()) => Ok(true),
        Err(ZkError::NoNode) | Err(ZkError::NotEmpty) | Err(ZkError::BadVersion) => Ok(false),
        Err(error) => Err(error)
            .with_context(|_| ErrorKind::Backend("node delete"))
            .map_err(Into::into),
    }
}

/// Stop deleting as soon as another process may have become the cleaner.
fn ensure_primary(primary: &ElectionWatch) -> Result<()> {
    if primary.is_primary() {
        return Ok(());
    }
    Err(ErrorKind::ElectionLost(CLEANER_ELECTION.to_string()).into())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::super::super::super::super::coordinator::ElectionWatch;
    use super::super::super::super::super::ErrorKind;
    use super::super::super::client::Client;
    use super::super::super::testing;
    use super::ensure_primary;
    use super::Sweeper;

    fn watch(primary: bool) -> (Arc<AtomicBool>, ElectionWatch) {
        let flag = Arc::new(AtomicBool::new(primary));
        let watch = ElectionWatch::new(Arc::clone(&flag));
        (flag, watch)
    }

    #[test]
    fn cleanup_stops_when_primary_is_lost() {
        let (flag, watch) = watch(true);
        assert!(ensure_primary(&watch).is_ok());
        flag.store(false, Ordering::Relaxed);
        let error = ensure_primary(&watch).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::ElectionLost("zookeeper-cleaner".into())
        );
    }

    #[test]
    #[ignore]
    fn live_sweep_removes_only_empty_children() {
        let client = testing::client();
        let keeper = client.get().unwrap();
        let parent = format!("/{}", testing::unique("sweep"));
        for path in &[
            parent.clone(),
            format!("{}/empty-a", parent),
            format!("{}/empty-b", parent),
            format!("{}/busy", parent),
            format!("{}/busy/child", parent),
        ] {
            Client::mkcontainer(&keeper, path).unwrap();
        }
        let sweeper = Sweeper {
            client: Arc::clone(&client),
            limit: 10,
            logger: testing::logger(),
        };

        let (_, lost) = watch(false);
        let error = sweeper.sweep(&keeper, &parent, 10, &lost).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::ElectionLost("zookeeper-cleaner".into())
        );

        let (_, primary) = watch(true);
        assert_eq!(sweeper.sweep(&keeper, &parent, 1, &primary).unwrap(), 1);
        assert_eq!(sweeper.sweep(&keeper, &parent, 10, &primary).unwrap(), 1);
        let mut left = Client::get_children(&keeper, &parent, false).unwrap();
        left.sort();
        assert_eq!(left, vec!["busy".to_string()]);

        for path in &[format!("{}/busy/child", parent), format!("{}/busy", parent), parent] {
            Client::delete(&keeper, path, None).unwrap();
        }
    }
}
