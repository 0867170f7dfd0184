use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use failure::ResultExt;
use slog::debug;
use slog::error;
use slog::info;
use slog::warn;
use slog::Logger;

use zkcoord_util_failure::failure_info;

use super::super::metrics::LEADER_GAINED;
use super::super::metrics::LEADER_REVOKED;
use super::super::Error;
use super::super::ErrorKind;
use super::super::Result;
use super::Coordinator;
use super::Election;
use super::LoopingElection;
use super::LoopingElectionControl;
use super::LoopingElectionLogic;
use super::LoopingElectionOpts;
use super::ShutdownSender;

/// Receive leadership changes from a `LeaderElectionService`.
///
/// Each method is called once per transition, from the service's background thread.
pub trait LeadershipListener: Send {
    /// This process is now the leader.
    fn is_leader(&self);

    /// This process is no longer the leader.
    fn not_leader(&self);
}

/// Options for a `LeaderElectionService`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaderElectionOpts {
    election_term: Option<u64>,
    retry_delay: Duration,
}

impl Default for LeaderElectionOpts {
    fn default() -> LeaderElectionOpts {
        LeaderElectionOpts {
            election_term: None,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl LeaderElectionOpts {
    /// Give up leadership after `term` checks to let other candidates take over.
    ///
    /// # Panics
    /// This method panics if `term` is 0.
    pub fn election_term(mut self, term: u64) -> LeaderElectionOpts {
        if term == 0 {
            panic!("LeaderElectionOpts::election_term requires at least 1 term");
        }
        self.election_term = Some(term);
        self
    }

    /// Delay between election checks and between failed attempts to join the election.
    pub fn retry_delay(mut self, delay: Duration) -> LeaderElectionOpts {
        self.retry_delay = delay;
        self
    }
}

/// Take part in a leader election in the background.
///
/// The service keeps a candidate registered in the election until closed.
/// Failures to join the election are logged and retried, and a terminated election
/// (session lost, candidate removed by an operator) is joined again from scratch.
pub struct LeaderElectionService {
    leader: Arc<AtomicBool>,
    logger: Logger,
    name: String,
    shutdown: Option<ShutdownSender>,
    thread: Option<JoinHandle<()>>,
}

impl LeaderElectionService {
    pub(crate) fn start<L>(
        coordinator: Coordinator,
        name: String,
        listener: L,
        opts: LeaderElectionOpts,
        logger: Logger,
    ) -> Result<LeaderElectionService>
    where
        L: LeadershipListener + 'static,
    {
        let LeaderElectionOpts {
            election_term,
            retry_delay,
        } = opts;
        let leader = Arc::new(AtomicBool::new(false));
        let (shutdown, receiver) = LoopingElectionOpts::shutdown_channel();
        let thread = {
            let leader = Arc::clone(&leader);
            let logger = logger.clone();
            let name = name.clone();
            std::thread::Builder::new()
                .name(format!("zkcoord:leader:{}", name))
                .spawn(move || {
                    let election = coordinator.election(name);
                    let logic = LatchLogic {
                        leader,
                        listener: Box::new(listener),
                        logger: logger.clone(),
                    };
                    let mut opts = LoopingElectionOpts::new(election, logic)
                        .loop_delay(retry_delay)
                        .shutdown_receiver(receiver);
                    if let Some(term) = election_term {
                        opts = opts.election_term(term);
                    }
                    let mut looper = LoopingElection::new(opts, logger);
                    looper.loop_forever();
                })
                .with_context(|_| ErrorKind::SpawnThread("leader election"))?
        };
        info!(logger, "Leader election service started"; "election" => &name);
        Ok(LeaderElectionService {
            leader,
            logger,
            name,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    /// Stop the service, leaving the election.
    ///
    /// The listener is told about the lost leadership, if it was the leader.
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.request();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(
                    self.logger, "Leader election thread panicked";
                    "election" => &self.name,
                );
            }
            info!(self.logger, "Leader election service stopped"; "election" => &self.name);
        }
    }

    /// Check if this process currently holds the leadership.
    pub fn is_leader(&self) -> bool {
        self.leader.load(Ordering::Relaxed)
    }

    /// Name of the election.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LeaderElectionService {
    fn drop(&mut self) {
        self.close();
    }
}

/// Map election states to leadership notifications.
struct LatchLogic {
    leader: Arc<AtomicBool>,
    listener: Box<dyn LeadershipListener>,
    logger: Logger,
}

impl LatchLogic {
    fn grant(&self, election: &Election) {
        if !self.leader.swap(true, Ordering::Relaxed) {
            LEADER_GAINED.inc();
            info!(self.logger, "Leadership acquired"; "election" => election.name());
            self.listener.is_leader();
        }
    }

    fn revoke(&self, election: &str) {
        if self.leader.swap(false, Ordering::Relaxed) {
            LEADER_REVOKED.inc();
            info!(self.logger, "Leadership revoked"; "election" => election);
            self.listener.not_leader();
        }
    }
}

impl LoopingElectionLogic for LatchLogic {
    fn handle_error(&self, error: Error) -> LoopingElectionControl {
        error!(
            self.logger, "Leader election failed, will retry";
            failure_info(&error),
        );
        LoopingElectionControl::Continue
    }

    fn not_candidate(&self, election: &Election) -> Result<LoopingElectionControl> {
        self.revoke(election.name());
        debug!(self.logger, "Joining leader election"; "election" => election.name());
        Ok(LoopingElectionControl::ReRun)
    }

    fn primary(&self, election: &Election) -> Result<LoopingElectionControl> {
        self.grant(election);
        Ok(LoopingElectionControl::Proceed)
    }

    fn secondary(&self, election: &Election) -> Result<LoopingElectionControl> {
        self.revoke(election.name());
        Ok(LoopingElectionControl::Proceed)
    }

    fn terminated(&self, election: &Election, reason: String) -> Result<LoopingElectionControl> {
        self.revoke(election.name());
        warn!(
            self.logger, "Leader election terminated, rejoining";
            "election" => election.name(),
            "reason" => reason,
        );
        Ok(LoopingElectionControl::ReRun)
    }
}

impl Drop for LatchLogic {
    fn drop(&mut self) {
        if self.leader.swap(false, Ordering::Relaxed) {
            LEADER_REVOKED.inc();
            info!(self.logger, "Leadership released on shutdown");
            self.listener.not_leader();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::unbounded;
    use crossbeam_channel::Receiver;
    use crossbeam_channel::Sender;
    use slog::o;
    use slog::Discard;
    use slog::Logger;

    use super::super::super::mock::MockCoordinator;
    use super::super::super::NodeId;
    use super::super::ElectionStatus;
    use super::LeaderElectionOpts;
    use super::LeadershipListener;

    #[derive(Debug, Eq, PartialEq)]
    enum Event {
        Leader,
        NotLeader,
    }

    struct ChannelListener(Sender<Event>);

    impl LeadershipListener for ChannelListener {
        fn is_leader(&self) {
            let _ = self.0.send(Event::Leader);
        }

        fn not_leader(&self) {
            let _ = self.0.send(Event::NotLeader);
        }
    }

    fn listener() -> (ChannelListener, Receiver<Event>) {
        let (sender, receiver) = unbounded();
        (ChannelListener(sender), receiver)
    }

    fn opts() -> LeaderElectionOpts {
        LeaderElectionOpts::default().retry_delay(Duration::from_millis(10))
    }

    fn next(events: &Receiver<Event>) -> Event {
        events
            .recv_timeout(Duration::from_secs(5))
            .expect("leadership event not received")
    }

    #[test]
    fn default_retry_delay() {
        let opts = LeaderElectionOpts::default();
        assert_eq!(opts.retry_delay, Duration::from_secs(2));
        assert_eq!(opts.election_term, None);
    }

    #[test]
    fn becomes_leader_and_releases_on_close() {
        let mock = MockCoordinator::default();
        *mock.election("leader").primary.lock().unwrap() = Some(NodeId::new());
        let (listener, events) = listener();
        let logger = Logger::root(Discard, o!());
        let mut service = mock
            .mock()
            .leader_service("leader", listener, opts(), logger)
            .unwrap();
        assert_eq!(next(&events), Event::Leader);
        assert!(service.is_leader());
        assert_eq!(service.name(), "leader");
        service.close();
        assert_eq!(next(&events), Event::NotLeader);
        assert!(!service.is_leader());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn secondary_is_not_notified() {
        let mock = MockCoordinator::default();
        let (listener, events) = listener();
        let logger = Logger::root(Discard, o!());
        let service = mock
            .mock()
            .leader_service("leader", listener, opts(), logger)
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert!(!service.is_leader());
        drop(service);
        assert!(events.try_recv().is_err());
        let status = mock.election("leader").status.lock().unwrap().clone();
        assert_eq!(status, ElectionStatus::NotCandidate);
    }

    #[test]
    fn terminated_election_is_rejoined() {
        let mock = MockCoordinator::default();
        let mock_election = mock.election("leader");
        *mock_election.primary.lock().unwrap() = Some(NodeId::new());
        let (listener, events) = listener();
        let logger = Logger::root(Discard, o!());
        let service = mock
            .mock()
            .leader_service("leader", listener, opts(), logger)
            .unwrap();
        assert_eq!(next(&events), Event::Leader);
        *mock_election.status.lock().unwrap() = ElectionStatus::Terminated("session lost".into());
        assert_eq!(next(&events), Event::NotLeader);
        assert_eq!(next(&events), Event::Leader);
        drop(service);
        assert_eq!(next(&events), Event::NotLeader);
    }
}
