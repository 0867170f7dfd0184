use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use failure::ResultExt;
use slog::debug;
use slog::error;
use slog::Logger;

use zookeeper::Acl;
use zookeeper::CreateMode;
use zookeeper::Subscription;
use zookeeper::ZkError;
use zookeeper::ZkState;
use zookeeper::ZooKeeper;

use zkcoord_util_failure::failure_info;

use super::super::super::super::coordinator::ElectionStatus;
use super::super::super::super::coordinator::ElectionWatch;
use super::super::super::super::metrics::tally;
use super::super::super::super::metrics::ELECTION_DROP_FAIL;
use super::super::super::super::metrics::ELECTION_DROP_TOTAL;
use super::super::super::super::metrics::ELECTION_TERMINATED;
use super::super::super::super::ErrorKind;
use super::super::super::super::NodeId;
use super::super::super::super::Result;
use super::super::super::ElectionBehaviour;
use super::super::client::Client;
use super::super::constants::PREFIX_ELECTION;
use super::super::ElectionCandidateInfo;
use super::super::ElectionInfo;

/// Where a node stands in an election.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Phase {
    Idle,
    Joined,
    Leading,
    Following,
    Ended(String),
}

impl Phase {
    fn active(&self) -> bool {
        matches!(self, Phase::Joined | Phase::Leading | Phase::Following)
    }
}

/// Role derived from the list of candidates in the election.
#[derive(Debug, Eq, PartialEq)]
enum Role {
    Gone(&'static str),
    Leading,
    Following,
}

/// Inputs that move a `Candidacy` between phases.
#[derive(Debug)]
enum Event {
    /// Outcome of a candidates refresh started for `generation`.
    Role { generation: u64, role: Role },

    /// The session the `generation` candidacy was registered with closed.
    SessionClosed { generation: u64 },

    /// The node asked to leave the election.
    StepDown,
}

/// Zookeeper resources owned by an active candidacy.
struct Seat<S> {
    subscription: S,
    znode: String,
}

/// Local view of our participation in an election.
///
/// Every join and every exit bumps `generation` so watches and listeners
/// installed for an earlier candidacy can tell they are stale.
struct Candidacy<S> {
    generation: u64,
    phase: Phase,
    primary: Arc<AtomicBool>,
    seat: Option<Seat<S>>,
}

impl<S> Candidacy<S> {
    fn new() -> Self {
        Candidacy {
            generation: 0,
            phase: Phase::Idle,
            primary: Arc::new(AtomicBool::new(false)),
            seat: None,
        }
    }

    /// Start a new candidacy, provided nothing changed since `expected` was observed.
    ///
    /// On conflict the seat is handed back so the caller can release it.
    fn join(
        &mut self,
        expected: u64,
        znode: String,
        subscription: S,
    ) -> std::result::Result<u64, Seat<S>> {
        let seat = Seat {
            subscription,
            znode,
        };
        if self.generation != expected || self.phase.active() {
            return Err(seat);
        }
        self.generation += 1;
        self.phase = Phase::Joined;
        self.primary.store(false, Ordering::Relaxed);
        self.seat = Some(seat);
        Ok(self.generation)
    }

    /// Apply an event and return the seat to release if the candidacy ended.
    fn transition(&mut self, event: Event) -> Option<Seat<S>> {
        match event {
            Event::StepDown => self.vacate(Phase::Idle),
            Event::SessionClosed { generation } => {
                if !self.current(generation) {
                    return None;
                }
                ELECTION_TERMINATED.inc();
                self.vacate(Phase::Ended("zookeeper session lost".into()))
            }
            Event::Role { generation, role } => {
                if !self.current(generation) {
                    return None;
                }
                match role {
                    Role::Gone(reason) => {
                        ELECTION_TERMINATED.inc();
                        self.vacate(Phase::Ended(reason.into()))
                    }
                    Role::Leading => {
                        self.phase = Phase::Leading;
                        self.primary.store(true, Ordering::Relaxed);
                        None
                    }
                    Role::Following => {
                        self.phase = Phase::Following;
                        self.primary.store(false, Ordering::Relaxed);
                        None
                    }
                }
            }
        }
    }

    fn current(&self, generation: u64) -> bool {
        self.generation == generation && self.phase.active()
    }

    fn status(&self) -> ElectionStatus {
        match &self.phase {
            Phase::Idle => ElectionStatus::NotCandidate,
            Phase::Joined => ElectionStatus::InProgress,
            Phase::Leading => ElectionStatus::Primary,
            Phase::Following => ElectionStatus::Secondary,
            Phase::Ended(reason) => ElectionStatus::Terminated(reason.clone()),
        }
    }

    fn vacate(&mut self, phase: Phase) -> Option<Seat<S>> {
        self.generation += 1;
        self.phase = phase;
        self.primary.store(false, Ordering::Relaxed);
        self.seat.take()
    }
}

/// Decide our role from the (unsorted) list of candidate znode names.
fn role_from_candidates(mut candidates: Vec<String>, path_election: &str, ours: &str) -> Role {
    let ours = match ours.strip_prefix(path_election) {
        Some(name) => name.trim_start_matches('/'),
        None => return Role::Gone("election candidate deleted"),
    };
    candidates.sort();
    match candidates.iter().position(|candidate| candidate == ours) {
        Some(0) => Role::Leading,
        Some(_) => Role::Following,
        None if candidates.is_empty() => Role::Gone("election has no candidates"),
        None => Role::Gone("election candidate deleted"),
    }
}

/// Election state shared between the handle and zookeeper callbacks.
struct Shared {
    candidacy: Mutex<Candidacy<Subscription>>,
    client: Arc<Client>,
    logger: Logger,
    name: String,
    path_election: String,
}

impl Shared {
    fn candidacy(&self) -> MutexGuard<Candidacy<Subscription>> {
        self.candidacy
            .lock()
            .expect("election candidacy lock poisoned")
    }

    /// Apply an event to the candidacy, logging phase changes.
    fn apply(&self, event: Event) -> Option<Seat<Subscription>> {
        let mut candidacy = self.candidacy();
        let before = candidacy.phase.clone();
        let seat = candidacy.transition(event);
        let after = &candidacy.phase;
        if *after != before {
            debug!(
                self.logger, "Election phase changed";
                "election" => &self.name,
                "from" => ?before,
                "to" => ?after,
            );
        }
        seat
    }

    /// Release a seat from a callback, where errors can only be logged.
    fn discard(&self, seat: Seat<Subscription>) {
        let result = self
            .client
            .get()
            .and_then(|keeper| release_seat(&keeper, seat));
        if let Err(error) = result {
            error!(
                self.logger, "Unable to clean up after ended election";
                "election" => &self.name,
                failure_info(&error),
            );
        }
    }

    /// Candidate znode for `generation`, unless that candidacy is over.
    fn seat_znode(&self, generation: u64) -> Option<String> {
        let candidacy = self.candidacy();
        if !candidacy.current(generation) {
            return None;
        }
        candidacy.seat.as_ref().map(|seat| seat.znode.clone())
    }
}

/// Re-read the candidates and re-arm the children watch for `generation`.
///
/// Stale callbacks stop here so at most one watch chain is live per election.
fn refresh(shared: &Arc<Shared>, generation: u64) {
    let znode = match shared.seat_znode(generation) {
        Some(znode) => znode,
        None => return,
    };
    let role = match shared.client.get() {
        Err(error) => {
            error!(
                shared.logger, "Failed to refresh election state";
                "election" => &shared.name, failure_info(&error),
            );
            Role::Gone("zookeeper session lost")
        }
        Ok(keeper) => {
            let rearm = Arc::clone(shared);
            let children = Client::get_children_w(&keeper, &shared.path_election, move |_| {
                refresh(&rearm, generation);
            });
            match children {
                Ok(children) => role_from_candidates(children, &shared.path_election, &znode),
                Err(ZkError::NoNode) => Role::Gone("election deleted"),
                Err(error) => {
                    error!(
                        shared.logger, "Failed to refresh election state";
                        "election" => &shared.name, failure_info(&error),
                    );
                    Role::Gone("election refresh failed")
                }
            }
        }
    };
    if let Some(seat) = shared.apply(Event::Role { generation, role }) {
        shared.discard(seat);
    }
}

/// Drop the session listener and candidate znode of a finished candidacy.
fn release_seat(keeper: &ZooKeeper, seat: Seat<Subscription>) -> Result<()> {
    keeper.remove_listener(seat.subscription);
    match Client::delete(keeper, &seat.znode, None) {
        Ok(()) | Err(ZkError::NoNode) => Ok(()),
        Err(error) => Err(error)
            .with_context(|_| ErrorKind::Backend("election candidate removal"))
            .map_err(Into::into),
    }
}

/// Zookeeper backed primary-secondaries election.
///
/// Candidates register ephemeral sequential znodes under the election znode
/// and the candidate with the lowest sequence is the primary.
///
/// A secondary may be promoted before the old primary notices it lost the role,
/// so two nodes can briefly both believe they are primary.
///
/// All candidates watch the election children rather than their predecessor,
/// which may cause a herd effect with very large numbers of candidates.
pub struct ZookeeperElection {
    candidate_payload: ElectionCandidateInfo,
    election_payload: ElectionInfo,
    path_candidate: String,
    shared: Arc<Shared>,
}

impl ZookeeperElection {
    pub fn new(client: Arc<Client>, name: &str, owner: NodeId, logger: Logger) -> Self {
        let path_election = format!("{}/{}", PREFIX_ELECTION, Client::hash_from_key(name));
        let shared = Shared {
            candidacy: Mutex::new(Candidacy::new()),
            client,
            logger,
            name: name.to_string(),
            path_election,
        };
        ZookeeperElection {
            candidate_payload: ElectionCandidateInfo { owner },
            election_payload: ElectionInfo {
                name: name.to_string(),
            },
            path_candidate: format!("{}/candidate-", shared.path_election),
            shared: Arc::new(shared),
        }
    }

    /// Create our candidate znode, creating the election znode first if missing.
    fn enlist(&self, keeper: &ZooKeeper) -> Result<String> {
        let candidate = serde_json::to_vec(&self.candidate_payload)
            .with_context(|_| ErrorKind::Encode("election candidate information"))?;
        let enlist = |data: Vec<u8>| {
            Client::create(
                keeper,
                &self.path_candidate,
                data,
                Acl::read_unsafe().clone(),
                CreateMode::EphemeralSequential,
            )
        };
        match enlist(candidate.clone()) {
            Err(ZkError::NoNode) => (),
            result => {
                return result
                    .with_context(|_| ErrorKind::Backend("election registration"))
                    .map_err(Into::into);
            }
        };

        debug!(self.shared.logger, "Creating election znode"; "election" => &self.shared.name);
        let election = serde_json::to_vec(&self.election_payload)
            .with_context(|_| ErrorKind::Encode("election information"))?;
        let created = Client::create(
            keeper,
            &self.shared.path_election,
            election,
            Acl::open_unsafe().clone(),
            CreateMode::Persistent,
        );
        match created {
            Ok(_) | Err(ZkError::NodeExists) => (),
            Err(error) => {
                return Err(error)
                    .with_context(|_| ErrorKind::Backend("election creation"))
                    .map_err(Into::into);
            }
        };
        let znode =
            enlist(candidate).with_context(|_| ErrorKind::Backend("election registration"))?;
        Ok(znode)
    }

    /// Leave the election and clean up after ourselves.
    fn leave(&self) -> Result<()> {
        let seat = match self.shared.apply(Event::StepDown) {
            None => return Ok(()),
            Some(seat) => seat,
        };
        let keeper = self.shared.client.get()?;
        release_seat(&keeper, seat)
    }
}

impl ElectionBehaviour for ZookeeperElection {
    fn run(&mut self) -> Result<()> {
        let expected = {
            let candidacy = self.shared.candidacy();
            if candidacy.phase.active() {
                return Err(ErrorKind::ElectionRunning(self.shared.name.clone()).into());
            }
            candidacy.generation
        };

        let keeper = self.shared.client.get()?;
        let znode = self.enlist(&keeper)?;
        let generation = expected + 1;
        let listener = Arc::clone(&self.shared);
        let subscription = keeper.add_listener(move |state| {
            // Listeners can't be removed from within a listener so the seat is just dropped.
            if let ZkState::Closed = state {
                let _ = listener.apply(Event::SessionClosed { generation });
            }
        });

        let joined = self.shared.candidacy().join(expected, znode, subscription);
        match joined {
            Ok(generation) => {
                refresh(&self.shared, generation);
                Ok(())
            }
            Err(seat) => {
                if let Err(error) = release_seat(&keeper, seat) {
                    error!(
                        self.shared.logger, "Failed to withdraw conflicting candidate znode";
                        "election" => &self.shared.name, failure_info(&error),
                    );
                }
                Err(ErrorKind::ElectionRunning(self.shared.name.clone()).into())
            }
        }
    }

    fn status(&self) -> ElectionStatus {
        self.shared.candidacy().status()
    }

    fn step_down(&mut self) -> Result<()> {
        debug!(self.shared.logger, "Stepping down from election"; "election" => &self.shared.name);
        self.leave()
    }

    fn step_down_on_drop(&mut self) {
        if !self.shared.candidacy().phase.active() {
            return;
        }
        let left = self.leave();
        if let Err(error) = tally(&ELECTION_DROP_TOTAL, &ELECTION_DROP_FAIL, left) {
            error!(
                self.shared.logger, "Failed to automatically step down election";
                "election" => &self.shared.name, failure_info(&error),
            );
        }
    }

    fn watch(&self) -> ElectionWatch {
        let candidacy = self.shared.candidacy();
        ElectionWatch::new(Arc::clone(&candidacy.primary))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::Instant;

    use super::super::super::super::super::coordinator::ElectionStatus;
    use super::super::super::super::super::NodeId;
    use super::super::super::super::ElectionBehaviour;
    use super::super::super::testing;
    use super::role_from_candidates;
    use super::Candidacy;
    use super::Event;
    use super::Phase;
    use super::Role;
    use super::ZookeeperElection;

    const ELECTION: &str = "/elections/abcd";

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn joined() -> Candidacy<u8> {
        let mut candidacy = Candidacy::new();
        let generation = candidacy
            .join(0, "/elections/abcd/candidate-0000000001".into(), 1)
            .unwrap_or_else(|_| panic!("join rejected"));
        assert_eq!(generation, 1);
        candidacy
    }

    #[test]
    fn lowest_candidate_is_primary() {
        let names = candidates(&["candidate-0000000003", "candidate-0000000001"]);
        let role = role_from_candidates(names, ELECTION, "/elections/abcd/candidate-0000000001");
        assert_eq!(role, Role::Leading);
    }

    #[test]
    fn other_candidates_are_secondary() {
        let names = candidates(&["candidate-0000000003", "candidate-0000000001"]);
        let role = role_from_candidates(names, ELECTION, "/elections/abcd/candidate-0000000003");
        assert_eq!(role, Role::Following);
    }

    #[test]
    fn missing_candidate_is_deleted() {
        let names = candidates(&["candidate-0000000003"]);
        let role = role_from_candidates(names, ELECTION, "/elections/abcd/candidate-0000000001");
        assert_eq!(role, Role::Gone("election candidate deleted"));
    }

    #[test]
    fn empty_election_is_deleted() {
        let role = role_from_candidates(Vec::new(), ELECTION, "/elections/abcd/candidate-0000000001");
        assert_eq!(role, Role::Gone("election has no candidates"));
    }

    #[test]
    fn roles_move_between_primary_and_secondary() {
        let mut candidacy = joined();
        assert_eq!(candidacy.status(), ElectionStatus::InProgress);
        let watch = candidacy.primary.clone();

        let role = Role::Leading;
        assert!(candidacy.transition(Event::Role { generation: 1, role }).is_none());
        assert_eq!(candidacy.status(), ElectionStatus::Primary);
        assert!(watch.load(std::sync::atomic::Ordering::Relaxed));

        let role = Role::Following;
        assert!(candidacy.transition(Event::Role { generation: 1, role }).is_none());
        assert_eq!(candidacy.status(), ElectionStatus::Secondary);
        assert!(!watch.load(std::sync::atomic::Ordering::Relaxed));
    }

    #[test]
    fn step_down_returns_seat_once() {
        let mut candidacy = joined();
        let seat = candidacy.transition(Event::StepDown).expect("seat not returned");
        assert_eq!(seat.znode, "/elections/abcd/candidate-0000000001");
        assert_eq!(seat.subscription, 1);
        assert_eq!(candidacy.status(), ElectionStatus::NotCandidate);
        assert_eq!(candidacy.generation, 2);
        assert!(candidacy.transition(Event::StepDown).is_none());
    }

    #[test]
    fn stale_generation_events_are_ignored() {
        let mut candidacy = joined();
        candidacy.transition(Event::StepDown);
        let generation = candidacy
            .join(2, "/elections/abcd/candidate-0000000007".into(), 2)
            .unwrap_or_else(|_| panic!("rejoin rejected"));
        assert_eq!(generation, 3);

        // Callbacks from the first candidacy must not touch the second.
        let role = Role::Gone("election candidate deleted");
        assert!(candidacy.transition(Event::Role { generation: 1, role }).is_none());
        assert!(candidacy.transition(Event::SessionClosed { generation: 1 }).is_none());
        assert_eq!(candidacy.status(), ElectionStatus::InProgress);
        assert!(candidacy.seat.is_some());
    }

    #[test]
    fn deleted_candidate_ends_candidacy() {
        let mut candidacy = joined();
        let role = Role::Gone("election deleted");
        let seat = candidacy.transition(Event::Role { generation: 1, role });
        assert!(seat.is_some());
        assert_eq!(
            candidacy.status(),
            ElectionStatus::Terminated("election deleted".into())
        );
        let role = Role::Leading;
        assert!(candidacy.transition(Event::Role { generation: 1, role }).is_none());
        assert_eq!(candidacy.phase, Phase::Ended("election deleted".into()));
    }

    #[test]
    fn session_close_ends_candidacy() {
        let mut candidacy = joined();
        assert!(candidacy
            .transition(Event::SessionClosed { generation: 1 })
            .is_some());
        assert_eq!(
            candidacy.status(),
            ElectionStatus::Terminated("zookeeper session lost".into())
        );
    }

    #[test]
    fn join_rejected_while_active_or_outdated() {
        let mut candidacy = joined();
        let seat = candidacy.join(1, "/elections/abcd/candidate-0000000002".into(), 2);
        assert!(matches!(seat, Err(ref seat) if seat.subscription == 2));

        candidacy.transition(Event::StepDown);
        let seat = candidacy.join(1, "/elections/abcd/candidate-0000000003".into(), 3);
        assert!(seat.is_err());
        assert_eq!(candidacy.status(), ElectionStatus::NotCandidate);
    }

    fn wait_for_status(election: &ZookeeperElection, expected: ElectionStatus) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while election.status() != expected {
            assert!(Instant::now() < deadline, "election never became {:?}", expected);
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    #[test]
    #[ignore]
    fn live_election_hands_over_on_step_down() {
        let name = testing::unique("election");
        let logger = testing::logger();
        let mut first = ZookeeperElection::new(testing::client(), &name, NodeId::new(), logger.clone());
        let mut second = ZookeeperElection::new(testing::client(), &name, NodeId::new(), logger);

        // The first candidate creates the missing election znode.
        first.run().unwrap();
        assert_eq!(first.status(), ElectionStatus::Primary);
        assert!(first.watch().is_primary());
        second.run().unwrap();
        assert_eq!(second.status(), ElectionStatus::Secondary);
        assert!(second.run().is_err());

        first.step_down().unwrap();
        assert_eq!(first.status(), ElectionStatus::NotCandidate);
        wait_for_status(&second, ElectionStatus::Primary);

        // Rejoining after a step down queues behind the new primary.
        first.run().unwrap();
        assert_eq!(first.status(), ElectionStatus::Secondary);
        first.step_down().unwrap();
        second.step_down().unwrap();
    }
}
