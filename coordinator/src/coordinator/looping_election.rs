use std::time::Duration;

use crossbeam_channel::bounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;
use slog::debug;
use slog::info;
use slog::warn;
use slog::Logger;

use zkcoord_util_failure::failure_info;

use super::super::Error;
use super::super::Result;
use super::Election;
use super::ElectionStatus;

/// Upper bound to `ReRun`/`StepDown` requests acted upon in a row before giving up on a cycle.
const MAX_ACTIONS_PER_STAGE: usize = 3;

/// Repeatedly inspect an `Election` and hand its status to `LoopingElectionLogic` hooks.
///
/// `loop_forever` returns only when a hook answers `Exit` or shutdown is requested;
/// the election is left on the way out.
pub struct LoopingElection {
    election: Election,
    logger: Logger,
    logic: Box<dyn LoopingElectionLogic>,
    pace: Pace,
    term: Option<Term>,
}

impl LoopingElection {
    pub fn new(options: LoopingElectionOpts, logger: Logger) -> LoopingElection {
        LoopingElection {
            election: options.election,
            logger,
            logic: options.logic,
            pace: Pace {
                delay: options.delay,
                shutdown: options.shutdown,
            },
            term: options.term.map(Term::new),
        }
    }

    /// Access the election driven by this loop.
    pub fn election(&self) -> &Election {
        &self.election
    }

    /// Cycle until a hook asks to `Exit` or a shutdown request arrives.
    pub fn loop_forever(&mut self) {
        let mut cycles: u64 = 0;
        loop {
            if cycles > 0 && self.pace.wait() {
                debug!(self.logger, "Election loop shutdown requested"; "election" => self.election.name());
                break;
            }
            cycles += 1;

            let expired = self.term.as_ref().map_or(false, Term::expired);
            if expired {
                debug!(self.logger, "Election term expired"; "election" => self.election.name());
                match self.settle(LoopingElectionControl::ReRun) {
                    LoopingElectionControl::Exit => break,
                    LoopingElectionControl::Continue => continue,
                    _ => (),
                }
            }
            if let Some(term) = self.term.as_mut() {
                term.consume();
            }

            if let LoopingElectionControl::Exit = self.loop_once() {
                break;
            }
        }

        if let Err(error) = self.election.step_down() {
            warn!(
                self.logger, "Unable to leave election while stopping its loop";
                "election" => self.election.name(),
                failure_info(&error),
            );
        }
    }

    /// Run one cycle of hooks: pre check, status hook and post check.
    ///
    /// Returns the first control that is not `Proceed`.
    pub fn loop_once(&mut self) -> LoopingElectionControl {
        for stage in &[Stage::PreCheck, Stage::Status, Stage::PostCheck] {
            let request = self.invoke(*stage);
            let flow = self.settle(request);
            if flow != LoopingElectionControl::Proceed {
                return flow;
            }
        }
        LoopingElectionControl::Proceed
    }
}

impl LoopingElection {
    /// Call the hook for a stage, turning errors into the control `handle_error` picks.
    fn invoke(&self, stage: Stage) -> LoopingElectionControl {
        let election = &self.election;
        let result = match stage {
            Stage::PreCheck => self.logic.pre_check(election),
            Stage::PostCheck => self.logic.post_check(election),
            Stage::Status => match election.status() {
                ElectionStatus::NotCandidate => self.logic.not_candidate(election),
                ElectionStatus::InProgress => {
                    debug!(self.logger, "Election still in progress"; "election" => election.name());
                    Ok(LoopingElectionControl::Proceed)
                }
                ElectionStatus::Primary => self.logic.primary(election),
                ElectionStatus::Secondary => self.logic.secondary(election),
                ElectionStatus::Terminated(reason) => {
                    warn!(
                        self.logger, "Election was terminated";
                        "election" => election.name(),
                        "reason" => &reason,
                    );
                    self.logic.terminated(election, reason)
                }
            },
        };
        result.unwrap_or_else(|error| self.logic.handle_error(error))
    }

    /// Act on `ReRun` and `StepDown` requests until a plain control is left.
    ///
    /// Errors raised while acting go through `handle_error`, whose answer is acted on in turn.
    fn settle(&mut self, request: LoopingElectionControl) -> LoopingElectionControl {
        let mut request = request;
        for _ in 0..MAX_ACTIONS_PER_STAGE {
            request = match request {
                LoopingElectionControl::ReRun => self.rerun(),
                LoopingElectionControl::StepDown => self.leave(),
                flow => return flow,
            };
        }
        match request {
            LoopingElectionControl::ReRun | LoopingElectionControl::StepDown => {
                warn!(
                    self.logger, "Election keeps failing, waiting for the next cycle";
                    "election" => self.election.name(),
                );
                LoopingElectionControl::Continue
            }
            flow => flow,
        }
    }

    /// Leave the election and run for it again, starting a new term.
    fn rerun(&mut self) -> LoopingElectionControl {
        info!(self.logger, "Running for election"; "election" => self.election.name());
        if let Some(term) = self.term.as_mut() {
            term.renew();
        }
        if let Err(error) = self.election.step_down() {
            let flow = self.logic.handle_error(error);
            if flow != LoopingElectionControl::Proceed {
                return flow;
            }
        }
        match self.election.run() {
            Ok(()) => LoopingElectionControl::Proceed,
            Err(error) => self.logic.handle_error(error),
        }
    }

    fn leave(&mut self) -> LoopingElectionControl {
        info!(self.logger, "Stepping down from election"; "election" => self.election.name());
        match self.election.step_down() {
            Ok(()) => LoopingElectionControl::Proceed,
            Err(error) => self.logic.handle_error(error),
        }
    }
}

/// Hook stages of a loop cycle, in order.
#[derive(Clone, Copy, Debug)]
enum Stage {
    PreCheck,
    Status,
    PostCheck,
}

/// Number of cycles left before the election is re-run.
struct Term {
    length: u64,
    remaining: u64,
}

impl Term {
    fn new(length: u64) -> Term {
        Term {
            length,
            remaining: length,
        }
    }

    fn consume(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    fn expired(&self) -> bool {
        self.remaining == 0
    }

    fn renew(&mut self) {
        self.remaining = self.length;
    }
}

/// Delay between cycles, cut short by a shutdown request.
struct Pace {
    delay: Duration,
    shutdown: Option<ShutdownReceiver>,
}

impl Pace {
    /// Wait for the next cycle, returning `true` if the loop should stop instead.
    fn wait(&self) -> bool {
        let receiver = match &self.shutdown {
            None => {
                std::thread::sleep(self.delay);
                return false;
            }
            Some(receiver) => receiver,
        };
        match receiver.0.recv_timeout(self.delay) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }
}

/// What a `LoopingElectionLogic` hook wants the loop to do next.
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub enum LoopingElectionControl {
    /// Skip the rest of this cycle and start the next one.
    Continue,

    /// Leave the loop, stepping down from the election.
    Exit,

    /// Proceed with the normal flow of events.
    Proceed,

    /// Step down and run for election again.
    ReRun,

    /// Step down from the election without running again.
    StepDown,
}

/// Application logic plugged into a `LoopingElection`.
pub trait LoopingElectionLogic {
    /// Pick a control for an error returned by a hook or by the election.
    fn handle_error(&self, error: Error) -> LoopingElectionControl;

    /// The node is not a candidate. Runs for election unless overridden.
    fn not_candidate(&self, _election: &Election) -> Result<LoopingElectionControl> {
        Ok(LoopingElectionControl::ReRun)
    }

    fn post_check(&self, _election: &Election) -> Result<LoopingElectionControl> {
        Ok(LoopingElectionControl::Proceed)
    }

    fn pre_check(&self, _election: &Election) -> Result<LoopingElectionControl> {
        Ok(LoopingElectionControl::Proceed)
    }

    /// The node is the primary.
    fn primary(&self, election: &Election) -> Result<LoopingElectionControl>;

    /// The node is waiting to take over.
    fn secondary(&self, election: &Election) -> Result<LoopingElectionControl>;

    /// The coordinator ended our candidacy. Runs for election again unless overridden.
    fn terminated(&self, _election: &Election, _reason: String) -> Result<LoopingElectionControl> {
        Ok(LoopingElectionControl::ReRun)
    }
}

/// Builder for `LoopingElection`s.
pub struct LoopingElectionOpts {
    delay: Duration,
    election: Election,
    logic: Box<dyn LoopingElectionLogic>,
    shutdown: Option<ShutdownReceiver>,
    term: Option<u64>,
}

impl LoopingElectionOpts {
    pub fn new<Logic>(election: Election, logic: Logic) -> LoopingElectionOpts
    where
        Logic: LoopingElectionLogic + 'static,
    {
        LoopingElectionOpts {
            delay: Duration::from_secs(60),
            election,
            logic: Box::new(logic),
            shutdown: None,
            term: None,
        }
    }

    /// Create a channel to stop a `LoopingElection` from another thread.
    pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
        let (sender, receiver) = bounded(0);
        (ShutdownSender(sender), ShutdownReceiver(receiver))
    }

    /// Keep the election running for as long as the process is a candidate.
    pub fn clear_election_term(self) -> LoopingElectionOpts {
        LoopingElectionOpts { term: None, ..self }
    }

    /// Re-run the election every `term` cycles so primaries rotate routinely.
    ///
    /// # Panics
    /// If `term` is 0.
    pub fn election_term(self, term: u64) -> LoopingElectionOpts {
        assert!(term > 0, "election_term requires at least 1 term");
        LoopingElectionOpts {
            term: Some(term),
            ..self
        }
    }

    pub fn loop_delay(self, loop_delay: Duration) -> LoopingElectionOpts {
        LoopingElectionOpts {
            delay: loop_delay,
            ..self
        }
    }

    /// Stop `loop_forever` when the matching `ShutdownSender` fires or is dropped.
    pub fn shutdown_receiver(self, receiver: ShutdownReceiver) -> LoopingElectionOpts {
        LoopingElectionOpts {
            shutdown: Some(receiver),
            ..self
        }
    }
}

/// Receiving end of a `LoopingElectionOpts::shutdown_channel`.
pub struct ShutdownReceiver(Receiver<()>);

/// Sending end of a `LoopingElectionOpts::shutdown_channel`.
#[derive(Clone)]
pub struct ShutdownSender(Sender<()>);

impl ShutdownSender {
    /// Ask the loop to stop, blocking until it is between cycles.
    pub fn request(&self) {
        // Nobody to notify if the loop already exited.
        let _ = self.0.send(());
    }
}
