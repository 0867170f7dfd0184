use lazy_static::lazy_static;
use prometheus::Counter;
use prometheus::Registry;
use slog::debug;
use slog::Logger;

use super::Result;

lazy_static! {
    pub static ref ELECTION_DROP_FAIL: Counter = Counter::new(
        "zkcoord_election_drop_fail",
        "Number of election step-down failures on drop"
    )
    .expect("Failed to create ELECTION_DROP_FAIL counter");
    pub static ref ELECTION_DROP_TOTAL: Counter = Counter::new(
        "zkcoord_election_drop_total",
        "Number of elections stepped down on drop"
    )
    .expect("Failed to create ELECTION_DROP_TOTAL counter");
    pub static ref ELECTION_RUN_FAIL: Counter = Counter::new(
        "zkcoord_election_run_fail",
        "Number of failed election runs"
    )
    .expect("Failed to create ELECTION_RUN_FAIL counter");
    pub static ref ELECTION_RUN_TOTAL: Counter = Counter::new(
        "zkcoord_election_run_total",
        "Number of election runs"
    )
    .expect("Failed to create ELECTION_RUN_TOTAL counter");
    pub static ref ELECTION_STEPDOWN_FAIL: Counter = Counter::new(
        "zkcoord_election_stepdown_fail",
        "Number of failed election step-downs"
    )
    .expect("Failed to create ELECTION_STEPDOWN_FAIL counter");
    pub static ref ELECTION_STEPDOWN_TOTAL: Counter = Counter::new(
        "zkcoord_election_stepdown_total",
        "Number of election step-downs"
    )
    .expect("Failed to create ELECTION_STEPDOWN_TOTAL counter");
    pub static ref ELECTION_TERMINATED: Counter = Counter::new(
        "zkcoord_election_terminated",
        "Number of elections terminated by the coordinator"
    )
    .expect("Failed to create ELECTION_TERMINATED counter");
    pub static ref LEADER_GAINED: Counter = Counter::new(
        "zkcoord_leader_gained",
        "Number of times a leader service acquired leadership"
    )
    .expect("Failed to create LEADER_GAINED counter");
    pub static ref LEADER_REVOKED: Counter = Counter::new(
        "zkcoord_leader_revoked",
        "Number of times a leader service lost leadership"
    )
    .expect("Failed to create LEADER_REVOKED counter");
    pub static ref NB_LOCK_ACQUIRE_FAIL: Counter = Counter::new(
        "zkcoord_nblock_acquire_fail",
        "Number of failed non-blocking lock acquire operations"
    )
    .expect("Failed to create NB_LOCK_ACQUIRE_FAIL counter");
    pub static ref NB_LOCK_ACQUIRE_TOTAL: Counter = Counter::new(
        "zkcoord_nblock_acquire_total",
        "Number of non-blocking lock acquire operations"
    )
    .expect("Failed to create NB_LOCK_ACQUIRE_TOTAL counter");
    pub static ref NB_LOCK_DROP_FAIL: Counter = Counter::new(
        "zkcoord_nblock_drop_fail",
        "Number of non-blocking locks that failed to release on drop"
    )
    .expect("Failed to create NB_LOCK_DROP_FAIL counter");
    pub static ref NB_LOCK_DROP_TOTAL: Counter = Counter::new(
        "zkcoord_nblock_drop_total",
        "Number of held non-blocking locks released on drop"
    )
    .expect("Failed to create NB_LOCK_DROP_TOTAL counter");
    pub static ref NB_LOCK_LOST: Counter = Counter::new(
        "zkcoord_nblock_lost",
        "Number of non-blocking locks lost while held"
    )
    .expect("Failed to create NB_LOCK_LOST counter");
    pub static ref NB_LOCK_RELEASE_FAIL: Counter = Counter::new(
        "zkcoord_nblock_release_fail",
        "Number of failed non-blocking lock release operations"
    )
    .expect("Failed to create NB_LOCK_RELEASE_FAIL counter");
    pub static ref NB_LOCK_RELEASE_TOTAL: Counter = Counter::new(
        "zkcoord_nblock_release_total",
        "Number of non-blocking lock release operations"
    )
    .expect("Failed to create NB_LOCK_RELEASE_TOTAL counter");
    pub static ref SEQUENCE_NEXT_FAIL: Counter = Counter::new(
        "zkcoord_sequence_next_fail",
        "Number of failed sequence ID generations"
    )
    .expect("Failed to create SEQUENCE_NEXT_FAIL counter");
    pub static ref SEQUENCE_NEXT_TOTAL: Counter = Counter::new(
        "zkcoord_sequence_next_total",
        "Number of sequence ID generations"
    )
    .expect("Failed to create SEQUENCE_NEXT_TOTAL counter");
}

/// Count an operation in `total` and, if it failed, in `fail` too.
pub fn tally<T>(total: &Counter, fail: &Counter, outcome: Result<T>) -> Result<T> {
    total.inc();
    if outcome.is_err() {
        fail.inc();
    }
    outcome
}

/// Attemps to register metrics with the Registry.
///
/// Metrics that fail to register are logged and ignored.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    let counters: [(&str, &Counter); 18] = [
        ("ELECTION_DROP_FAIL", &*ELECTION_DROP_FAIL),
        ("ELECTION_DROP_TOTAL", &*ELECTION_DROP_TOTAL),
        ("ELECTION_RUN_FAIL", &*ELECTION_RUN_FAIL),
        ("ELECTION_RUN_TOTAL", &*ELECTION_RUN_TOTAL),
        ("ELECTION_STEPDOWN_FAIL", &*ELECTION_STEPDOWN_FAIL),
        ("ELECTION_STEPDOWN_TOTAL", &*ELECTION_STEPDOWN_TOTAL),
        ("ELECTION_TERMINATED", &*ELECTION_TERMINATED),
        ("LEADER_GAINED", &*LEADER_GAINED),
        ("LEADER_REVOKED", &*LEADER_REVOKED),
        ("NB_LOCK_ACQUIRE_FAIL", &*NB_LOCK_ACQUIRE_FAIL),
        ("NB_LOCK_ACQUIRE_TOTAL", &*NB_LOCK_ACQUIRE_TOTAL),
        ("NB_LOCK_DROP_FAIL", &*NB_LOCK_DROP_FAIL),
        ("NB_LOCK_DROP_TOTAL", &*NB_LOCK_DROP_TOTAL),
        ("NB_LOCK_LOST", &*NB_LOCK_LOST),
        ("NB_LOCK_RELEASE_FAIL", &*NB_LOCK_RELEASE_FAIL),
        ("NB_LOCK_RELEASE_TOTAL", &*NB_LOCK_RELEASE_TOTAL),
        ("SEQUENCE_NEXT_FAIL", &*SEQUENCE_NEXT_FAIL),
        ("SEQUENCE_NEXT_TOTAL", &*SEQUENCE_NEXT_TOTAL),
    ];
    for (name, counter) in counters.iter() {
        if let Err(error) = registry.register(Box::new((*counter).clone())) {
            debug!(logger, "Failed to register {}", name; "error" => ?error);
        }
    }
    super::backend::zookeeper::register_metrics(logger, registry);
}

#[cfg(test)]
mod tests {
    use prometheus::Registry;
    use slog::o;
    use slog::Discard;
    use slog::Logger;

use super::Result;

    use super::register_metrics;

    #[test]
    fn register_twice_is_harmless() {
        let logger = Logger::root(Discard, o!());
        let registry = Registry::new();
        register_metrics(&logger, &registry);
        register_metrics(&logger, &registry);
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|family| family.get_name() == "zkcoord_election_run_total"));
    }
}
