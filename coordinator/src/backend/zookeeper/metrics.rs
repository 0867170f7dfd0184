use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::Counter;
use prometheus::CounterVec;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::Opts;
use prometheus::Registry;
use slog::debug;
use slog::Logger;

lazy_static! {
    pub static ref ZOO_CLEANUP_COUNT: Counter = Counter::new(
        "zkcoord_zookeeper_cleanup",
        "Empty znodes removed by the cleaner"
    )
    .expect("Failed to create ZOO_CLEANUP_COUNT counter");
    pub static ref ZOO_CONNECTION_COUNT: Counter = Counter::new(
        "zkcoord_zookeeper_connect",
        "Sessions opened with the ensemble"
    )
    .expect("Failed to create ZOO_CONNECTION_COUNT counter");
    pub static ref ZOO_CONNECTION_RETRY: Counter = Counter::new(
        "zkcoord_zookeeper_connect_retry",
        "Session attempts retried after a backoff"
    )
    .expect("Failed to create ZOO_CONNECTION_RETRY counter");
    pub static ref ZOO_NB_LOCK_DELETED: Counter = Counter::new(
        "zkcoord_zookeeper_nb_lock_deleted",
        "Held locks whose znode was removed by someone else"
    )
    .expect("Failed to create ZOO_NB_LOCK_DELETED counter");
    pub static ref ZOO_NB_LOCK_LOST: Counter = Counter::new(
        "zkcoord_zookeeper_nb_lock_lost",
        "Held locks dropped with an expired session"
    )
    .expect("Failed to create ZOO_NB_LOCK_LOST counter");
    pub static ref ZOO_OP_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "zkcoord_zookeeper_op_duration",
            "Seconds spent waiting on Zookeeper requests by operation"
        ),
        &["operation"]
    )
    .expect("Failed to create ZOO_OP_DURATION histogram");
    pub static ref ZOO_OP_ERRORS_COUNT: CounterVec = CounterVec::new(
        Opts::new(
            "zkcoord_zookeeper_op_errors",
            "Failed Zookeeper requests by operation"
        ),
        &["operation"]
    )
    .expect("Failed to create ZOO_OP_ERRORS_COUNT counter");
    pub static ref ZOO_TIMEOUTS_COUNT: Counter = Counter::new(
        "zkcoord_zookeeper_timeouts",
        "Zookeeper requests that timed out"
    )
    .expect("Failed to create ZOO_TIMEOUTS_COUNT counter");
}

/// Register the zookeeper backend metrics, logging and skipping any the registry refuses.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    let collectors: Vec<(&str, Box<dyn Collector>)> = vec![
        ("ZOO_CLEANUP_COUNT", Box::new(ZOO_CLEANUP_COUNT.clone())),
        ("ZOO_CONNECTION_COUNT", Box::new(ZOO_CONNECTION_COUNT.clone())),
        ("ZOO_CONNECTION_RETRY", Box::new(ZOO_CONNECTION_RETRY.clone())),
        ("ZOO_NB_LOCK_DELETED", Box::new(ZOO_NB_LOCK_DELETED.clone())),
        ("ZOO_NB_LOCK_LOST", Box::new(ZOO_NB_LOCK_LOST.clone())),
        ("ZOO_OP_DURATION", Box::new(ZOO_OP_DURATION.clone())),
        ("ZOO_OP_ERRORS_COUNT", Box::new(ZOO_OP_ERRORS_COUNT.clone())),
        ("ZOO_TIMEOUTS_COUNT", Box::new(ZOO_TIMEOUTS_COUNT.clone())),
    ];
    for (name, collector) in collectors {
        if let Err(error) = registry.register(collector) {
            debug!(logger, "Skipped zookeeper metric registration"; "metric" => name, "error" => ?error);
        }
    }
}
