/// Root of election znodes.
pub const PREFIX_ELECTION: &str = "/elections";

/// Root of non-blocking lock znodes.
pub const PREFIX_LOCK: &str = "/locks";

/// Root of the registry of connected processes.
pub const PREFIX_NODE: &str = "/nodes";

/// Root of sequence znodes.
///
/// Never cleaned up: deleting a sequence znode resets its counter.
pub const PREFIX_SEQUENCE: &str = "/sequences";
