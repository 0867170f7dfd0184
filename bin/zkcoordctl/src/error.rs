use std::fmt;

use failure::Backtrace;
use failure::Context;
use failure::Fail;

/// Error information returned by functions in case of errors.
#[derive(Debug)]
pub struct Error(Context<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.get_context()
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.0.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.0.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error(inner)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error(Context::new(kind))
    }
}

/// Failures reported to the operator before exiting.
#[derive(Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "could not connect the admin client")]
    AdminInit,

    #[fail(display = "invalid configuration in '{}'", _0)]
    ConfigLoad(String),

    #[fail(display = "could not connect the coordinator client")]
    CoordinatorInit,

    #[fail(display = "listing elections failed")]
    CoordinatorElectionList,

    #[fail(display = "could not load election '{}'", _0)]
    CoordinatorElectionLookup(String),

    #[fail(display = "could not read the primary of election '{}'", _0)]
    CoordinatorElectionPrimaryLookup(String),

    #[fail(display = "could not count candidates of election '{}'", _0)]
    CoordinatorElectionSecondaryCount(String),

    #[fail(display = "could not depose the primary of election '{}'", _0)]
    CoordinatorElectionStepDown(String),

    #[fail(display = "listing non-blocking locks failed")]
    CoordinatorNBLockList,

    #[fail(display = "could not load non-blocking lock '{}'", _0)]
    CoordinatorNBLockLookup(String),

    #[fail(display = "could not read the owner of non-blocking lock '{}'", _0)]
    CoordinatorNBLockOwnerLookup(String),

    #[fail(display = "could not force-release non-blocking lock '{}'", _0)]
    CoordinatorNBLockRelease(String),

    #[fail(display = "listing nodes failed")]
    CoordinatorNodeList,

    #[fail(display = "could not determine the coordinator version")]
    CoordinatorVersion,

    #[fail(display = "could not open '{}'", _0)]
    FsOpen(String),

    #[fail(display = "could not join leader election '{}'", _0)]
    LeaderService(String),

    #[fail(display = "'{}' needs a subcommand, see --help", _0)]
    NoCommand(String),

    #[fail(display = "sequence '{}' did not produce an ID", _0)]
    SequenceGenerate(String),

    #[fail(display = "could not query server '{}'", _0)]
    ServerProbe(String),

    #[fail(display = "gave up waiting for server '{}'", _0)]
    ServerUnavailable(String),

    #[fail(display = "refusing to continue without --I-take-responsibility-for-this-action")]
    TakeResponsibility,

    #[fail(display = "'{}' has no '{}' subcommand", _0, _1)]
    UnknownSubcommand(String, String),
}

pub type Result<T> = ::std::result::Result<T, Error>;
