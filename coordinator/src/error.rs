use std::fmt;

use failure::Backtrace;
use failure::Context;
use failure::Fail;

use super::NodeId;

/// Error information returned by the `Coordinator` API in case of errors.
#[derive(Debug)]
pub struct Error(Context<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.get_context()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error(Context::new(kind))
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error(inner)
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

/// What went wrong, see `Error::kind`.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "could not open a session with the coordinator")]
    BackendConnect,

    #[fail(display = "coordinator request for {} failed", _0)]
    Backend(&'static str),

    #[fail(display = "server refused the '{}' command, is it whitelisted?", _0)]
    CommandNotAllowed(String),

    #[fail(display = "invalid {} payload", _0)]
    Decode(&'static str),

    #[fail(display = "could not serialise {}", _0)]
    Encode(&'static str),

    #[fail(display = "candidacy in election '{}' was lost", _0)]
    ElectionLost(String),

    #[fail(display = "no election named '{}'", _0)]
    ElectionNotFound(String),

    #[fail(display = "already a candidate in election '{}'", _0)]
    ElectionRunning(String),

    #[fail(display = "lock '{}' is taken by node '{}'", _0, _1)]
    LockHeld(String, NodeId),

    #[fail(display = "lost hold of lock '{}'", _0)]
    LockLost(String),

    #[fail(display = "no lock named '{}'", _0)]
    LockNotFound(String),

    #[fail(display = "lock '{}' is not held by this handle (owner '{}')", _0, _1)]
    LockNotHeld(String, NodeId),

    #[fail(display = "no usable reply from server '{}'", _0)]
    Probe(String),

    #[fail(display = "server reply has an invalid {}", _0)]
    ProbeParse(&'static str),

    #[fail(display = "sequence '{}' has run out of IDs", _0)]
    SequenceExhausted(String),

    #[fail(display = "could not start the {} thread", _0)]
    SpawnThread(&'static str),
}

pub type Result<T> = ::std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use failure::Fail;
    use failure::ResultExt;

    use super::Error;
    use super::ErrorKind;

    #[test]
    fn context_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket gone");
        let error: Error = Err::<(), _>(io)
            .context(ErrorKind::Backend("lock acquisition"))
            .map_err(Error::from)
            .unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::Backend("lock acquisition"));
        assert_eq!(error.to_string(), "coordinator request for lock acquisition failed");
        let cause = error.cause().map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("socket gone"));
    }
}
