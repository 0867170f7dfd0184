use std::fmt::Write;

use failure::Fail;
use slog::Record;
use slog::Serializer;
use slog::KV;

/// Format a `Fail` and all of its causes into a human readable message.
///
/// The first line is the error itself, followed by one line per cause.
/// If a backtrace was captured it is appended at the end.
pub fn format_fail(fail: &dyn Fail) -> String {
    let mut message = String::new();
    for (depth, cause) in fail.iter_chain().enumerate() {
        // Writing to a String never fails.
        if depth == 0 {
            let _ = write!(message, "{}", cause);
        } else {
            let _ = write!(message, "\n  caused by: {}", cause);
        }
    }
    let backtrace = fail
        .iter_chain()
        .filter_map(|cause| cause.backtrace())
        .map(|backtrace| backtrace.to_string())
        .filter(|backtrace| !backtrace.is_empty())
        .last();
    if let Some(backtrace) = backtrace {
        let _ = write!(message, "\n\nbacktrace:\n{}", backtrace);
    }
    message
}

/// Extract structured logging information out of a `Fail`.
///
/// The returned value can be attached to slog records directly:
///
/// ```ignore
/// error!(logger, "Operation failed"; failure_info(&error));
/// ```
pub fn failure_info(fail: &dyn Fail) -> FailureInfo {
    let layers = fail.iter_chain().count();
    let root_cause = fail
        .iter_chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_default();
    FailureInfo {
        layers,
        message: fail.to_string(),
        root_cause,
        trace: format_fail(fail),
    }
}

/// Structured information about an error and its causes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureInfo {
    layers: usize,
    message: String,
    root_cause: String,
    trace: String,
}

impl FailureInfo {
    /// Number of errors in the cause chain (including the top level error).
    pub fn layers(&self) -> usize {
        self.layers
    }

    /// Message of the top level error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message of the innermost error.
    pub fn root_cause(&self) -> &str {
        &self.root_cause
    }
}

impl KV for FailureInfo {
    fn serialize(&self, _: &Record, serializer: &mut dyn Serializer) -> slog::Result {
        serializer.emit_str("message", &self.message)?;
        serializer.emit_usize("layers", self.layers)?;
        serializer.emit_str("root_cause", &self.root_cause)?;
        serializer.emit_str("trace", &self.trace)
    }
}

#[cfg(test)]
mod tests {
    use failure::err_msg;

    use super::failure_info;
    use super::format_fail;

    #[test]
    fn format_single_error() {
        let error = err_msg("something broke");
        let message = format_fail(error.as_fail());
        assert_eq!(message.lines().next(), Some("something broke"));
        assert!(!message.contains("caused by"));
    }

    #[test]
    fn format_error_chain() {
        let error = err_msg("connection refused").context("lock acquisition failed");
        let message = format_fail(&error);
        assert!(message.starts_with("lock acquisition failed\n  caused by: connection refused"));
    }

    #[test]
    fn info_reports_layers_and_root() {
        let error = err_msg("connection refused").context("lock acquisition failed");
        let info = failure_info(&error);
        assert_eq!(info.layers(), 2);
        assert_eq!(info.message(), "lock acquisition failed");
        assert_eq!(info.root_cause(), "connection refused");
    }
}
