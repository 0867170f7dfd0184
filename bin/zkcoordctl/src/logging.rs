use std::sync::Mutex;

use slog::o;
use slog::Drain;
use slog::IgnoreResult;
use slog::Logger;
use slog_term::FullFormat;
use slog_term::TermDecorator;

use crate::CLI_NAME;

/// Verbosity accepted by `--log-level`.
#[derive(clap::ValueEnum, Clone, Copy, Default, Eq, PartialEq, Hash, Debug)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    #[cfg_attr(not(debug_assertions), default)]
    Info,
    #[cfg_attr(debug_assertions, default)]
    Debug,
}

impl From<LogLevel> for ::slog::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Critical => ::slog::Level::Critical,
            LogLevel::Error => ::slog::Level::Error,
            LogLevel::Warning => ::slog::Level::Warning,
            LogLevel::Info => ::slog::Level::Info,
            LogLevel::Debug => ::slog::Level::Debug,
        }
    }
}

/// Terminal logger writing to stderr, keeping stdout for command output.
pub fn configure(level: LogLevel) -> Logger {
    let decorator = TermDecorator::new().stderr().build();
    let drain = Mutex::new(FullFormat::new(decorator).build())
        .map(IgnoreResult::new)
        .filter_level(level.into())
        .ignore_res();
    Logger::root(drain, o!("cli" => CLI_NAME))
}

#[cfg(test)]
mod tests {
    use clap::ValueEnum;
    use slog::Level;

    use super::LogLevel;

    #[test]
    fn levels_map_to_slog() {
        assert_eq!(Level::from(LogLevel::Critical), Level::Critical);
        assert_eq!(Level::from(LogLevel::Error), Level::Error);
        assert_eq!(Level::from(LogLevel::Warning), Level::Warning);
        assert_eq!(Level::from(LogLevel::Info), Level::Info);
        assert_eq!(Level::from(LogLevel::Debug), Level::Debug);
    }

    #[test]
    fn parse_from_cli_value() {
        let level = LogLevel::from_str("warning", true).unwrap();
        assert_eq!(level, LogLevel::Warning);
        let level = LogLevel::from_str("DEBUG", true).unwrap();
        assert_eq!(level, LogLevel::Debug);
        assert!(LogLevel::from_str("trace", true).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn debug_builds_default_to_debug() {
        assert_eq!(LogLevel::default(), LogLevel::Debug);
    }
}
