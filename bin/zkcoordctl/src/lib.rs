use clap::value_parser;
use clap::Arg;
use clap::ArgMatches;
use clap::Command;
use slog::debug;
use slog::error;

mod commands;
mod error;
mod interfaces;
mod logging;
mod utils;

pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::error::Result;

use self::commands::coordinator;
use self::commands::elect;
use self::commands::sequence;
use self::commands::server;
use self::interfaces::Interfaces;
use self::logging::LogLevel;

pub(crate) const CLI_NAME: &str = "zkcoordctl";

/// Argument definitions for every command.
fn cli() -> Command {
    Command::new(CLI_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .num_args(1)
                .global(true)
                .help("Specifies the configuration file to use (defaults are used when omitted)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .num_args(1)
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .global(true)
                .help("Specifies the logging verbosity"),
        )
        .subcommand(coordinator::command())
        .subcommand(elect::command())
        .subcommand(sequence::command())
        .subcommand(server::command())
}

/// Parse the command line and run the requested command.
pub fn run() -> Result<()> {
    let args = cli().get_matches();
    let level = args.get_one::<LogLevel>("log-level").copied().unwrap_or_default();
    let logger = logging::configure(level);
    debug!(logger, "Command line parsed"; "version" => env!("CARGO_PKG_VERSION"));

    let interfaces = Interfaces::new(&args, logger.clone())?;
    let outcome = run_command(&args, &interfaces);
    match &outcome {
        Ok(()) => debug!(logger, "Command completed"),
        Err(_) => error!(logger, "Command failed"),
    };
    outcome
}

fn run_command(args: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    match args.subcommand() {
        Some((coordinator::COMMAND, command)) => coordinator::run(command, interfaces),
        Some((elect::COMMAND, command)) => elect::run(command, interfaces),
        Some((sequence::COMMAND, command)) => sequence::run(command, interfaces),
        Some((server::COMMAND, command)) => server::run(command, interfaces),
        _ => Err(utils::unknown_subcommand(CLI_NAME, args)),
    }
}

#[cfg(test)]
mod tests {
    use super::cli;
    use super::logging::LogLevel;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn global_args_after_subcommand() {
        let args = cli()
            .try_get_matches_from(vec![
                "zkcoordctl",
                "coordinator",
                "nodes",
                "--config",
                "zk.yaml",
                "--log-level",
                "ERROR",
            ])
            .unwrap();
        let (_, coordinator) = args.subcommand().unwrap();
        let (_, nodes) = coordinator.subcommand().unwrap();
        assert_eq!(nodes.get_one::<String>("config").unwrap(), "zk.yaml");
        assert_eq!(
            nodes.get_one::<LogLevel>("log-level").copied(),
            Some(LogLevel::Error)
        );
    }

    #[test]
    fn step_down_requires_election() {
        let result = cli().try_get_matches_from(vec![
            "zkcoordctl",
            "coordinator",
            "step-down-election",
            "--I-take-responsibility-for-this-action",
        ]);
        assert!(result.is_err());
    }
}
