use clap::ArgMatches;
use clap::Command;

use crate::utils::unknown_subcommand;
use crate::Interfaces;
use crate::CLI_NAME;
use crate::Result;

mod stat;
mod wait;

pub const COMMAND: &str = "server";

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Probe zookeeper servers directly, without a session")
        .subcommand(stat::command())
        .subcommand(wait::command())
}

pub fn run(args: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    match args.subcommand() {
        Some((stat::COMMAND, command)) => stat::run(command, interfaces),
        Some((wait::COMMAND, command)) => wait::run(command, interfaces),
        _ => Err(unknown_subcommand(&format!("{} {}", CLI_NAME, COMMAND), args)),
    }
}
