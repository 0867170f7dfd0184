use clap::ArgMatches;
use clap::Command;

use crate::utils::unknown_subcommand;
use crate::Interfaces;
use crate::CLI_NAME;
use crate::Result;

mod next;

pub const COMMAND: &str = "sequence";

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Generate cluster-wide increasing IDs")
        .subcommand(next::command())
}

pub fn run(args: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    match args.subcommand() {
        Some((next::COMMAND, command)) => next::run(command, interfaces),
        _ => Err(unknown_subcommand(&format!("{} {}", CLI_NAME, COMMAND), args)),
    }
}
