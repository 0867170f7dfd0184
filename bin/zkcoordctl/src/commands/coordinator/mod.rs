use clap::ArgMatches;
use clap::Command;
use failure::ResultExt;

use crate::utils::unknown_subcommand;
use crate::ErrorKind;
use crate::Interfaces;
use crate::CLI_NAME;
use crate::Result;

mod election_info;
mod election_list;
mod force_release_nonblocking_lock;
mod nodes;
mod nonblocking_lock_info;
mod nonblocking_lock_list;
mod step_down_election;
mod version;

pub const COMMAND: &str = "coordinator";

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Inspect and manage the coordination service")
        .subcommand(election_info::command())
        .subcommand(election_list::command())
        .subcommand(force_release_nonblocking_lock::command())
        .subcommand(nodes::command())
        .subcommand(nonblocking_lock_info::command())
        .subcommand(nonblocking_lock_list::command())
        .subcommand(step_down_election::command())
        .subcommand(version::command())
}

pub fn run(args: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    match args.subcommand() {
        Some((election_info::COMMAND, command)) => election_info::run(command, interfaces),
        Some((election_list::COMMAND, _)) => election_list::run(interfaces),
        Some((force_release_nonblocking_lock::COMMAND, command)) => {
            force_release_nonblocking_lock::run(command, interfaces)
        }
        Some((nodes::COMMAND, _)) => nodes::run(interfaces),
        Some((nonblocking_lock_info::COMMAND, command)) => {
            nonblocking_lock_info::run(command, interfaces)
        }
        Some((nonblocking_lock_list::COMMAND, _)) => nonblocking_lock_list::run(interfaces),
        Some((step_down_election::COMMAND, command)) => {
            step_down_election::run(command, interfaces)
        }
        Some((version::COMMAND, _)) => version::run(interfaces),
        _ => Err(unknown_subcommand(&format!("{} {}", CLI_NAME, COMMAND), args)),
    }
}

/// Print `heading` then one line per listed item, stopping at the first failed lookup.
fn print_listing<T, I, L>(heading: &str, items: I, failed: fn() -> ErrorKind, label: L) -> Result<()>
where
    I: Iterator<Item = zkcoord::Result<T>>,
    L: Fn(&T) -> String,
{
    println!("==> {}:", heading);
    for item in items {
        let item = item.with_context(|_| failed())?;
        println!("====> {}", label(&item));
    }
    Ok(())
}
