use clap::Command;

use super::print_listing;
use crate::utils::coordinator_admin;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub const COMMAND: &str = "election-list";

pub fn command() -> Command {
    Command::new(COMMAND).about("List all running elections")
}

pub fn run(interfaces: &Interfaces) -> Result<()> {
    let admin = coordinator_admin(interfaces.config(), interfaces.logger().clone())?;
    print_listing(
        "Available elections",
        admin.elections(),
        || ErrorKind::CoordinatorElectionList,
        |election| election.name().to_string(),
    )
}
