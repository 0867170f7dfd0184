use clap::ArgMatches;
use clap::Command;
use failure::ResultExt;

use crate::utils::coordinator_admin;
use crate::utils::required_arg;
use crate::utils::required_value;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub const COMMAND: &str = "election-info";

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Show the primary and candidates of an election")
        .arg(required_arg("election", "ELECTION", "Election to describe"))
}

pub fn run(command: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    let name = required_value(command, "election");
    let admin = coordinator_admin(interfaces.config(), interfaces.logger().clone())?;
    let election = admin
        .election(name)
        .with_context(|_| ErrorKind::CoordinatorElectionLookup(name.to_string()))?;
    let primary = election
        .primary()
        .with_context(|_| ErrorKind::CoordinatorElectionPrimaryLookup(name.to_string()))?;
    let secondaries = election
        .secondaries_count()
        .with_context(|_| ErrorKind::CoordinatorElectionSecondaryCount(name.to_string()))?;

    println!("==> Election name: {}", election.name());
    match primary {
        Some(node_id) => println!("==> Election primary: {}", node_id),
        None => println!("==> Election primary: NONE ELECTED"),
    };
    println!("==> Election secondaries count: {}", secondaries);
    Ok(())
}
