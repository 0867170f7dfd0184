use clap::Command;

use super::print_listing;
use crate::utils::coordinator_admin;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub const COMMAND: &str = "nodes";

pub fn command() -> Command {
    Command::new(COMMAND).about("List processes registered with the coordinator")
}

pub fn run(interfaces: &Interfaces) -> Result<()> {
    let admin = coordinator_admin(interfaces.config(), interfaces.logger().clone())?;
    print_listing(
        "Registered nodes",
        admin.nodes(),
        || ErrorKind::CoordinatorNodeList,
        ToString::to_string,
    )
}
