use clap::Command;

use super::print_listing;
use crate::utils::coordinator_admin;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub const COMMAND: &str = "nonblocking-lock-list";

pub fn command() -> Command {
    Command::new(COMMAND).about("List currently held non-blocking locks")
}

pub fn run(interfaces: &Interfaces) -> Result<()> {
    let admin = coordinator_admin(interfaces.config(), interfaces.logger().clone())?;
    print_listing(
        "Currently held locks",
        admin.non_blocking_locks(),
        || ErrorKind::CoordinatorNBLockList,
        |lock| lock.name().to_string(),
    )
}
