use clap::ArgMatches;
use clap::Command;
use failure::ResultExt;

use crate::utils::coordinator_admin;
use crate::utils::required_arg;
use crate::utils::required_value;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub const COMMAND: &str = "nonblocking-lock-info";

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Show which node holds a non-blocking lock")
        .arg(required_arg("lock", "LOCK", "Lock to describe"))
}

pub fn run(command: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    let name = required_value(command, "lock");
    let admin = coordinator_admin(interfaces.config(), interfaces.logger().clone())?;
    let lock = admin
        .non_blocking_lock(name)
        .with_context(|_| ErrorKind::CoordinatorNBLockLookup(name.to_string()))?;
    let owner = lock
        .owner()
        .with_context(|_| ErrorKind::CoordinatorNBLockOwnerLookup(name.to_string()))?;
    println!("==> Lock name: {}", lock.name());
    println!("==> Lock owner: {}", owner);
    owner
        .attributes()
        .iter()
        .for_each(|(key, value)| println!("====> {}: {}", key, value));
    Ok(())
}
