use clap::Command;
use failure::ResultExt;

use crate::utils::coordinator_admin;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub const COMMAND: &str = "version";

pub fn command() -> Command {
    Command::new(COMMAND).about("Report the version of the coordination service")
}

pub fn run(interfaces: &Interfaces) -> Result<()> {
    let admin = coordinator_admin(interfaces.config(), interfaces.logger().clone())?;
    let version = admin.version().context(ErrorKind::CoordinatorVersion)?;
    println!("==> Coordinator: {}", version);
    println!("==> {}: {}", crate::CLI_NAME, env!("CARGO_PKG_VERSION"));
    Ok(())
}
