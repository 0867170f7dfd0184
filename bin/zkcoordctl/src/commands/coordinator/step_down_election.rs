use clap::ArgMatches;
use clap::Command;
use failure::ResultExt;
use slog::info;

use crate::utils::coordinator_admin;
use crate::utils::required_arg;
use crate::utils::required_value;
use crate::utils::responsibility_taken;
use crate::utils::take_responsibility_arg;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub const COMMAND: &str = "step-down-election";

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("*** DANGER *** Depose the primary of an election")
        .arg(required_arg("election", "ELECTION", "Election whose primary steps down"))
        .arg(take_responsibility_arg())
}

pub fn run(command: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    let name = required_value(command, "election");
    responsibility_taken(command)?;

    let logger = interfaces.logger();
    let admin = coordinator_admin(interfaces.config(), logger.clone())?;
    let deposed = admin
        .election(name)
        .with_context(|_| ErrorKind::CoordinatorElectionLookup(name.to_string()))?
        .step_down()
        .with_context(|_| ErrorKind::CoordinatorElectionStepDown(name.to_string()))?;
    info!(logger, "Election step-down requested"; "election" => name, "deposed" => deposed);
    Ok(())
}
