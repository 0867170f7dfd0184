use clap::ArgMatches;
use clap::Command;
use failure::ResultExt;

use crate::utils::coordinator_admin;
use crate::utils::required_arg;
use crate::utils::required_value;
use crate::utils::responsibility_taken;
use crate::utils::take_responsibility_arg;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub const COMMAND: &str = "force-release-nonblocking-lock";

const WARNING: &str = "\
==> *** DANGER ***
==> The current holder only notices the lock is gone when its watch fires.
==> Use this for locks left behind by a killed process, after its session had time to expire.
==> *** DANGER ***";

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("*** DANGER *** Take a held lock away from its owner")
        .arg(required_arg("lock", "LOCK", "Lock to release"))
        .arg(take_responsibility_arg())
}

pub fn run(command: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    let name = required_value(command, "lock");
    println!("{}", WARNING);
    responsibility_taken(command)?;

    let admin = coordinator_admin(interfaces.config(), interfaces.logger().clone())?;
    let mut lock = admin
        .non_blocking_lock(name)
        .with_context(|_| ErrorKind::CoordinatorNBLockLookup(name.to_string()))?;
    lock.force_release()
        .with_context(|_| ErrorKind::CoordinatorNBLockRelease(name.to_string()))?;
    println!("==> Lock '{}' released", name);
    Ok(())
}
