use std::thread;
use std::time::Duration;

use clap::value_parser;
use clap::Arg;
use clap::ArgMatches;
use clap::Command;
use failure::ResultExt;
use slog::info;

use zkcoord::LeaderElectionOpts;
use zkcoord::LeadershipListener;

pub const COMMAND: &str = "elect";

use crate::utils::coordinator;
use crate::utils::required_arg;
use crate::utils::required_value;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Take part in a leader election and report leadership changes")
        .arg(required_arg("election", "ELECTION", "Name of the election to join"))
        .arg(
            Arg::new("duration")
                .long("duration")
                .help("Seconds to stay in the election before leaving")
                .value_name("SECONDS")
                .num_args(1)
                .default_value("60")
                .value_parser(value_parser!(u64)),
        )
}

/// Print leadership changes to stdout.
struct PrintListener {
    election: String,
}

impl LeadershipListener for PrintListener {
    fn is_leader(&self) {
        println!("==> Elected leader of '{}'", self.election);
    }

    fn not_leader(&self) {
        println!("==> No longer leader of '{}'", self.election);
    }
}

pub fn run(command: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    let name = required_value(command, "election");
    let duration = command
        .get_one::<u64>("duration")
        .copied()
        .map(Duration::from_secs)
        .expect("clap to provide a default --duration");

    let logger = interfaces.logger();
    let coordinator = coordinator(interfaces.config(), logger.clone())?;
    println!("==> Joining election '{}' as {}", name, coordinator.node_id());
    let listener = PrintListener {
        election: name.to_string(),
    };
    let mut service = coordinator
        .leader_service(
            name,
            listener,
            LeaderElectionOpts::default(),
            logger.clone(),
        )
        .with_context(|_| ErrorKind::LeaderService(name.to_string()))?;
    thread::sleep(duration);
    info!(logger, "Leaving election"; "election" => name, "leader" => service.is_leader());
    service.close();
    Ok(())
}
