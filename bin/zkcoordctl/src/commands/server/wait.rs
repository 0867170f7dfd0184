use std::time::Duration;

use clap::value_parser;
use clap::Arg;
use clap::ArgMatches;
use clap::Command;
use failure::ResultExt;
use slog::info;

use zkcoord::probe;

pub const COMMAND: &str = "wait";

use crate::utils::servers;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Wait for zookeeper servers to accept requests")
        .arg(
            Arg::new("server")
                .long("server")
                .help("Server to wait for (defaults to all servers in the ensemble)")
                .value_name("HOST:PORT")
                .num_args(1),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Seconds to wait for each server")
                .value_name("SECONDS")
                .num_args(1)
                .default_value("30")
                .value_parser(value_parser!(u64)),
        )
}

pub fn run(command: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    let logger = interfaces.logger();
    let timeout = command
        .get_one::<u64>("timeout")
        .copied()
        .map(Duration::from_secs)
        .expect("clap to provide a default --timeout");
    for server in servers(interfaces.config(), command.get_one::<String>("server")) {
        info!(logger, "Waiting for server"; "server" => &server, "timeout" => ?timeout);
        let up = probe::wait_for_server(&server, timeout, POLL_INTERVAL)
            .with_context(|_| ErrorKind::ServerProbe(server.clone()))?;
        if !up {
            return Err(ErrorKind::ServerUnavailable(server).into());
        }
        println!("==> Server {} is up", server);
    }
    Ok(())
}
