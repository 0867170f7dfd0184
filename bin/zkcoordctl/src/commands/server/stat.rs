use clap::Arg;
use clap::ArgMatches;
use clap::Command;
use slog::warn;

use zkcoord::probe;
use zkcoord_util_failure::failure_info;

pub const COMMAND: &str = "stat";

use crate::utils::probe_timeout;
use crate::utils::servers;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Show the stat output of zookeeper servers")
        .arg(
            Arg::new("server")
                .long("server")
                .help("Server to probe (defaults to all servers in the ensemble)")
                .value_name("HOST:PORT")
                .num_args(1),
        )
}

pub fn run(command: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    let logger = interfaces.logger();
    let timeout = probe_timeout(interfaces.config());
    let mut failed = None;
    for server in servers(interfaces.config(), command.get_one::<String>("server")) {
        println!("==> Server: {}", server);
        let stats = match probe::stat(&server, timeout) {
            Ok(stats) => stats,
            Err(error) => {
                warn!(logger, "Unable to probe server"; "server" => &server, failure_info(&error));
                println!("====> Unavailable: {}", error);
                failed = Some(server);
                continue;
            }
        };
        println!("====> Version: {}", stats.version);
        if let Some(mode) = stats.mode {
            println!("====> Mode: {}", mode);
        }
        if let Some(zxid) = stats.zxid {
            println!("====> Zxid: {}", zxid);
        }
        if let Some(connections) = stats.connections {
            println!("====> Connections: {}", connections);
        }
        if let Some(outstanding) = stats.outstanding {
            println!("====> Outstanding requests: {}", outstanding);
        }
        if let Some(node_count) = stats.node_count {
            println!("====> Node count: {}", node_count);
        }
        if let (Some(min), Some(avg), Some(max)) =
            (stats.latency_min, stats.latency_avg, stats.latency_max)
        {
            println!("====> Latency min/avg/max: {}/{}/{}", min, avg, max);
        }
    }

    // Fail if any server could not be probed.
    match failed {
        None => Ok(()),
        Some(server) => Err(ErrorKind::ServerProbe(server).into()),
    }
}
