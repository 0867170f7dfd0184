use std::fs::File;
use std::io::Read;
use std::time::Duration;

use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use failure::ResultExt;
use slog::Logger;

use zkcoord::Admin;
use zkcoord::BackendConfig;
use zkcoord::Config;
use zkcoord::Coordinator;

use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// Initialise the coordinator admin interface.
pub fn coordinator_admin(config: &Config, logger: Logger) -> Result<Admin> {
    let admin = Admin::new(config.clone(), logger).with_context(|_| ErrorKind::AdminInit)?;
    Ok(admin)
}

/// Initialise the coordinator interface, registering this process as a node.
pub fn coordinator(config: &Config, logger: Logger) -> Result<Coordinator> {
    let coordinator =
        Coordinator::new(config.clone(), logger).with_context(|_| ErrorKind::CoordinatorInit)?;
    Ok(coordinator)
}

/// Load the configuration file, or use the defaults when no file is given.
pub fn load_config(file: Option<&str>) -> Result<Config> {
    let file = match file {
        None => return Ok(Config::default()),
        Some(file) => file,
    };
    let config = File::open(file).with_context(|_| ErrorKind::FsOpen(file.to_string()))?;
    parse_config(config, file)
}

/// Decode a YAML configuration from the given reader.
pub fn parse_config<R: Read>(reader: R, source: &str) -> Result<Config> {
    let config = serde_yaml::from_reader(reader)
        .with_context(|_| ErrorKind::ConfigLoad(source.to_string()))?;
    Ok(config)
}

/// Servers to probe: the one requested or all servers in the ensemble.
pub fn servers(config: &Config, server: Option<&String>) -> Vec<String> {
    if let Some(server) = server {
        return vec![server.clone()];
    }
    match &config.backend {
        BackendConfig::Zookeeper(zookeeper) => zookeeper.hosts(),
    }
}

/// Timeout for single server probes, taken from the session timeout.
pub fn probe_timeout(config: &Config) -> Duration {
    match &config.backend {
        BackendConfig::Zookeeper(zookeeper) => Duration::from_secs(zookeeper.timeout),
    }
}

/// Mandatory `--<id>` option with a single value.
pub fn required_arg(id: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .help(help)
        .value_name(value_name)
        .num_args(1)
        .required(true)
}

/// Value of an option declared with `required_arg`.
pub fn required_value<'a>(args: &'a ArgMatches, id: &str) -> &'a str {
    args.get_one::<String>(id)
        .map(String::as_str)
        .expect("clap to enforce required arguments")
}

/// Flag operators must pass to run disruptive commands.
pub fn take_responsibility_arg() -> Arg {
    Arg::new("take-responsibility")
        .long("I-take-responsibility-for-this-action")
        .action(ArgAction::SetTrue)
        .help("Acknowledges the desire to perform the operation")
}

/// Refuse to continue unless `take_responsibility_arg` was given.
pub fn responsibility_taken(args: &ArgMatches) -> Result<()> {
    if args.get_flag("take-responsibility") {
        return Ok(());
    }
    Err(ErrorKind::TakeResponsibility.into())
}

/// Error for a `path` command invoked without a known subcommand.
pub fn unknown_subcommand(path: &str, args: &ArgMatches) -> Error {
    match args.subcommand_name() {
        None => ErrorKind::NoCommand(path.to_string()).into(),
        Some(name) => ErrorKind::UnknownSubcommand(path.to_string(), name.to_string()).into(),
    }
}
