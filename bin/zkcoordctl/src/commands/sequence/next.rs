use clap::value_parser;
use clap::Arg;
use clap::ArgMatches;
use clap::Command;
use failure::ResultExt;

pub const COMMAND: &str = "next";

use crate::utils::coordinator;
use crate::utils::required_arg;
use crate::utils::required_value;
use crate::ErrorKind;
use crate::Interfaces;
use crate::Result;

pub fn command() -> Command {
    Command::new(COMMAND)
        .about("Generate the next IDs from a sequence")
        .arg(required_arg("name", "NAME", "Name of the sequence"))
        .arg(
            Arg::new("count")
                .long("count")
                .help("Number of IDs to generate")
                .value_name("N")
                .num_args(1)
                .default_value("1")
                .value_parser(value_parser!(u32).range(1..)),
        )
}

pub fn run(command: &ArgMatches, interfaces: &Interfaces) -> Result<()> {
    let name = required_value(command, "name");
    let count = command
        .get_one::<u32>("count")
        .copied()
        .expect("clap to provide a default --count");

    let logger = interfaces.logger();
    let coordinator = coordinator(interfaces.config(), logger.clone())?;
    let sequence = coordinator.sequence(name);
    for _ in 0..count {
        let id = sequence
            .generate()
            .with_context(|_| ErrorKind::SequenceGenerate(name.to_string()))?;
        println!("{}", id);
    }
    Ok(())
}
