use clap::ArgMatches;
use slog::debug;
use slog::Logger;

use zkcoord::Config;

use super::utils::load_config;
use super::Result;

/// A container structure to inject dependencies.
pub struct Interfaces {
    config: Config,
    logger: Logger,
}

impl Interfaces {
    /// Create a new `Interfaces` container, loading the configuration file if one is given.
    pub fn new(args: &ArgMatches, logger: Logger) -> Result<Interfaces> {
        let file = args.get_one::<String>("config").map(String::as_str);
        let config = load_config(file)?;
        debug!(logger, "Configuration loaded"; "file" => file.unwrap_or("<defaults>"));
        Ok(Interfaces { config, logger })
    }

    /// Access the coordinator configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Access the logger instance.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}
