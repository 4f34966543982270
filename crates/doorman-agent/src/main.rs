//! # Doorman
//!
//! Bridges a Homebridge MQTT lock accessory to a SESAME smart lock.
//!
//! ## Architecture
//!
//! The bridge runs two loops:
//! 1. **Commands**: Receives set-target-state messages from the broker and
//!    drives the lock, one message at a time
//! 2. **Status**: Polls the lock and announces every settled state change
//!    back to Homebridge
//!
//! Both loops publish through the same reconciler, so a target/current pair
//! is never split by a concurrent announcement.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod bus;
mod config;
mod runtime;
mod schema;

use config::Config;
use runtime::Bridge;

/// Homebridge MQTT to SESAME smart lock bridge.
#[derive(Debug, Parser)]
#[command(name = "doorman", version, about)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = "./config.yaml")]
    config_file: PathBuf,

    /// Schema the configuration file is validated against
    #[arg(short = 's', long, default_value = "./schema.yaml")]
    schema_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting doorman");

    let config = match Config::load(&args.config_file, &args.schema_file) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(
                error = %err,
                config_file = %args.config_file.display(),
                "Configuration error"
            );
            std::process::exit(1);
        }
    };

    tracing::info!(
        broker = %config.mqtt.broker,
        port = config.mqtt.port,
        "Configuration loaded"
    );

    Bridge::new(config).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn default_paths() {
        let args = Args::try_parse_from(["doorman"]).unwrap();

        assert_eq!(args.config_file, PathBuf::from("./config.yaml"));
        assert_eq!(args.schema_file, PathBuf::from("./schema.yaml"));
    }

    #[test]
    fn short_flags() {
        let args =
            Args::try_parse_from(["doorman", "-c", "/etc/doorman.yaml", "-s", "/etc/schema.yaml"])
                .unwrap();

        assert_eq!(args.config_file, PathBuf::from("/etc/doorman.yaml"));
        assert_eq!(args.schema_file, PathBuf::from("/etc/schema.yaml"));
    }
}
