//! CLI argument definitions using clap
//!
//! Commands:
//! - flowgate run --config <path>
//! - flowgate check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// flowgate - an admission-controlled task pipeline
#[derive(Parser, Debug)]
#[command(name = "flowgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the pipeline against simulated bursty traffic
    Run {
        /// Path to configuration file (defaults are used when absent)
        #[arg(long, default_value = "./flowgate.toml")]
        config: PathBuf,

        /// How long to generate traffic, in seconds
        #[arg(long, default_value = "10")]
        duration_secs: u64,

        /// Requests submitted per burst
        #[arg(long, default_value = "8")]
        burst_size: u32,

        /// Milliseconds between bursts
        #[arg(long, default_value = "100")]
        burst_interval_ms: u64,
    },

    /// Validate a configuration file and exit
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./flowgate.toml")]
        config: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["flowgate", "run"]).unwrap();
        match cli.command {
            Command::Run {
                config,
                duration_secs,
                burst_size,
                burst_interval_ms,
            } => {
                assert_eq!(config, PathBuf::from("./flowgate.toml"));
                assert_eq!(duration_secs, 10);
                assert_eq!(burst_size, 8);
                assert_eq!(burst_interval_ms, 100);
            }
            other => panic!("expected Run, got {:?}", other),
        }
    }

    #[test]
    fn test_check_config_takes_path() {
        let cli =
            Cli::try_parse_from(["flowgate", "check-config", "--config", "/tmp/x.toml"]).unwrap();
        match cli.command {
            Command::CheckConfig { config } => assert_eq!(config, PathBuf::from("/tmp/x.toml")),
            other => panic!("expected CheckConfig, got {:?}", other),
        }
    }
}
