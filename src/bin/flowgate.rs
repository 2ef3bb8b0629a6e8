//! Demo driver for the flowgate pipeline
//!
//! Loads configuration, starts the pipeline and observer, burst-drives the
//! admission boundary with simulated traffic, then drains and prints the
//! final status and traffic report as JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowgate::cli::{Cli, Command};
use flowgate::config::{ConfigError, FlowgateConfig};
use flowgate::observer::Observer;
use flowgate::pipeline::FlowPipeline;
use flowgate::workload;

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            duration_secs,
            burst_size,
            burst_interval_ms,
        } => {
            if let Err(error) = run(config, duration_secs, burst_size, burst_interval_ms).await {
                report_error(&error);
                std::process::exit(1);
            }
        }
        Command::CheckConfig { config } => match FlowgateConfig::load(&config) {
            Ok(_) => println!("Configuration OK: {}", config.display()),
            Err(error) => {
                report_error(&error);
                std::process::exit(1);
            }
        },
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn report_error(error: &ConfigError) {
    eprintln!("Error: {}", error);
    if let ConfigError::Invalid(errors) = error {
        for error in errors {
            eprintln!("  - {}", error);
        }
    }
}

async fn run(
    config_path: PathBuf,
    duration_secs: u64,
    burst_size: u32,
    burst_interval_ms: u64,
) -> Result<(), ConfigError> {
    let config = FlowgateConfig::load_or_default(&config_path)?;

    let pipeline = Arc::new(FlowPipeline::new(&config));
    pipeline.start();

    let observer = Observer::new(
        Arc::clone(&pipeline),
        Duration::from_millis(config.observer_interval_ms),
    );
    let observer_handle = observer.spawn();

    let report = workload::drive(
        &pipeline,
        &config.workload,
        burst_size,
        Duration::from_millis(burst_interval_ms),
        Duration::from_secs(duration_secs),
    )
    .await;

    pipeline.drain().await;
    pipeline.shutdown().await;
    observer.stop();
    let _ = observer_handle.await;

    let status = pipeline.status();
    match serde_json::to_string_pretty(&status) {
        Ok(json) => println!("{}", json),
        Err(error) => eprintln!("Failed to serialize status: {}", error),
    }
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(error) => eprintln!("Failed to serialize traffic report: {}", error),
    }

    Ok(())
}
