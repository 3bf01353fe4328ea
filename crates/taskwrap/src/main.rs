//! taskwrap - task lifecycle supervisor
//!
//! Wraps one job, tells the orchestrator it started, and guarantees exactly
//! one terminal notification (complete or abort) however the job ends.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod child;
mod config;
mod signals;
mod supervisor;

use config::{Cli, Config, EXIT_CONFIG_ERROR};
use supervisor::{TaskSupervisor, EXIT_NOTIFY_FAILURE};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Stdout belongs to the child; logs go to stderr.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration; orchestrator not contacted");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    info!(
        task = %config.context.task(),
        host = %config.context.host(),
        port = config.context.port(),
        try_no = config.context.try_no(),
        rid = %config.context.rid(),
        transport = ?config.transport.kind,
        command = %config.command,
        "Starting task supervisor"
    );

    let client = match config.transport.connect(&config.context) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create orchestrator client");
            return ExitCode::from(EXIT_NOTIFY_FAILURE);
        }
    };

    let abort_exit_code = config.supervisor.abort_exit_code;
    let supervisor = TaskSupervisor::new(config.context, client, config.supervisor);

    match supervisor.run(config.command).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code(abort_exit_code)),
        Err(e) => {
            error!(error = %e, "Supervisor failed");
            ExitCode::from(EXIT_NOTIFY_FAILURE)
        }
    }
}
