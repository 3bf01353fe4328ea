//! Supervisor configuration.
//!
//! Every task context value can be given as a flag or through the
//! environment variable the orchestrator exports for its jobs. Values are
//! validated before any orchestrator contact is attempted.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use taskwrap_client::{ClientError, CommandClient, HttpClient, OrchestratorClient};
use taskwrap_core::{CoreError, ProcessId, TaskContext};

use crate::child::ChildCommand;
use crate::signals::TrapSignal;
use crate::supervisor::SupervisorSettings;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// taskwrap - run a job and report its lifecycle to the orchestrator
#[derive(Debug, Parser)]
#[command(name = "taskwrap", version)]
#[command(about = "Run a job and report its outcome to the orchestrator exactly once", long_about = None)]
pub struct Cli {
    /// Orchestrator host
    #[arg(long, env = "ECF_HOST")]
    pub host: Option<String>,

    /// Orchestrator port
    #[arg(long, env = "ECF_PORT")]
    pub port: Option<String>,

    /// Task identity known to the orchestrator
    #[arg(long, env = "ECF_NAME")]
    pub task: Option<String>,

    /// Credential token for this run
    #[arg(long, env = "ECF_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Current try number
    #[arg(long, env = "ECF_TRYNO")]
    pub try_no: Option<String>,

    /// How notifications reach the orchestrator
    #[arg(long, value_enum, default_value_t = Transport::Command)]
    pub transport: Transport,

    /// Orchestrator client program used by the command transport
    #[arg(long, env = "TASKWRAP_CLIENT", default_value = "ecflow_client")]
    pub client_bin: String,

    /// Timeout for each notification (seconds)
    #[arg(long, default_value = "30")]
    pub notify_timeout_secs: u64,

    /// Time the child gets to exit after a trapped signal (seconds)
    #[arg(long, default_value = "10")]
    pub grace_period_secs: u64,

    /// Exit code once an abort has been delivered (0 leaves failure
    /// reporting entirely to the orchestrator)
    #[arg(long, default_value = "1")]
    pub abort_exit_code: u8,

    /// Signals to trap
    #[arg(long = "trap", value_enum, value_delimiter = ',', default_values_t = TrapSignal::ALL.to_vec())]
    pub traps: Vec<TrapSignal>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Command to supervise, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Notification transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Run an orchestrator client program per notification
    Command,
    /// POST JSON to the orchestrator
    Http,
}

/// Configuration errors. Always reported before contacting the orchestrator.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required values absent or empty.
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    /// A value that does not parse.
    #[error("invalid {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Nothing to run.
    #[error("no command to supervise")]
    NoCommand,

    #[error(transparent)]
    Context(#[from] CoreError),
}

/// How to reach the orchestrator.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub kind: Transport,
    pub client_bin: String,
    pub timeout: Duration,
}

impl TransportSettings {
    /// Build the client for `context`.
    pub fn connect(
        &self,
        context: &TaskContext,
    ) -> Result<Arc<dyn OrchestratorClient>, ClientError> {
        match self.kind {
            Transport::Command => Ok(Arc::new(
                CommandClient::new(self.client_bin.clone(), context.clone())
                    .with_timeout(self.timeout),
            )),
            Transport::Http => Ok(Arc::new(HttpClient::new(context.clone(), self.timeout)?)),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub context: TaskContext,
    pub transport: TransportSettings,
    pub supervisor: SupervisorSettings,
    pub command: ChildCommand,
}

impl Config {
    /// Validate parsed arguments. The process id is taken from this process.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        Self::from_cli_with_rid(cli, ProcessId::current())
    }

    fn from_cli_with_rid(cli: Cli, rid: ProcessId) -> Result<Self, ConfigError> {
        let host = present(cli.host);
        let port = present(cli.port);
        let task = present(cli.task);
        let password = present(cli.password);
        let try_no = present(cli.try_no);

        let missing: Vec<&'static str> = [
            ("ECF_HOST", host.is_none()),
            ("ECF_PORT", port.is_none()),
            ("ECF_NAME", task.is_none()),
            ("ECF_PASS", password.is_none()),
            ("ECF_TRYNO", try_no.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(host), Some(port), Some(task), Some(password), Some(try_no)) =
            (host, port, task, password, try_no)
        else {
            return Err(ConfigError::Missing(missing));
        };

        let port: u16 = port.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                name: "ECF_PORT",
                value: port.clone(),
                reason: e.to_string(),
            }
        })?;
        let try_no: u32 = try_no.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                name: "ECF_TRYNO",
                value: try_no.clone(),
                reason: e.to_string(),
            }
        })?;

        let context = TaskContext::new(host, port, task, password, try_no, rid)?;
        let command = ChildCommand::from_argv(cli.command).ok_or(ConfigError::NoCommand)?;

        Ok(Self {
            context,
            transport: TransportSettings {
                kind: cli.transport,
                client_bin: cli.client_bin,
                timeout: Duration::from_secs(cli.notify_timeout_secs),
            },
            supervisor: SupervisorSettings {
                grace_period: Duration::from_secs(cli.grace_period_secs),
                abort_exit_code: cli.abort_exit_code,
                signals: cli.traps,
            },
            command,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
