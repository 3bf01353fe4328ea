//! Notifications delivered through an external client program.
//!
//! Schedulers commonly ship a small CLI (`ecflow_client` and friends) that
//! reads the task identity from the environment and takes the request as a
//! single flag. `CommandClient` drives such a program once per request.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use taskwrap_core::{ProcessId, TaskContext};

use crate::error::ClientError;
use crate::protocol::{OrchestratorClient, Request};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client that shells out to an orchestrator client program.
#[derive(Debug, Clone)]
pub struct CommandClient {
    /// Program name or path; PATH lookup applies.
    program: String,

    /// Context exported to the program's environment.
    context: TaskContext,

    /// Upper bound for one invocation.
    timeout: Duration,
}

impl CommandClient {
    /// Create a client for the given program.
    pub fn new(program: impl Into<String>, context: TaskContext) -> Self {
        Self {
            program: program.into(),
            context,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program this client invokes.
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn send(&self, request: Request) -> Result<(), ClientError> {
        let arg = request.cli_arg();
        let kind = request.kind().name();
        info!(program = %self.program, request = %arg, task = %self.context.task(), "Notifying orchestrator");

        let mut cmd = Command::new(&self.program);
        cmd.arg(&arg)
            .envs(self.context.env_vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
            .map_err(|source| ClientError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(request = kind, output = %stdout.trim(), "Client program output");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(request = kind, status = %output.status, "Client program failed");
            return Err(ClientError::Rejected {
                request: kind,
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl OrchestratorClient for CommandClient {
    async fn notify_start(&self, rid: ProcessId) -> Result<(), ClientError> {
        self.send(Request::Init(rid)).await
    }

    async fn notify_abort(&self, reason: &str) -> Result<(), ClientError> {
        self.send(Request::Abort(reason.to_string())).await
    }

    async fn notify_complete(&self) -> Result<(), ClientError> {
        self.send(Request::Complete).await
    }
}
