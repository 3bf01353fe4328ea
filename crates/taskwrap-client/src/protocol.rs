//! The notification protocol spoken to the orchestrator.

use async_trait::async_trait;

use taskwrap_core::ProcessId;

use crate::error::ClientError;

/// Capability interface to the remote orchestrator.
///
/// The supervisor calls each method at most once per process and never
/// retries; implementations should not retry either.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Tell the orchestrator the task is alive under `rid`.
    async fn notify_start(&self, rid: ProcessId) -> Result<(), ClientError>;

    /// Tell the orchestrator the task failed.
    async fn notify_abort(&self, reason: &str) -> Result<(), ClientError>;

    /// Tell the orchestrator the task finished successfully.
    async fn notify_complete(&self) -> Result<(), ClientError>;
}

/// Kind of a lifecycle request, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Init,
    Abort,
    Complete,
}

impl RequestKind {
    /// Wire name of the request.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Abort => "abort",
            Self::Complete => "complete",
        }
    }
}

/// A lifecycle request with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Init(ProcessId),
    Abort(String),
    Complete,
}

impl Request {
    /// The request kind.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Init(_) => RequestKind::Init,
            Self::Abort(_) => RequestKind::Abort,
            Self::Complete => RequestKind::Complete,
        }
    }

    /// Command-line form understood by orchestrator client programs.
    pub fn cli_arg(&self) -> String {
        match self {
            Self::Init(rid) => format!("--init={}", rid),
            Self::Abort(reason) => format!("--abort={}", reason),
            Self::Complete => "--complete".to_string(),
        }
    }
}
