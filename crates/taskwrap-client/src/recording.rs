//! In-memory client that records what it was asked to send.
//!
//! Useful for exercising a supervisor without an orchestrator: calls are
//! kept in order, and individual requests can be delayed or made to fail.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use taskwrap_core::ProcessId;

use crate::error::ClientError;
use crate::protocol::{OrchestratorClient, RequestKind};

/// A notification as observed by [`RecordingClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Start(ProcessId),
    Abort(String),
    Complete,
}

impl Notification {
    /// Returns true for abort and complete.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Start(_))
    }
}

/// Records every notification instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<Notification>>,
    delay: Duration,
    failing: HashSet<RequestKind>,
}

impl RecordingClient {
    /// Create a client that accepts everything immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every notification by `delay` after recording it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make requests of `kind` fail with [`ClientError::Rejected`].
    pub fn failing_on(mut self, kind: RequestKind) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Notifications received so far, in call order.
    pub fn calls(&self) -> Vec<Notification> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of abort and complete notifications received.
    pub fn terminal_count(&self) -> usize {
        self.calls().iter().filter(|n| n.is_terminal()).count()
    }

    async fn record(&self, kind: RequestKind, notification: Notification) -> Result<(), ClientError> {
        trace!(?notification, "Recording notification");
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.contains(&kind) {
            return Err(ClientError::Rejected {
                request: kind.name(),
                detail: "rejected by recording client".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl OrchestratorClient for RecordingClient {
    async fn notify_start(&self, rid: ProcessId) -> Result<(), ClientError> {
        self.record(RequestKind::Init, Notification::Start(rid)).await
    }

    async fn notify_abort(&self, reason: &str) -> Result<(), ClientError> {
        self.record(RequestKind::Abort, Notification::Abort(reason.to_string()))
            .await
    }

    async fn notify_complete(&self) -> Result<(), ClientError> {
        self.record(RequestKind::Complete, Notification::Complete).await
    }
}
