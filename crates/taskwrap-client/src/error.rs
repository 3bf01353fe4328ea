//! Error types for orchestrator clients.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while notifying the orchestrator.
///
/// None of them are retried: the supervisor treats every variant as fatal.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client program could not be started.
    #[error("failed to launch orchestrator client '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The orchestrator (or its client program) refused the request.
    #[error("orchestrator rejected {request}: {detail}")]
    Rejected {
        request: &'static str,
        detail: String,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No answer within the notification timeout.
    #[error("no answer from orchestrator within {0:?}")]
    Timeout(Duration),
}
