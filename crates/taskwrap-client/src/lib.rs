//! Orchestrator clients for taskwrap
//!
//! The supervisor only sees the [`OrchestratorClient`] capability: three
//! one-shot notifications describing the task lifecycle. This crate ships
//! the transports behind it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use taskwrap_client::{CommandClient, OrchestratorClient};
//! use taskwrap_core::{ProcessId, TaskContext};
//!
//! async fn announce() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = TaskContext::new(
//!         "scheduler.local", 3141, "/suite/task", "s3cret", 1, ProcessId::current(),
//!     )?;
//!
//!     let client = CommandClient::new("ecflow_client", context.clone())
//!         .with_timeout(Duration::from_secs(30));
//!
//!     client.notify_start(context.rid()).await?;
//!     client.notify_complete().await?;
//!     Ok(())
//! }
//! ```

mod command;
mod error;
mod http;
mod protocol;
mod recording;

// Re-export main types
pub use command::CommandClient;
pub use error::ClientError;
pub use http::HttpClient;
pub use protocol::{OrchestratorClient, Request, RequestKind};
pub use recording::{Notification, RecordingClient};
