//! taskwrap Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network transports
//! - Process spawning
//! - Runtime specifics
//!
//! Everything here describes one supervised task: who it is
//! ([`TaskContext`]), where it is in its lifecycle ([`LifecycleState`]) and
//! the single-use guard deciding how it ends ([`TerminationLatch`]).

pub mod context;
pub mod error;
pub mod ids;
pub mod latch;
pub mod lifecycle;
pub mod status;

// Re-export commonly used types
pub use context::TaskContext;
pub use error::CoreError;
pub use ids::{ProcessId, TaskName};
pub use latch::TerminationLatch;
pub use lifecycle::Lifecycle;
pub use status::{AbortReason, LifecycleState, Termination};
