//! Identifiers exchanged with the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Path of the task in the orchestrator's suite tree, e.g.
/// `/suite/family/task`.
///
/// Sent verbatim with every notification and exported to the child as
/// `ECF_NAME`. The orchestrator resolves it, so no structure is enforced
/// here beyond what [`crate::TaskContext`] checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskName(String);

impl TaskName {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Last path segment, the task itself without its enclosing families.
    pub fn leaf(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskName {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl From<&str> for TaskName {
    fn from(path: &str) -> Self {
        Self(path.to_owned())
    }
}

/// Local process identifier of the supervisor.
///
/// The orchestrator uses it to tell apart two processes that claim the same
/// task identity and credential (zombie detection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Create a ProcessId from a raw pid.
    pub fn new(pid: u32) -> Self {
        Self(pid)
    }

    /// The identifier of the current process.
    pub fn current() -> Self {
        Self(std::process::id())
    }

    /// Get the raw pid.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        Self(pid)
    }
}
