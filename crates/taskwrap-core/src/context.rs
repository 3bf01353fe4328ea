//! Immutable description of the supervised task.

use std::fmt;

use crate::error::CoreError;
use crate::ids::{ProcessId, TaskName};

/// Everything the orchestrator needs to recognise this run of the task.
///
/// Built once at startup and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct TaskContext {
    host: String,
    port: u16,
    task: TaskName,
    password: String,
    try_no: u32,
    rid: ProcessId,
}

impl TaskContext {
    /// Create a validated context.
    ///
    /// String values must be non-empty after trimming and the port must be
    /// non-zero.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        task: impl Into<TaskName>,
        password: impl Into<String>,
        try_no: u32,
        rid: ProcessId,
    ) -> Result<Self, CoreError> {
        let host = non_empty("host", host.into())?;
        let task = TaskName::new(non_empty("task", task.into().into_inner())?);
        let password = non_empty("password", password.into())?;

        if port == 0 {
            return Err(CoreError::InvalidValue {
                field: "port",
                value: port.to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }

        Ok(Self {
            host,
            port,
            task,
            password,
            try_no,
            rid,
        })
    }

    /// Orchestrator host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Orchestrator port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Task identity.
    pub fn task(&self) -> &TaskName {
        &self.task
    }

    /// Credential token for this run.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Current try number.
    pub fn try_no(&self) -> u32 {
        self.try_no
    }

    /// Process identifier reported to the orchestrator.
    pub fn rid(&self) -> ProcessId {
        self.rid
    }

    /// Environment variables describing this context, as exported to the
    /// child task and to the orchestrator client program.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ECF_HOST", self.host.clone()),
            ("ECF_PORT", self.port.to_string()),
            ("ECF_NAME", self.task.as_str().to_string()),
            ("ECF_PASS", self.password.clone()),
            ("ECF_TRYNO", self.try_no.to_string()),
            ("ECF_RID", self.rid.to_string()),
        ]
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("task", &self.task)
            .field("password", &"<redacted>")
            .field("try_no", &self.try_no)
            .field("rid", &self.rid)
            .finish()
    }
}

fn non_empty(field: &'static str, value: String) -> Result<String, CoreError> {
    if value.trim().is_empty() {
        Err(CoreError::MissingValue(field))
    } else {
        Ok(value)
    }
}
