//! Notifications delivered over HTTP/JSON.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use taskwrap_core::{ProcessId, TaskContext};

use crate::error::ClientError;
use crate::protocol::{OrchestratorClient, Request};

/// JSON body posted for every lifecycle request.
#[derive(Debug, Serialize)]
struct NotificationBody<'a> {
    task: &'a str,
    try_no: u32,
    rid: u32,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    timestamp_ms: i64,
}

/// HTTP client posting lifecycle requests to `/v1/lifecycle/{init,abort,complete}`.
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: String,
    context: TaskContext,
}

impl HttpClient {
    /// Create a client targeting `http://<host>:<port>` from the context.
    pub fn new(context: TaskContext, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = format!("http://{}:{}", context.host(), context.port());
        Self::with_base_url(&base_url, context, timeout)
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(
        base_url: &str,
        context: TaskContext,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
            context,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn body<'a>(&'a self, request: &'a Request) -> NotificationBody<'a> {
        NotificationBody {
            task: self.context.task().as_str(),
            try_no: self.context.try_no(),
            rid: match request {
                Request::Init(rid) => rid.as_u32(),
                _ => self.context.rid().as_u32(),
            },
            password: self.context.password(),
            reason: match request {
                Request::Abort(reason) => Some(reason.as_str()),
                _ => None,
            },
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    async fn send(&self, request: Request) -> Result<(), ClientError> {
        let kind = request.kind().name();
        let url = format!("{}/v1/lifecycle/{}", self.base_url, kind);
        info!(url = %url, task = %self.context.task(), "Notifying orchestrator");

        let response = self.inner.post(&url).json(&self.body(&request)).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                request: kind,
                detail: format!("HTTP {}: {}", status, text.trim()),
            });
        }

        debug!(request = kind, status = %status, "Orchestrator acknowledged");
        Ok(())
    }
}

#[async_trait]
impl OrchestratorClient for HttpClient {
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
