//! Execution layer: runs a capability's instructions against a task through
//! a pluggable backend and collapses the event stream into one result string.
//!
//! This layer never surfaces an error. Timeouts, unreachable backends, and
//! empty streams all degrade to a deterministic fallback string so the
//! request still reports `completed`.

mod http;

pub use http::HttpAgentBackend;

use crate::credentials::{ProviderCredential, provider_runtime_auth_instructions};
use crate::util::preview;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// One event emitted by an execution backend, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Incremental output text.
    Text(String),
    /// The backend invoked a tool; informational only.
    ToolCall { name: String },
    /// A declared final result. The last non-empty one wins.
    Result(String),
}

pub type EventStream = Pin<Box<dyn Stream<Item = anyhow::Result<AgentEvent>> + Send>>;

/// Contract for anything that can execute capability instructions.
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &str;

    fn run<'a>(
        &'a self,
        instructions: &'a str,
        task_description: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<EventStream>> + Send + 'a>>;
}

/// Runtime execution settings, configurable per deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Wall-clock bound on one execution attempt.
    pub timeout_secs: u64,
    /// Log every backend event (at debug level) as it arrives.
    pub log_events: bool,
    /// Truncation length for previewed event text in logs.
    pub preview_len: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            log_events: default_log_events(),
            preview_len: default_preview_len(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_log_events() -> bool {
    true
}

fn default_preview_len() -> usize {
    260
}

impl ExecutionSettings {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.timeout_secs = self.timeout_secs.clamp(5, 3600);
        self.preview_len = self.preview_len.clamp(40, 4000);
        self
    }
}

pub struct Executor {
    backend: Arc<dyn ExecutionBackend>,
    settings: ExecutionSettings,
}

impl Executor {
    pub fn new(backend: Arc<dyn ExecutionBackend>, settings: ExecutionSettings) -> Self {
        Self {
            backend,
            settings: settings.clamped(),
        }
    }

    /// Execute one attempt. Infallible by design of the reporting contract:
    /// every failure mode returns a fallback result string instead.
    ///
    /// The credential, when present, exists only inside the composed
    /// instruction text for this single attempt. It is never logged here.
    pub async fn execute(
        &self,
        capability_name: &str,
        instructions: &str,
        task_description: &str,
        credential: Option<&ProviderCredential>,
    ) -> String {
        let composed = compose_instructions(instructions, credential);
        let timeout = Duration::from_secs(self.settings.timeout_secs);

        let outcome = tokio::time::timeout(
            timeout,
            self.consume(&composed, task_description, capability_name),
        )
        .await;

        match outcome {
            Ok(Ok(Some(result))) => result,
            Ok(Ok(None)) => {
                tracing::warn!(capability = capability_name, "execution produced no output");
                fallback_result(capability_name, "no output produced", task_description)
            }
            Ok(Err(reason)) => {
                tracing::warn!(capability = capability_name, "execution failed: {reason}");
                fallback_result(capability_name, &reason, task_description)
            }
            Err(_) => {
                tracing::warn!(
                    capability = capability_name,
                    timeout_secs = self.settings.timeout_secs,
                    "execution timed out"
                );
                let reason = format!("timed out after {}s", self.settings.timeout_secs);
                fallback_result(capability_name, &reason, task_description)
            }
        }
    }

    /// Drain the backend stream. `Ok(None)` means the stream completed with
    /// zero usable output; `Err` carries a human-readable failure reason.
    async fn consume(
        &self,
        instructions: &str,
        task_description: &str,
        capability_name: &str,
    ) -> Result<Option<String>, String> {
        let mut stream = self
            .backend
            .run(instructions, task_description)
            .await
            .map_err(|error| format!("backend unavailable: {error:#}"))?;

        let mut chunks: Vec<String> = Vec::new();
        let mut declared_result: Option<String> = None;

        while let Some(event) = stream.next().await {
            let event = event.map_err(|error| format!("event stream broke: {error:#}"))?;
            if self.settings.log_events {
                self.log_event(capability_name, &event);
            }
            match event {
                AgentEvent::Text(text) => {
                    if !text.trim().is_empty() {
                        chunks.push(text);
                    }
                }
                AgentEvent::ToolCall { .. } => {}
                AgentEvent::Result(result) => {
                    if !result.trim().is_empty() {
                        declared_result = Some(result);
                    }
                }
            }
        }

        if let Some(result) = declared_result {
            return Ok(Some(result));
        }
        if chunks.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunks.join("\n")))
    }

    fn log_event(&self, capability_name: &str, event: &AgentEvent) {
        match event {
            AgentEvent::Text(text) => tracing::debug!(
                capability = capability_name,
                event = "text",
                "{}",
                preview(text, self.settings.preview_len)
            ),
            AgentEvent::ToolCall { name } => {
                tracing::debug!(capability = capability_name, event = "tool_call", tool = name);
            }
            AgentEvent::Result(result) => tracing::debug!(
                capability = capability_name,
                event = "result",
                "{}",
                preview(result, self.settings.preview_len)
            ),
        }
    }
}

/// Append the runtime credential block to the capability instructions. The
/// composed string is handed to the backend and dropped with the attempt.
fn compose_instructions(instructions: &str, credential: Option<&ProviderCredential>) -> String {
    let Some(credential) = credential else {
        return instructions.to_string();
    };
    format!(
        "{instructions}\n\n\
         Runtime credential context (this execution only):\n\
         - provider: {}\n\
         - api_key: {}\n\
         - {}",
        credential.provider,
        credential.secret,
        provider_runtime_auth_instructions(&credential.provider),
    )
}

/// Deterministic degraded-result string. Reported as a normal completion.
#[must_use]
pub fn fallback_result(capability_name: &str, reason: &str, task_description: &str) -> String {
    format!(
        "[Fallback {capability_name}] Unable to complete task. Reason: {reason}. \
         Task: {}",
        preview(task_description, 200)
    )
}
