//! HTTP execution backend speaking newline-delimited JSON.
//!
//! The backend service accepts `{instructions, task}` and streams one JSON
//! object per line as it works. Lines that fail to parse are logged and
//! dropped rather than failing the attempt; a broken transport still
//! surfaces as a stream error.

use super::{AgentEvent, EventStream, ExecutionBackend};
use anyhow::Context;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub struct HttpAgentBackend {
    base_url: String,
    cached_auth_header: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    instructions: &'a str,
    task: &'a str,
}

/// Wire shape of one NDJSON line.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Text { text: String },
    ToolCall { name: String },
    Result { result: String },
}

impl From<WireEvent> for AgentEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Text { text } => Self::Text(text),
            WireEvent::ToolCall { name } => Self::ToolCall { name },
            WireEvent::Result { result } => Self::Result(result),
        }
    }
}

impl HttpAgentBackend {
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            // No request-level timeout: it would cover the whole streamed
            // body. The executor owns the wall clock.
            client: Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn parse_line(line: &str) -> Option<AgentEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<WireEvent>(line) {
            Ok(event) => Some(event.into()),
            Err(error) => {
                tracing::warn!(
                    "discarding malformed backend event line: {error} ({})",
                    crate::util::preview(line, 120)
                );
                None
            }
        }
    }
}

impl ExecutionBackend for HttpAgentBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn run<'a>(
        &'a self,
        instructions: &'a str,
        task_description: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<EventStream>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/v1/executions", self.base_url);
            let mut request = self.client.post(&url).json(&RunRequest {
                instructions,
                task: task_description,
            });
            if let Some(auth) = &self.cached_auth_header {
                request = request.header("Authorization", auth);
            }

            let response = request.send().await.context("backend request failed")?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!(
                    "backend returned {status}: {}",
                    crate::util::preview(&body, 200)
                );
            }

            let mut bytes = response.bytes_stream();
            let stream = async_stream::try_stream! {
                let mut buffer = String::new();
                while let Some(chunk) = bytes.next().await {
                    let chunk = chunk.context("backend stream read failed")?;
                    buffer.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(newline) = buffer.find('\n') {
                        let line: String = buffer.drain(..=newline).collect();
                        if let Some(event) = Self::parse_line(&line) {
                            yield event;
                        }
                    }
                }
                // Trailing line without a final newline.
                if let Some(event) = Self::parse_line(&buffer) {
                    yield event;
                }
            };
            Ok(Box::pin(stream) as EventStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn collect(backend: &HttpAgentBackend) -> anyhow::Result<Vec<AgentEvent>> {
        let mut stream = backend.run("instructions", "task").await?;
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event?);
        }
        Ok(events)
    }

    #[tokio::test]
    async fn parses_ndjson_events_in_order() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"type\":\"text\",\"text\":\"working\"}\n",
            "{\"type\":\"tool_call\",\"name\":\"shell\"}\n",
            "{\"type\":\"result\",\"result\":\"done\"}\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/executions"))
            .and(header("Authorization", "Bearer backend-key"))
            .and(body_partial_json(serde_json::json!({
                "instructions": "instructions",
                "task": "task"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpAgentBackend::new(&server.uri(), Some("backend-key"));
        let events = collect(&backend).await.unwrap();
        assert_eq!(
            events,
            vec![
                AgentEvent::Text("working".into()),
                AgentEvent::ToolCall { name: "shell".into() },
                AgentEvent::Result("done".into()),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped_not_fatal() {
        let server = MockServer::start().await;
        let body = concat!(
            "not json at all\n",
            "{\"type\":\"mystery\"}\n",
            "{\"type\":\"result\",\"result\":\"survived\"}",
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let backend = HttpAgentBackend::new(&server.uri(), None);
        let events = collect(&backend).await.unwrap();
        assert_eq!(events, vec![AgentEvent::Result("survived".into())]);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let backend = HttpAgentBackend::new(&server.uri(), None);
        let err = collect(&backend).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
