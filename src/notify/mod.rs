//! Fire-and-forget webhook notifications.
//!
//! Delivery is best-effort by contract: a dead webhook must never change a
//! request's outcome, so failures are logged and dropped, never retried.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub struct Notifier {
    webhook_url: Option<String>,
    cached_auth_header: Option<String>,
    dry_run: bool,
    client: Client,
}

#[derive(Debug, Serialize)]
struct NotificationBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Value>,
}

impl Notifier {
    pub fn new(webhook_url: Option<&str>, api_key: Option<&str>, dry_run: bool) -> Self {
        Self {
            webhook_url: webhook_url
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(ToString::to_string),
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            dry_run,
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Deliver one notification. Returns nothing: success and every failure
    /// mode are equivalent to the caller.
    pub async fn send(&self, request_id: &str, message: &str, metadata: Option<&Value>) {
        let message = format!("[conductor:{request_id}] {message}");

        if self.dry_run {
            tracing::info!(
                request_id,
                metadata = metadata.map(|v| v.to_string()).unwrap_or_default(),
                "dry-run notification: {message}"
            );
            return;
        }
        let Some(url) = &self.webhook_url else {
            tracing::debug!(request_id, "no webhook configured, dropping notification");
            return;
        };

        let mut request = self.client.post(url).json(&NotificationBody {
            message: &message,
            metadata,
        });
        if let Some(auth) = &self.cached_auth_header {
            request = request.header("Authorization", auth);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(request_id, "notification delivered");
            }
            Ok(response) => {
                tracing::warn!(
                    request_id,
                    status = response.status().as_u16(),
                    "notification rejected by webhook"
                );
            }
            Err(error) => {
                tracing::warn!(request_id, "notification delivery failed: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_message_and_metadata_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer hook-key"))
            .and(body_partial_json(serde_json::json!({
                "message": "[conductor:req-1] task completed",
                "metadata": {"branch": "match"}
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = server.uri();
        let notifier = Notifier::new(Some(url.as_str()), Some("hook-key"), false);
        let metadata = serde_json::json!({"branch": "match"});
        notifier.send("req-1", "task completed", Some(&metadata)).await;
    }

    #[tokio::test]
    async fn webhook_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let url = server.uri();
        let notifier = Notifier::new(Some(url.as_str()), None, false);
        notifier.send("req-2", "still fine", None).await;
    }

    #[tokio::test]
    async fn dry_run_never_touches_the_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let url = server.uri();
        let notifier = Notifier::new(Some(url.as_str()), None, true);
        notifier.send("req-3", "suppressed", None).await;
    }

    #[tokio::test]
    async fn missing_webhook_url_is_a_no_op() {
        let notifier = Notifier::new(None, None, false);
        notifier.send("req-4", "nowhere to go", None).await;

        let blank = Notifier::new(Some("   "), None, false);
        blank.send("req-5", "also nowhere", None).await;
    }
}
