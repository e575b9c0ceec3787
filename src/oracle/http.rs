use super::Oracle;
use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Oracle backed by an OpenAI-compatible chat-completions endpoint.
pub struct HttpOracle {
    base_url: String,
    model: String,
    temperature: f64,
    /// Pre-computed `"Bearer <key>"` header value (avoids `format!` per request).
    cached_auth_header: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl HttpOracle {
    pub fn new(
        base_url: &str,
        model: &str,
        temperature: f64,
        api_key: Option<&str>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .connect_timeout(Duration::from_secs(10))
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn build_request(&self, system_prompt: &str, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
        }
    }
}

impl Oracle for HttpOracle {
    fn name(&self) -> &str {
        "openai"
    }

    fn infer<'a>(
        &'a self,
        system_prompt: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/chat/completions", self.base_url);
            let mut request = self
                .client
                .post(&url)
                .json(&self.build_request(system_prompt, prompt));
            if let Some(auth) = &self.cached_auth_header {
                request = request.header("Authorization", auth);
            }

            let response = request.send().await.context("oracle request failed")?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                anyhow::bail!(
                    "oracle returned {status}: {}",
                    crate::util::preview(&body, 200)
                );
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .context("oracle response was not valid JSON")?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();
            Ok(content.trim().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn infer_sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "strict json only"},
                    {"role": "user", "content": "pick one"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                "{\"decision\": \"match\"}",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(
            &format!("{}/v1", server.uri()),
            "gpt-4o-mini",
            0.0,
            Some("test-key"),
            10,
        );
        let response = oracle.infer("strict json only", "pick one").await.unwrap();
        assert_eq!(response, "{\"decision\": \"match\"}");
    }

    #[tokio::test]
    async fn infer_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(&server.uri(), "gpt-4o-mini", 0.0, None, 10);
        let err = oracle.infer("sys", "prompt").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn infer_tolerates_missing_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant"}}]
            })))
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(&server.uri(), "gpt-4o-mini", 0.0, None, 10);
        let response = oracle.infer("sys", "prompt").await.unwrap();
        assert_eq!(response, "");
    }
}
