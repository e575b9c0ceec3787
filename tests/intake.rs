//! Intake server tests over a real listener.

use conductor::executor::{AgentEvent, EventStream, ExecutionBackend, ExecutionSettings, Executor};
use conductor::notify::Notifier;
use conductor::oracle::Oracle;
use conductor::orchestrator::Orchestrator;
use conductor::registry::{Registry, SqliteRegistry};
use conductor::routing::{ArbiterClient, ArbiterSettings, RouteThresholds, Router};
use conductor::server;
use conductor::synthesis::CapabilitySynthesizer;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

struct StubOracle;

impl Oracle for StubOracle {
    fn name(&self) -> &str {
        "stub"
    }

    fn infer<'a>(
        &'a self,
        _system_prompt: &'a str,
        _prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async {
            Ok(r#"{"name": "auto_generic_task_handler",
                "description": "Handle generic tasks",
                "system_prompt": "Do the task."}"#
                .to_string())
        })
    }
}

struct StubBackend;

impl ExecutionBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn run<'a>(
        &'a self,
        _instructions: &'a str,
        _task_description: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<EventStream>> + Send + 'a>> {
        Box::pin(async {
            Ok(Box::pin(futures_util::stream::iter(vec![Ok(
                AgentEvent::Result("done".into()),
            )])) as EventStream)
        })
    }
}

async fn spawn_server() -> String {
    let registry = Arc::new(SqliteRegistry::in_memory().await.unwrap());
    let oracle: Arc<dyn Oracle> = Arc::new(StubOracle);
    let orchestrator = Arc::new(Orchestrator::new(
        registry as Arc<dyn Registry>,
        Router::new(
            RouteThresholds::default(),
            ArbiterClient::new(Arc::clone(&oracle), ArbiterSettings::default()),
        ),
        CapabilitySynthesizer::new(oracle, 180),
        Executor::new(Arc::new(StubBackend), ExecutionSettings::default()),
        Notifier::new(None, None, true),
        180,
        true,
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server::run_with_listener(listener, orchestrator).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_endpoint_responds() {
    let base = spawn_server().await;
    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn task_intake_acknowledges_immediately_with_request_id() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/v1/tasks"))
        .json(&serde_json::json!({
            "task": "summarize yesterday's logs",
            "metadata": {"source": "test"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "accepted");
    let request_id = body["request_id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
}

#[tokio::test]
async fn blank_task_is_rejected() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/v1/tasks"))
        .json(&serde_json::json!({"task": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn non_object_metadata_is_tolerated() {
    let base = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/v1/tasks"))
        .json(&serde_json::json!({"task": "do a thing", "metadata": [1, 2, 3]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
}
