//! Top-level request pipeline:
//! routing, optional synthesis, credential check, execution, reporting.
//!
//! Reporting is the one hard guarantee here: every accepted request emits
//! exactly one terminal callback, whatever happens in between.

use crate::credentials::{
    CredentialCheck, CredentialGate, credential_found_message, infer_provider,
    provider_capability_instructions,
};
use crate::error::{ConductorError, RoutingError};
use crate::executor::Executor;
use crate::notify::Notifier;
use crate::registry::{Capability, CapabilityStatus, NewCapability, Registry};
use crate::routing::{RouteDecision, Router};
use crate::synthesis::CapabilitySynthesizer;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// One accepted intake request.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub request_id: String,
    pub description: String,
    /// Caller-supplied metadata, echoed in the terminal callback.
    pub metadata: Option<Map<String, Value>>,
}

/// Terminal (and progress) statuses carried in callback metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Completed,
    MissingCredential,
    InProgress,
    Failed,
}

impl ReportStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::MissingCredential => "missing_credential",
            Self::InProgress => "in_progress",
            Self::Failed => "failed",
        }
    }
}

/// Pipeline outcome, before reporting.
enum Outcome {
    Completed {
        branch: &'static str,
        capability_name: String,
        result: String,
    },
    MissingCredential {
        branch: &'static str,
        capability_name: String,
        provider: String,
        message: String,
    },
}

pub struct Orchestrator {
    registry: Arc<dyn Registry>,
    router: Router,
    synthesizer: CapabilitySynthesizer,
    credential_gate: CredentialGate,
    executor: Executor,
    notifier: Notifier,
    exec_timeout_secs: u64,
    progress_updates: bool,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn Registry>,
        router: Router,
        synthesizer: CapabilitySynthesizer,
        executor: Executor,
        notifier: Notifier,
        exec_timeout_secs: u64,
        progress_updates: bool,
    ) -> Self {
        Self {
            credential_gate: CredentialGate::new(Arc::clone(&registry)),
            registry,
            router,
            synthesizer,
            executor,
            notifier,
            exec_timeout_secs,
            progress_updates,
        }
    }

    /// Drive one request to its terminal callback.
    pub async fn orchestrate(&self, request: TaskRequest) {
        tracing::info!(
            request_id = request.request_id,
            task = crate::util::preview(&request.description, 120),
            "request accepted"
        );

        match self.pipeline(&request).await {
            Ok(Outcome::Completed {
                branch,
                capability_name,
                result,
            }) => {
                tracing::info!(
                    request_id = request.request_id,
                    capability = capability_name,
                    branch,
                    "request completed"
                );
                let metadata = self.callback_metadata(
                    &request,
                    ReportStatus::Completed,
                    branch,
                    &[("capability", json!(capability_name))],
                );
                self.notifier
                    .send(&request.request_id, &result, Some(&metadata))
                    .await;
            }
            Ok(Outcome::MissingCredential {
                branch,
                capability_name,
                provider,
                message,
            }) => {
                tracing::info!(
                    request_id = request.request_id,
                    capability = capability_name,
                    provider,
                    "request parked: missing credential"
                );
                let metadata = self.callback_metadata(
                    &request,
                    ReportStatus::MissingCredential,
                    branch,
                    &[
                        ("capability", json!(capability_name)),
                        ("required_provider", json!(provider)),
                    ],
                );
                self.notifier
                    .send(&request.request_id, &message, Some(&metadata))
                    .await;
            }
            Err(error) => {
                tracing::error!(request_id = request.request_id, "request failed: {error}");
                let metadata = self.callback_metadata(
                    &request,
                    ReportStatus::Failed,
                    "none",
                    &[("error", json!(error.to_string()))],
                );
                let message = format!("Task failed: {error}");
                self.notifier
                    .send(&request.request_id, &message, Some(&metadata))
                    .await;
            }
        }
    }

    async fn pipeline(&self, request: &TaskRequest) -> Result<Outcome, ConductorError> {
        // Routing.
        let capabilities = self.registry.find_all().await.map_err(|error| {
            RoutingError::DecisionFailed(format!("registry read failed: {error:#}"))
        })?;
        let decision = self
            .router
            .decide(&request.description, &capabilities, self.exec_timeout_secs)
            .await;
        let branch = decision.branch();

        // Synthesizing (build-new branch only).
        let mut capability = match decision {
            RouteDecision::Match(capability) => capability,
            RouteDecision::BuildNew { name_hint } => {
                self.build_capability(&request.description, &name_hint).await?
            }
        };

        // Credential check.
        let check = self
            .credential_gate
            .check(&mut capability, &request.description)
            .await?;
        let credential = match check {
            CredentialCheck::Blocked { provider, message } => {
                return Ok(Outcome::MissingCredential {
                    branch,
                    capability_name: capability.name,
                    provider,
                    message,
                });
            }
            CredentialCheck::Ready { credential } => credential,
        };

        if self.progress_updates
            && let Some(credential) = &credential
        {
            let metadata =
                self.callback_metadata(request, ReportStatus::InProgress, branch, &[]);
            self.notifier
                .send(
                    &request.request_id,
                    &credential_found_message(&credential.provider),
                    Some(&metadata),
                )
                .await;
        }

        // Executing. Infallible: degraded attempts produce fallback text.
        let result = self
            .executor
            .execute(
                &capability.name,
                &capability.instructions,
                &request.description,
                credential.as_ref(),
            )
            .await;

        Ok(Outcome::Completed {
            branch,
            capability_name: capability.name,
            result,
        })
    }

    /// Synthesize and persist a new capability. Under a concurrent duplicate
    /// the registry's unique name constraint decides; the surviving row is
    /// used either way.
    async fn build_capability(
        &self,
        task_description: &str,
        name_hint: &str,
    ) -> Result<Capability, ConductorError> {
        let spec = self.synthesizer.synthesize(task_description, name_hint).await?;

        let mut instructions = spec.instructions;
        let required_provider = infer_provider(&format!(
            "{task_description}\n{}\n{}",
            spec.name, spec.description
        ))
        .map(ToString::to_string);
        if let Some(provider) = &required_provider {
            instructions = format!(
                "{instructions}\n\n{}",
                provider_capability_instructions(provider)
            );
        }

        let capability = self
            .registry
            .insert_if_absent(&NewCapability {
                name: spec.name,
                description: spec.description,
                instructions,
                status: CapabilityStatus::Ready,
                required_provider,
            })
            .await?;
        tracing::info!(capability = capability.name, "capability persisted or reused");
        Ok(capability)
    }

    /// Terminal-callback metadata: caller metadata first, then the reserved
    /// report fields (which always win on key collisions).
    fn callback_metadata(
        &self,
        request: &TaskRequest,
        status: ReportStatus,
        branch: &str,
        extra: &[(&str, Value)],
    ) -> Value {
        let mut map = request.metadata.clone().unwrap_or_default();
        map.insert("request_id".into(), json!(request.request_id));
        map.insert("status".into(), json!(status.as_str()));
        map.insert("branch".into(), json!(branch));
        map.insert("task_description".into(), json!(request.description));
        for (key, value) in extra {
            map.insert((*key).to_string(), value.clone());
        }
        Value::Object(map)
    }
}
