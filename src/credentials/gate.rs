//! Credential gate: decides whether a capability's external-provider
//! dependency is currently satisfiable.

use super::hints::infer_provider;
use crate::registry::{Capability, CapabilityStatus, Registry};
use std::sync::Arc;

/// A resolved provider credential, handed to the executor only. The secret
/// is never logged outside the single execution context.
#[derive(Clone)]
pub struct ProviderCredential {
    pub provider: String,
    pub secret: String,
}

impl std::fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("provider", &self.provider)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Outcome of one credential check.
#[derive(Debug)]
pub enum CredentialCheck {
    /// No provider dependency, or the credential is stored; execution may
    /// proceed.
    Ready {
        credential: Option<ProviderCredential>,
    },
    /// The required credential is absent. Not an error: a distinct terminal
    /// status with user-facing remediation text.
    Blocked { provider: String, message: String },
}

pub struct CredentialGate {
    registry: Arc<dyn Registry>,
}

impl CredentialGate {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    /// Run the gate for one execution attempt. Mutates the capability's
    /// `status`/`required_provider` in place to mirror what was persisted.
    pub async fn check(
        &self,
        capability: &mut Capability,
        task_description: &str,
    ) -> anyhow::Result<CredentialCheck> {
        let provider = match &capability.required_provider {
            Some(provider) => Some(provider.clone()),
            None => {
                // Post-hoc inference over task text plus the capability's own
                // name and description.
                let combined = format!(
                    "{task_description}\n{}\n{}",
                    capability.name, capability.description
                );
                let inferred = infer_provider(&combined).map(ToString::to_string);
                if let Some(inferred) = &inferred {
                    capability.required_provider = Some(inferred.clone());
                }
                inferred
            }
        };

        let Some(provider) = provider else {
            return Ok(CredentialCheck::Ready { credential: None });
        };

        let secret = self.registry.get_credential(&provider).await?;
        let Some(secret) = secret else {
            self.persist_status(capability, CapabilityStatus::NeedsCredential)
                .await;
            tracing::info!(
                capability = capability.name,
                provider,
                "credential gate blocked: no stored credential"
            );
            return Ok(CredentialCheck::Blocked {
                message: missing_credential_message(&provider, &capability.name),
                provider,
            });
        };

        self.persist_status(capability, CapabilityStatus::Ready).await;
        tracing::info!(
            capability = capability.name,
            provider,
            "credential gate ready: stored credential found"
        );
        Ok(CredentialCheck::Ready {
            credential: Some(ProviderCredential { provider, secret }),
        })
    }

    /// Persist the auth status; best-effort. A transient registry failure
    /// here must not abort an otherwise decided attempt.
    async fn persist_status(&self, capability: &mut Capability, status: CapabilityStatus) {
        if capability.id.is_empty() {
            return;
        }
        match self
            .registry
            .update_auth(
                &capability.id,
                status,
                capability.required_provider.as_deref(),
            )
            .await
        {
            Ok(Some(updated)) => {
                capability.status = updated.status;
                capability.required_provider = updated.required_provider;
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(
                    capability = capability.name,
                    status = status.as_str(),
                    "failed to persist capability auth status: {error:#}"
                );
            }
        }
    }
}

/// User-facing remediation text for the `missing_credential` terminal status.
#[must_use]
pub fn missing_credential_message(provider: &str, capability_name: &str) -> String {
    format!(
        "No stored credential was found for provider '{provider}'. Add one to the credential \
         store and re-send the task; capability '{capability_name}' stays parked as \
         needs_credential until then."
    )
}

/// Progress text emitted just before a credential-gated execution starts.
#[must_use]
pub fn credential_found_message(provider: &str) -> String {
    format!("Found the stored {provider} credential; pulling the data now.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{NewCapability, SqliteRegistry};

    async fn seeded_registry() -> Arc<SqliteRegistry> {
        Arc::new(SqliteRegistry::in_memory().await.unwrap())
    }

    async fn insert(
        registry: &Arc<SqliteRegistry>,
        name: &str,
        provider: Option<&str>,
    ) -> Capability {
        registry
            .insert_if_absent(&NewCapability {
                name: name.to_string(),
                description: format!("{name} description"),
                instructions: "instructions".to_string(),
                status: CapabilityStatus::Ready,
                required_provider: provider.map(ToString::to_string),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn no_provider_dependency_is_ready_immediately() {
        let registry = seeded_registry().await;
        let mut capability = insert(&registry, "auto_disk_usage", None).await;

        let gate = CredentialGate::new(Arc::clone(&registry) as Arc<dyn Registry>);
        let check = gate.check(&mut capability, "check disk usage").await.unwrap();
        match check {
            CredentialCheck::Ready { credential } => assert!(credential.is_none()),
            CredentialCheck::Blocked { .. } => panic!("no dependency should be ready"),
        }
    }

    #[tokio::test]
    async fn missing_credential_blocks_and_persists_status() {
        let registry = seeded_registry().await;
        let mut capability = insert(&registry, "auto_stripe_payouts", Some("stripe")).await;

        let gate = CredentialGate::new(Arc::clone(&registry) as Arc<dyn Registry>);
        let check = gate.check(&mut capability, "pull payouts").await.unwrap();
        match check {
            CredentialCheck::Blocked { provider, message } => {
                assert_eq!(provider, "stripe");
                assert!(message.contains("stripe"));
                assert!(message.contains("auto_stripe_payouts"));
            }
            CredentialCheck::Ready { .. } => panic!("expected blocked"),
        }

        assert_eq!(capability.status, CapabilityStatus::NeedsCredential);
        let stored = registry
            .find_by_name("auto_stripe_payouts")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, CapabilityStatus::NeedsCredential);
    }

    #[tokio::test]
    async fn stored_credential_unblocks_and_marks_ready() {
        let registry = seeded_registry().await;
        registry.store_credential("stripe", "sk_live_123").await.unwrap();
        let mut capability = insert(&registry, "auto_stripe_payouts", Some("stripe")).await;
        capability.status = CapabilityStatus::NeedsCredential;

        let gate = CredentialGate::new(Arc::clone(&registry) as Arc<dyn Registry>);
        let check = gate.check(&mut capability, "pull payouts").await.unwrap();
        match check {
            CredentialCheck::Ready { credential } => {
                let credential = credential.unwrap();
                assert_eq!(credential.provider, "stripe");
                assert_eq!(credential.secret, "sk_live_123");
            }
            CredentialCheck::Blocked { .. } => panic!("expected ready"),
        }
        assert_eq!(capability.status, CapabilityStatus::Ready);
    }

    #[tokio::test]
    async fn provider_is_inferred_post_hoc_from_task_text() {
        let registry = seeded_registry().await;
        let mut capability = insert(&registry, "auto_notify_people", None).await;

        let gate = CredentialGate::new(Arc::clone(&registry) as Arc<dyn Registry>);
        let check = gate
            .check(&mut capability, "send sms to the on-call engineer")
            .await
            .unwrap();
        assert!(matches!(check, CredentialCheck::Blocked { ref provider, .. } if provider == "twilio"));
        assert_eq!(capability.required_provider.as_deref(), Some("twilio"));
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let credential = ProviderCredential {
            provider: "stripe".into(),
            secret: "sk_live_123".into(),
        };
        let debug = format!("{credential:?}");
        assert!(!debug.contains("sk_live_123"));
        assert!(debug.contains("<redacted>"));
    }
}
