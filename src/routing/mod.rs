pub mod arbiter;
pub mod gate;
pub mod ranker;
pub mod tokenizer;

pub use arbiter::{ArbiterClient, ArbiterSettings};
pub use gate::{RouteConfidence, RouteThresholds, classify};
pub use ranker::{RankedCandidate, rank};
pub use tokenizer::tokenize;

use crate::registry::Capability;
use crate::util::slugify;

const NAME_HINT_MAX_LEN: usize = 56;
const FALLBACK_NAME_HINT: &str = "general_task_automation";

/// Sole output of the routing phase.
#[derive(Debug, Clone)]
pub enum RouteDecision {
    /// An existing capability fits; execute it.
    Match(Capability),
    /// Nothing fits well enough; synthesize a new capability.
    BuildNew { name_hint: String },
}

impl RouteDecision {
    /// Branch label carried through logs and callbacks.
    #[must_use]
    pub fn branch(&self) -> &'static str {
        match self {
            Self::Match(_) => "match",
            Self::BuildNew { .. } => "build_new",
        }
    }
}

/// Routing decision engine: rank, gate, and (on ambiguity) arbitrate.
pub struct Router {
    thresholds: RouteThresholds,
    arbiter: ArbiterClient,
}

impl Router {
    pub fn new(thresholds: RouteThresholds, arbiter: ArbiterClient) -> Self {
        Self {
            thresholds: thresholds.clamped(),
            arbiter,
        }
    }

    /// Map a task description to an existing capability or a build-new
    /// decision. Never errors: every uncertain outcome degrades to
    /// `BuildNew`.
    pub async fn decide(
        &self,
        task_description: &str,
        capabilities: &[Capability],
        global_timeout_secs: u64,
    ) -> RouteDecision {
        let ranked = rank(task_description, capabilities);

        match classify(&ranked, self.thresholds) {
            RouteConfidence::Confident => {
                let top = &ranked[0];
                tracing::info!(
                    capability = top.capability.name,
                    score = top.score,
                    margin = top.score - ranked.get(1).map_or(0, |c| c.score),
                    "route=match strategy=lexical_confident"
                );
                return RouteDecision::Match(top.capability.clone());
            }
            RouteConfidence::Ambiguous => {
                let top = &ranked[0];
                let top_score = top.score;
                let margin = top_score - ranked.get(1).map_or(0, |c| c.score);

                if let Some(confirmed) = self
                    .arbiter
                    .adjudicate(task_description, &ranked, global_timeout_secs)
                    .await
                {
                    tracing::info!(
                        capability = confirmed.name,
                        top_score,
                        margin,
                        "route=match strategy=arbiter_validated"
                    );
                    return RouteDecision::Match(confirmed);
                }

                tracing::info!(
                    top_capability = top.capability.name,
                    top_score,
                    margin,
                    "route=build_new reason=uncertain_match_rejected"
                );
            }
            RouteConfidence::NoMatch => {
                if let Some(top) = ranked.first() {
                    tracing::info!(
                        top_capability = top.capability.name,
                        top_score = top.score,
                        min_score = self.thresholds.min_score,
                        "route=build_new reason=top_score_below_threshold"
                    );
                }
            }
        }

        let name_hint = build_name_hint(task_description);
        tracing::info!(name_hint, "route=build_new");
        RouteDecision::BuildNew { name_hint }
    }
}

/// Slug-based name hint for a capability that does not exist yet. Used as
/// the fallback when the synthesizer's proposed name normalizes to empty.
#[must_use]
pub fn build_name_hint(task_description: &str) -> String {
    let mut slug = slugify(task_description);
    if slug.is_empty() {
        slug = FALLBACK_NAME_HINT.to_string();
    }
    if slug.len() > NAME_HINT_MAX_LEN {
        slug.truncate(NAME_HINT_MAX_LEN);
        slug = slug.trim_end_matches('_').to_string();
    }
    format!("auto_{slug}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Oracle;
    use crate::registry::CapabilityStatus;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingOracle {
        calls: AtomicUsize,
        response: String,
    }

    impl CountingOracle {
        fn new(response: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: response.to_string(),
            }
        }
    }

    impl Oracle for CountingOracle {
        fn name(&self) -> &str {
            "counting"
        }

        fn infer<'a>(
            &'a self,
            _system_prompt: &'a str,
            _prompt: &'a str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(self.response.clone()) })
        }
    }

    fn capability(name: &str, description: &str) -> Capability {
        Capability {
            id: format!("id_{name}"),
            name: name.to_string(),
            description: description.to_string(),
            instructions: "instructions".to_string(),
            status: CapabilityStatus::Ready,
            required_provider: None,
        }
    }

    fn router_with(oracle: Arc<CountingOracle>) -> Router {
        Router::new(
            RouteThresholds::default(),
            ArbiterClient::new(oracle, ArbiterSettings::default()),
        )
    }

    #[tokio::test]
    async fn confident_match_skips_arbiter() {
        let oracle = Arc::new(CountingOracle::new("{}"));
        let router = router_with(Arc::clone(&oracle));
        let caps = vec![
            capability("auto_sales_report_generator", "generate sales report summaries"),
            capability("auto_dns_lookup", "resolve domains"),
        ];

        let decision = router
            .decide("generate sales report", &caps, 180)
            .await;
        match decision {
            RouteDecision::Match(cap) => assert_eq!(cap.name, "auto_sales_report_generator"),
            RouteDecision::BuildNew { .. } => panic!("expected confident match"),
        }
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ambiguous_ranking_consults_arbiter_once() {
        let oracle = Arc::new(CountingOracle::new(
            r#"{"decision":"match","selected_name":"auto_report_tool","confidence":0.8,"reason":"fits"}"#,
        ));
        let router = router_with(Arc::clone(&oracle));
        // Overlapping names keep the margin thin: ambiguous.
        let caps = vec![
            capability("auto_report_tool", "build reports"),
            capability("auto_report_mailer", "mail reports"),
        ];

        let decision = router.decide("report on sign-ups", &caps, 180).await;
        match decision {
            RouteDecision::Match(cap) => assert_eq!(cap.name, "auto_report_tool"),
            RouteDecision::BuildNew { .. } => panic!("expected arbiter-validated match"),
        }
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_task_routes_to_build_new() {
        let oracle = Arc::new(CountingOracle::new("{}"));
        let router = router_with(Arc::clone(&oracle));
        let caps = vec![capability("auto_sms_send", "send text messages")];

        let decision = router.decide("", &caps, 180).await;
        match decision {
            RouteDecision::BuildNew { name_hint } => {
                assert_eq!(name_hint, "auto_general_task_automation");
            }
            RouteDecision::Match(_) => panic!("empty tokens can never match"),
        }
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_verdict_falls_through_to_build_new() {
        let oracle = Arc::new(CountingOracle::new(
            r#"{"decision":"build_new","selected_name":"","confidence":0.9,"reason":"partial"}"#,
        ));
        let router = router_with(Arc::clone(&oracle));
        let caps = vec![
            capability("auto_report_tool", "build reports"),
            capability("auto_report_mailer", "mail reports"),
        ];

        let decision = router.decide("report on sign-ups", &caps, 180).await;
        assert!(matches!(decision, RouteDecision::BuildNew { .. }));
        assert_eq!(decision.branch(), "build_new");
    }

    #[test]
    fn name_hint_is_slugged_prefixed_and_capped() {
        assert_eq!(build_name_hint("Send SMS to Bob"), "auto_send_sms_to_bob");
        assert_eq!(build_name_hint("!!!"), "auto_general_task_automation");

        let long = build_name_hint(&"word ".repeat(40));
        assert!(long.starts_with("auto_"));
        assert!(long.len() <= "auto_".len() + 56);
        assert!(!long.ends_with('_'));
    }
}
