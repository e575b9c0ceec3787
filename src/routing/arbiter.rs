//! Arbiter client: second, semantic-level gate consulted only on ambiguous
//! lexical rankings.
//!
//! Every failure mode here — timeout, transport error, malformed JSON, low
//! confidence, out-of-set selection — collapses to "no confirmed match".
//! Ambiguity degrades safely to capability creation, never to an error.

use super::ranker::RankedCandidate;
use crate::oracle::{Oracle, extract_json_object};
use crate::registry::Capability;
use crate::util::{normalize_text_field, preview};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

const REASON_MAX_LEN: usize = 220;

const ARBITER_SYSTEM_PROMPT: &str = "You are a strict routing validator for capability selection. \
     Output strict JSON only.";

/// Runtime-tunable arbiter settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArbiterSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// How many top candidates are offered to the arbiter.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Verdicts below this confidence are rejected.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_top_k() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    12
}

fn default_min_confidence() -> f64 {
    0.6
}

impl Default for ArbiterSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            top_k: default_top_k(),
            timeout_secs: default_timeout_secs(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl ArbiterSettings {
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            enabled: self.enabled,
            top_k: self.top_k.max(1),
            timeout_secs: self.timeout_secs.max(3),
            min_confidence: self.min_confidence.clamp(0.0, 1.0),
        }
    }
}

pub struct ArbiterClient {
    oracle: Arc<dyn Oracle>,
    settings: ArbiterSettings,
}

impl ArbiterClient {
    pub fn new(oracle: Arc<dyn Oracle>, settings: ArbiterSettings) -> Self {
        Self {
            oracle,
            settings: settings.clamped(),
        }
    }

    /// Ask the oracle to confirm one of the offered candidates. Returns the
    /// confirmed capability, or `None` for every rejecting or failing
    /// outcome. `global_timeout_secs` caps the call alongside the arbiter's
    /// own timeout.
    pub async fn adjudicate(
        &self,
        task_description: &str,
        ranked: &[RankedCandidate],
        global_timeout_secs: u64,
    ) -> Option<Capability> {
        if ranked.is_empty() {
            return None;
        }
        if !self.settings.enabled {
            tracing::info!("route arbiter skipped: disabled");
            return None;
        }

        let offered = &ranked[..ranked.len().min(self.settings.top_k)];
        let by_name: HashMap<String, &Capability> = offered
            .iter()
            .map(|candidate| {
                (
                    candidate.capability.name.to_lowercase(),
                    &candidate.capability,
                )
            })
            .collect();

        let prompt = build_prompt(task_description, offered);
        let timeout = Duration::from_secs(self.settings.timeout_secs.min(global_timeout_secs));
        let response =
            match tokio::time::timeout(timeout, self.oracle.infer(ARBITER_SYSTEM_PROMPT, &prompt))
                .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(error)) => {
                    tracing::warn!("route arbiter call failed: {error:#}");
                    return None;
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = timeout.as_secs(),
                        "route arbiter call timed out"
                    );
                    return None;
                }
            };

        let Some(parsed) = extract_json_object(&response) else {
            tracing::warn!("route arbiter returned non-JSON output");
            return None;
        };

        let decision = parsed
            .get("decision")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        let selected_name = parsed
            .get("selected_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        let confidence = normalize_confidence(parsed.get("confidence"));
        let reason = normalize_text_field(
            parsed
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default(),
            REASON_MAX_LEN,
        );

        if decision != "match" {
            tracing::info!(
                confidence,
                reason = preview(&reason, REASON_MAX_LEN),
                "route arbiter decision=build_new"
            );
            return None;
        }

        if confidence < self.settings.min_confidence {
            tracing::info!(
                confidence,
                threshold = self.settings.min_confidence,
                selected = selected_name,
                "route arbiter rejected match: low confidence"
            );
            return None;
        }

        let Some(selected) = by_name.get(&selected_name.to_lowercase()) else {
            // Never trust an out-of-set selection.
            tracing::warn!(
                selected = selected_name,
                "route arbiter selected unknown capability; rejecting"
            );
            return None;
        };

        tracing::info!(
            capability = selected.name,
            confidence,
            reason = preview(&reason, REASON_MAX_LEN),
            "route arbiter accepted match"
        );
        Some((*selected).clone())
    }
}

/// Clamp confidence to `[0.0, 1.0]`; non-numeric input normalizes to `0.0`.
#[must_use]
pub fn normalize_confidence(value: Option<&Value>) -> f64 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    number.clamp(0.0, 1.0)
}

fn build_prompt(task_description: &str, offered: &[RankedCandidate]) -> String {
    let mut candidate_blocks = String::new();
    for (idx, candidate) in offered.iter().enumerate() {
        let name_hits = join_or_none(&candidate.name_hits);
        let description_hits = join_or_none(&candidate.description_hits);
        let _ = writeln!(
            candidate_blocks,
            "{}. name={}\n   description={}\n   lexical_score={}\n   name_hits={}\n   description_hits={}",
            idx + 1,
            candidate.capability.name,
            candidate.capability.description,
            candidate.score,
            name_hits,
            description_hits,
        );
    }

    format!(
        "Select an existing capability ONLY if it clearly fits this task. \
         If uncertain, choose build_new.\n\n\
         TASK:\n{task_description}\n\n\
         CANDIDATES:\n{candidate_blocks}\n\
         Return ONLY a JSON object with exactly these keys:\n\
         {{\n\
         \x20 \"decision\": \"match\" or \"build_new\",\n\
         \x20 \"selected_name\": \"exact candidate name when decision is match, else empty string\",\n\
         \x20 \"confidence\": 0.0,\n\
         \x20 \"reason\": \"short explanation\"\n\
         }}\n\
         Rules:\n\
         - Do not rely only on lexical overlap.\n\
         - If capability fit is partial or unclear, choose build_new.\n\
         - selected_name must exactly match one candidate name when decision=match.\n"
    )
}

fn join_or_none(tokens: &std::collections::BTreeSet<String>) -> String {
    if tokens.is_empty() {
        "(none)".to_string()
    } else {
        tokens.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
