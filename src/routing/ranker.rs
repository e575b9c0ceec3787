//! Weighted lexical-overlap ranking of capabilities against a task.

use super::tokenizer::tokenize;
use crate::registry::Capability;
use std::collections::BTreeSet;

/// Weight applied to name-token overlap. Name overlap is a stronger
/// reusability signal than description overlap.
const NAME_HIT_WEIGHT: u32 = 3;

/// Per-request match evidence for one capability. Never persisted.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub capability: Capability,
    pub score: u32,
    pub name_hits: BTreeSet<String>,
    pub description_hits: BTreeSet<String>,
    pub matched_token_count: usize,
}

/// Score every capability against the task and return candidates sorted
/// descending by `(score, matched_token_count, |name_hits|)`.
///
/// Candidates with zero score are dropped. The sort is stable, so full ties
/// keep registration order for determinism.
#[must_use]
pub fn rank(task: &str, capabilities: &[Capability]) -> Vec<RankedCandidate> {
    let task_tokens = tokenize(task);
    if task_tokens.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<RankedCandidate> = capabilities
        .iter()
        .filter_map(|capability| score_candidate(&task_tokens, capability))
        .collect();

    ranked.sort_by(|a, b| {
        (b.score, b.matched_token_count, b.name_hits.len()).cmp(&(
            a.score,
            a.matched_token_count,
            a.name_hits.len(),
        ))
    });
    ranked
}

fn score_candidate(
    task_tokens: &BTreeSet<String>,
    capability: &Capability,
) -> Option<RankedCandidate> {
    let name_hits: BTreeSet<String> = task_tokens
        .intersection(&tokenize(&capability.name))
        .cloned()
        .collect();
    let description_hits: BTreeSet<String> = task_tokens
        .intersection(&tokenize(&capability.description))
        .cloned()
        .collect();

    let score = NAME_HIT_WEIGHT * u32::try_from(name_hits.len()).unwrap_or(u32::MAX)
        + u32::try_from(description_hits.len()).unwrap_or(u32::MAX);
    if score == 0 {
        return None;
    }

    let matched_token_count = name_hits.union(&description_hits).count();
    Some(RankedCandidate {
        capability: capability.clone(),
        score,
        name_hits,
        description_hits,
        matched_token_count,
    })
}
