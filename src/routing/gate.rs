//! Confidence gate: classifies a ranked candidate list before any oracle
//! spend happens.

use super::ranker::RankedCandidate;
use serde::{Deserialize, Serialize};

/// Runtime-tunable routing thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteThresholds {
    /// Below this top score the lexical signal is treated as noise.
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    /// Top score required for a confident match without arbiter involvement.
    #[serde(default = "default_confident_score")]
    pub confident_score: u32,
    /// Required lead of the top score over the runner-up.
    #[serde(default = "default_confident_margin")]
    pub confident_margin: u32,
}

fn default_min_score() -> u32 {
    2
}

fn default_confident_score() -> u32 {
    7
}

fn default_confident_margin() -> u32 {
    4
}

impl Default for RouteThresholds {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            confident_score: default_confident_score(),
            confident_margin: default_confident_margin(),
        }
    }
}

impl RouteThresholds {
    /// Clamp into sane ranges: `min_score >= 1`, `confident_score >=
    /// min_score`, `confident_margin >= 1`.
    #[must_use]
    pub fn clamped(self) -> Self {
        let min_score = self.min_score.max(1);
        Self {
            min_score,
            confident_score: self.confident_score.max(min_score),
            confident_margin: self.confident_margin.max(1),
        }
    }
}

/// Outcome of the gate. `Ambiguous` is the only path that consults the
/// arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteConfidence {
    NoMatch,
    Confident,
    Ambiguous,
}

/// Classify a ranked list. A confident match requires all three of: top score
/// at or above `confident_score`, a margin of at least `confident_margin`
/// over the runner-up, and at least two distinct matched tokens.
#[must_use]
pub fn classify(ranked: &[RankedCandidate], thresholds: RouteThresholds) -> RouteConfidence {
    let Some(top) = ranked.first() else {
        return RouteConfidence::NoMatch;
    };
    if top.score < thresholds.min_score {
        return RouteConfidence::NoMatch;
    }

    let second_score = ranked.get(1).map_or(0, |candidate| candidate.score);
    let margin = top.score.saturating_sub(second_score);
    if top.score >= thresholds.confident_score
        && margin >= thresholds.confident_margin
        && top.matched_token_count >= 2
    {
        return RouteConfidence::Confident;
    }

    RouteConfidence::Ambiguous
}
