use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `conductor`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ConductorError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Routing decision ────────────────────────────────────────────────
    #[error("routing: {0}")]
    Routing(#[from] RoutingError),

    // ── Capability synthesis ────────────────────────────────────────────
    #[error("synthesis: {0}")]
    Synthesis(#[from] SynthesisError),

    // ── Registry ────────────────────────────────────────────────────────
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),

    // ── Oracle ──────────────────────────────────────────────────────────
    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Routing errors ─────────────────────────────────────────────────────────
//
// Raised only when the decision itself cannot be reached (registry down,
// decision logic threw). An ambiguous or rejected match is not an error —
// routing degrades to capability creation instead.

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("could not determine route: {0}")]
    DecisionFailed(String),
}

// ─── Synthesis errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("capability analysis returned incomplete spec fields: {field} is empty")]
    IncompleteSpec { field: &'static str },

    #[error("capability analysis did not return valid JSON")]
    MalformedSpec,

    #[error("capability analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("template '{name}' invalid: {reason}")]
    Template { name: String, reason: String },
}

// ─── Registry errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("capability name cannot be empty")]
    EmptyName,

    #[error("capability not found: {0}")]
    NotFound(String),

    #[error("sqlx: {0}")]
    Sqlx(String),
}

// ─── Oracle errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(String),

    #[error("oracle call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("oracle returned no usable JSON object")]
    Malformed,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ConductorError>;
