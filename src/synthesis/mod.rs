//! Capability synthesizer: derives a generalized, reusable capability spec
//! from a single task description via the oracle contract.

use crate::error::SynthesisError;
use crate::oracle::{Oracle, extract_json_object};
use crate::util::{normalize_text_field, slugify};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const NAME_MAX_LEN: usize = 64;
const DESCRIPTION_MAX_LEN: usize = 240;
const INSTRUCTIONS_MAX_LEN: usize = 2400;

/// Analysis calls are cheaper than executions; cap them well below the
/// execution timeout.
const ANALYSIS_TIMEOUT_CAP_SECS: u64 = 45;

const SYNTHESIS_SYSTEM_PROMPT: &str =
    "You generate reusable capability specifications for an orchestrator system. \
     Bias toward category-level capabilities with broad reuse when tasks share the \
     same execution strategy. \
     When external services are required, force concrete provider/API selection instead of \
     generic 'figure it out' language. \
     Output strict JSON only.";

/// A normalized capability spec, ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedSpec {
    pub name: String,
    pub description: String,
    pub instructions: String,
}

pub struct CapabilitySynthesizer {
    oracle: Arc<dyn Oracle>,
    timeout_secs: u64,
}

impl CapabilitySynthesizer {
    pub fn new(oracle: Arc<dyn Oracle>, timeout_secs: u64) -> Self {
        Self {
            oracle,
            timeout_secs,
        }
    }

    /// Ask the oracle for a generalized capability spec and normalize it.
    ///
    /// A malformed or incomplete spec fails the whole request — nothing
    /// half-formed is ever persisted.
    pub async fn synthesize(
        &self,
        task_description: &str,
        name_hint: &str,
    ) -> Result<SynthesizedSpec, SynthesisError> {
        let prompt = build_analysis_prompt(task_description);
        let timeout = Duration::from_secs(self.timeout_secs.min(ANALYSIS_TIMEOUT_CAP_SECS));

        let response =
            match tokio::time::timeout(timeout, self.oracle.infer(SYNTHESIS_SYSTEM_PROMPT, &prompt))
                .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(error)) => {
                    tracing::error!("capability analysis failed: {error:#}");
                    return Err(SynthesisError::AnalysisFailed(format!("{error:#}")));
                }
                Err(_) => {
                    return Err(SynthesisError::AnalysisFailed(format!(
                        "analysis timed out after {}s",
                        timeout.as_secs()
                    )));
                }
            };

        let parsed = extract_json_object(&response).ok_or(SynthesisError::MalformedSpec)?;
        let spec = normalize_spec(&parsed, name_hint)?;
        tracing::info!(name = spec.name, "synthesized reusable capability spec");
        Ok(spec)
    }
}

/// Normalize raw oracle output into a persistable spec. Empty description or
/// instructions after normalization is a hard failure.
fn normalize_spec(
    parsed: &serde_json::Map<String, Value>,
    name_hint: &str,
) -> Result<SynthesizedSpec, SynthesisError> {
    let field = |key: &str| parsed.get(key).and_then(Value::as_str).unwrap_or_default();

    let name = normalize_capability_name(field("name"), name_hint);
    let description = normalize_text_field(field("description"), DESCRIPTION_MAX_LEN);
    let instructions = normalize_text_field(field("system_prompt"), INSTRUCTIONS_MAX_LEN);

    if description.is_empty() {
        return Err(SynthesisError::IncompleteSpec {
            field: "description",
        });
    }
    if instructions.is_empty() {
        return Err(SynthesisError::IncompleteSpec {
            field: "instructions",
        });
    }

    Ok(SynthesizedSpec {
        name,
        description,
        instructions,
    })
}

/// Slugify a proposed capability name, force the `auto_` prefix, and cap the
/// length. Falls back to the routing name hint, then to a generic slug.
#[must_use]
pub fn normalize_capability_name(proposed: &str, fallback_hint: &str) -> String {
    let mut slug = slugify(proposed);
    if slug.is_empty() {
        slug = slugify(fallback_hint);
    }
    if slug.is_empty() {
        slug = "auto_general_task_automation".to_string();
    }
    if !slug.starts_with("auto_") {
        slug = format!("auto_{slug}");
    }
    if slug.len() > NAME_MAX_LEN {
        slug.truncate(NAME_MAX_LEN);
    }
    slug.trim_end_matches('_').to_string()
}

fn build_analysis_prompt(task_description: &str) -> String {
    format!(
        "Analyze this task and design a reusable capability spec that can solve future similar \
         requests, not just this one instance.\n\n\
         TASK:\n{task_description}\n\n\
         Return ONLY a JSON object with exactly these keys:\n\
         {{\n\
         \x20 \"name\": \"auto_snake_case_name\",\n\
         \x20 \"description\": \"one-sentence reusable capability summary\",\n\
         \x20 \"system_prompt\": \"multi-sentence reusable instructions\"\n\
         }}\n\n\
         Rules:\n\
         - Generalize across target entities, date ranges, geographies, and filters.\n\
         - Prefer capability categories that cover multiple related tasks using the same \
         execution strategy (same runtime, commands, tools, or API family).\n\
         - If neighboring requests can be handled with the same shell command family or API \
         calls, create one broader capability instead of a metric-specific one.\n\
         - Example: RAM usage request -> auto_system_resources_check (broader), not \
         auto_system_memory_check (too narrow).\n\
         - Do not hardcode a single person/company/date.\n\
         - Avoid request-instance words in names such as current, today, one_user, or a \
         single metric when a category name fits.\n\
         - If the task requires an external integration, pick a concrete API/provider by name \
         in system_prompt (not vague wording).\n\
         - Explicitly include the API name and a docs URL in system_prompt when a provider is needed.\n\
         - Example: SMS sending tasks should specify Twilio Programmable Messaging API and \
         mention the Message Resource endpoint.\n\
         - Keep name concise, snake_case, and prefixed with auto_.\n\
         - Description should describe the capability class and reusable scope, not one request.\n\
         - system_prompt should tell the handler to choose exact commands or API operations \
         dynamically per task inside that category.\n"
    )
}

/// Load a fixed capability template from a JSON file. Every field is
/// required and must be a non-empty string.
pub async fn load_template(path: &Path) -> Result<SynthesizedSpec, SynthesisError> {
    let template_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|error| SynthesisError::Template {
            name: template_name.clone(),
            reason: format!("read failed: {error}"),
        })?;

    let parsed: Value =
        serde_json::from_str(&raw).map_err(|error| SynthesisError::Template {
            name: template_name.clone(),
            reason: format!("not valid JSON: {error}"),
        })?;
    let Value::Object(object) = parsed else {
        return Err(SynthesisError::Template {
            name: template_name,
            reason: "must be a JSON object".to_string(),
        });
    };

    let required = |key: &str| {
        let value = object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if value.is_empty() {
            return Err(SynthesisError::Template {
                name: template_name.clone(),
                reason: format!("missing required field '{key}'"),
            });
        }
        Ok(value.to_string())
    };

    Ok(SynthesizedSpec {
        name: required("name")?,
        description: required("description")?,
        instructions: required("system_prompt")?,
    })
}
