//! Lexical provider inference and per-provider API profiles.
//!
//! Deliberately a standalone, swappable classifier: the orchestrator only
//! calls [`infer_provider`], so a real classifier can replace the hint table
//! without touching the state machine.

use crate::util::slugify;

/// Substring hints mapping task language to an external provider tag.
const PROVIDER_HINTS: &[(&str, &[&str])] = &[
    (
        "google_search_console",
        &[
            "google search console",
            "search console",
            "gsc",
            "google search",
            "search impressions",
        ],
    ),
    ("google_analytics", &["google analytics", "ga4"]),
    ("stripe", &["stripe"]),
    ("shopify", &["shopify"]),
    ("hubspot", &["hubspot"]),
    ("salesforce", &["salesforce"]),
    ("github", &["github"]),
    (
        "twilio",
        &["twilio", "sms", "text message", "send sms", "send text", "mms"],
    ),
];

/// External API profile attached to synthesized capability instructions.
pub struct ApiProfile {
    pub api_name: &'static str,
    pub docs_url: &'static str,
    pub base_url: &'static str,
}

const PROVIDER_API_PROFILES: &[(&str, ApiProfile)] = &[
    (
        "google_search_console",
        ApiProfile {
            api_name: "Google Search Console API",
            docs_url: "https://developers.google.com/webmaster-tools",
            base_url: "https://www.googleapis.com/webmasters/v3",
        },
    ),
    (
        "google_analytics",
        ApiProfile {
            api_name: "Google Analytics Data API (GA4)",
            docs_url: "https://developers.google.com/analytics/devguides/reporting/data/v1",
            base_url: "https://analyticsdata.googleapis.com/v1beta",
        },
    ),
    (
        "stripe",
        ApiProfile {
            api_name: "Stripe API",
            docs_url: "https://docs.stripe.com/api",
            base_url: "https://api.stripe.com/v1",
        },
    ),
    (
        "shopify",
        ApiProfile {
            api_name: "Shopify Admin API",
            docs_url: "https://shopify.dev/docs/api",
            base_url: "https://{shop}.myshopify.com/admin/api",
        },
    ),
    (
        "hubspot",
        ApiProfile {
            api_name: "HubSpot APIs",
            docs_url: "https://developers.hubspot.com/docs/api/overview",
            base_url: "https://api.hubapi.com",
        },
    ),
    (
        "salesforce",
        ApiProfile {
            api_name: "Salesforce REST API",
            docs_url: "https://developer.salesforce.com/docs/atlas.en-us.api_rest.meta/api_rest/",
            base_url: "https://{instance}.salesforce.com/services/data",
        },
    ),
    (
        "github",
        ApiProfile {
            api_name: "GitHub REST API",
            docs_url: "https://docs.github.com/en/rest",
            base_url: "https://api.github.com",
        },
    ),
    (
        "twilio",
        ApiProfile {
            api_name: "Twilio Programmable Messaging API",
            docs_url: "https://www.twilio.com/docs/messaging/api/message-resource",
            base_url: "https://api.twilio.com/2010-04-01",
        },
    ),
];

/// Infer an external-provider dependency from free text. First hint wins in
/// table order.
#[must_use]
pub fn infer_provider(text: &str) -> Option<&'static str> {
    let haystack = text.to_lowercase();
    for (provider, hints) in PROVIDER_HINTS {
        if hints.iter().any(|hint| haystack.contains(hint)) {
            return Some(provider);
        }
    }
    None
}

/// Normalize a provider tag to `[a-z0-9_]`; empty results become `None`.
#[must_use]
pub fn normalize_provider(value: Option<&str>) -> Option<String> {
    let slug = slugify(value?.trim());
    (!slug.is_empty()).then_some(slug)
}

#[must_use]
pub fn provider_profile(provider: &str) -> Option<&'static ApiProfile> {
    PROVIDER_API_PROFILES
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, profile)| profile)
}

/// Capability-level instruction block appended to synthesized instructions
/// when a provider dependency is attached.
#[must_use]
pub fn provider_capability_instructions(provider: &str) -> String {
    let common = "- Credential source: the orchestrator injects the stored key at runtime.\n\
         - Do not ask the user for credentials when a key is already present in runtime context.";

    if let Some(profile) = provider_profile(provider) {
        format!(
            "Provider/API requirements for this capability:\n\
             - required_provider: {provider}\n\
             - use API: {}\n\
             - docs: {}\n\
             - base_url: {}\n\
             {common}\n\
             - {}",
            profile.api_name,
            profile.docs_url,
            profile.base_url,
            provider_runtime_auth_instructions(provider),
        )
    } else {
        format!(
            "Provider/API requirements for this capability:\n\
             - required_provider: {provider}\n\
             - Use the runtime credential for authenticated calls and follow provider docs.\n\
             {common}"
        )
    }
}

/// Instruction line telling the execution backend how to apply the injected
/// key.
#[must_use]
pub fn provider_runtime_auth_instructions(provider: &str) -> &'static str {
    if provider == "twilio" {
        "Twilio auth: the injected key is the API key secret. Use HTTP Basic Auth with the \
         account's API key SID as username and the injected secret as password."
    } else {
        "Use this key for authenticated API calls. Prefer Authorization: Bearer <api_key> unless \
         provider documentation clearly specifies a different header or query format."
    }
}
