mod sqlite;

pub use sqlite::SqliteRegistry;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Auth status of a capability. Mutated only through [`Registry::update_auth`]
/// by the credential gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    Ready,
    NeedsCredential,
}

impl CapabilityStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::NeedsCredential => "needs_credential",
        }
    }

    /// Parse a stored status string. Unknown values degrade to `Ready` so a
    /// schema drift never poisons ranking reads.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "needs_credential" => Self::NeedsCredential,
            _ => Self::Ready,
        }
    }
}

/// A named, reusable task-handling spec: description plus execution
/// instructions, optionally tied to an external provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub status: CapabilityStatus,
    pub required_provider: Option<String>,
}

/// Insert payload for [`Registry::insert_if_absent`]. The id and timestamps
/// are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewCapability {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub status: CapabilityStatus,
    pub required_provider: Option<String>,
}

/// Durable capability store. The registry is the single source of truth; the
/// core never caches capability lists across requests.
///
/// `insert_if_absent` is atomic on the lower-cased name: under concurrent
/// duplicate creation, whichever row wins the unique constraint is returned
/// to every caller.
pub trait Registry: Send + Sync {
    fn find_all(&self)
    -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Capability>>> + Send + '_>>;

    fn find_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Capability>>> + Send + 'a>>;

    fn insert_if_absent<'a>(
        &'a self,
        spec: &'a NewCapability,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Capability>> + Send + 'a>>;

    fn update_auth<'a>(
        &'a self,
        id: &'a str,
        status: CapabilityStatus,
        required_provider: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<Capability>>> + Send + 'a>>;

    fn get_credential<'a>(
        &'a self,
        provider: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + 'a>>;

    fn store_credential<'a>(
        &'a self,
        provider: &'a str,
        secret: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        assert_eq!(CapabilityStatus::parse("ready"), CapabilityStatus::Ready);
        assert_eq!(
            CapabilityStatus::parse("needs_credential"),
            CapabilityStatus::NeedsCredential
        );
        assert_eq!(CapabilityStatus::Ready.as_str(), "ready");
        assert_eq!(
            CapabilityStatus::NeedsCredential.as_str(),
            "needs_credential"
        );
    }

    #[test]
    fn unknown_status_degrades_to_ready() {
        assert_eq!(CapabilityStatus::parse("archived"), CapabilityStatus::Ready);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&CapabilityStatus::NeedsCredential).unwrap();
        assert_eq!(json, "\"needs_credential\"");
    }
}
