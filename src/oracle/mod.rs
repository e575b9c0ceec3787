mod extract;
mod http;

pub use extract::extract_json_object;
pub use http::HttpOracle;

use std::future::Future;
use std::pin::Pin;

/// Narrow seam to the external decision oracle shared by the arbiter and the
/// capability synthesizer.
///
/// The contract is deliberately loose on the wire: the oracle returns free
/// text that *should* contain a single JSON object. Callers run the response
/// through [`extract_json_object`] and treat extraction failure as a failed
/// call, never as a panic or a propagated error.
pub trait Oracle: Send + Sync {
    /// Oracle identifier for log lines (e.g. "openai").
    fn name(&self) -> &str;

    fn infer<'a>(
        &'a self,
        system_prompt: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}
