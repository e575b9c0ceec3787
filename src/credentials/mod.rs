mod gate;
mod hints;

pub use gate::{
    CredentialCheck, CredentialGate, ProviderCredential, credential_found_message,
    missing_credential_message,
};
pub use hints::{
    infer_provider, normalize_provider, provider_capability_instructions, provider_profile,
    provider_runtime_auth_instructions,
};
