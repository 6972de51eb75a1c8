//! Provider configuration
//!
//! Everything the categorizer knows about its environment is computed here
//! once, at startup, and handed over as a plain [`ResolvedProvider`] value.

pub mod env;
pub mod providers;

pub use env::EnvSnapshot;
pub use providers::{
    find_provider, provider_env, provider_names, resolve, resolve_from_process_env,
    ProviderCandidate, ResolvedProvider, OPENAI_DEFAULT_BASE_URL, PROVIDER_CANDIDATES,
};
