//! LLM provider registry and resolution
//!
//! Cloud providers are tried in priority order; the first one whose
//! credential variable is set wins. When none is configured, a local
//! Ollama endpoint is used if `LLM_PROVIDER=ollama` or `OLLAMA_HOST` is
//! present. Otherwise categorization is disabled.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

use super::env::{EnvSnapshot, LLM_MODEL, LLM_PROVIDER, OLLAMA_HOST};

/// Endpoint used when a provider has no endpoint of its own
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const CREDENTIAL_SUFFIX: &str = "_API_KEY";
const BASE_URL_SUFFIX: &str = "_BASE_URL";

/// A cloud provider that may be selected by setting its credential variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCandidate {
    /// Short lowercase name (`deepseek`, `openai`, ...)
    pub name: &'static str,
    pub display_name: &'static str,
    /// Environment variable holding the API key
    pub credential_env_key: &'static str,
    /// Default endpoint; `None` means the OpenAI default
    pub endpoint_url: Option<&'static str>,
    pub default_model: &'static str,
    /// Whether the provider can constrain replies to a JSON schema
    pub supports_structured_output: bool,
    pub description: &'static str,
}

impl ProviderCandidate {
    /// Name of the variable that overrides this provider's endpoint
    pub fn base_url_env_key(&self) -> String {
        self.credential_env_key.replace(CREDENTIAL_SUFFIX, BASE_URL_SUFFIX)
    }
}

/// Priority-ordered cloud providers
pub const PROVIDER_CANDIDATES: [ProviderCandidate; 5] = [
    ProviderCandidate {
        name: "deepseek",
        display_name: "DeepSeek",
        credential_env_key: "DEEPSEEK_API_KEY",
        endpoint_url: Some("https://api.deepseek.com"),
        default_model: "deepseek-chat",
        supports_structured_output: false,
        description: "Good value, strong Chinese-language ability",
    },
    ProviderCandidate {
        name: "minimax",
        display_name: "MiniMax",
        credential_env_key: "MINIMAX_API_KEY",
        endpoint_url: Some("https://api.minimax.chat/v1"),
        default_model: "abab6.5s-chat",
        supports_structured_output: false,
        description: "Fast responses",
    },
    ProviderCandidate {
        name: "zhipu",
        display_name: "ZhiPu AI",
        credential_env_key: "ZHIPU_API_KEY",
        endpoint_url: Some("https://open.bigmodel.cn/api/paas/v4"),
        default_model: "glm-4-flash",
        supports_structured_output: false,
        description: "GLM model family",
    },
    ProviderCandidate {
        name: "qwen",
        display_name: "Qwen (DashScope)",
        credential_env_key: "DASHSCOPE_API_KEY",
        endpoint_url: Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
        default_model: "qwen-turbo",
        supports_structured_output: false,
        description: "Alibaba Cloud hosted models",
    },
    ProviderCandidate {
        name: "openai",
        display_name: "OpenAI",
        credential_env_key: "OPENAI_API_KEY",
        endpoint_url: None,
        default_model: "gpt-4o-mini",
        supports_structured_output: true,
        description: "Supports structured output",
    },
];

/// Local Ollama fallback
pub mod ollama {
    pub const NAME: &str = "ollama";
    pub const DISPLAY_NAME: &str = "Ollama (local)";
    pub const DEFAULT_HOST: &str = "http://localhost:11434";
    pub const DEFAULT_MODEL: &str = "qwen2.5:7b";
    /// The OpenAI-compatible Ollama endpoint ignores auth but requires a token
    pub const DUMMY_CREDENTIAL: &str = "ollama";
    pub const DESCRIPTION: &str = "Runs locally, no API key needed";

    pub(crate) fn base_url(host: &str) -> String {
        format!("{}/v1", host.trim_end_matches('/'))
    }
}

/// The provider chosen for this process
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub name: String,
    pub credential: String,
    /// `None` means the OpenAI default endpoint
    pub endpoint_url: Option<String>,
    pub model_id: String,
    pub supports_structured_output: bool,
}

impl ResolvedProvider {
    /// Endpoint requests are sent to
    pub fn base_url(&self) -> &str {
        self.endpoint_url
            .as_deref()
            .unwrap_or(OPENAI_DEFAULT_BASE_URL)
    }

    pub fn is_local(&self) -> bool {
        self.name == ollama::NAME
    }
}

// Keeps the credential out of logs and panic messages
impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("name", &self.name)
            .field("credential", &"<redacted>")
            .field("endpoint_url", &self.endpoint_url)
            .field("model_id", &self.model_id)
            .field("supports_structured_output", &self.supports_structured_output)
            .finish()
    }
}

/// Pick the provider configured by `env`, if any
pub fn resolve(env: &EnvSnapshot) -> Option<ResolvedProvider> {
    let resolved = resolve_cloud(env).or_else(|| resolve_local(env));

    match &resolved {
        Some(provider) => info!(
            provider = %provider.name,
            model = %provider.model_id,
            "Using LLM provider: {}, model: {}",
            provider.name,
            provider.model_id
        ),
        None => warn!("No LLM provider configured; memory categorization is disabled"),
    }

    resolved
}

/// Snapshot the process environment and resolve it
pub fn resolve_from_process_env() -> Option<ResolvedProvider> {
    resolve(&EnvSnapshot::from_process())
}

fn resolve_cloud(env: &EnvSnapshot) -> Option<ResolvedProvider> {
    PROVIDER_CANDIDATES.iter().find_map(|candidate| {
        let credential = env.get(candidate.credential_env_key)?;

        let endpoint_url = env
            .get(&candidate.base_url_env_key())
            .map(str::to_string)
            .or_else(|| candidate.endpoint_url.map(str::to_string));

        let model_id = env
            .get(LLM_MODEL)
            .unwrap_or(candidate.default_model)
            .to_string();

        Some(ResolvedProvider {
            name: candidate.name.to_string(),
            credential: credential.to_string(),
            endpoint_url,
            model_id,
            supports_structured_output: candidate.supports_structured_output,
        })
    })
}

fn resolve_local(env: &EnvSnapshot) -> Option<ResolvedProvider> {
    let selected = env
        .get(LLM_PROVIDER)
        .is_some_and(|p| p.eq_ignore_ascii_case(ollama::NAME));

    if !selected && !env.is_set(OLLAMA_HOST) {
        return None;
    }

    let host = env.get(OLLAMA_HOST).unwrap_or(ollama::DEFAULT_HOST);

    Some(ResolvedProvider {
        name: ollama::NAME.to_string(),
        credential: ollama::DUMMY_CREDENTIAL.to_string(),
        endpoint_url: Some(ollama::base_url(host)),
        model_id: env
            .get(LLM_MODEL)
            .unwrap_or(ollama::DEFAULT_MODEL)
            .to_string(),
        supports_structured_output: false,
    })
}

/// Look up a cloud provider by short name (case-insensitive)
pub fn find_provider(name: &str) -> Option<&'static ProviderCandidate> {
    PROVIDER_CANDIDATES
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Every selectable provider name, cloud providers first, then `ollama`
pub fn provider_names() -> impl Iterator<Item = &'static str> {
    PROVIDER_CANDIDATES
        .iter()
        .map(|c| c.name)
        .chain(std::iter::once(ollama::NAME))
}

/// Environment block that selects `name` on the next start
///
/// Returns `None` for an unknown provider. The credential is included only
/// when `api_key` is given. The OpenAI endpoint is the client default and
/// is therefore not written out.
pub fn provider_env(name: &str, api_key: Option<&str>) -> Option<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();

    if name.eq_ignore_ascii_case(ollama::NAME) {
        env.insert(LLM_MODEL.to_string(), ollama::DEFAULT_MODEL.to_string());
        env.insert(LLM_PROVIDER.to_string(), ollama::NAME.to_string());
        return Some(env);
    }

    let candidate = find_provider(name)?;

    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        env.insert(candidate.credential_env_key.to_string(), key.to_string());
    }
    if let Some(url) = candidate.endpoint_url {
        env.insert(candidate.base_url_env_key(), url.to_string());
    }
    env.insert(LLM_MODEL.to_string(), candidate.default_model.to_string());
    env.insert(LLM_PROVIDER.to_string(), candidate.name.to_string());

    Some(env)
}
