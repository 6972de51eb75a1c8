//! OpenAI-compatible HTTP client
//!
//! Every supported provider (DeepSeek, MiniMax, ZhiPu, DashScope, OpenAI and
//! a local Ollama) speaks the OpenAI chat-completions dialect, so one client
//! covers them all. The [`ChatBackend`] trait is the seam the categorizer
//! depends on.

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client as HttpClient, StatusCode,
};
use tokio::time::Duration;
use tracing::debug;

use super::chat::{ChatRequest, ChatResponse};
use crate::config::ResolvedProvider;
use crate::error::{LlmError, Result};
use crate::util::{bearer_token, join_url, normalize_base_url};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CREDENTIAL_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can answer a chat-completion request
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

/// Main LLM Client
pub struct LlmClient {
    base_url: String,
    headers: HeaderMap,
    http_client: HttpClient,
}

impl LlmClient {
    /// Build a client for `provider`, validating its endpoint and credential
    pub fn new(provider: &ResolvedProvider) -> Result<Self> {
        let base_url = normalize_base_url(provider.base_url(), "base URL").map_err(config_error)?;
        let headers = build_headers(&provider.credential)?;

        let http_client = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("memcat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(LlmClient {
            base_url,
            headers,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = join_url(&self.base_url, "chat/completions");
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            structured = request.response_format.is_some(),
            "Chat request to {}",
            url
        );

        let response = self
            .http_client
            .post(&url)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message: provider_error_message(&body),
            });
        }

        let text = response.text().await?;
        let body: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            LlmError::malformed(format!("unexpected chat completion body: {}", e))
        })?;

        if let Some(usage) = body.usage {
            debug!(
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                total = usage.total_tokens,
                "Chat completed"
            );
        }

        Ok(body)
    }
}

fn config_error(err: anyhow::Error) -> LlmError {
    LlmError::InvalidConfig {
        message: format!("{:#}", err),
    }
}

fn build_headers(credential: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let auth_value = bearer_token(credential).map_err(config_error)?;
    let auth_value = HeaderValue::from_str(&auth_value).map_err(|e| LlmError::InvalidConfig {
        message: format!("invalid Authorization header: {}", e),
    })?;
    headers.insert(AUTHORIZATION, auth_value);

    Ok(headers)
}

/// Pull `error.message` out of an OpenAI-style error body, else the raw body
fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "Unknown error".to_string()
            } else {
                trimmed.chars().take(500).collect()
            }
        })
}

/// Outcome of probing a provider with its credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStatus {
    Valid,
    Invalid { reason: String },
}

impl CredentialStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, CredentialStatus::Valid)
    }

    fn invalid(reason: impl Into<String>) -> Self {
        CredentialStatus::Invalid {
            reason: reason.into(),
        }
    }

    fn from_status(status: StatusCode) -> Self {
        match status {
            s if s.is_success() => CredentialStatus::Valid,
            StatusCode::UNAUTHORIZED => Self::invalid("API key is invalid or expired"),
            StatusCode::FORBIDDEN => Self::invalid("API key lacks permission"),
            // Rate limited, but the key itself was accepted
            StatusCode::TOO_MANY_REQUESTS => CredentialStatus::Valid,
            s => Self::invalid(format!("HTTP {}", s)),
        }
    }
}

/// Check that `provider` accepts its credential by listing models
///
/// The local Ollama endpoint needs no credential and is not probed.
pub async fn check_credentials(provider: &ResolvedProvider) -> CredentialStatus {
    if provider.is_local() {
        return CredentialStatus::Valid;
    }

    let base_url = match normalize_base_url(provider.base_url(), "base URL") {
        Ok(url) => url,
        Err(e) => return CredentialStatus::invalid(format!("{:#}", e)),
    };
    let headers = match build_headers(&provider.credential) {
        Ok(headers) => headers,
        Err(e) => return CredentialStatus::invalid(e.to_string()),
    };

    let result = HttpClient::new()
        .get(join_url(&base_url, "models"))
        .headers(headers)
        .timeout(CREDENTIAL_CHECK_TIMEOUT)
        .send()
        .await;

    match result {
        Ok(response) => CredentialStatus::from_status(response.status()),
        Err(e) => match LlmError::from(e) {
            LlmError::Timeout { .. } => CredentialStatus::invalid("connection timed out"),
            LlmError::ConnectionFailed { message } => {
                CredentialStatus::invalid(format!("network error: {}", message))
            }
            other => CredentialStatus::invalid(other.to_string()),
        },
    }
}
