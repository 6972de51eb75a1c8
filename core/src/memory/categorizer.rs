use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::prompt::{
    categories_schema, JSON_ONLY_INSTRUCTION, MEMORY_CATEGORIZATION_PROMPT, RESPONSE_SCHEMA_NAME,
};
use crate::config::{resolve_from_process_env, ResolvedProvider};
use crate::error::{CategorizeError, LlmError};
use crate::llm::{
    ChatBackend, ChatMessage, ChatRequest, ChatResponse, LlmClient, ResponseFormat, RetryPolicy,
};

/// Output contract of a categorization call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCategories {
    pub categories: Vec<String>,
}

struct Engine {
    provider: ResolvedProvider,
    backend: Arc<dyn ChatBackend>,
}

/// Assigns category labels to memories using the resolved provider
///
/// Without a provider every call returns an empty list and nothing is sent.
pub struct MemoryCategorizer {
    engine: Option<Engine>,
    retry: RetryPolicy,
    prompt: String,
}

impl MemoryCategorizer {
    /// Build a categorizer talking HTTP to `provider`
    ///
    /// Fails with [`LlmError::InvalidConfig`] only when the provider's
    /// endpoint or credential cannot be used to build requests, such as a
    /// blank credential or a base URL without a scheme.
    pub fn new(provider: Option<ResolvedProvider>) -> Result<Self, LlmError> {
        match provider {
            Some(provider) => {
                let client = LlmClient::new(&provider)?;
                Ok(Self::with_backend(provider, Arc::new(client)))
            }
            None => Ok(Self::disabled()),
        }
    }

    /// Resolve the provider from the process environment and build a categorizer
    ///
    /// An unusable credential or `*_BASE_URL` is reported here as
    /// [`LlmError::InvalidConfig`]. Callers handle it once at startup; it is
    /// separate from `categorize`, which degrades to an empty list.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::new(resolve_from_process_env())
    }

    /// Use a caller-supplied backend for `provider`
    pub fn with_backend(provider: ResolvedProvider, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            engine: Some(Engine { provider, backend }),
            retry: RetryPolicy::default(),
            prompt: MEMORY_CATEGORIZATION_PROMPT.to_string(),
        }
    }

    /// A categorizer with no provider
    pub fn disabled() -> Self {
        Self {
            engine: None,
            retry: RetryPolicy::default(),
            prompt: MEMORY_CATEGORIZATION_PROMPT.to_string(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the system prompt
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn provider(&self) -> Option<&ResolvedProvider> {
        self.engine.as_ref().map(|e| &e.provider)
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.is_some()
    }

    /// Categorize a memory
    ///
    /// Returns lower-cased, trimmed category names. Missing configuration,
    /// provider errors and unparseable replies all yield an empty list on
    /// the first attempt. Transport failures are retried; once the retry
    /// policy is exhausted the last one is returned as an error.
    pub async fn categorize(&self, memory: &str) -> Result<Vec<String>, CategorizeError> {
        let Some(engine) = &self.engine else {
            warn!("No LLM provider configured, skipping categorization");
            return Ok(Vec::new());
        };

        let request = self.build_request(&engine.provider, memory);
        let structured = engine.provider.supports_structured_output;
        let backend = engine.backend.as_ref();
        let request = &request;

        let outcome = self
            .retry
            .run(|attempt| async move {
                debug!(attempt, structured, "Requesting categories");
                let response = backend.chat(request).await?;
                if structured {
                    parse_structured_response(&response)
                } else {
                    parse_free_text_response(&response)
                }
            })
            .await?;

        match outcome {
            Ok(categories) => Ok(categories),
            Err(e) => {
                error!(provider = %engine.provider.name, "Failed to get categories: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Like [`Self::categorize`], but exhausted retries also yield an empty list
    pub async fn categorize_or_empty(&self, memory: &str) -> Vec<String> {
        match self.categorize(memory).await {
            Ok(categories) => categories,
            Err(e) => {
                error!("Giving up on categorization: {}", e);
                Vec::new()
            }
        }
    }

    fn build_request(&self, provider: &ResolvedProvider, memory: &str) -> ChatRequest {
        let mut messages = vec![
            ChatMessage::system(self.prompt.as_str()),
            ChatMessage::user(memory),
        ];

        let request = if provider.supports_structured_output {
            ChatRequest::new(provider.model_id.as_str(), messages).with_response_format(
                ResponseFormat::json_schema(RESPONSE_SCHEMA_NAME, categories_schema()),
            )
        } else {
            messages.push(ChatMessage::user(JSON_ONLY_INSTRUCTION));
            ChatRequest::new(provider.model_id.as_str(), messages)
        };

        request.with_temperature(0.0)
    }
}

/// Structured-output replies are trusted to match the declared schema
fn parse_structured_response(response: &ChatResponse) -> Result<Vec<String>, LlmError> {
    let content = match response.content() {
        Some(content) => content,
        None => {
            let refusal = response
                .choices
                .first()
                .and_then(|c| c.message.refusal.as_deref());
            return Err(match refusal {
                Some(reason) => LlmError::malformed(format!("model refused: {}", reason)),
                None => LlmError::malformed("structured response has no content"),
            });
        }
    };

    let parsed: MemoryCategories = serde_json::from_str(content)?;
    Ok(normalize(parsed.categories))
}

fn parse_free_text_response(response: &ChatResponse) -> Result<Vec<String>, LlmError> {
    match response.content() {
        Some(content) if !content.is_empty() => categories_from_text(content),
        _ => Ok(Vec::new()),
    }
}

/// Pull the category list out of a free-text reply
///
/// Only the text between the first `{` and the last `}` is decoded. No
/// JSON object, or an object without `categories`, yields an empty list.
pub fn categories_from_text(text: &str) -> Result<Vec<String>, LlmError> {
    let Some(object) = extract_json_object(text) else {
        debug!("No JSON object in response");
        return Ok(Vec::new());
    };

    let Some(raw) = object.get("categories") else {
        debug!("Response JSON has no 'categories' key");
        return Ok(Vec::new());
    };

    let items = raw
        .as_array()
        .ok_or_else(|| LlmError::malformed("'categories' is not an array"))?;

    let categories = items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| LlmError::malformed(format!("category is not a string: {}", item)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(normalize(categories))
}

/// Decode the span from the first `{` to the last `}` as JSON
pub fn extract_json_object(text: &str) -> Option<Value> {
    let text = text.trim();
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn normalize(categories: Vec<String>) -> Vec<String> {
    categories
        .into_iter()
        .map(|c| c.trim().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::llm::MessageRole;

    /// Replays canned results and records every request it receives
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<ChatResponse, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_request(&self) -> ChatRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected chat call")
        }
    }

    fn provider(structured: bool) -> ResolvedProvider {
        ResolvedProvider {
            name: if structured { "openai" } else { "deepseek" }.to_string(),
            credential: "sk-test".to_string(),
            endpoint_url: None,
            model_id: if structured { "gpt-4o-mini" } else { "deepseek-chat" }.to_string(),
            supports_structured_output: structured,
        }
    }

    fn reply(content: &str) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse::from_content(content))
    }

    fn refused() -> Result<ChatResponse, LlmError> {
        Err(LlmError::ConnectionFailed {
            message: "connection refused".to_string(),
        })
    }

    fn categorizer(structured: bool, backend: &Arc<ScriptedBackend>) -> MemoryCategorizer {
        MemoryCategorizer::with_backend(provider(structured), backend.clone())
    }

    #[tokio::test]
    async fn test_disabled_returns_empty() {
        let categorizer = MemoryCategorizer::new(None).unwrap();
        assert!(!categorizer.is_enabled());
        assert!(categorizer.provider().is_none());
        assert_eq!(categorizer.categorize("Went hiking").await.unwrap(), Vec::<String>::new());
        assert!(categorizer.categorize_or_empty("Went hiking").await.is_empty());
    }

    #[test]
    fn test_unusable_provider_is_a_startup_error() {
        let blank = ResolvedProvider {
            credential: "   ".to_string(),
            ..provider(false)
        };
        assert!(matches!(
            MemoryCategorizer::new(Some(blank)),
            Err(LlmError::InvalidConfig { .. })
        ));

        let schemeless = ResolvedProvider {
            endpoint_url: Some("api.deepseek.com".to_string()),
            ..provider(false)
        };
        assert!(matches!(
            MemoryCategorizer::new(Some(schemeless)),
            Err(LlmError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_structured_output() {
        let backend = ScriptedBackend::new(vec![reply(r#"{"categories": ["Sports"]}"#)]);
        let categorizer = categorizer(true, &backend);

        let categories = categorizer.categorize("Won the tennis match").await.unwrap();
        assert_eq!(categories, vec!["sports"]);

        let request = backend.last_request();
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert_eq!(request.messages[0].content, MEMORY_CATEGORIZATION_PROMPT);
        assert_eq!(request.messages[1], ChatMessage::user("Won the tennis match"));
        assert_eq!(
            request.response_format,
            Some(ResponseFormat::json_schema("MemoryCategories", categories_schema()))
        );
    }

    #[tokio::test]
    async fn test_free_text_with_surrounding_prose() {
        let backend = ScriptedBackend::new(vec![reply(
            r#"Here are the categories: {"categories": ["Personal", " Work "]}"#,
        )]);
        let categorizer = categorizer(false, &backend);

        let categories = categorizer.categorize("Promoted at work").await.unwrap();
        assert_eq!(categories, vec!["personal", "work"]);

        let request = backend.last_request();
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.response_format.is_none());
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[2], ChatMessage::user(JSON_ONLY_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_unusable_free_text_replies_yield_empty_without_retry() {
        for content in [
            "I could not decide.",
            "} backwards {",
            r#"{"categories": ["unterminated"}"#,
            r#"{"labels": ["work"]}"#,
            r#"{"categories": [1, 2]}"#,
            r#"{"categories": "work"}"#,
            "",
        ] {
            let backend = ScriptedBackend::new(vec![reply(content)]);
            let categorizer = categorizer(false, &backend);

            let categories = categorizer.categorize("memory").await.unwrap();
            assert!(categories.is_empty(), "reply {:?} produced {:?}", content, categories);
            assert_eq!(backend.calls(), 1, "reply {:?} was retried", content);
        }
    }

    #[tokio::test]
    async fn test_malformed_structured_reply_yields_empty() {
        let backend = ScriptedBackend::new(vec![reply("categories: sports")]);
        let categorizer = categorizer(true, &backend);

        assert!(categorizer.categorize("memory").await.unwrap().is_empty());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_is_not_retried() {
        let backend = ScriptedBackend::new(vec![Err(LlmError::Provider {
            status: 429,
            message: "rate limited".to_string(),
        })]);
        let categorizer = categorizer(false, &backend);

        assert!(categorizer.categorize("memory").await.unwrap().is_empty());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_are_retried() {
        let backend = ScriptedBackend::new(vec![
            refused(),
            refused(),
            reply(r#"{"categories": ["Travel"]}"#),
        ]);
        let categorizer = categorizer(false, &backend);

        let categories = categorizer.categorize("Flew to Lisbon").await.unwrap();
        assert_eq!(categories, vec!["travel"]);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_transport_failure_propagates() {
        let backend = ScriptedBackend::new(vec![refused(), refused(), refused()]);
        let categorizer = categorizer(false, &backend);

        let err = categorizer.categorize("memory").await.unwrap_err();
        assert!(matches!(err, CategorizeError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_categorize_or_empty_swallows_exhaustion() {
        let backend = ScriptedBackend::new(vec![refused(), refused()]);
        let categorizer = categorizer(false, &backend).with_retry_policy(RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        });

        assert!(categorizer.categorize_or_empty("memory").await.is_empty());
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_custom_prompt() {
        let backend = ScriptedBackend::new(vec![reply(r#"{"categories": ["Rust"]}"#)]);
        let categorizer = categorizer(false, &backend).with_prompt("Tag programming notes.");

        assert_eq!(categorizer.categorize("borrowck").await.unwrap(), vec!["rust"]);
        assert_eq!(backend.last_request().messages[0].content, "Tag programming notes.");
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(
            extract_json_object("  prefix {\"a\": {\"b\": 1}} suffix } "),
            None
        );
        assert_eq!(
            extract_json_object("```json\n{\"a\": {\"b\": 1}}\n```"),
            Some(serde_json::json!({"a": {"b": 1}}))
        );
        assert_eq!(extract_json_object("no braces here"), None);
        assert_eq!(extract_json_object("{"), None);
    }

    #[test]
    fn test_categories_from_text_normalizes() {
        assert_eq!(
            categories_from_text(r#"{"categories": ["  AI, ML & Technology ", "WORK"]}"#).unwrap(),
            vec!["ai, ml & technology", "work"]
        );
        assert_eq!(
            categories_from_text(r#"{"categories": []}"#).unwrap(),
            Vec::<String>::new()
        );
    }
}
