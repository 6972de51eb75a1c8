//! LLM client module
//!
//! Chat types, the OpenAI-compatible HTTP client and the retry policy used
//! by the categorizer.

pub mod chat;
pub mod client;
pub mod retry;

pub use chat::{ChatMessage, ChatRequest, ChatResponse, MessageRole, ResponseFormat, Usage};
pub use client::{check_credentials, ChatBackend, CredentialStatus, LlmClient};
pub use retry::RetryPolicy;
