pub mod client;
pub mod credentials;
pub mod error;
pub mod json;
pub mod retry;

pub use client::{AnthropicLlmClient, LlmClient, LlmMessage, LlmRequest, LlmResponse, StubLlmClient};
pub use credentials::CredentialResolver;
pub use error::LlmError;
pub use json::extract_json;
pub use retry::{chat_with_retry, complete};
