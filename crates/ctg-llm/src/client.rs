use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// A message in an LLM conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

/// Request to an LLM.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn single_user_turn(system_prompt: impl Into<String>, user_content: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: vec![LlmMessage {
                role: "user".into(),
                content: user_content.into(),
            }],
            max_tokens,
        }
    }
}

/// Response from an LLM.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
}

/// Facade trait for LLM providers.
///
/// `Pin<Box<dyn Future>>` keeps this dyn-compatible so the pipeline can hold
/// providers as `Arc<dyn LlmClient>` regardless of the concrete backend.
pub trait LlmClient: Send + Sync {
    fn chat<'a>(
        &'a self,
        request: &'a LlmRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>>;
}

/// Calls the Anthropic Messages API directly over `reqwest`. Temperature is
/// fixed at 0.1 so repeated calls on identical inputs tend to converge,
/// which matters for golden-capture idempotence.
pub struct AnthropicLlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

impl AnthropicLlmClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct AnthropicRequestBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: &'a [LlmMessage],
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicResponseBody {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
}

impl LlmClient for AnthropicLlmClient {
    fn chat<'a>(
        &'a self,
        request: &'a LlmRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            let body = AnthropicRequestBody {
                model: &self.model,
                max_tokens: request.max_tokens,
                temperature: 0.1,
                system: &request.system_prompt,
                messages: &request.messages,
            };

            let response = self
                .http
                .post(&self.base_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

            if !status.is_success() {
                return Err(LlmError::RequestFailed(format!(
                    "anthropic API returned {status}: {text}"
                )));
            }

            let parsed: AnthropicResponseBody =
                serde_json::from_str(&text).map_err(|e| LlmError::RequestFailed(e.to_string()))?;

            let content = parsed
                .content
                .into_iter()
                .map(|block| block.text)
                .collect::<Vec<_>>()
                .join("");

            Ok(LlmResponse { content })
        })
    }
}

/// Stub LLM client that returns deterministic responses for testing.
pub struct StubLlmClient {
    responses: Vec<String>,
    call_count: std::sync::atomic::AtomicUsize,
}

impl StubLlmClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            call_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Create a stub that always returns the given response.
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Create a stub whose every call fails, simulating exhausted retries.
    pub fn always_fails(message: &str) -> FailingLlmClient {
        FailingLlmClient {
            message: message.to_string(),
        }
    }
}

impl LlmClient for StubLlmClient {
    fn chat<'a>(
        &'a self,
        _request: &'a LlmRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            let idx = self
                .call_count
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let response = if self.responses.is_empty() {
                "stub response".to_string()
            } else {
                self.responses[idx % self.responses.len()].clone()
            };
            Ok(LlmResponse { content: response })
        })
    }
}

/// Stub client that always errors; used to exercise `LlmUnavailable`
/// degradation paths in tests.
pub struct FailingLlmClient {
    message: String,
}

impl LlmClient for FailingLlmClient {
    fn chat<'a>(
        &'a self,
        _request: &'a LlmRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LlmResponse, LlmError>> + Send + 'a>> {
        Box::pin(async move { Err(LlmError::RequestFailed(self.message.clone())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_returns_constant_response() {
        let client = StubLlmClient::constant("hello");
        let request = LlmRequest::single_user_turn("system", "hi", 100);

        let response = client.chat(&request).await.unwrap();
        assert_eq!(response.content, "hello");
    }

    #[tokio::test]
    async fn stub_cycles_through_responses() {
        let client = StubLlmClient::new(vec!["first".into(), "second".into()]);
        let request = LlmRequest::single_user_turn("system", "hi", 100);

        let r1 = client.chat(&request).await.unwrap();
        assert_eq!(r1.content, "first");
        let r2 = client.chat(&request).await.unwrap();
        assert_eq!(r2.content, "second");
        let r3 = client.chat(&request).await.unwrap();
        assert_eq!(r3.content, "first");
    }

    #[tokio::test]
    async fn failing_client_always_errors() {
        let client = StubLlmClient::always_fails("simulated outage");
        let request = LlmRequest::single_user_turn("system", "hi", 100);
        let err = client.chat(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(msg) if msg == "simulated outage"));
    }
}
