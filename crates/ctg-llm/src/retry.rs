use serde::de::DeserializeOwned;

use crate::client::{LlmClient, LlmRequest};
use crate::error::LlmError;
use crate::json::extract_json;

const BASE_BACKOFF: std::time::Duration = std::time::Duration::from_secs(1);
const MAX_BACKOFF: std::time::Duration = std::time::Duration::from_secs(60);
const MAX_ATTEMPTS: u32 = 6;

/// Calls `client.chat(request)`, retrying with exponential backoff (base 1s,
/// cap 60s) on transient failures up to `MAX_ATTEMPTS` times. Returns
/// `LlmError::Unavailable` once attempts are exhausted.
///
/// `on_retry` fires once per failed attempt, before the backoff sleep (if
/// any) -- callers use it to feed a retry counter into their own metrics
/// without this crate needing to know what a metrics backend looks like.
pub async fn chat_with_retry(
    client: &dyn LlmClient,
    request: &LlmRequest,
    on_retry: &dyn Fn(),
) -> Result<String, LlmError> {
    let mut last_error = String::new();
    for attempt in 0..MAX_ATTEMPTS {
        match client.chat(request).await {
            Ok(response) => return Ok(response.content),
            Err(e) => {
                last_error = e.to_string();
                tracing::warn!(attempt = attempt + 1, error = %last_error, "LLM call failed, retrying");
                on_retry();
                if attempt + 1 < MAX_ATTEMPTS {
                    let backoff = std::cmp::min(BASE_BACKOFF * 2u32.pow(attempt), MAX_BACKOFF);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
    Err(LlmError::Unavailable {
        attempts: MAX_ATTEMPTS,
        last_error,
    })
}

/// Calls the LLM with retry, then parses the response into `T` via the
/// 3-strategy JSON extraction. On a first parse failure, asks the model to
/// repair its own output once before giving up with `SchemaInvalid`.
///
/// `on_retry` is forwarded to every `chat_with_retry` call this makes,
/// including the repair turn, so a caller's retry count covers both.
pub async fn complete<T: DeserializeOwned>(
    client: &dyn LlmClient,
    request: &LlmRequest,
    on_retry: &dyn Fn(),
) -> Result<T, LlmError> {
    let raw = chat_with_retry(client, request, on_retry).await?;

    if let Some(parsed) = extract_json::<T>(&raw) {
        return Ok(parsed);
    }

    tracing::warn!(raw_response = %raw, "LLM response failed schema validation, requesting repair");

    let repair_request = LlmRequest::single_user_turn(
        request.system_prompt.clone(),
        format!(
            "Your previous response could not be parsed as the required JSON schema. \
             Here is what you sent:\n\n{raw}\n\nRespond again with ONLY the corrected JSON object, \
             no surrounding text."
        ),
        request.max_tokens,
    );

    let repaired = chat_with_retry(client, &repair_request, on_retry).await?;
    extract_json::<T>(&repaired).ok_or_else(|| LlmError::SchemaInvalid(repaired))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StubLlmClient;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn complete_parses_clean_json() {
        let client = StubLlmClient::constant(r#"{"value": 42}"#);
        let request = LlmRequest::single_user_turn("sys", "go", 100);
        let parsed: Sample = complete(&client, &request, &|| {}).await.unwrap();
        assert_eq!(parsed, Sample { value: 42 });
    }

    #[tokio::test]
    async fn complete_repairs_once_then_succeeds() {
        let client = StubLlmClient::new(vec!["not json at all".into(), r#"{"value": 7}"#.into()]);
        let request = LlmRequest::single_user_turn("sys", "go", 100);
        let parsed: Sample = complete(&client, &request, &|| {}).await.unwrap();
        assert_eq!(parsed, Sample { value: 7 });
    }

    #[tokio::test]
    async fn complete_fails_schema_invalid_after_repair_attempt() {
        let client = StubLlmClient::constant("never valid json");
        let request = LlmRequest::single_user_turn("sys", "go", 100);
        let err = complete::<Sample>(&client, &request, &|| {}).await.unwrap_err();
        assert!(matches!(err, LlmError::SchemaInvalid(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn chat_with_retry_gives_up_after_max_attempts() {
        let client = StubLlmClient::always_fails("down");
        let request = LlmRequest::single_user_turn("sys", "go", 100);
        let err = chat_with_retry(&client, &request, &|| {}).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable { attempts: 6, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn chat_with_retry_invokes_hook_once_per_failed_attempt() {
        let client = StubLlmClient::always_fails("down");
        let request = LlmRequest::single_user_turn("sys", "go", 100);
        let retries = std::sync::atomic::AtomicU32::new(0);
        let _ = chat_with_retry(&client, &request, &|| {
            retries.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        })
        .await;
        assert_eq!(retries.load(std::sync::atomic::Ordering::Relaxed), 6);
    }
}
