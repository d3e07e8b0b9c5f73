use ctg_llm::{LlmClient, LlmRequest};

use crate::error::PipelineError;
use crate::metrics::RunMetrics;
use crate::types::{Guidance, MockRecommendation};

const GUIDANCE_SYSTEM_PROMPT: &str = r#"You are a test-characterization analyst. You are given a source file and
compact signatures of the files it depends on.

Your job: identify everything that makes this file's behavior hard to pin
down with a snapshot test.

Look for:
- Observable side effects: file writes, network calls, database access, stdout/logging.
- Non-determinism sources: wall-clock time, random number generation, UUID
  generation, environment variables, iteration order over unordered
  collections, thread/process IDs.
- Seams worth stubbing so a driver script can capture deterministic output.
- The names of any external dependencies (libraries, services) this file calls out to.

Output ONLY valid JSON:
{
  "side_effects": ["<description>"],
  "mock_recommendations": [{"target": "<name of the call or object to stub>", "reason": "<why>"}],
  "nondeterminism_notes": "<summary or null>",
  "external_deps": ["<dependency name>"]
}

If the file has no side effects or non-determinism, return empty lists and
null for nondeterminism_notes. Do not include any text outside the JSON object."#;

/// Produces Guidance for a single legacy file ahead of golden capture.
pub struct GuidanceGenerator<'a> {
    llm: &'a dyn LlmClient,
    metrics: &'a RunMetrics,
}

impl<'a> GuidanceGenerator<'a> {
    pub fn new(llm: &'a dyn LlmClient, metrics: &'a RunMetrics) -> Self {
        Self { llm, metrics }
    }

    pub async fn generate(
        &self,
        file_contents: &str,
        dependency_signatures: &str,
    ) -> Result<Guidance, PipelineError> {
        let request = LlmRequest::single_user_turn(
            GUIDANCE_SYSTEM_PROMPT,
            format!(
                "Source file:\n{file_contents}\n\nDependency signatures:\n{dependency_signatures}"
            ),
            1500,
        );

        let on_retry = || self.metrics.record_llm_retry();
        match ctg_llm::complete::<Guidance>(self.llm, &request, &on_retry).await {
            Ok(guidance) => {
                tracing::info!(
                    side_effects = guidance.side_effects.len(),
                    mock_recommendations = guidance.mock_recommendations.len(),
                    "Guidance generated"
                );
                Ok(guidance)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Guidance generation degraded, using neutral default");
                Ok(Self::neutral())
            }
        }
    }

    /// Neutral all-empty Guidance used when the LLM call fails entirely.
    /// The pipeline continues with this rather than aborting the mapping.
    pub fn neutral() -> Guidance {
        Guidance {
            side_effects: vec![],
            mock_recommendations: vec![],
            nondeterminism_notes: None,
            external_deps: vec![],
            degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctg_llm::StubLlmClient;

    #[tokio::test]
    async fn parses_guidance_from_llm_response() {
        let response = serde_json::json!({
            "side_effects": ["writes to stdout"],
            "mock_recommendations": [{"target": "datetime.now", "reason": "non-deterministic timestamp"}],
            "nondeterminism_notes": "uses current time for invoice date",
            "external_deps": ["requests"]
        });
        let client = StubLlmClient::constant(&response.to_string());
        let metrics = RunMetrics::new();
        let generator = GuidanceGenerator::new(&client, &metrics);

        let guidance = generator.generate("def total(): ...", "").await.unwrap();
        assert_eq!(guidance.side_effects, vec!["writes to stdout"]);
        assert_eq!(guidance.mock_recommendations.len(), 1);
        assert_eq!(
            guidance.mock_recommendations[0],
            MockRecommendation {
                target: "datetime.now".into(),
                reason: "non-deterministic timestamp".into(),
            }
        );
        assert!(!guidance.degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn degrades_to_neutral_on_llm_failure() {
        let client = StubLlmClient::always_fails("provider outage");
        let metrics = RunMetrics::new();
        let generator = GuidanceGenerator::new(&client, &metrics);
        let guidance = generator.generate("def total(): ...", "").await.unwrap();
        assert!(guidance.degraded);
        assert!(guidance.side_effects.is_empty());
        assert_eq!(metrics.snapshot().llm_retries, 6);
    }
}
