use ctg_llm::{LlmClient, LlmRequest};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::metrics::RunMetrics;
use crate::types::{EmittedTest, GoldenRecord, Guidance};

const TEST_EMIT_SYSTEM_PROMPT: &str = r#"You are a characterization test engineer. You are given a refactored
source file, the golden observations captured from the ORIGINAL (pre-refactor)
version of the same behavior, and guidance about side effects and
non-determinism to stub.

Write a test file, in the refactored file's own language and its test
framework's idiomatic style, that asserts the refactored code reproduces
every golden observation exactly.

Rules:
- One test case (or assertion block) per golden observation key.
- Stub the same non-deterministic sources the guidance calls out, the same way.
- If a golden key has no operation in the refactored file it could plausibly
  correspond to, do not invent one. Instead add a line comment in the test
  file of the exact form `// unmapped_golden_key: <key>` and skip it.
- Use the refactored file's real public API -- do not guess names.

Output ONLY valid JSON:
{
  "path": "<file path for the test, relative to the refactored file's directory>",
  "language": "<language id, e.g. python, java, go>",
  "content": "<the full test file source>"
}

Do not include any text outside the JSON object."#;

#[derive(Debug, Deserialize)]
struct TestEmitResponse {
    path: String,
    language: String,
    content: String,
}

/// Turns captured golden observations into an executable characterization
/// test against the refactored file.
pub struct TestEmitter<'a> {
    llm: &'a dyn LlmClient,
    metrics: &'a RunMetrics,
}

impl<'a> TestEmitter<'a> {
    pub fn new(llm: &'a dyn LlmClient, metrics: &'a RunMetrics) -> Self {
        Self { llm, metrics }
    }

    pub async fn emit(
        &self,
        refactored_file_contents: &str,
        golden_records: &[GoldenRecord],
        guidance: &Guidance,
    ) -> Result<EmittedTest, PipelineError> {
        let observations: Vec<_> = golden_records
            .iter()
            .filter(|r| r.is_captured())
            .filter_map(|r| r.observations.clone())
            .collect();

        let guidance_json = serde_json::to_string_pretty(guidance).unwrap_or_default();
        let observations_json = serde_json::to_string_pretty(&observations).unwrap_or_default();

        let request = LlmRequest::single_user_turn(
            TEST_EMIT_SYSTEM_PROMPT,
            format!(
                "Refactored source file:\n{refactored_file_contents}\n\nGolden observations:\n{observations_json}\n\nGuidance:\n{guidance_json}"
            ),
            3000,
        );

        let on_retry = || self.metrics.record_llm_retry();
        let response = ctg_llm::complete::<TestEmitResponse>(self.llm, &request, &on_retry)
            .await
            .map_err(|e| PipelineError::LlmUnavailable(e.to_string()))?;

        let unmapped_keys = find_unmapped_keys(&response.content);
        for key in &unmapped_keys {
            tracing::warn!(key, "golden key left unmapped by emitted test");
        }

        Ok(EmittedTest {
            path: response.path.into(),
            language: response.language,
            content: response.content,
        })
    }
}

/// Scans emitted test source for the `// unmapped_golden_key: <key>` marker
/// the prompt asks the model to leave when a golden key has no counterpart.
fn find_unmapped_keys(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("// unmapped_golden_key:"))
        .map(|rest| rest.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctg_llm::StubLlmClient;

    fn sample_golden() -> GoldenRecord {
        let mut observations = serde_json::Map::new();
        observations.insert("total_with_discount".into(), serde_json::json!(90.0));
        GoldenRecord {
            source_file: "invoice.py".into(),
            driver_script_path: "invoice_golden_driver.py".into(),
            observations: Some(observations),
            exit_code: 0,
            stderr_trailer: None,
            duration_ms: 12,
            coverage_pct: Some(95.0),
        }
    }

    #[tokio::test]
    async fn parses_emitted_test_from_llm_response() {
        let response = serde_json::json!({
            "path": "test_invoice_characterization.py",
            "language": "python",
            "content": "def test_total_with_discount():\n    assert invoice.total(100, 0.1) == 90.0\n"
        });
        let client = StubLlmClient::constant(&response.to_string());
        let metrics = RunMetrics::new();
        let emitter = TestEmitter::new(&client, &metrics);

        let test = emitter
            .emit("def total(amount, discount): ...", &[sample_golden()], &Guidance::default())
            .await
            .unwrap();

        assert_eq!(test.language, "python");
        assert!(test.content.contains("total_with_discount"));
    }

    #[tokio::test]
    async fn surfaces_unmapped_golden_key_markers() {
        let response = serde_json::json!({
            "path": "test_invoice_characterization.py",
            "language": "python",
            "content": "def test_total():\n    pass\n// unmapped_golden_key: legacy_tax_rounding_mode\n"
        });
        let client = StubLlmClient::constant(&response.to_string());
        let metrics = RunMetrics::new();
        let emitter = TestEmitter::new(&client, &metrics);

        let test = emitter
            .emit("def total(amount): ...", &[sample_golden()], &Guidance::default())
            .await
            .unwrap();

        assert_eq!(find_unmapped_keys(&test.content), vec!["legacy_tax_rounding_mode"]);
    }

    #[tokio::test]
    async fn ignores_uncaptured_golden_records_when_building_prompt() {
        let response = serde_json::json!({
            "path": "test_invoice_characterization.py",
            "language": "python",
            "content": "def test_noop():\n    pass\n"
        });
        let client = StubLlmClient::constant(&response.to_string());
        let metrics = RunMetrics::new();
        let emitter = TestEmitter::new(&client, &metrics);

        let failed_capture = GoldenRecord {
            source_file: "invoice.py".into(),
            driver_script_path: "invoice_golden_driver.py".into(),
            observations: None,
            exit_code: 1,
            stderr_trailer: Some("boom".into()),
            duration_ms: 5,
            coverage_pct: None,
        };

        let test = emitter
            .emit("def total(amount): ...", &[failed_capture], &Guidance::default())
            .await
            .unwrap();
        assert_eq!(test.path.to_string_lossy(), "test_invoice_characterization.py");
    }
}
