use ctg_llm::{LlmClient, LlmRequest};

use crate::error::PipelineError;
use crate::metrics::RunMetrics;
use crate::types::{ModuleMapping, Review, TestResult};

const REVIEW_SYSTEM_PROMPT: &str = r#"You are a senior engineer reviewing the result of a characterization test
run for a legacy-to-refactor migration. You are given the module mapping,
the emitted test's outcome, and a summary of what was captured.

Your job: decide whether the refactor preserved behavior, and whether any
test failures actually matter.

Consider:
- A failing test caused by a legitimate, intended behavior change is not
  a regression -- say so and explain why.
- A failing test caused by an unintended behavioral drift IS a regression.
- Call out any part of the legacy file's behavior that the golden capture
  and emitted test do NOT exercise at all (dead code paths, branches
  needing inputs the driver script didn't try, concurrency-dependent
  behavior). These become risk warnings.
- Judge each risk's severity (low/medium/high/critical) and note whether
  the emitted golden test actually covers it.

Output ONLY valid JSON:
{
  "semantic_diff": "<description of what changed in observable behavior, if anything>",
  "test_purpose": "<what the emitted test actually verifies>",
  "result_analysis": "<why the tests passed or failed>",
  "failures_ignorable": true/false,
  "failures_ignorable_reason": "<explanation, empty string if there were no failures>",
  "risk_warnings": [
    {"description": "<uncovered behavior>", "severity": "low|medium|high|critical", "tested_by_golden": false}
  ]
}

Do not include any text outside the JSON object."#;

/// Produces the behavioral review for one processed mapping.
pub struct ReviewGenerator<'a> {
    llm: &'a dyn LlmClient,
    metrics: &'a RunMetrics,
}

impl<'a> ReviewGenerator<'a> {
    pub fn new(llm: &'a dyn LlmClient, metrics: &'a RunMetrics) -> Self {
        Self { llm, metrics }
    }

    pub async fn review(
        &self,
        mapping: &ModuleMapping,
        test_results: &[TestResult],
    ) -> Result<Review, PipelineError> {
        let request = LlmRequest::single_user_turn(
            REVIEW_SYSTEM_PROMPT,
            format!(
                "Mapping:\n{}\n\nTest results:\n{}",
                serde_json::to_string_pretty(mapping).unwrap_or_default(),
                serde_json::to_string_pretty(test_results).unwrap_or_default(),
            ),
            2500,
        );

        let on_retry = || self.metrics.record_llm_retry();
        match ctg_llm::complete::<Review>(self.llm, &request, &on_retry).await {
            Ok(review) => {
                tracing::info!(
                    failures_ignorable = review.failures_ignorable,
                    risk_warnings = review.risk_warnings.len(),
                    "review generated"
                );
                Ok(review)
            }
            Err(e) => {
                tracing::warn!(error = %e, "review generation degraded");
                Ok(Review::degraded(&e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RiskSeverity, TestItem, TestStatus};
    use ctg_llm::StubLlmClient;

    fn sample_mapping() -> ModuleMapping {
        ModuleMapping {
            before_files: vec!["invoice.py".into()],
            after_files: vec!["invoice.go".into()],
        }
    }

    fn sample_results() -> Vec<TestResult> {
        vec![TestResult::from_items(
            vec![TestItem { name: "total".into(), status: TestStatus::Passed }],
            Some(92.0),
            "",
            "",
            0,
        )]
    }

    #[tokio::test]
    async fn parses_review_with_risk_warnings() {
        let response = serde_json::json!({
            "semantic_diff": "no observable change",
            "test_purpose": "verifies invoice totals",
            "result_analysis": "all assertions passed",
            "failures_ignorable": true,
            "failures_ignorable_reason": "",
            "risk_warnings": [
                {"description": "currency rounding on negative totals untested", "severity": "medium", "tested_by_golden": false}
            ]
        });
        let client = StubLlmClient::constant(&response.to_string());
        let metrics = RunMetrics::new();
        let generator = ReviewGenerator::new(&client, &metrics);

        let review = generator.review(&sample_mapping(), &sample_results()).await.unwrap();
        assert!(review.failures_ignorable);
        assert_eq!(review.risk_warnings.len(), 1);
        assert_eq!(review.risk_warnings[0].severity, RiskSeverity::Medium);
    }

    #[tokio::test(start_paused = true)]
    async fn degrades_on_llm_failure() {
        let client = StubLlmClient::always_fails("provider outage");
        let metrics = RunMetrics::new();
        let generator = ReviewGenerator::new(&client, &metrics);

        let review = generator.review(&sample_mapping(), &sample_results()).await.unwrap();
        assert!(!review.failures_ignorable);
        assert!(review.risk_warnings.is_empty());
        assert_eq!(metrics.snapshot().llm_retries, 6);
    }
}
