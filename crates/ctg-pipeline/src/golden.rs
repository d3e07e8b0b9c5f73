use std::path::{Path, PathBuf};

use ctg_core::{LanguagePlugin, normalize::normalize_observations};
use ctg_llm::{LlmClient, LlmRequest};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::metrics::RunMetrics;
use crate::types::{reduce_stderr, Guidance};
use crate::types::GoldenRecord;

const DRIVER_SYSTEM_PROMPT: &str = r#"You are a characterization test engineer writing a standalone driver
script in the SAME language as the source file provided.

Your script must:
1. Import only from the given source file and the real dependencies shown
   in its signatures -- never invent APIs.
2. Instantiate representative inputs covering normal, boundary, and edge
   cases for every public function/method in the file.
3. Stub every non-deterministic source called out in the guidance (time,
   randomness, environment, filesystem, network) with a fixed value so
   re-running the script is reproducible.
4. Print exactly one JSON object to stdout whose keys describe the
   behavior being observed (e.g. "Invoice_total_with_discount") and whose
   values are the captured outputs.
5. Exit with status 0 on success.

If the file exposes no executable surface (pure data/constants), still
instantiate each public type and print an empty JSON object `{}`.

Output ONLY valid JSON in this exact format:
{
  "script_source": "<the full driver script source, as a string>",
  "required_import_paths": ["<any additional import/search paths the script needs>"]
}

Do not include any text outside the JSON object."#;

#[derive(Debug, Deserialize)]
struct DriverScriptResponse {
    script_source: String,
    #[serde(default)]
    required_import_paths: Vec<String>,
}

/// Generates and executes the golden-capture driver script for one legacy file.
pub struct GoldenCaptureEngine<'a> {
    llm: &'a dyn LlmClient,
    plugin: &'a dyn LanguagePlugin,
    metrics: &'a RunMetrics,
}

impl<'a> GoldenCaptureEngine<'a> {
    pub fn new(llm: &'a dyn LlmClient, plugin: &'a dyn LanguagePlugin, metrics: &'a RunMetrics) -> Self {
        Self { llm, plugin, metrics }
    }

    /// Generate a driver script for `source_file`, write it next to the
    /// file, execute it, and return the normalized GoldenRecord.
    pub async fn capture(
        &self,
        source_file: &Path,
        file_contents: &str,
        dependency_signatures: &str,
        guidance: &Guidance,
    ) -> Result<GoldenRecord, PipelineError> {
        let script_path = self.plugin.emit_script_filename(source_file);

        let driver = match self.generate_driver(file_contents, dependency_signatures, guidance).await {
            Ok(driver) => driver,
            Err(e) => {
                tracing::warn!(error = %e, file = %source_file.display(), "driver generation failed");
                return Ok(GoldenRecord {
                    source_file: source_file.to_path_buf(),
                    driver_script_path: script_path,
                    observations: None,
                    exit_code: -2,
                    stderr_trailer: Some(e.to_string()),
                    duration_ms: 0,
                    coverage_pct: None,
                });
            }
        };

        tokio::fs::write(&script_path, &driver.script_source).await?;

        let cwd = script_path.parent().unwrap_or_else(|| Path::new("."));
        let extra_paths: Vec<PathBuf> = driver.required_import_paths.iter().map(PathBuf::from).collect();

        let run = match self.plugin.run_script(&script_path, cwd, &extra_paths).await {
            Ok(run) => run,
            Err(e) => {
                let (exit_code, message) = match &e {
                    ctg_core::CoreError::ScriptTimeout(secs) => (-1, format!("timed out after {secs}s")),
                    other => (-3, other.to_string()),
                };
                return Ok(GoldenRecord {
                    source_file: source_file.to_path_buf(),
                    driver_script_path: script_path,
                    observations: None,
                    exit_code,
                    stderr_trailer: Some(message),
                    duration_ms: 0,
                    coverage_pct: None,
                });
            }
        };

        let observations = if run.exit_code == 0 {
            serde_json::from_str::<serde_json::Value>(run.stdout.trim())
                .ok()
                .and_then(|v| v.as_object().cloned())
                .map(|map| normalize_observations(&map))
        } else {
            None
        };

        Ok(GoldenRecord {
            source_file: source_file.to_path_buf(),
            driver_script_path: script_path,
            observations,
            exit_code: run.exit_code,
            stderr_trailer: if run.stderr.is_empty() { None } else { Some(reduce_stderr(&run.stderr)) },
            duration_ms: run.duration_ms,
            coverage_pct: run.coverage_pct,
        })
    }

    async fn generate_driver(
        &self,
        file_contents: &str,
        dependency_signatures: &str,
        guidance: &Guidance,
    ) -> Result<DriverScriptResponse, PipelineError> {
        let guidance_json = serde_json::to_string_pretty(guidance).unwrap_or_default();
        let request = LlmRequest::single_user_turn(
            DRIVER_SYSTEM_PROMPT,
            format!(
                "Source file:\n{file_contents}\n\nDependency signatures:\n{dependency_signatures}\n\nGuidance:\n{guidance_json}"
            ),
            3000,
        );

        let on_retry = || self.metrics.record_llm_retry();
        ctg_llm::complete::<DriverScriptResponse>(self.llm, &request, &on_retry)
            .await
            .map_err(|e| PipelineError::LlmUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctg_core::plugins::python::PythonPlugin;
    use ctg_llm::StubLlmClient;

    #[tokio::test]
    async fn driver_generation_failure_yields_unscaptured_record() {
        let llm = StubLlmClient::always_fails("outage");
        let plugin = PythonPlugin::new();
        let metrics = RunMetrics::new();
        let engine = GoldenCaptureEngine::new(&llm, &plugin, &metrics);

        let record = engine
            .capture(Path::new("/repo/invoice.py"), "def total(): pass", "", &Guidance::default())
            .await
            .unwrap();

        assert!(!record.is_captured());
        assert_eq!(record.exit_code, -2);
        assert_eq!(metrics.snapshot().llm_retries, 6);
    }
}
