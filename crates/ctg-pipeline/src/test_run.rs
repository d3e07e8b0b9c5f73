use std::path::Path;

use ctg_core::LanguagePlugin;

use crate::error::PipelineError;
use crate::types::{reduce_stderr, EmittedTest, TestItem, TestResult, TestStatus};

/// Executes an emitted test file under its language's own runner and
/// normalizes the result into a `TestResult`.
pub struct TestRunner<'a> {
    plugin: &'a dyn LanguagePlugin,
}

impl<'a> TestRunner<'a> {
    pub fn new(plugin: &'a dyn LanguagePlugin) -> Self {
        Self { plugin }
    }

    pub async fn run(
        &self,
        test: &EmittedTest,
        cwd: &Path,
        source_files_under_test: &[std::path::PathBuf],
    ) -> Result<TestResult, PipelineError> {
        tokio::fs::write(&test.path, &test.content).await?;

        let run = match self.plugin.run_test(&test.path, cwd, source_files_under_test).await {
            Ok(run) => run,
            Err(e) => {
                let message = match &e {
                    ctg_core::CoreError::ScriptTimeout(secs) => format!("timed out after {secs}s"),
                    other => other.to_string(),
                };
                return Ok(TestResult::runner_crash("", &message, -1));
            }
        };

        let raw_items = self.plugin.parse_test_items(&run.stdout, &run.stderr);
        if raw_items.is_empty() && run.exit_code != 0 {
            return Ok(TestResult::runner_crash(
                &run.stdout,
                &reduce_stderr(&run.stderr),
                run.exit_code,
            ));
        }

        let items = raw_items
            .into_iter()
            .map(|(name, status)| TestItem {
                name,
                status: parse_status(&status),
            })
            .collect();

        Ok(TestResult::from_items(
            items,
            run.coverage_pct,
            &run.stdout,
            &run.stderr,
            run.exit_code,
        ))
    }
}

fn parse_status(status: &str) -> TestStatus {
    match status {
        "passed" | "pass" | "ok" => TestStatus::Passed,
        "failed" | "fail" => TestStatus::Failed,
        "skipped" | "skip" => TestStatus::Skipped,
        _ => TestStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctg_core::plugins::python::PythonPlugin;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_test_file_before_running() {
        let dir = tempdir().unwrap();
        let plugin = PythonPlugin::new();
        let runner = TestRunner::new(&plugin);

        let test = EmittedTest {
            path: dir.path().join("test_invoice_characterization.py"),
            language: "python".into(),
            content: "def test_noop():\n    pass\n".into(),
        };

        // This will attempt to invoke pytest, which may not exist in every
        // environment; we only assert the file is persisted before the
        // runner is invoked at all.
        let _ = runner.run(&test, dir.path(), &[]).await;
        assert!(test.path.exists());
    }

    #[test]
    fn parse_status_maps_known_variants() {
        assert_eq!(parse_status("passed"), TestStatus::Passed);
        assert_eq!(parse_status("failed"), TestStatus::Failed);
        assert_eq!(parse_status("skipped"), TestStatus::Skipped);
        assert_eq!(parse_status("weird"), TestStatus::Error);
    }
}
