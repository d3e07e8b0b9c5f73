use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::error::CoreError;
use crate::plugin::{CompileCheckResult, LanguagePlugin, ScriptRunResult, TestRunResult, run_with_timeout};

/// Go plugin. Driver scripts run via `go run`; emitted tests run via
/// `go test -json` so per-item results come out machine-parseable.
pub struct GoPlugin {
    go_bin: String,
    timeout_seconds: u64,
}

impl GoPlugin {
    pub fn new() -> Self {
        Self {
            go_bin: "go".into(),
            timeout_seconds: 120,
        }
    }
}

impl Default for GoPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for GoPlugin {
    fn id(&self) -> &str {
        "go"
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn emit_script_filename(&self, source_file: &Path) -> PathBuf {
        let stem = source_file.file_stem().and_then(|s| s.to_str()).unwrap_or("module");
        source_file.with_file_name(format!("{stem}_golden_driver.go"))
    }

    fn emit_test_filename(&self, source_file: &Path) -> PathBuf {
        let stem = source_file.file_stem().and_then(|s| s.to_str()).unwrap_or("module");
        source_file.with_file_name(format!("{stem}_characterization_test.go"))
    }

    fn run_script<'a>(
        &'a self,
        script_path: &'a Path,
        cwd: &'a Path,
        _extra_import_paths: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<ScriptRunResult, CoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut command = tokio::process::Command::new(&self.go_bin);
            command.arg("run").arg(script_path).current_dir(cwd);

            let (exit_code, stdout, stderr, duration_ms) =
                run_with_timeout(command, self.timeout_seconds).await?;

            Ok(ScriptRunResult {
                exit_code,
                stdout,
                stderr,
                duration_ms,
                coverage_pct: None,
            })
        })
    }

    fn run_test<'a>(
        &'a self,
        test_file_path: &'a Path,
        cwd: &'a Path,
        _source_files_under_test: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<TestRunResult, CoreError>> + Send + 'a>> {
        Box::pin(async move {
            let package_dir = test_file_path.parent().unwrap_or(cwd);
            let coverage_file = cwd.join("go_coverage.out");

            let mut command = tokio::process::Command::new(&self.go_bin);
            command
                .arg("test")
                .arg("-json")
                .arg(format!("-coverprofile={}", coverage_file.display()))
                .arg(package_dir)
                .current_dir(cwd);

            let (exit_code, stdout, stderr, duration_ms) =
                run_with_timeout(command, self.timeout_seconds).await?;

            let coverage_pct = read_go_coverage(cwd, &self.go_bin, &coverage_file).await;

            Ok(TestRunResult {
                exit_code,
                stdout,
                stderr,
                duration_ms,
                coverage_pct,
            })
        })
    }

    fn compile_check<'a>(
        &'a self,
        repo_root: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<CompileCheckResult, CoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut command = tokio::process::Command::new(&self.go_bin);
            command.arg("build").arg("./...").current_dir(repo_root);

            match run_with_timeout(command, 90).await {
                Ok((0, _, _, _)) => Ok(CompileCheckResult {
                    ok: true,
                    error_message: None,
                }),
                Ok((_, _, stderr, _)) => Ok(CompileCheckResult {
                    ok: false,
                    error_message: Some(stderr),
                }),
                Err(e) => Ok(CompileCheckResult {
                    ok: false,
                    error_message: Some(e.to_string()),
                }),
            }
        })
    }

    fn parse_test_items(&self, stdout: &str, _stderr: &str) -> Vec<(String, String)> {
        // `go test -json` emits one JSON object per line with an "Action" field
        // of run/pass/fail/skip and a "Test" field naming the subtest. Order
        // matters (matches the runner's reporting order), so we keep first-seen
        // position in `items` and just look up the index to update status in
        // place when a later line updates the same test.
        let mut items: Vec<(String, String)> = Vec::new();
        let mut index_of: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for line in stdout.lines() {
            let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
                continue;
            };
            let (Some(action), Some(test)) = (
                value.get("Action").and_then(|v| v.as_str()),
                value.get("Test").and_then(|v| v.as_str()),
            ) else {
                continue;
            };
            let status = match action {
                "pass" => "passed",
                "fail" => "failed",
                "skip" => "skipped",
                _ => continue,
            };
            if let Some(&i) = index_of.get(test) {
                items[i].1 = status.to_string();
            } else {
                index_of.insert(test.to_string(), items.len());
                items.push((test.to_string(), status.to_string()));
            }
        }
        items
    }
}

async fn read_go_coverage(cwd: &Path, go_bin: &str, coverage_file: &Path) -> Option<f64> {
    if !coverage_file.exists() {
        return None;
    }
    let mut command = tokio::process::Command::new(go_bin);
    command.arg("tool").arg("cover").arg("-func").arg(coverage_file).current_dir(cwd);
    let output = command.output().await.ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let last_line = stdout.lines().last()?;
    let pct_str = last_line.split_whitespace().last()?.trim_end_matches('%');
    pct_str.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_snake_case() {
        let plugin = GoPlugin::new();
        let source = Path::new("/repo/billing/invoice.go");
        assert_eq!(
            plugin.emit_script_filename(source),
            Path::new("/repo/billing/invoice_golden_driver.go")
        );
        assert_eq!(
            plugin.emit_test_filename(source),
            Path::new("/repo/billing/invoice_characterization_test.go")
        );
    }

    #[test]
    fn parses_go_test_json_lines_in_runner_order() {
        let plugin = GoPlugin::new();
        // Deliberately reverse-alphabetical so a stray sort would be caught.
        let stdout = concat!(
            r#"{"Action":"run","Test":"TestZebra"}"#, "\n",
            r#"{"Action":"pass","Test":"TestZebra"}"#, "\n",
            r#"{"Action":"run","Test":"TestAardvark"}"#, "\n",
            r#"{"Action":"fail","Test":"TestAardvark"}"#, "\n",
        );
        let items = plugin.parse_test_items(stdout, "");
        assert_eq!(
            items,
            vec![
                ("TestZebra".to_string(), "passed".to_string()),
                ("TestAardvark".to_string(), "failed".to_string()),
            ]
        );
    }

    #[test]
    fn repeated_action_line_for_same_test_updates_status_in_place() {
        let plugin = GoPlugin::new();
        // `go test -json` can report the same test twice under `-count=2` or
        // when a parent test re-emits a status for a subtest; the later line
        // should overwrite the status without moving the test's position.
        let stdout = concat!(
            r#"{"Action":"run","Test":"TestFlaky"}"#, "\n",
            r#"{"Action":"pass","Test":"TestFlaky"}"#, "\n",
            r#"{"Action":"run","Test":"TestStable"}"#, "\n",
            r#"{"Action":"pass","Test":"TestStable"}"#, "\n",
            r#"{"Action":"fail","Test":"TestFlaky"}"#, "\n",
        );
        let items = plugin.parse_test_items(stdout, "");
        assert_eq!(
            items,
            vec![
                ("TestFlaky".to_string(), "failed".to_string()),
                ("TestStable".to_string(), "passed".to_string()),
            ]
        );
    }
}
