use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::error::CoreError;
use crate::plugin::{CompileCheckResult, LanguagePlugin, ScriptRunResult, TestRunResult, run_with_timeout};

/// Python plugin. Runs driver scripts directly under `python3` and emitted
/// tests under `pytest`, both with `coverage.py` instrumentation.
pub struct PythonPlugin {
    python_bin: String,
    pytest_bin: String,
    timeout_seconds: u64,
}

impl PythonPlugin {
    pub fn new() -> Self {
        Self {
            python_bin: "python3".into(),
            pytest_bin: "pytest".into(),
            timeout_seconds: 120,
        }
    }

    pub fn with_python_bin(mut self, bin: impl Into<String>) -> Self {
        self.python_bin = bin.into();
        self
    }

    fn pythonpath(&self, extra_import_paths: &[PathBuf]) -> String {
        std::env::join_paths(extra_import_paths.iter())
            .map(|os| os.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl Default for PythonPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for PythonPlugin {
    fn id(&self) -> &str {
        "python"
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn emit_script_filename(&self, source_file: &Path) -> PathBuf {
        let stem = source_file.file_stem().and_then(|s| s.to_str()).unwrap_or("module");
        source_file.with_file_name(format!("{stem}_golden_driver.py"))
    }

    fn emit_test_filename(&self, source_file: &Path) -> PathBuf {
        let stem = source_file.file_stem().and_then(|s| s.to_str()).unwrap_or("module");
        source_file.with_file_name(format!("test_{stem}_characterization.py"))
    }

    fn run_script<'a>(
        &'a self,
        script_path: &'a Path,
        cwd: &'a Path,
        extra_import_paths: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<ScriptRunResult, CoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut command = tokio::process::Command::new(&self.python_bin);
            command
                .arg("-m")
                .arg("coverage")
                .arg("run")
                .arg("--branch")
                .arg(script_path)
                .current_dir(cwd)
                .env("PYTHONPATH", self.pythonpath(extra_import_paths));

            let (exit_code, stdout, stderr, duration_ms) =
                run_with_timeout(command, self.timeout_seconds).await?;

            let coverage_pct = read_coverage_report(&self.python_bin, cwd).await;

            Ok(ScriptRunResult {
                exit_code,
                stdout,
                stderr,
                duration_ms,
                coverage_pct,
            })
        })
    }

    fn run_test<'a>(
        &'a self,
        test_file_path: &'a Path,
        cwd: &'a Path,
        source_files_under_test: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<TestRunResult, CoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut command = tokio::process::Command::new(&self.pytest_bin);
            command
                .arg(test_file_path)
                .arg("-v")
                .arg("--tb=short")
                .current_dir(cwd)
                .env("PYTHONPATH", self.pythonpath(source_files_under_test));

            let (exit_code, stdout, stderr, duration_ms) =
                run_with_timeout(command, self.timeout_seconds).await?;

            let coverage_pct = read_coverage_report(&self.python_bin, cwd).await;

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
            let mut command = tokio::process::Command::new(&self.python_bin);
            command
                .arg("-m")
                .arg("py_compile")
                .arg(repo_root)
                .current_dir(repo_root);

            match run_with_timeout(command, 60).await {
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
        // pytest -v lines look like: "test_foo.py::test_bar PASSED"
        stdout
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                for status in ["PASSED", "FAILED", "ERROR", "SKIPPED"] {
                    if let Some(name) = line.strip_suffix(status) {
                        return Some((name.trim().to_string(), status.to_lowercase()));
                    }
                }
                None
            })
            .collect()
    }
}

async fn read_coverage_report(python_bin: &str, cwd: &Path) -> Option<f64> {
    if !cwd.join(".coverage").exists() {
        return None;
    }
    let output = tokio::process::Command::new(python_bin)
        .arg("-m")
        .arg("coverage")
        .arg("report")
        .arg("--format=total")
        .current_dir(cwd)
        .output()
        .await
        .ok()?;
    String::from_utf8_lossy(&output.stdout).trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_deterministic() {
        let plugin = PythonPlugin::new();
        let source = Path::new("/repo/billing/invoice.py");
        assert_eq!(
            plugin.emit_script_filename(source),
            Path::new("/repo/billing/invoice_golden_driver.py")
        );
        assert_eq!(
            plugin.emit_test_filename(source),
            Path::new("/repo/billing/test_invoice_characterization.py")
        );
    }

    #[test]
    fn parses_pytest_verbose_lines() {
        let plugin = PythonPlugin::new();
        let stdout = "test_invoice.py::test_total_matches_golden PASSED\ntest_invoice.py::test_discount FAILED\n";
        let items = plugin.parse_test_items(stdout, "");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].1, "passed");
        assert_eq!(items[1].1, "failed");
    }
}
