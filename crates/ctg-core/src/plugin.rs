use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::error::CoreError;

/// Outcome of running a golden-capture driver script against the legacy file.
#[derive(Debug, Clone)]
pub struct ScriptRunResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub coverage_pct: Option<f64>,
}

/// Outcome of running an emitted test file, before per-item parsing.
#[derive(Debug, Clone)]
pub struct TestRunResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub coverage_pct: Option<f64>,
}

/// Outcome of a best-effort compile/syntax check over a repo.
#[derive(Debug, Clone)]
pub struct CompileCheckResult {
    pub ok: bool,
    pub error_message: Option<String>,
}

/// Per-language hooks the orchestrator needs to capture golden behavior
/// and run emitted tests. Implementations shell out to the language's own
/// toolchain; the trait itself only describes the contract.
///
/// Uses `Pin<Box<dyn Future>>` so a registry can hold these as trait
/// objects (`Box<dyn LanguagePlugin>`).
pub trait LanguagePlugin: Send + Sync {
    /// Plugin identifier, e.g. "python", "java", "go".
    fn id(&self) -> &str;

    /// How long a single script or test invocation may run before being killed.
    fn timeout_seconds(&self) -> u64 {
        120
    }

    /// Deterministic path for the driver script generated for `source_file`.
    fn emit_script_filename(&self, source_file: &Path) -> PathBuf;

    /// Deterministic path for the test file generated for `source_file`.
    fn emit_test_filename(&self, source_file: &Path) -> PathBuf;

    /// Execute a driver script that was already written to disk, capturing
    /// stdout/stderr and line coverage of the legacy file(s).
    fn run_script<'a>(
        &'a self,
        script_path: &'a Path,
        cwd: &'a Path,
        extra_import_paths: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<ScriptRunResult, CoreError>> + Send + 'a>>;

    /// Execute an emitted test file under the language's own test runner.
    fn run_test<'a>(
        &'a self,
        test_file_path: &'a Path,
        cwd: &'a Path,
        source_files_under_test: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<TestRunResult, CoreError>> + Send + 'a>>;

    /// Best-effort syntactic/type validation of a repo.
    fn compile_check<'a>(
        &'a self,
        repo_root: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<CompileCheckResult, CoreError>> + Send + 'a>>;

    /// Parse a test runner's raw output into normalized per-item results.
    /// Default returns an empty list; language plugins override with their
    /// runner's actual format (see `ctg-pipeline::test_run` for the
    /// normalization this feeds into).
    fn parse_test_items(&self, _stdout: &str, _stderr: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Runs a subprocess with a timeout, returning captured output or a
/// `ScriptTimeout`/`ScriptExecutionFailed` error. Shared by every plugin so
/// timeout and output-capture behavior stays consistent.
pub async fn run_with_timeout(
    mut command: tokio::process::Command,
    timeout_seconds: u64,
) -> Result<(i32, String, String, u64), CoreError> {
    let start = std::time::Instant::now();
    let child = command
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| CoreError::ScriptExecutionFailed(format!("failed to spawn: {e}")))?;

    let output = tokio::time::timeout(
        std::time::Duration::from_secs(timeout_seconds),
        child.wait_with_output(),
    )
    .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    match output {
        Ok(Ok(output)) => {
            let exit_code = output.status.code().unwrap_or(-1);
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::debug!(exit_code, duration_ms, "subprocess finished");
            Ok((exit_code, stdout, stderr, duration_ms))
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed to collect subprocess output");
            Err(CoreError::ScriptExecutionFailed(format!(
                "failed to collect output: {e}"
            )))
        }
        Err(_) => {
            tracing::warn!(timeout_seconds, "subprocess exceeded its timeout, killing");
            Err(CoreError::ScriptTimeout(timeout_seconds))
        }
    }
}
