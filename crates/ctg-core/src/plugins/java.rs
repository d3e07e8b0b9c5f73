use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::error::CoreError;
use crate::plugin::{CompileCheckResult, LanguagePlugin, ScriptRunResult, TestRunResult, run_with_timeout};

/// Java plugin. Compiles with `javac` into a scratch directory, then runs
/// the driver/test class with `java` on the resulting classpath.
pub struct JavaPlugin {
    javac_bin: String,
    java_bin: String,
    timeout_seconds: u64,
}

impl JavaPlugin {
    pub fn new() -> Self {
        Self {
            javac_bin: "javac".into(),
            java_bin: "java".into(),
            timeout_seconds: 180,
        }
    }

    fn classpath(&self, extra: &[PathBuf]) -> String {
        std::env::join_paths(extra.iter())
            .map(|os| os.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn class_name(source_file: &Path) -> String {
        source_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Module")
            .to_string()
    }
}

impl Default for JavaPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguagePlugin for JavaPlugin {
    fn id(&self) -> &str {
        "java"
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn emit_script_filename(&self, source_file: &Path) -> PathBuf {
        let class = Self::class_name(source_file);
        source_file.with_file_name(format!("{class}GoldenDriver.java"))
    }

    fn emit_test_filename(&self, source_file: &Path) -> PathBuf {
        let class = Self::class_name(source_file);
        source_file.with_file_name(format!("{class}CharacterizationTest.java"))
    }

    fn run_script<'a>(
        &'a self,
        script_path: &'a Path,
        cwd: &'a Path,
        extra_import_paths: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<ScriptRunResult, CoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut javac = tokio::process::Command::new(&self.javac_bin);
            javac
                .arg("-d")
                .arg(cwd)
                .arg("-cp")
                .arg(self.classpath(extra_import_paths))
                .arg(script_path)
                .current_dir(cwd);

            let (exit_code, stdout, stderr, compile_ms) = run_with_timeout(javac, 60).await?;
            if exit_code != 0 {
                return Ok(ScriptRunResult {
                    exit_code,
                    stdout,
                    stderr,
                    duration_ms: compile_ms,
                    coverage_pct: None,
                });
            }

            let class_name = Self::class_name(script_path);
            let mut run = tokio::process::Command::new(&self.java_bin);
            run.arg("-cp").arg(cwd).arg(&class_name).current_dir(cwd);

            let (exit_code, stdout, stderr, duration_ms) =
                run_with_timeout(run, self.timeout_seconds).await?;

            Ok(ScriptRunResult {
                exit_code,
                stdout,
                stderr,
                duration_ms: compile_ms + duration_ms,
                coverage_pct: None,
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
            let mut javac = tokio::process::Command::new(&self.javac_bin);
            javac
                .arg("-d")
                .arg(cwd)
                .arg("-cp")
                .arg(self.classpath(source_files_under_test))
                .arg(test_file_path)
                .current_dir(cwd);

            let (exit_code, stdout, stderr, compile_ms) = run_with_timeout(javac, 60).await?;
            if exit_code != 0 {
                return Ok(TestRunResult {
                    exit_code,
                    stdout,
                    stderr,
                    duration_ms: compile_ms,
                    coverage_pct: None,
                });
            }

            let class_name = Self::class_name(test_file_path);
            let mut run = tokio::process::Command::new(&self.java_bin);
            run.arg("-cp").arg(cwd).arg(&class_name).current_dir(cwd);

            let (exit_code, stdout, stderr, duration_ms) =
                run_with_timeout(run, self.timeout_seconds).await?;

            Ok(TestRunResult {
                exit_code,
                stdout,
                stderr,
                duration_ms: compile_ms + duration_ms,
                coverage_pct: None,
            })
        })
    }

    fn compile_check<'a>(
        &'a self,
        repo_root: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<CompileCheckResult, CoreError>> + Send + 'a>> {
        Box::pin(async move {
            let tmp = tempfile::tempdir()?;
            let mut command = tokio::process::Command::new(&self.javac_bin);
            command
                .arg("-d")
                .arg(tmp.path())
                .arg("-Xlint:none")
                .arg(repo_root)
                .current_dir(repo_root);

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
        // Our hand-rolled JUnit-style runner prints "TEST <name> <STATUS>" lines.
        stdout
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                let rest = line.strip_prefix("TEST ")?;
                let (name, status) = rest.rsplit_once(' ')?;
                Some((name.to_string(), status.to_lowercase()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_use_pascal_case_class_name() {
        let plugin = JavaPlugin::new();
        let source = Path::new("/repo/src/Invoice.java");
        assert_eq!(
            plugin.emit_script_filename(source),
            Path::new("/repo/src/InvoiceGoldenDriver.java")
        );
        assert_eq!(
            plugin.emit_test_filename(source),
            Path::new("/repo/src/InvoiceCharacterizationTest.java")
        );
    }

    #[test]
    fn parses_hand_rolled_runner_output() {
        let plugin = JavaPlugin::new();
        let stdout = "TEST total_matches_golden PASSED\nTEST discount_applies FAILED\n";
        let items = plugin.parse_test_items(stdout, "");
        assert_eq!(items, vec![
            ("total_matches_golden".to_string(), "passed".to_string()),
            ("discount_applies".to_string(), "failed".to_string()),
        ]);
    }
}
