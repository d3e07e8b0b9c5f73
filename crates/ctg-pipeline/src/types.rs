use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// An immutable pairing of legacy files to their refactored counterparts,
/// as handed down by the upstream planner. The generator never edits either
/// side; it only reads from them and writes generated artifacts alongside
/// the refactored files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleMapping {
    pub before_files: Vec<PathBuf>,
    pub after_files: Vec<PathBuf>,
}

/// One file in the externally supplied dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepGraphNode {
    pub path: PathBuf,
    pub lang: String,
    pub ext: String,
}

/// A directed edge from a file to something it depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepGraphEdge {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub kind: String,
}

/// The dependency graph handed down by the upstream planner, used to bound
/// signature resolution to direct (depth-1) dependencies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepGraph {
    #[serde(default)]
    pub nodes: Vec<DepGraphNode>,
    #[serde(default)]
    pub edges: Vec<DepGraphEdge>,
}

impl DepGraph {
    /// Direct (depth-1) dependencies of `file`.
    pub fn direct_dependencies(&self, file: &std::path::Path) -> Vec<PathBuf> {
        self.edges
            .iter()
            .filter(|e| e.src == file)
            .map(|e| e.dst.clone())
            .collect()
    }
}

/// A suggested stub point: something non-deterministic the driver script
/// must replace with a fixed value before capturing behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockRecommendation {
    pub target: String,
    pub reason: String,
}

/// Guidance produced per legacy file: side effects, non-determinism, and
/// stubbing recommendations that inform both the golden-capture driver and
/// the emitted test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Guidance {
    #[serde(default)]
    pub side_effects: Vec<String>,
    #[serde(default)]
    pub mock_recommendations: Vec<MockRecommendation>,
    #[serde(default)]
    pub nondeterminism_notes: Option<String>,
    #[serde(default)]
    pub external_deps: Vec<String>,
    /// Set when the LLM call that would have produced this Guidance failed
    /// and this is the neutral fallback instead.
    #[serde(default)]
    pub degraded: bool,
}

/// The golden behavioral snapshot captured from a legacy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenRecord {
    pub source_file: PathBuf,
    pub driver_script_path: PathBuf,
    /// Observation map, normalized. `None` when capture failed.
    pub observations: Option<serde_json::Map<String, serde_json::Value>>,
    pub exit_code: i32,
    /// Last 4 KiB of stderr, kept for diagnosis when capture fails.
    pub stderr_trailer: Option<String>,
    pub duration_ms: u64,
    pub coverage_pct: Option<f64>,
}

impl GoldenRecord {
    pub fn is_captured(&self) -> bool {
        self.exit_code == 0 && self.observations.is_some()
    }
}

/// A test file emitted by the Test Emitter, in the target language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmittedTest {
    pub path: PathBuf,
    pub language: String,
    pub content: String,
}

/// Status of a single test item after normalization across runner formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestItem {
    pub name: String,
    pub status: TestStatus,
}

/// Outcome of running one emitted test file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub errored: u32,
    pub skipped: u32,
    pub items: Vec<TestItem>,
    pub coverage_pct: Option<f64>,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub exit_code: i32,
}

impl TestResult {
    pub fn from_items(items: Vec<TestItem>, coverage_pct: Option<f64>, stdout: &str, stderr: &str, exit_code: i32) -> Self {
        let mut result = Self {
            total: items.len() as u32,
            passed: 0,
            failed: 0,
            errored: 0,
            skipped: 0,
            items,
            coverage_pct,
            stdout_tail: tail(stdout, 4096),
            stderr_tail: tail(stderr, 4096),
            exit_code,
        };
        for item in &result.items {
            match item.status {
                TestStatus::Passed => result.passed += 1,
                TestStatus::Failed => result.failed += 1,
                TestStatus::Error => result.errored += 1,
                TestStatus::Skipped => result.skipped += 1,
            }
        }
        result
    }

    /// A result synthesized when the runner produced no parseable items at all.
    pub fn runner_crash(stdout: &str, stderr: &str, exit_code: i32) -> Self {
        Self::from_items(
            vec![TestItem {
                name: "<runner_failure>".into(),
                status: TestStatus::Error,
            }],
            None,
            stdout,
            stderr,
            exit_code,
        )
    }
}

/// Truncate stderr to its last 4 KiB, for attaching to a failed GoldenRecord
/// or TestResult without retaining unbounded output.
pub fn reduce_stderr(s: &str) -> String {
    tail(s, 4096)
}

fn tail(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let start = s.len() - max_bytes;
    let boundary = (start..s.len()).find(|&i| s.is_char_boundary(i)).unwrap_or(start);
    s[boundary..].to_string()
}

/// Severity of a risk a Review surfaces that the golden snapshot doesn't cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWarning {
    pub description: String,
    pub severity: RiskSeverity,
    pub tested_by_golden: bool,
}

/// The LLM-authored semantic-diff analysis for one mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub semantic_diff: String,
    pub test_purpose: String,
    pub result_analysis: String,
    pub failures_ignorable: bool,
    pub failures_ignorable_reason: String,
    pub risk_warnings: Vec<RiskWarning>,
}

impl Review {
    /// Neutral Review used when the review LLM call itself degrades.
    pub fn degraded(reason: &str) -> Self {
        Self {
            semantic_diff: "review unavailable".into(),
            test_purpose: "review unavailable".into(),
            result_analysis: "review unavailable".into(),
            failures_ignorable: false,
            failures_ignorable_reason: reason.into(),
            risk_warnings: vec![],
        }
    }
}

/// Per-mapping lifecycle state. Soft LLM-step failures land in `Degraded`
/// rather than aborting the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingState {
    Pending,
    Capturing,
    Emitting,
    Running,
    Reviewing,
    Done,
    Degraded,
    Failed,
}

/// Aggregate record for one processed mapping: the mapping itself plus
/// every stage's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub mapping: ModuleMapping,
    pub state: MappingState,
    pub golden_records: Vec<GoldenRecord>,
    pub emitted_tests: Vec<EmittedTest>,
    pub test_results: Vec<TestResult>,
    pub tested_functions: Vec<String>,
}

/// Aggregate summary for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub build_success: bool,
    pub build_error: Option<String>,
    pub overall_pass_rate: f64,
    pub overall_coverage_pct: f64,
    pub total_modules: u32,
    pub total_passed: u32,
    pub total_failed: u32,
    pub total_errored: u32,
}

/// The full output of one run: the three report files' contents in memory,
/// before they're serialized to `<artifacts_root>/<run_id>/*.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub summary: RunSummary,
    pub modules: Vec<ModuleRecord>,
    pub reviews: Vec<Review>,
    pub overall_assessment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_aggregates_counts_from_items() {
        let items = vec![
            TestItem { name: "a".into(), status: TestStatus::Passed },
            TestItem { name: "b".into(), status: TestStatus::Failed },
            TestItem { name: "c".into(), status: TestStatus::Skipped },
        ];
        let result = TestResult::from_items(items, Some(80.0), "out", "err", 1);
        assert_eq!(result.total, 3);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errored, 0);
    }

    #[test]
    fn runner_crash_synthesizes_single_error_item() {
        let result = TestResult::runner_crash("", "segfault", -11);
        assert_eq!(result.total, 1);
        assert_eq!(result.errored, 1);
        assert_eq!(result.items[0].name, "<runner_failure>");
    }

    #[test]
    fn golden_record_is_captured_requires_zero_exit_and_observations() {
        let mut record = GoldenRecord {
            source_file: "a.py".into(),
            driver_script_path: "a_golden_driver.py".into(),
            observations: Some(serde_json::Map::new()),
            exit_code: 0,
            stderr_trailer: None,
            duration_ms: 10,
            coverage_pct: None,
        };
        assert!(record.is_captured());
        record.exit_code = 1;
        assert!(!record.is_captured());
    }
}
