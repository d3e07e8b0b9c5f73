use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ctg_core::{DependencySignatureResolver, PluginRegistry};
use ctg_llm::LlmClient;

use crate::error::PipelineError;
use crate::golden::GoldenCaptureEngine;
use crate::guidance::GuidanceGenerator;
use crate::metrics::RunMetrics;
use crate::review::ReviewGenerator;
use crate::test_emit::TestEmitter;
use crate::test_run::TestRunner;
use crate::types::{
    DepGraph, MappingState, ModuleMapping, ModuleRecord, RiskSeverity, RiskWarning, RunReport,
    RunSummary,
};

/// Owns a run's directory layout and drives every mapping through
/// capture -> emit -> run -> review, in input order.
pub struct Orchestrator<'a> {
    llm: &'a dyn LlmClient,
    registry: PluginRegistry,
    metrics: RunMetrics,
}

impl<'a> Orchestrator<'a> {
    pub fn new(llm: &'a dyn LlmClient) -> Self {
        Self {
            llm,
            registry: PluginRegistry::with_builtins(),
            metrics: RunMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Run the whole pipeline for a run's set of mappings and persist the
    /// three report files under `<artifacts_root>/<run_id>/`.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_stage_test(
        &self,
        run_id: &str,
        repo_dir: &Path,
        refactored_repo_dir: &Path,
        stage_mappings: &[ModuleMapping],
        dep_graph: &DepGraph,
        artifacts_root: &Path,
        source_language: &str,
        target_language: &str,
    ) -> Result<RunReport, PipelineError> {
        let run_dir = artifacts_root.join(run_id);
        // Reserved for artifact bookkeeping; driver scripts and emitted tests
        // are written beside the files they exercise so relative imports
        // resolve, not copied in here. See DESIGN.md open question 4.
        tokio::fs::create_dir_all(run_dir.join("golden")).await?;
        tokio::fs::create_dir_all(run_dir.join("tests")).await?;

        let target_plugin = self.registry.get(target_language)?;
        let check = target_plugin.compile_check(refactored_repo_dir).await?;
        if !check.ok {
            tracing::error!(error = ?check.error_message, "build check failed, aborting run");
            let report = RunReport {
                run_id: run_id.to_string(),
                summary: RunSummary {
                    run_id: run_id.to_string(),
                    build_success: false,
                    build_error: check.error_message,
                    overall_pass_rate: 0.0,
                    overall_coverage_pct: 0.0,
                    total_modules: 0,
                    total_passed: 0,
                    total_failed: 0,
                    total_errored: 0,
                },
                modules: vec![],
                reviews: vec![],
                overall_assessment: "build check failed before any mapping was processed".into(),
            };
            self.persist(&run_dir, &report).await?;
            return Err(PipelineError::BuildCheckFailed(
                report.summary.build_error.clone().unwrap_or_default(),
            ));
        }

        let source_plugin = self.registry.get(source_language)?;

        let mut modules = Vec::with_capacity(stage_mappings.len());
        let mut reviews = Vec::with_capacity(stage_mappings.len());

        for mapping in stage_mappings {
            self.metrics.record_mapping_processed();
            let (record, review, state) = self
                .process_mapping(mapping, repo_dir, refactored_repo_dir, dep_graph, source_plugin, target_plugin)
                .await;

            match state {
                MappingState::Degraded => self.metrics.record_mapping_degraded(),
                MappingState::Failed => self.metrics.record_mapping_failed(),
                _ => {}
            }

            modules.push(record);
            reviews.push(review);
        }

        let summary = aggregate_summary(run_id, &modules);
        let overall_assessment = summarize_reviews(&reviews);

        let report = RunReport {
            run_id: run_id.to_string(),
            summary,
            modules,
            reviews,
            overall_assessment,
        };

        self.persist(&run_dir, &report).await?;
        Ok(report)
    }

    async fn process_mapping(
        &self,
        mapping: &ModuleMapping,
        repo_dir: &Path,
        refactored_repo_dir: &Path,
        dep_graph: &DepGraph,
        source_plugin: &dyn ctg_core::LanguagePlugin,
        target_plugin: &dyn ctg_core::LanguagePlugin,
    ) -> (ModuleRecord, crate::types::Review, MappingState) {
        let mut state = MappingState::Capturing;
        let mut golden_records = Vec::with_capacity(mapping.before_files.len());
        let mut guidances = Vec::with_capacity(mapping.before_files.len());

        for before_file in &mapping.before_files {
            let abs_path = resolve_under(repo_dir, before_file);
            let contents = match tokio::fs::read_to_string(&abs_path).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(file = %abs_path.display(), error = %e, "legacy file unreadable, skipping capture");
                    continue;
                }
            };

            let dependency_signatures = self.resolve_signatures(&abs_path, dep_graph).await;

            let guidance = GuidanceGenerator::new(self.llm, &self.metrics)
                .generate(&contents, &dependency_signatures)
                .await
                .unwrap_or_else(|_| GuidanceGenerator::neutral());
            if guidance.degraded {
                state = MappingState::Degraded;
            }

            let capture = GoldenCaptureEngine::new(self.llm, source_plugin, &self.metrics);
            let record = match capture.capture(&abs_path, &contents, &dependency_signatures, &guidance).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(file = %abs_path.display(), error = %e, "golden capture failed");
                    state = MappingState::Degraded;
                    continue;
                }
            };
            self.metrics.record_golden_capture(record.is_captured());
            golden_records.push(record);
            guidances.push(guidance);
        }

        if golden_records.is_empty() {
            let review = crate::types::Review::degraded("no golden record could be captured for this mapping");
            let record = ModuleRecord {
                mapping: mapping.clone(),
                state: MappingState::Failed,
                golden_records,
                emitted_tests: vec![],
                test_results: vec![],
                tested_functions: vec![],
            };
            return (record, review, MappingState::Failed);
        }

        state = match state {
            MappingState::Degraded => MappingState::Degraded,
            _ => MappingState::Emitting,
        };

        let matched_len = mapping.after_files.len().min(golden_records.len());
        let mut emitted_tests = Vec::with_capacity(matched_len);
        let mut test_results = Vec::with_capacity(matched_len);

        for (after_file, (golden, guidance)) in mapping
            .after_files
            .iter()
            .zip(golden_records.iter().zip(guidances.iter()))
            .take(matched_len)
        {
            let abs_after = resolve_under(refactored_repo_dir, after_file);
            let refactored_contents = match tokio::fs::read_to_string(&abs_after).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(file = %abs_after.display(), error = %e, "refactored file unreadable, skipping emit");
                    continue;
                }
            };

            if !golden.is_captured() {
                tracing::warn!(
                    file = %abs_after.display(),
                    "golden record was not captured, skipping test emission for this file"
                );
                state = MappingState::Degraded;
                continue;
            }

            let emitter = TestEmitter::new(self.llm, &self.metrics);
            let emitted = match emitter.emit(&refactored_contents, std::slice::from_ref(golden), guidance).await {
                Ok(emitted) => emitted,
                Err(e) => {
                    tracing::warn!(error = %e, "test emission failed");
                    state = MappingState::Degraded;
                    continue;
                }
            };

            let test_path = abs_after.with_file_name(emitted.path.file_name().unwrap_or_default());
            let mut emitted = emitted;
            emitted.path = test_path;

            state = MappingState::Running;
            let runner = TestRunner::new(target_plugin);
            let result = match runner.run(&emitted, abs_after.parent().unwrap_or(refactored_repo_dir), &[abs_after.clone()]).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, "test run failed");
                    state = MappingState::Degraded;
                    continue;
                }
            };
            self.metrics.record_test_run(result.failed == 0 && result.errored == 0);

            emitted_tests.push(emitted);
            test_results.push(result);
        }

        state = match state {
            MappingState::Degraded => MappingState::Degraded,
            _ => MappingState::Reviewing,
        };

        let review_generator = ReviewGenerator::new(self.llm, &self.metrics);
        let mut review = match review_generator.review(mapping, &test_results).await {
            Ok(review) => review,
            Err(e) => {
                state = MappingState::Degraded;
                crate::types::Review::degraded(&e.to_string())
            }
        };

        if mapping.after_files.len() > golden_records.len() {
            let unmatched = mapping.after_files.len() - golden_records.len();
            review.risk_warnings.push(RiskWarning {
                description: format!(
                    "{unmatched} refactored file(s) have no corresponding golden record; new behavior not covered by golden"
                ),
                severity: RiskSeverity::Medium,
                tested_by_golden: false,
            });
        } else if golden_records.len() > mapping.after_files.len() {
            let unmatched = golden_records.len() - mapping.after_files.len();
            review.risk_warnings.push(RiskWarning {
                description: format!(
                    "{unmatched} legacy golden record(s) have no corresponding refactored file; behavior may have been dropped"
                ),
                severity: RiskSeverity::High,
                tested_by_golden: false,
            });
        }

        let tested_functions = golden_records
            .iter()
            .filter_map(|r| r.observations.as_ref())
            .flat_map(|obs| obs.keys().cloned())
            .collect();

        let final_state = if state == MappingState::Reviewing {
            MappingState::Done
        } else {
            state
        };

        let record = ModuleRecord {
            mapping: mapping.clone(),
            state: final_state,
            golden_records,
            emitted_tests,
            test_results,
            tested_functions,
        };

        (record, review, final_state)
    }

    async fn resolve_signatures(&self, file: &Path, dep_graph: &DepGraph) -> String {
        let dependencies = dep_graph.direct_dependencies(file);
        let mut contents: HashMap<PathBuf, String> = HashMap::new();
        for dep in &dependencies {
            if let Ok(text) = tokio::fs::read_to_string(dep).await {
                contents.insert(dep.clone(), text);
            }
        }

        let resolver = DependencySignatureResolver::new();
        let signatures = resolver.resolve(&dependencies, |path| contents.get(path).cloned());

        signatures
            .into_iter()
            .map(|(path, sig)| format!("# {}\n{}", path.display(), sig))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn persist(&self, run_dir: &Path, report: &RunReport) -> Result<(), PipelineError> {
        tokio::fs::create_dir_all(run_dir).await?;

        atomic_write_json(&run_dir.join("summary.json"), &report.summary).await?;

        #[derive(serde::Serialize)]
        struct TestRecords<'a> {
            run_id: &'a str,
            modules: &'a [ModuleRecord],
        }
        atomic_write_json(
            &run_dir.join("test_records.json"),
            &TestRecords { run_id: &report.run_id, modules: &report.modules },
        )
        .await?;

        #[derive(serde::Serialize)]
        struct ReviewFile<'a> {
            run_id: &'a str,
            modules: &'a [crate::types::Review],
            overall_assessment: &'a str,
        }
        atomic_write_json(
            &run_dir.join("review.json"),
            &ReviewFile {
                run_id: &report.run_id,
                modules: &report.reviews,
                overall_assessment: &report.overall_assessment,
            },
        )
        .await?;

        Ok(())
    }
}

fn resolve_under(root: &Path, relative_or_abs: &Path) -> PathBuf {
    if relative_or_abs.is_absolute() {
        relative_or_abs.to_path_buf()
    } else {
        root.join(relative_or_abs)
    }
}

/// P1: pass rate is the ratio of passed to (passed+failed+errored) across
/// every mapping's test results, 0 when the denominator is 0.
fn aggregate_summary(run_id: &str, modules: &[ModuleRecord]) -> RunSummary {
    let mut total_passed = 0u32;
    let mut total_failed = 0u32;
    let mut total_errored = 0u32;
    let mut coverage_sum = 0.0f64;
    let mut coverage_count = 0u32;

    for module in modules {
        for result in &module.test_results {
            total_passed += result.passed;
            total_failed += result.failed;
            total_errored += result.errored;
            if let Some(cov) = result.coverage_pct {
                coverage_sum += cov;
                coverage_count += 1;
            }
        }
    }

    let denominator = total_passed + total_failed + total_errored;
    let overall_pass_rate = if denominator == 0 {
        0.0
    } else {
        total_passed as f64 / denominator as f64
    };
    let overall_coverage_pct = if coverage_count == 0 {
        0.0
    } else {
        coverage_sum / coverage_count as f64
    };

    RunSummary {
        run_id: run_id.to_string(),
        build_success: true,
        build_error: None,
        overall_pass_rate,
        overall_coverage_pct,
        total_modules: modules.len() as u32,
        total_passed,
        total_failed,
        total_errored,
    }
}

fn summarize_reviews(reviews: &[crate::types::Review]) -> String {
    if reviews.is_empty() {
        return "no mappings were processed".into();
    }
    let critical = reviews
        .iter()
        .flat_map(|r| r.risk_warnings.iter())
        .filter(|w| w.severity >= RiskSeverity::High)
        .count();
    if critical > 0 {
        format!("{critical} high-or-critical risk warning(s) across {} mapping(s)", reviews.len())
    } else {
        format!("{} mapping(s) reviewed, no high-or-critical risks found", reviews.len())
    }
}

async fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("report")
    ));
    let json = serde_json::to_string_pretty(value)?;
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GoldenRecord, TestItem, TestResult, TestStatus};

    fn sample_result(passed: u32, failed: u32, errored: u32, coverage: Option<f64>) -> TestResult {
        let mut items = Vec::new();
        for _ in 0..passed {
            items.push(TestItem { name: "t".into(), status: TestStatus::Passed });
        }
        for _ in 0..failed {
            items.push(TestItem { name: "t".into(), status: TestStatus::Failed });
        }
        for _ in 0..errored {
            items.push(TestItem { name: "t".into(), status: TestStatus::Error });
        }
        TestResult::from_items(items, coverage, "", "", 0)
    }

    fn sample_module(results: Vec<TestResult>) -> ModuleRecord {
        ModuleRecord {
            mapping: ModuleMapping { before_files: vec![], after_files: vec![] },
            state: MappingState::Done,
            golden_records: vec![],
            emitted_tests: vec![],
            test_results: results,
            tested_functions: vec![],
        }
    }

    #[test]
    fn aggregate_summary_computes_pass_rate_and_zero_on_empty() {
        let empty_summary = aggregate_summary("run1", &[]);
        assert_eq!(empty_summary.overall_pass_rate, 0.0);

        let modules = vec![
            sample_module(vec![sample_result(2, 0, 0, Some(80.0))]),
            sample_module(vec![sample_result(1, 1, 0, Some(60.0))]),
        ];
        let summary = aggregate_summary("run1", &modules);
        assert_eq!(summary.total_passed, 3);
        assert_eq!(summary.total_failed, 1);
        assert!((summary.overall_pass_rate - 0.75).abs() < 1e-9);
        assert!((summary.overall_coverage_pct - 70.0).abs() < 1e-9);
    }

    #[test]
    fn resolve_under_keeps_absolute_paths_as_is() {
        let abs = Path::new("/repo/a.py");
        assert_eq!(resolve_under(Path::new("/other"), abs), abs);
    }

    #[test]
    fn resolve_under_joins_relative_paths() {
        let rel = Path::new("a.py");
        assert_eq!(resolve_under(Path::new("/repo"), rel), Path::new("/repo/a.py"));
    }

    #[test]
    fn dep_graph_returns_direct_dependencies_only() {
        let graph = DepGraph {
            nodes: vec![],
            edges: vec![
                crate::types::DepGraphEdge {
                    src: "/repo/invoice.py".into(),
                    dst: "/repo/tax.py".into(),
                    kind: "import".into(),
                },
                crate::types::DepGraphEdge {
                    src: "/repo/tax.py".into(),
                    dst: "/repo/rates.py".into(),
                    kind: "import".into(),
                },
            ],
        };
        let deps = graph.direct_dependencies(Path::new("/repo/invoice.py"));
        assert_eq!(deps, vec![PathBuf::from("/repo/tax.py")]);
    }

    #[test]
    fn golden_record_helper_is_captured() {
        let record = GoldenRecord {
            source_file: "a.py".into(),
            driver_script_path: "a_golden_driver.py".into(),
            observations: Some(serde_json::Map::new()),
            exit_code: 0,
            stderr_trailer: None,
            duration_ms: 1,
            coverage_pct: None,
        };
        assert!(record.is_captured());
    }
}
