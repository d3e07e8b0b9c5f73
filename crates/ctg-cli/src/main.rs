use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ctg_pipeline::{CtgConfig, DepGraph, ModuleMapping, Orchestrator, PipelineError};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "ctg", about = "Characterization test generator for AI-driven refactorings")]
struct Cli {
    /// Path to the mapping file describing the run.
    mapping_file: PathBuf,

    /// Path to a ctg.toml configuration file.
    #[arg(long, default_value = "ctg.toml")]
    config: PathBuf,
}

#[derive(Debug, Deserialize)]
struct MappingEntry {
    before: Vec<PathBuf>,
    after: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    repo_dir: PathBuf,
    refactored_repo_dir: PathBuf,
    dep_graph_path: PathBuf,
    source_language: String,
    target_language: String,
    mappings: Vec<MappingEntry>,
}

#[derive(Debug, Serialize)]
struct SuccessOutput {
    ok: bool,
    test_result_dir: PathBuf,
    summary_path: PathBuf,
    test_records_path: PathBuf,
    review_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct FailureOutput {
    ok: bool,
    error: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_env("CTG_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> ExitCode {
    let mapping_file = match load_mapping_file(&cli.mapping_file).await {
        Ok(m) => m,
        Err(e) => return fail(2, e),
    };

    let dep_graph = match load_dep_graph(&mapping_file.dep_graph_path).await {
        Ok(g) => g,
        Err(e) => return fail(2, e),
    };

    // Exit code 2 is reserved for the mapping file specifically; a bad
    // ctg.toml is a different failure mode and falls into the catch-all.
    let config = match CtgConfig::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => return fail(1, e.to_string()),
    };

    let llm_client = match config.build_llm_client().await {
        Ok(c) => c,
        Err(e) => return fail(llm_client_build_exit_code(&e), e.to_string()),
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    let artifacts_root = config.artifacts_root_path();
    let stage_mappings: Vec<ModuleMapping> = mapping_file
        .mappings
        .into_iter()
        .map(|m| ModuleMapping { before_files: m.before, after_files: m.after })
        .collect();

    tracing::info!(run_id, mappings = stage_mappings.len(), "starting characterization run");

    let orchestrator = Orchestrator::new(llm_client.as_ref());
    let result = orchestrator
        .run_stage_test(
            &run_id,
            &mapping_file.repo_dir,
            &mapping_file.refactored_repo_dir,
            &stage_mappings,
            &dep_graph,
            &artifacts_root,
            &mapping_file.source_language,
            &mapping_file.target_language,
        )
        .await;

    match result {
        Ok(_report) => {
            let run_dir = artifacts_root.join(&run_id);
            let output = SuccessOutput {
                ok: true,
                summary_path: run_dir.join("summary.json"),
                test_records_path: run_dir.join("test_records.json"),
                review_path: run_dir.join("review.json"),
                test_result_dir: run_dir,
            };
            println!("{}", serde_json::to_string(&output).unwrap_or_default());
            ExitCode::from(0)
        }
        Err(PipelineError::BuildCheckFailed(msg)) => fail(3, msg),
        Err(PipelineError::LlmUnavailable(msg)) => fail(4, msg),
        Err(e) => fail(1, e.to_string()),
    }
}

/// `build_llm_client` never makes a network call -- it only resolves
/// credentials -- so a failure here is a setup problem, not exhausted LLM
/// retries. Exit 4 is reserved for the latter; only map to it if the error
/// genuinely is an `Unavailable` (kept for forward-compatibility, not
/// currently reachable from this call site).
fn llm_client_build_exit_code(e: &PipelineError) -> u8 {
    match e {
        PipelineError::LlmUnavailable(_) => 4,
        PipelineError::Llm(ctg_llm::LlmError::Unavailable { .. }) => 4,
        _ => 1,
    }
}

fn fail(code: u8, error: String) -> ExitCode {
    let output = FailureOutput { ok: false, error };
    println!("{}", serde_json::to_string(&output).unwrap_or_default());
    ExitCode::from(code)
}

async fn load_mapping_file(path: &std::path::Path) -> Result<MappingFile, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("mapping file not found: {e}"))?;
    serde_json::from_str(&content).map_err(|e| format!("mapping file malformed: {e}"))
}

async fn load_dep_graph(path: &std::path::Path) -> Result<DepGraph, String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content).map_err(|e| format!("dependency graph malformed: {e}")),
        Err(_) => Ok(DepGraph::default()),
    }
}
