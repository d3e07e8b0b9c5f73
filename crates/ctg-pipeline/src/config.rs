use std::path::Path;
use std::sync::Arc;

use ctg_llm::{AnthropicLlmClient, CredentialResolver, LlmClient, StubLlmClient};
use serde::Deserialize;

use crate::error::PipelineError;

#[derive(Debug, Deserialize)]
pub struct CtgConfig {
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "claude-sonnet-4-5".into()
}

fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum LlmProvider {
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "stub")]
    Stub,
}

/// Pipeline-level configuration: artifact layout and per-run timeouts.
#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    /// Root directory under which `<run_id>/` subdirectories are created.
    #[serde(default = "default_artifacts_root")]
    pub artifacts_root: String,
    /// Default subprocess timeout, used when a language plugin doesn't
    /// declare its own.
    #[serde(default = "default_plugin_timeout_seconds")]
    pub plugin_timeout_seconds: u64,
    /// Overall per-run deadline in seconds before the orchestrator aborts
    /// the in-flight mapping and marks it `Failed`.
    #[serde(default = "default_run_deadline_seconds")]
    pub run_deadline_seconds: u64,
    /// How to reconcile `before_files`/`after_files` of differing length.
    #[serde(default)]
    pub match_strategy: MatchStrategy,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    #[default]
    Positional,
}

fn default_artifacts_root() -> String {
    "~/.ctg/runs".into()
}

fn default_plugin_timeout_seconds() -> u64 {
    120
}

fn default_run_deadline_seconds() -> u64 {
    900
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifacts_root: default_artifacts_root(),
            plugin_timeout_seconds: default_plugin_timeout_seconds(),
            run_deadline_seconds: default_run_deadline_seconds(),
            match_strategy: MatchStrategy::default(),
        }
    }
}

impl CtgConfig {
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(PipelineError::IoError)?;
        toml::from_str(&content).map_err(|e| PipelineError::ConfigError(format!("failed to parse config: {e}")))
    }

    /// Expand `~` in `artifacts_root` to the home directory. Falls back to
    /// the literal path if the home directory can't be resolved.
    pub fn artifacts_root_path(&self) -> std::path::PathBuf {
        let raw = &self.pipeline.artifacts_root;
        if let Some(stripped) = raw.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        }
        std::path::PathBuf::from(raw)
    }

    pub async fn build_llm_client(&self) -> Result<Arc<dyn LlmClient>, PipelineError> {
        match self.llm.provider {
            LlmProvider::Anthropic => {
                let api_key = CredentialResolver::new().resolve_api_key().await?;
                Ok(Arc::new(AnthropicLlmClient::new(api_key, self.llm.model.clone())))
            }
            LlmProvider::Stub => Ok(Arc::new(StubLlmClient::constant("stub response"))),
        }
    }
}
