use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("build check failed: {0}")]
    BuildCheckFailed(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM response failed schema validation: {0}")]
    LlmSchemaInvalid(String),

    #[error("script execution failed: {0}")]
    ScriptExecutionFailed(String),

    #[error("script timed out: {0}")]
    ScriptTimeout(String),

    #[error("test runner crashed: {0}")]
    TestRunnerCrash(String),

    #[error("unmapped golden key: {0}")]
    UnmappedGoldenKey(String),

    #[error("mapping file not found or malformed: {0}")]
    MappingFileInvalid(String),

    #[error("core error: {0}")]
    Core(#[from] ctg_core::CoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] ctg_llm::LlmError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),
}
