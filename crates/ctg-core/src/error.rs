use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown language plugin: {0}")]
    UnknownLanguage(String),

    #[error("script execution failed: {0}")]
    ScriptExecutionFailed(String),

    #[error("script timed out after {0}s")]
    ScriptTimeout(u64),

    #[error("test execution failed: {0}")]
    TestExecutionFailed(String),

    #[error("compile check failed: {0}")]
    CompileCheckFailed(String),

    #[error("signature resolution error: {0}")]
    SignatureError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
