use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM call failed: {0}")]
    RequestFailed(String),

    #[error("LLM unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    #[error("LLM response did not match the expected schema: {0}")]
    SchemaInvalid(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
