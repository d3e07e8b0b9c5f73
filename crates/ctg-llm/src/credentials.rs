use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::LlmError;

const CREDENTIALS_ENV_VAR: &str = "CTG_LLM_CREDENTIALS_FILE";

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    api_key: String,
}

/// Resolves the LLM provider's API key from a credentials file named by
/// `CTG_LLM_CREDENTIALS_FILE`. The generator never creates, rotates, or
/// caches this file beyond process lifetime -- it only reads it.
pub struct CredentialResolver {
    env_var: String,
}

impl CredentialResolver {
    pub fn new() -> Self {
        Self {
            env_var: CREDENTIALS_ENV_VAR.to_string(),
        }
    }

    /// Override the environment variable name, for testing.
    pub fn with_env_var(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
        }
    }

    pub fn credentials_path(&self) -> Result<PathBuf, LlmError> {
        std::env::var(&self.env_var)
            .map(PathBuf::from)
            .map_err(|_| {
                LlmError::Credentials(format!(
                    "environment variable {} is not set",
                    self.env_var
                ))
            })
    }

    pub async fn resolve_api_key(&self) -> Result<String, LlmError> {
        let path = self.credentials_path()?;
        Self::read_api_key(&path).await
    }

    async fn read_api_key(path: &Path) -> Result<String, LlmError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            LlmError::Credentials(format!(
                "failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;
        let parsed: CredentialsFile = serde_json::from_str(&content).map_err(|e| {
            LlmError::Credentials(format!(
                "credentials file {} is not valid JSON: {e}",
                path.display()
            ))
        })?;
        if parsed.api_key.is_empty() {
            return Err(LlmError::Credentials(format!(
                "credentials file {} has an empty api_key",
                path.display()
            )));
        }
        Ok(parsed.api_key)
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unique_env_var(tag: &str) -> String {
        format!("CTG_TEST_CREDS_{tag}")
    }

    #[tokio::test]
    async fn resolves_api_key_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.json");
        tokio::fs::write(&path, r#"{"api_key": "sk-test-123"}"#)
            .await
            .unwrap();

        let var = unique_env_var("ok");
        unsafe { std::env::set_var(&var, &path) };
        let resolver = CredentialResolver::with_env_var(&var);
        let key = resolver.resolve_api_key().await.unwrap();
        assert_eq!(key, "sk-test-123");
        unsafe { std::env::remove_var(&var) };
    }

    #[tokio::test]
    async fn missing_env_var_errors() {
        let var = unique_env_var("missing");
        unsafe { std::env::remove_var(&var) };
        let resolver = CredentialResolver::with_env_var(&var);
        let err = resolver.resolve_api_key().await.unwrap_err();
        assert!(matches!(err, LlmError::Credentials(_)));
    }

    #[tokio::test]
    async fn empty_api_key_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.json");
        tokio::fs::write(&path, r#"{"api_key": ""}"#).await.unwrap();

        let var = unique_env_var("empty");
        unsafe { std::env::set_var(&var, &path) };
        let resolver = CredentialResolver::with_env_var(&var);
        let err = resolver.resolve_api_key().await.unwrap_err();
        assert!(matches!(err, LlmError::Credentials(_)));
        unsafe { std::env::remove_var(&var) };
    }
}
