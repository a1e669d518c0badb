//! Secret lookup used at startup to obtain API credentials.
//!
//! Secrets are either plain environment variables (populated from `.env` in
//! development) or files in a mounted directory, which is how managed secret
//! stores are usually exposed to containers.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret {0} is not set")]
    Missing(String),
    #[error("failed to read secret {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait::async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError>;
}

pub struct EnvSecretProvider;

#[async_trait::async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| SecretError::Missing(name.to_string()))
    }
}

/// Reads `<dir>/<name>`, trimming surrounding whitespace.
pub struct FileSecretProvider {
    dir: PathBuf,
}

impl FileSecretProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl SecretProvider for FileSecretProvider {
    async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let path = self.dir.join(name);
        let value = match tokio::fs::read_to_string(&path).await {
            Ok(value) => value,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SecretError::Missing(name.to_string()))
            }
            Err(source) => {
                return Err(SecretError::Io {
                    name: name.to_string(),
                    source,
                })
            }
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(SecretError::Missing(name.to_string()));
        }
        Ok(value.to_string())
    }
}
