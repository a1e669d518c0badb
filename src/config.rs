//! Process configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BUCKET: &str = "cnd-bucket-z23746775";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Gcs,
    S3,
    Local,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcs" | "gcp" => Ok(StorageBackend::Gcs),
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!("unsupported STORAGE_BACKEND: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bucket: String,
    pub backend: StorageBackend,
    pub local_storage_root: PathBuf,
    /// Scratch directory uploads are written to before captioning.
    pub upload_dir: PathBuf,
    pub gemini_endpoint: String,
    pub gemini_model: String,
    pub gemini_secret_name: String,
    /// When set, secrets are read from files in this directory instead of env vars.
    pub secrets_dir: Option<PathBuf>,
    pub caption_timeout: Duration,
    pub max_upload_bytes: usize,
    /// Serve the sniffed content type from `/files/{name}` instead of `image/jpeg`.
    pub strict_content_type: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bucket: DEFAULT_BUCKET.to_string(),
            backend: StorageBackend::Gcs,
            local_storage_root: PathBuf::from("storage"),
            upload_dir: PathBuf::from("files"),
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_secret_name: "GEMINI_API_KEY".to_string(),
            secrets_dir: None,
            caption_timeout: Duration::from_secs(60),
            max_upload_bytes: 10 * 1024 * 1024,
            strict_content_type: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(v) => v
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT {v:?}: {e}"))?,
            None => defaults.port,
        };
        let backend = match var("STORAGE_BACKEND") {
            Some(v) => v.parse()?,
            None => defaults.backend,
        };
        let caption_timeout = match var("CAPTION_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .map_err(|e| anyhow::anyhow!("invalid CAPTION_TIMEOUT_SECS {v:?}: {e}"))?,
            ),
            None => defaults.caption_timeout,
        };
        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid MAX_UPLOAD_BYTES {v:?}: {e}"))?,
            None => defaults.max_upload_bytes,
        };
        let strict_content_type = var("STRICT_CONTENT_TYPE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.strict_content_type);

        Ok(Self {
            port,
            bucket: var("GALLERY_BUCKET").unwrap_or(defaults.bucket),
            backend,
            local_storage_root: var("LOCAL_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_storage_root),
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            gemini_endpoint: var("GEMINI_ENDPOINT")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_endpoint),
            gemini_model: var("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_secret_name: var("GEMINI_SECRET_NAME").unwrap_or(defaults.gemini_secret_name),
            secrets_dir: var("SECRETS_DIR").map(PathBuf::from),
            caption_timeout,
            max_upload_bytes,
            strict_content_type,
        })
    }
}
