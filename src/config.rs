use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::service::{DEFAULT_FACE_THRESHOLD, DEFAULT_TEXT_THRESHOLD, DEFAULT_TEXT_TOP_K};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct VectorizerConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub face: FaceConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub max_upload_bytes: usize,
}

/// PostgREST datastore and object storage (Supabase).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: String,
    pub table: String,
    pub bucket: String,
    pub timeout_secs: u64,
    pub page_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

/// Remote face detection/embedding service.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FaceConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default similarity floor for query-image searches.
    pub face_threshold: f32,
    /// Default similarity floor for text-prompt searches.
    pub text_threshold: f32,
    pub text_top_k: usize,
    /// Upload query images so searches can be audited later.
    pub archive_query_images: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            log_level: "info".into(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            table: "face_images".into(),
            bucket: "face-images".into(),
            timeout_secs: 30,
            page_size: 1000,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_vectorizer_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "clip-vit-base-patch32".into(),
            cache_dir,
        }
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8100".into(),
            timeout_secs: 30,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            face_threshold: DEFAULT_FACE_THRESHOLD,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            text_top_k: DEFAULT_TEXT_TOP_K,
            archive_query_images: true,
        }
    }
}

/// Returns `~/.vectorizer/`, or `./.vectorizer/` when no home directory is known.
pub fn default_vectorizer_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vectorizer")
}

/// Returns the default config file path: `~/.vectorizer/config.toml`
pub fn default_config_path() -> PathBuf {
    default_vectorizer_dir().join("config.toml")
}

impl VectorizerConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            VectorizerConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (SUPABASE_*, FACE_SERVICE_URL, VECTORIZER_*).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SUPABASE_URL") {
            self.store.url = val;
        }
        if let Ok(val) = std::env::var("SUPABASE_SERVICE_KEY") {
            self.store.service_key = val;
        }
        if let Ok(val) = std::env::var("SUPABASE_BUCKET") {
            self.store.bucket = val;
        }
        if let Ok(val) = std::env::var("SUPABASE_TABLE") {
            self.store.table = val;
        }
        if let Ok(val) = std::env::var("FACE_SERVICE_URL") {
            self.face.url = val;
        }
        if let Ok(val) = std::env::var("VECTORIZER_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("VECTORIZER_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid VECTORIZER_PORT"),
            }
        }
    }

    /// Check the settings the service cannot run without.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.store.url.trim().is_empty(),
            "store.url is not set (config file or SUPABASE_URL)"
        );
        anyhow::ensure!(
            !self.store.service_key.trim().is_empty(),
            "store.service_key is not set (config file or SUPABASE_SERVICE_KEY)"
        );
        for (name, value) in [
            ("retrieval.face_threshold", self.retrieval.face_threshold),
            ("retrieval.text_threshold", self.retrieval.text_threshold),
        ] {
            anyhow::ensure!(
                (-1.0..=1.0).contains(&value),
                "{name} must be within [-1, 1], got {value}"
            );
        }
        Ok(())
    }

    /// Resolve the model cache directory, expanding `~` if needed.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        expand_tilde(&self.embedding.cache_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = VectorizerConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.store.table, "face_images");
        assert_eq!(config.retrieval.face_threshold, 0.6);
        assert_eq!(config.retrieval.text_top_k, 5);
        assert!(config.embedding.cache_dir.ends_with("models"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
port = 9000

[store]
url = "https://example.supabase.co"
service_key = "secret"

[retrieval]
face_threshold = 0.75
"#;
        let config: VectorizerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.store.url, "https://example.supabase.co");
        assert_eq!(config.retrieval.face_threshold, 0.75);
        // defaults still apply for unset fields
        assert_eq!(config.store.bucket, "face-images");
        assert_eq!(config.retrieval.text_top_k, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_store_and_bad_thresholds() {
        let mut config = VectorizerConfig::default();
        assert!(config.validate().is_err());

        config.store.url = "https://example.supabase.co".into();
        config.store.service_key = "secret".into();
        assert!(config.validate().is_ok());

        config.retrieval.face_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = VectorizerConfig::load_from(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.store.table, "face_images");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = VectorizerConfig::default();
        std::env::set_var("SUPABASE_URL", "https://env.supabase.co");
        std::env::set_var("FACE_SERVICE_URL", "http://faces:9000");
        std::env::set_var("VECTORIZER_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.store.url, "https://env.supabase.co");
        assert_eq!(config.face.url, "http://faces:9000");
        assert_eq!(config.server.log_level, "trace");

        // Clean up
        std::env::remove_var("SUPABASE_URL");
        std::env::remove_var("FACE_SERVICE_URL");
        std::env::remove_var("VECTORIZER_LOG_LEVEL");
    }
}
