//! Configuration for ModelVault tools

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Root directory holding one sub-directory per asset type
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Directory scanned for pending descriptor files
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    /// Catalogue document
    #[serde(default = "default_catalogue_path")]
    pub catalogue_path: PathBuf,

    /// Character prompt book
    #[serde(default = "default_characters_path")]
    pub characters_path: PathBuf,

    /// Directories searched for LoRA files, in priority order
    #[serde(default)]
    pub lora_paths: Vec<PathBuf>,

    /// Maximum number of decoded LoRA payloads kept in memory
    #[serde(default = "default_max_cached_loras")]
    pub max_cached_loras: usize,

    /// Remote storage used as last-resort source (`remote:models/<type>/<id>`)
    #[serde(default)]
    pub cloud_storage_id: Option<String>,

    /// Access tokens by host name
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,

    /// Timeout for a single download attempt
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// User agent sent with HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            downloads_dir: default_downloads_dir(),
            catalogue_path: default_catalogue_path(),
            characters_path: default_characters_path(),
            lora_paths: Vec::new(),
            max_cached_loras: default_max_cached_loras(),
            cloud_storage_id: None,
            credentials: BTreeMap::new(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl VaultConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("modelvault").join("config.json"))
    }

    /// Load the configuration
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present, otherwise built-in defaults. Environment
    /// overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `MODELVAULT_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = non_empty("MODELVAULT_MODELS_DIR") {
            self.models_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty("MODELVAULT_DOWNLOADS_DIR") {
            self.downloads_dir = PathBuf::from(dir);
        }
        if let Some(id) = non_empty("MODELVAULT_STORAGE_ID") {
            self.cloud_storage_id = Some(id);
        }
        if let Some(max) = non_empty("MODELVAULT_MAX_CACHED_LORAS").and_then(|v| v.parse().ok()) {
            self.max_cached_loras = max;
        }
        if let Some(token) = non_empty("MODELVAULT_CIVITAI_TOKEN") {
            self.credentials.insert("civitai.com".to_string(), token);
        }
    }

    /// LoRA search paths, falling back to `<models_dir>/loras`
    pub fn lora_search_paths(&self) -> Vec<PathBuf> {
        if self.lora_paths.is_empty() {
            vec![self.models_dir.join("loras")]
        } else {
            self.lora_paths.clone()
        }
    }
}

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("modelvault")
}

fn default_models_dir() -> PathBuf {
    data_root().join("models")
}

fn default_downloads_dir() -> PathBuf {
    data_root().join("downloads")
}

fn default_catalogue_path() -> PathBuf {
    data_root().join("catalogue.json")
}

fn default_characters_path() -> PathBuf {
    data_root().join("characters.json")
}

fn default_max_cached_loras() -> usize {
    5
}

fn default_fetch_timeout_secs() -> u64 {
    3600 // large checkpoints take a while
}

fn default_user_agent() -> String {
    format!("modelvault/{}", env!("CARGO_PKG_VERSION"))
}
