//! Adapter lookup and loading from disk

use crate::adapter::AdapterWeights;
use crate::error::{LoraError, Result};
use modelvault_core::asset::normalize_separators;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Maps an adapter name to the file backing it
pub trait AdapterResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<PathBuf>;
}

/// Decodes an adapter file
pub trait WeightLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<AdapterWeights>;
}

/// Ordered list of adapter directories; the first root holding the name wins
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    roots: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    /// Add a search path
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.roots.push(path.into());
    }

    /// Get search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl AdapterResolver for SearchPaths {
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative: PathBuf = normalize_separators(name)
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        self.roots
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LoraError::NotFound(name.to_string()))
    }
}

/// Loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Maximum file size in bytes
    pub max_file_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_file_size: 4 * 1024 * 1024 * 1024, // 4GB
        }
    }
}

/// Reads `.safetensors` adapters
#[derive(Debug, Clone, Default)]
pub struct SafetensorsLoader {
    config: LoaderConfig,
}

impl SafetensorsLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl WeightLoader for SafetensorsLoader {
    fn load(&self, path: &Path) -> Result<AdapterWeights> {
        let io = |source| LoraError::Io {
            path: path.to_path_buf(),
            source,
        };

        // Check file size
        let size = std::fs::metadata(path).map_err(io)?.len();
        if size > self.config.max_file_size {
            return Err(LoraError::TooLarge {
                path: path.to_path_buf(),
                size,
                max: self.config.max_file_size,
            });
        }

        let bytes = std::fs::read(path).map_err(io)?;
        let weights = AdapterWeights::from_safetensors(&bytes).map_err(|e| match e {
            LoraError::Decode(message) => {
                LoraError::Decode(format!("{}: {}", path.display(), message))
            }
            other => other,
        })?;

        debug!(layers = weights.len(), "Decoded {:?}", path);
        Ok(weights)
    }
}
