//! Asset types and identities
//!
//! An asset identity is a path-like token such as `FLUX/styles/ink.safetensors`.
//! Identities always use `/` as separator, whatever the platform or the way
//! the identity was written in a document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Canonical separator inside identities
pub const SEPARATOR: char = '/';

/// Asset category
///
/// Doubles as the name of the sub-directory holding assets of this kind
/// under the models root. Any spelling other than the known lowercase
/// names (`Loras`, `lora`) is kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetType {
    /// Full diffusion checkpoints
    Checkpoints,
    /// LoRA adapters
    Loras,
    /// VAE weights
    Vae,
    /// Standalone diffusion models
    Unet,
    /// Text encoders
    Clip,
    /// Textual inversion embeddings
    Embeddings,
    /// Upscaler networks
    UpscaleModels,
    /// Any other directory name, kept verbatim
    Other(String),
}

impl AssetType {
    /// Directory name for this type
    pub fn as_str(&self) -> &str {
        match self {
            Self::Checkpoints => "checkpoints",
            Self::Loras => "loras",
            Self::Vae => "vae",
            Self::Unet => "unet",
            Self::Clip => "clip",
            Self::Embeddings => "embeddings",
            Self::UpscaleModels => "upscale_models",
            Self::Other(name) => name,
        }
    }

    /// Usable as a single directory name
    pub fn is_directory_name(&self) -> bool {
        let name = self.as_str();
        !matches!(name, "" | "." | "..") && !name.contains(['/', '\\', ':'])
    }

    /// Namespaced lookup key (`type@identifier`)
    pub fn key(&self, identifier: &str) -> String {
        format!("{}@{}", self.as_str(), identifier)
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an asset type name is empty
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("asset type is empty")]
pub struct EmptyAssetType;

impl FromStr for AssetType {
    type Err = EmptyAssetType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EmptyAssetType);
        }

        // Matched verbatim: the name is also a directory and a remote path
        Ok(match trimmed {
            "checkpoints" => Self::Checkpoints,
            "loras" => Self::Loras,
            "vae" => Self::Vae,
            "unet" => Self::Unet,
            "clip" => Self::Clip,
            "embeddings" => Self::Embeddings,
            "upscale_models" => Self::UpscaleModels,
            _ => Self::Other(trimmed.to_string()),
        })
    }
}

impl Serialize for AssetType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AssetType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Canonical asset identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Create an identity, normalizing separators and trimming whitespace
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_separators(raw.as_ref().trim()))
    }

    /// The identity as written
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identity is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// File name without its last extension
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    /// Directory segments between the first segment and the file name
    pub fn inner_dirs(&self) -> Vec<&str> {
        let segments: Vec<&str> = self.segments().collect();
        if segments.len() <= 2 {
            return Vec::new();
        }
        segments[1..segments.len() - 1].to_vec()
    }

    /// Whether the identity stays below the directory it is joined to.
    ///
    /// Rejects `..` segments, a leading separator and drive or remote
    /// prefixes (`C:`, `remote:`).
    pub fn is_contained(&self) -> bool {
        !self.0.starts_with(SEPARATOR) && !self.segments().any(|s| s == ".." || s.contains(':'))
    }

    /// Relative filesystem path with platform separators
    pub fn to_relative_path(&self) -> PathBuf {
        self.segments().collect()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AssetId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for AssetId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

/// Replace `\` with the canonical separator
pub fn normalize_separators(raw: &str) -> String {
    raw.replace('\\', "/")
}
