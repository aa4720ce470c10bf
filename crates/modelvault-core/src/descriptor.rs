//! Asset descriptor documents
//!
//! A descriptor is a small text file sitting next to (or waiting for) an
//! asset. Free-form notes come first, then a structured YAML block
//! introduced by [`CONFIG_MARKER`]:
//!
//! ```text
//! Ink style LoRA, trained on 200 brush drawings.
//! Works best at 0.7.
//! CONFIG-DATA::
//! id: FLUX/styles/ink.safetensors
//! model_type: loras
//! url: https://example.com/ink.safetensors
//! download:
//!   - url: https://mirror.example.com/ink.safetensors
//! hash:
//!   sha256: 3a7bd3e2360a3d29eea436fcfb7e44c735d117c42d1c1835420b6b9942dd4f1b
//! ```

use crate::asset::{AssetId, AssetType};
use crate::value::{FieldMap, FieldValue, text_field};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Token separating the notes from the structured block
pub const CONFIG_MARKER: &str = "CONFIG-DATA::";

/// File extension of descriptor files
pub const DESCRIPTOR_EXTENSION: &str = "assetinfo";

/// Key the notes are stored under
pub const NOTES_KEY: &str = "notes";

/// Descriptor errors
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Failed to read descriptor {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed descriptor {}{}: {message}", .path.display(), location_suffix(.line, .column))]
    Malformed {
        path: PathBuf,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" (line {line}, column {column})"),
        (Some(line), None) => format!(" (line {line})"),
        _ => String::new(),
    }
}

/// Split a descriptor document into its field map
///
/// The notes are always injected under [`NOTES_KEY`], replacing any declared
/// field of the same name.
pub fn parse_document(text: &str, source: &Path) -> Result<FieldMap, DescriptorError> {
    let Some(idx) = text.find(CONFIG_MARKER) else {
        let mut fields = FieldMap::new();
        fields.insert(NOTES_KEY.to_string(), FieldValue::from(text));
        return Ok(fields);
    };

    let notes = &text[..idx];
    let after_marker = &text[idx + CONFIG_MARKER.len()..];
    let block = after_marker.trim_start_matches(['\r', '\n']);

    // line offset of the block inside the document
    let marker_line = notes.matches('\n').count();
    let skipped_lines = after_marker[..after_marker.len() - block.len()]
        .matches('\n')
        .count();

    let block = block.replace('\t', "    ");

    let mut fields = if block.trim().is_empty() {
        FieldMap::new()
    } else {
        match serde_yaml::from_str::<FieldValue>(&block) {
            Ok(FieldValue::Map(map)) => map,
            Ok(FieldValue::Null) => FieldMap::new(),
            Ok(_) => {
                return Err(DescriptorError::Malformed {
                    path: source.to_path_buf(),
                    line: Some(marker_line + skipped_lines + 1),
                    column: None,
                    message: "structured block is not a mapping".to_string(),
                });
            }
            Err(e) => {
                let location = e.location();
                return Err(DescriptorError::Malformed {
                    path: source.to_path_buf(),
                    line: location
                        .as_ref()
                        .map(|l| marker_line + skipped_lines + l.line()),
                    column: location.as_ref().map(|l| l.column()),
                    message: e.to_string(),
                });
            }
        }
    };

    fields.insert(NOTES_KEY.to_string(), FieldValue::from(notes));
    Ok(fields)
}

/// A parsed asset descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct AssetDescriptor {
    id: AssetId,
    asset_type: Option<AssetType>,
    urls: Vec<String>,
    sha256: Option<String>,
    fields: FieldMap,
    source: PathBuf,
}

impl AssetDescriptor {
    /// Read and parse a descriptor file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse descriptor text; `source` is used for error locations and provenance
    pub fn parse(text: &str, source: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let source = source.as_ref();
        let fields = parse_document(text, source)?;
        Ok(Self::from_fields(fields, source))
    }

    /// Build a descriptor from an already parsed field map
    pub fn from_fields(fields: FieldMap, source: impl Into<PathBuf>) -> Self {
        let id = AssetId::new(text_field(&fields, "id"));
        let asset_type = text_field(&fields, "model_type").parse().ok();

        let mut urls = Vec::new();
        let top_level = text_field(&fields, "url");
        if !top_level.is_empty() {
            urls.push(top_level.to_string());
        }
        if let Some(downloads) = fields.get("download").and_then(FieldValue::as_list) {
            for download in downloads {
                let url = download
                    .get("url")
                    .and_then(FieldValue::as_str)
                    .unwrap_or("")
                    .trim();
                if !url.is_empty() {
                    urls.push(url.to_string());
                }
            }
        }

        let sha256 = fields
            .get("hash")
            .and_then(|h| h.get("sha256"))
            .and_then(FieldValue::as_str)
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty());

        Self {
            id,
            asset_type,
            urls,
            sha256,
            fields,
            source: source.into(),
        }
    }

    /// Asset identity (may be empty)
    pub fn id(&self) -> &AssetId {
        &self.id
    }

    /// Asset type, `None` when not declared
    pub fn asset_type(&self) -> Option<&AssetType> {
        self.asset_type.as_ref()
    }

    /// Explicit source URLs in priority order
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Expected SHA-256 digest (lowercase hex)
    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }

    /// Free-text notes
    pub fn notes(&self) -> &str {
        self.fields
            .get(NOTES_KEY)
            .and_then(FieldValue::as_str)
            .unwrap_or("")
    }

    /// All declared fields, notes included
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// File the descriptor was read from
    pub fn source(&self) -> &Path {
        &self.source
    }
}
