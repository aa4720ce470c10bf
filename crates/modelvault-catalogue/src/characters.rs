//! Character prompt book
//!
//! `characters.json` maps a character to named prompt options:
//!
//! ```json
//! { "mira": { "portrait": "mira, close-up", "full": "mira, full body" } }
//! ```

use crate::index::CatalogueError;
use std::path::Path;
use tracing::{info, warn};

/// A character and its prompt options, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    pub options: Vec<(String, String)>,
}

/// Character prompt book
#[derive(Debug, Clone, Default)]
pub struct CharacterBook {
    characters: Vec<Character>,
}

impl CharacterBook {
    /// Load from a file; a missing file yields an empty book
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        let path = path.as_ref();
        if !path.is_file() {
            info!("No character book at {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| CatalogueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_document(&content)
    }

    /// Parse a JSON document
    pub fn from_document(document: &str) -> Result<Self, CatalogueError> {
        let root: serde_json::Value =
            serde_json::from_str(document).map_err(|e| CatalogueError::Malformed(e.to_string()))?;
        let serde_json::Value::Object(entries) = root else {
            return Err(CatalogueError::Malformed(
                "character book must be an object".to_string(),
            ));
        };

        let mut characters = Vec::with_capacity(entries.len());
        for (name, options) in entries {
            let serde_json::Value::Object(options) = options else {
                warn!(character = %name, "Skipping character without options");
                continue;
            };
            let options = options
                .into_iter()
                .filter_map(|(option, prompt)| match prompt {
                    serde_json::Value::String(prompt) => Some((option, prompt)),
                    _ => {
                        warn!(character = %name, option = %option, "Skipping non-text prompt");
                        None
                    }
                })
                .collect();
            characters.push(Character { name, options });
        }

        Ok(Self { characters })
    }

    fn find(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.name == name)
    }

    /// Character names
    pub fn names(&self) -> Vec<&str> {
        self.characters.iter().map(|c| c.name.as_str()).collect()
    }

    /// Every option name used by any character, first-seen order
    pub fn all_options(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for character in &self.characters {
            for (option, _) in &character.options {
                if !seen.contains(&option.as_str()) {
                    seen.push(option);
                }
            }
        }
        seen
    }

    /// Option names of one character (empty when unknown)
    pub fn options_for(&self, name: &str) -> Vec<&str> {
        self.find(name)
            .map(|c| c.options.iter().map(|(o, _)| o.as_str()).collect())
            .unwrap_or_default()
    }

    /// Prompt of a character option (empty when unknown)
    pub fn prompt_for(&self, name: &str, option: &str) -> &str {
        self.find(name)
            .and_then(|c| c.options.iter().find(|(o, _)| o == option))
            .map(|(_, prompt)| prompt.as_str())
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}
