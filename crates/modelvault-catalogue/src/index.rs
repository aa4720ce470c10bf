//! Catalogue index
//!
//! The catalogue document lists the known assets per type:
//!
//! ```json
//! {
//!   "checkpoints": [
//!     { "id": "FLUX/base.safetensors", "sampler": "euler", "steps": 20 }
//!   ],
//!   "loras": [
//!     { "id": "FLUX/styles/ink.safetensors", "strength": 0.7 }
//!   ]
//! }
//! ```
//!
//! Every entry is reachable under three aliases (full identity, file name,
//! stem), namespaced by type as `type@alias`. When two entries claim the
//! same alias the first declared one keeps it.

use modelvault_core::{AssetId, AssetType, FieldMap, FieldValue};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Catalogue errors
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("Failed to read catalogue {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalogue: {0}")]
    Malformed(String),
}

/// A declared catalogue entry
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueEntry {
    /// Canonical identity
    pub id: AssetId,
    /// Asset type the entry is declared under
    pub asset_type: AssetType,
    /// Every declared field, `id` included
    pub attributes: FieldMap,
}

impl CatalogueEntry {
    /// Declared attribute
    pub fn attribute(&self, key: &str) -> Option<&FieldValue> {
        self.attributes.get(key)
    }
}

/// An alias claimed by more than one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// Namespaced key (`type@alias`)
    pub key: String,
    /// Entry that keeps the alias
    pub kept: AssetId,
    /// Entry that lost it
    pub dropped: AssetId,
}

/// Outcome of a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An alias matched; carries the canonical identity
    Resolved(AssetId),
    /// Nothing matched; carries the reference unchanged
    Unresolved(String),
}

impl Resolution {
    /// Whether an alias matched
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// Lenient form: the canonical identity, or the input echoed back
    pub fn into_identity(self) -> String {
        match self {
            Self::Resolved(id) => id.into(),
            Self::Unresolved(reference) => reference,
        }
    }

    /// Strict form
    pub fn resolved(self) -> Option<AssetId> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::Unresolved(_) => None,
        }
    }
}

/// Multi-key lookup over the catalogue
#[derive(Debug, Clone, Default)]
pub struct CatalogueIndex {
    /// Types in document order
    types: Vec<AssetType>,
    /// Entries per type, in declaration order
    entries: HashMap<AssetType, Vec<CatalogueEntry>>,
    /// Namespaced alias → position in `entries`
    aliases: HashMap<String, (AssetType, usize)>,
    /// Detected alias collisions
    collisions: Vec<Collision>,
}

impl CatalogueIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalogue file; a missing file yields an empty index
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        let path = path.as_ref();

        if !path.is_file() {
            info!("No catalogue at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|source| CatalogueError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_document(&content)?;

        info!(
            entries = index.len(),
            types = index.types.len(),
            "Loaded catalogue from {}",
            path.display()
        );
        Ok(index)
    }

    /// Load a catalogue file, falling back to an empty index on any error
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("{}, using an empty catalogue", e);
            Self::new()
        })
    }

    /// Build the index from a JSON document
    pub fn from_document(document: &str) -> Result<Self, CatalogueError> {
        let root: serde_json::Value =
            serde_json::from_str(document).map_err(|e| CatalogueError::Malformed(e.to_string()))?;
        let serde_json::Value::Object(sections) = root else {
            return Err(CatalogueError::Malformed(
                "top level must be an object keyed by asset type".to_string(),
            ));
        };

        let mut index = Self::new();

        for (type_name, section) in sections {
            let asset_type: AssetType = match type_name.parse() {
                Ok(t) => t,
                Err(_) => {
                    warn!("Skipping catalogue section with an empty type name");
                    continue;
                }
            };
            let serde_json::Value::Array(items) = section else {
                warn!(asset_type = %asset_type, "Skipping catalogue section that is not a list");
                continue;
            };

            for (position, item) in items.into_iter().enumerate() {
                let attributes: FieldMap = match serde_json::from_value(item) {
                    Ok(map) => map,
                    Err(e) => {
                        warn!(asset_type = %asset_type, position, "Skipping catalogue entry: {}", e);
                        continue;
                    }
                };
                let id = attributes
                    .get("id")
                    .and_then(FieldValue::as_str)
                    .map(AssetId::new)
                    .filter(|id| !id.is_empty());
                let Some(id) = id else {
                    warn!(asset_type = %asset_type, position, "Skipping catalogue entry without id");
                    continue;
                };

                index.insert(CatalogueEntry {
                    id,
                    asset_type: asset_type.clone(),
                    attributes,
                });
            }
        }

        if !index.collisions.is_empty() {
            warn!(
                "{} catalogue alias collision(s); first declared entries were kept",
                index.collisions.len()
            );
        }

        Ok(index)
    }

    /// Register an entry under its three aliases
    fn insert(&mut self, entry: CatalogueEntry) {
        let asset_type = entry.asset_type.clone();
        if !self.entries.contains_key(&asset_type) {
            self.types.push(asset_type.clone());
        }
        let list = self.entries.entry(asset_type.clone()).or_default();
        let position = list.len();

        let mut aliases = vec![entry.id.as_str(), entry.id.file_name(), entry.id.stem()];
        aliases.dedup();

        for alias in aliases {
            let key = asset_type.key(alias);
            match self.aliases.get(&key) {
                Some((_, existing)) => {
                    let kept = list[*existing].id.clone();
                    if kept == entry.id {
                        // same identity declared twice
                        debug!(key = %key, "Duplicate catalogue declaration");
                        continue;
                    }
                    warn!(key = %key, kept = %kept, dropped = %entry.id, "Catalogue alias collision");
                    self.collisions.push(Collision {
                        key,
                        kept,
                        dropped: entry.id.clone(),
                    });
                }
                None => {
                    self.aliases.insert(key, (asset_type.clone(), position));
                }
            }
        }

        list.push(entry);
    }

    fn lookup(&self, asset_type: &AssetType, reference: &str) -> Option<&CatalogueEntry> {
        let normalized = AssetId::new(reference);
        let key = asset_type.key(normalized.as_str());
        let (t, position) = self.aliases.get(&key)?;
        self.entries.get(t).and_then(|list| list.get(*position))
    }

    /// Resolve a full path, file name or stem to its canonical identity
    pub fn resolve(&self, asset_type: &AssetType, reference: &str) -> Resolution {
        match self.lookup(asset_type, reference) {
            Some(entry) => Resolution::Resolved(entry.id.clone()),
            None => Resolution::Unresolved(reference.to_string()),
        }
    }

    /// Resolve, returning `None` when nothing matches
    pub fn resolve_strict(&self, asset_type: &AssetType, reference: &str) -> Option<AssetId> {
        self.resolve(asset_type, reference).resolved()
    }

    /// Copy of the entry an alias points to
    pub fn entry(&self, asset_type: &AssetType, reference: &str) -> Option<CatalogueEntry> {
        self.lookup(asset_type, reference).cloned()
    }

    /// Declared entries of a type, in declaration order
    pub fn entries_of(&self, asset_type: &AssetType) -> &[CatalogueEntry] {
        self.entries
            .get(asset_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Identities of a type, in declaration order
    pub fn list_by_type(&self, asset_type: &AssetType) -> Vec<AssetId> {
        self.entries_of(asset_type)
            .iter()
            .map(|e| e.id.clone())
            .collect()
    }

    /// Categories derived from the directories below each asset's root
    ///
    /// `root/styles/vixon/x` belongs to `styles.vixon`; assets directly
    /// under their root belong to the empty category.
    pub fn categories_of(&self, asset_type: &AssetType) -> BTreeSet<String> {
        self.entries_of(asset_type)
            .iter()
            .map(|e| e.id.inner_dirs().join("."))
            .collect()
    }

    /// Declared asset types, in document order
    pub fn types(&self) -> &[AssetType] {
        &self.types
    }

    /// Detected alias collisions
    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    /// Total number of declared entries
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Whether nothing is declared
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "checkpoints": [
            { "id": "FLUX/base.safetensors", "sampler": "euler", "steps": 20 },
            { "id": "SDXL\\styles\\vixon\\anime.safetensors" }
        ],
        "loras": [
            { "id": "FLUX/styles/ink.safetensors", "strength": 0.7 },
            { "id": "SDXL/ink.safetensors" },
            { "id": "SDXL/ink.ckpt" },
            { "name": "no id here" }
        ]
    }"#;

    fn index() -> CatalogueIndex {
        CatalogueIndex::from_document(DOC).unwrap()
    }

    #[test]
    fn test_resolve_all_aliases() {
        let index = index();
        let t = AssetType::Checkpoints;

        for reference in ["FLUX/base.safetensors", "base.safetensors", "base"] {
            assert_eq!(
                index.resolve(&t, reference),
                Resolution::Resolved(AssetId::new("FLUX/base.safetensors")),
                "reference {reference}"
            );
        }
    }

    #[test]
    fn test_resolve_backslash_reference() {
        let index = index();
        assert_eq!(
            index.resolve_strict(&AssetType::Checkpoints, "SDXL\\styles\\vixon\\anime.safetensors"),
            Some(AssetId::new("SDXL/styles/vixon/anime.safetensors"))
        );
    }

    #[test]
    fn test_unresolved_echoes_input() {
        let index = index();
        let resolution = index.resolve(&AssetType::Checkpoints, "unknown");

        assert!(!resolution.is_resolved());
        assert_eq!(resolution.into_identity(), "unknown");
        assert!(index.resolve_strict(&AssetType::Vae, "base").is_none());
    }

    #[test]
    fn test_types_are_namespaced() {
        let index = index();
        // "base" is a checkpoint, not a LoRA
        assert!(index.resolve_strict(&AssetType::Loras, "base").is_none());
    }

    #[test]
    fn test_collisions_keep_first() {
        let index = index();
        let t = AssetType::Loras;

        // file name collision between FLUX/styles/ink and SDXL/ink
        assert_eq!(
            index.resolve_strict(&t, "ink.safetensors"),
            Some(AssetId::new("FLUX/styles/ink.safetensors"))
        );
        // stem collision for all three
        assert_eq!(
            index.resolve_strict(&t, "ink"),
            Some(AssetId::new("FLUX/styles/ink.safetensors"))
        );
        // full identities stay reachable
        assert_eq!(
            index.resolve_strict(&t, "SDXL/ink.ckpt"),
            Some(AssetId::new("SDXL/ink.ckpt"))
        );

        let keys: Vec<&str> = index.collisions().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["loras@ink.safetensors", "loras@ink", "loras@ink"]
        );
    }

    #[test]
    fn test_one_collision_per_alias() {
        let doc = r#"{"loras": [{"id": "a/x.safetensors"}, {"id": "b/x.safetensors"}]}"#;
        let index = CatalogueIndex::from_document(doc).unwrap();

        assert_eq!(index.collisions().len(), 2);
        assert_eq!(index.collisions()[0].key, "loras@x.safetensors");
        assert_eq!(index.collisions()[1].key, "loras@x");
        assert_eq!(index.collisions()[0].dropped, AssetId::new("b/x.safetensors"));
        // dropped entries remain declared
        assert_eq!(index.list_by_type(&AssetType::Loras).len(), 2);
    }

    #[test]
    fn test_same_identity_twice_is_not_a_collision() {
        let doc = r#"{"vae": [{"id": "ae.safetensors"}, {"id": "ae.safetensors"}]}"#;
        let index = CatalogueIndex::from_document(doc).unwrap();
        assert!(index.collisions().is_empty());
    }

    #[test]
    fn test_list_preserves_order() {
        let index = index();
        let ids: Vec<String> = index
            .list_by_type(&AssetType::Loras)
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(
            ids,
            vec![
                "FLUX/styles/ink.safetensors",
                "SDXL/ink.safetensors",
                "SDXL/ink.ckpt"
            ]
        );
        assert_eq!(index.types(), &[AssetType::Checkpoints, AssetType::Loras]);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_type_names_kept_as_declared() {
        let index = CatalogueIndex::from_document(
            r#"{
                "checkpoints": [{"id": "FLUX/base.safetensors"}],
                "checkpoint": [{"id": "SDXL/base.safetensors"}]
            }"#,
        )
        .unwrap();

        let singular: AssetType = "checkpoint".parse().unwrap();
        assert_eq!(index.types(), &[AssetType::Checkpoints, singular.clone()]);
        assert!(index.collisions().is_empty());
        assert_eq!(
            index.resolve_strict(&singular, "base").unwrap().as_str(),
            "SDXL/base.safetensors"
        );
        assert_eq!(
            index.resolve_strict(&AssetType::Checkpoints, "base").unwrap().as_str(),
            "FLUX/base.safetensors"
        );
    }

    #[test]
    fn test_categories() {
        let index = index();

        let checkpoints = index.categories_of(&AssetType::Checkpoints);
        assert_eq!(
            checkpoints.into_iter().collect::<Vec<_>>(),
            vec!["".to_string(), "styles.vixon".to_string()]
        );

        let loras = index.categories_of(&AssetType::Loras);
        assert!(loras.contains("styles"));
        assert!(loras.contains(""));
    }

    #[test]
    fn test_entry_is_a_copy() {
        let index = index();
        let mut entry = index.entry(&AssetType::Checkpoints, "base").unwrap();

        assert_eq!(
            entry.attribute("sampler").and_then(FieldValue::as_str),
            Some("euler")
        );
        entry.attributes.clear();

        let again = index.entry(&AssetType::Checkpoints, "base").unwrap();
        assert_eq!(again.attribute("steps"), Some(&FieldValue::Int(20)));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            CatalogueIndex::from_document("[1, 2]"),
            Err(CatalogueError::Malformed(_))
        ));
        assert!(matches!(
            CatalogueIndex::from_document("{ nope"),
            Err(CatalogueError::Malformed(_))
        ));

        // wrong section shapes are skipped, not fatal
        let index = CatalogueIndex::from_document(r#"{"loras": {"id": "x"}}"#).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let index = CatalogueIndex::load(dir.path().join("catalogue.json")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_load_or_empty_on_bad_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalogue.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(CatalogueIndex::load(&path).is_err());
        assert!(CatalogueIndex::load_or_empty(&path).is_empty());
    }

    #[test]
    fn test_flux_base_scenario() {
        let doc = r#"{"checkpoints": [{"id": "FLUX/base.safetensors"}]}"#;
        let index = CatalogueIndex::from_document(doc).unwrap();

        assert_eq!(
            index.resolve(&AssetType::Checkpoints, "base").into_identity(),
            "FLUX/base.safetensors"
        );
    }
}
