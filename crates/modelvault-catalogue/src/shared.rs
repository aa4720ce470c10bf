//! Shared catalogue handle
//!
//! Lookups work on an immutable snapshot. Rebuilding produces a whole new
//! index which is swapped in at once, so a reader never sees a partially
//! built one.

use crate::index::{CatalogueError, CatalogueIndex};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Cloneable handle to the live catalogue
#[derive(Debug, Clone, Default)]
pub struct SharedCatalogue {
    current: Arc<RwLock<Arc<CatalogueIndex>>>,
}

impl SharedCatalogue {
    /// Wrap an index
    pub fn new(index: CatalogueIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// Current index
    pub fn snapshot(&self) -> Arc<CatalogueIndex> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a new index, returning the previous one
    pub fn replace(&self, index: CatalogueIndex) -> Arc<CatalogueIndex> {
        let next = Arc::new(index);
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Rebuild from a file; on error the live index is left untouched
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<(), CatalogueError> {
        let index = CatalogueIndex::load(path)?;
        let entries = index.len();
        self.replace(index);
        info!(entries, "Catalogue reloaded");
        Ok(())
    }
}
