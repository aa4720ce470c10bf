//! Stack application
//!
//! Walks a stack in order, decodes (or reuses) every adapter and composes
//! it onto the model and clip handles. One bad entry never fails the whole
//! request: it is logged, left out of the applied stack, and leaves both
//! handles untouched. Duplicates are only skipped once a same-named entry
//! has been applied.

use crate::adapter::{AdapterTarget, AdapterWeights, PatchTarget};
use crate::cache::WeightCache;
use crate::error::Result;
use crate::loader::{AdapterResolver, SafetensorsLoader, SearchPaths, WeightLoader};
use crate::stack::StackEntry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where an applied payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Decoded from disk and added to the cache
    Disk,
    /// Retrieved from the cache
    Cache,
}

/// One applied stack entry
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEntry {
    pub entry: StackEntry,
    pub path: PathBuf,
    pub provenance: Provenance,
}

/// Result of applying a stack
#[derive(Debug)]
pub struct AppliedStack<M, C> {
    pub applied: Vec<AppliedEntry>,
    pub model: M,
    pub clip: Option<C>,
}

impl<M, C> AppliedStack<M, C> {
    /// Entries that were applied, in order
    pub fn stack(&self) -> Vec<StackEntry> {
        self.applied.iter().map(|a| a.entry.clone()).collect()
    }
}

/// Applies adapter stacks through a shared weight cache
pub struct LoraApplicator<R = SearchPaths, L = SafetensorsLoader> {
    resolver: R,
    loader: L,
    cache: Arc<WeightCache>,
}

impl<R: AdapterResolver, L: WeightLoader> LoraApplicator<R, L> {
    pub fn new(resolver: R, loader: L, cache: Arc<WeightCache>) -> Self {
        Self {
            resolver,
            loader,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<WeightCache> {
        &self.cache
    }

    /// Apply `stack` to `model` (and `clip` when given)
    pub fn apply_stack<M: PatchTarget, C: PatchTarget>(
        &self,
        stack: &[StackEntry],
        mut model: M,
        mut clip: Option<C>,
    ) -> AppliedStack<M, C> {
        let mut applied = Vec::new();
        if stack.is_empty() {
            return AppliedStack {
                applied,
                model,
                clip,
            };
        }

        info!(entries = stack.len(), "Applying adapter stack");
        let mut seen: HashSet<&str> = HashSet::new();

        for entry in stack {
            if entry.is_noop() {
                info!(lora = %entry.name, "SKIP - strength=0");
                continue;
            }
            if seen.contains(entry.name.as_str()) {
                warn!(lora = %entry.name, "SKIP - already in stack");
                continue;
            }

            match self.apply_entry(entry, &mut model, clip.as_mut()) {
                Ok(done) => {
                    seen.insert(entry.name.as_str());
                    let source = match done.provenance {
                        Provenance::Disk => "loaded from disk (added to cache)",
                        Provenance::Cache => "retrieved from cache",
                    };
                    info!(lora = %entry.name, "OK - {}", source);
                    applied.push(done);
                }
                Err(e) => warn!(lora = %entry.name, "ERROR - {}", e),
            }
        }

        for done in &applied {
            debug!(
                lora = %done.entry.name,
                model = done.entry.strength_model,
                clip = done.entry.strength_clip,
                "Final stack"
            );
        }
        for path in self.cache.paths() {
            debug!("Cached {:?}", path);
        }

        AppliedStack {
            applied,
            model,
            clip,
        }
    }

    fn apply_entry<M: PatchTarget, C: PatchTarget>(
        &self,
        entry: &StackEntry,
        model: &mut M,
        clip: Option<&mut C>,
    ) -> Result<AppliedEntry> {
        let path = self.resolver.resolve(&entry.name)?;
        let (payload, provenance) = self.payload(&path)?;

        let patch_model = entry.strength_model != 0.0;
        let clip = clip.filter(|_| entry.strength_clip != 0.0);

        // both handles are checked before either changes
        if patch_model {
            model.check_patch(&payload, AdapterTarget::Model)?;
        }
        if let Some(clip) = clip.as_deref() {
            clip.check_patch(&payload, AdapterTarget::Clip)?;
        }

        if patch_model {
            model.apply_patch(&payload, AdapterTarget::Model, entry.strength_model)?;
        }
        if let Some(clip) = clip {
            clip.apply_patch(&payload, AdapterTarget::Clip, entry.strength_clip)?;
        }

        Ok(AppliedEntry {
            entry: entry.clone(),
            path,
            provenance,
        })
    }

    /// Cached payload, or decode outside the lock and admit
    fn payload(&self, path: &Path) -> Result<(Arc<AdapterWeights>, Provenance)> {
        if let Some(payload) = self.cache.get(path) {
            return Ok((payload, Provenance::Cache));
        }

        let decoded = Arc::new(self.loader.load(path)?);
        let (payload, evicted) = self.cache.admit(path.to_path_buf(), decoded);
        for old in evicted {
            debug!("Evicted {:?} from cache", old);
        }
        Ok((payload, Provenance::Disk))
    }
}
