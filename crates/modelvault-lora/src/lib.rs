//! ModelVault LoRA - Adapter decoding, caching and application
//!
//! LoRA (Low-Rank Adaptation) adapters are small weight files layered on
//! top of a base model with two strengths: one for the diffusion model and
//! one for the text encoder (clip).
//!
//! # Flow
//!
//! ```text
//! "<lora:ink:0.7>" ──extract_lora_tags──▶ [StackEntry]
//!                                             │
//!                         LoraApplicator::apply_stack
//!                                             │
//!        AdapterResolver ─▶ path ─▶ WeightCache hit? ─no─▶ WeightLoader
//!                                             │
//!                              PatchTarget (model, clip)
//! ```
//!
//! The cache is shared between concurrent callers. Decoding happens outside
//! its lock; only the admit-and-evict step is serialized.

pub mod adapter;
pub mod apply;
pub mod cache;
pub mod error;
pub mod loader;
pub mod stack;

pub use adapter::{AdapterTarget, AdapterWeights, LoraLayer, PatchTarget, WeightSet};
pub use apply::{AppliedEntry, AppliedStack, LoraApplicator, Provenance};
pub use cache::{CacheStats, CachedWeight, DEFAULT_MAX_ENTRIES, WeightCache};
pub use error::{LoraError, Result};
pub use loader::{AdapterResolver, LoaderConfig, SafetensorsLoader, SearchPaths, WeightLoader};
pub use stack::{StackEntry, extract_lora_tags, format_entry, stack_to_text, strip_angle_tags};
