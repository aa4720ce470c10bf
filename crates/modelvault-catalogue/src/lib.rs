//! ModelVault Catalogue - Declared assets and their aliases
//!
//! The catalogue is the declarative list of every asset the pipeline knows
//! about. Callers refer to assets loosely (`base`, `ink.safetensors`,
//! `FLUX/styles/ink.safetensors`); the index maps any of those back to the
//! canonical identity.
//!
//! # Lifecycle
//!
//! The index is built once from the catalogue document and is read-only
//! afterwards. [`SharedCatalogue`] hands out snapshots and swaps in a
//! rebuilt index atomically on refresh.

pub mod characters;
pub mod index;
pub mod shared;

pub use characters::{Character, CharacterBook};
pub use index::{CatalogueEntry, CatalogueError, CatalogueIndex, Collision, Resolution};
pub use shared::SharedCatalogue;
