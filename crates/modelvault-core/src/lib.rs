//! ModelVault Core - Asset identities and descriptors
//!
//! ModelVault keeps the large binary artifacts of an image-generation
//! pipeline (checkpoints, LoRA adapters, VAE weights) in order: it knows
//! which assets exist, where they come from, whether the bytes on disk are
//! the bytes that were declared, and keeps decoded adapters warm in memory.
//!
//! # Crates
//!
//! ```text
//! modelvault-core       identities, descriptors, config
//!        ↑
//! modelvault-catalogue  alias index over the declared assets
//! modelvault-fetch      descriptor → verified file on disk
//! modelvault-lora       decoded adapters, FIFO cache, stack application
//!        ↑
//! modelvault-cli        the `modelvault` tool
//! ```

pub mod asset;
pub mod config;
pub mod descriptor;
pub mod value;

pub use asset::{AssetId, AssetType, EmptyAssetType};
pub use config::{ConfigError, VaultConfig};
pub use descriptor::{
    AssetDescriptor, CONFIG_MARKER, DESCRIPTOR_EXTENSION, DescriptorError, parse_document,
};
pub use value::{FieldMap, FieldValue};
