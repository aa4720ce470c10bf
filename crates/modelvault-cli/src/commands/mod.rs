//! CLI command implementations

pub mod catalogue;
pub mod characters;
pub mod hash;
pub mod lora;
pub mod sync;
