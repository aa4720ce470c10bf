//! Catalogue queries

use modelvault_catalogue::{CatalogueIndex, Resolution};
use modelvault_core::{AssetType, VaultConfig};

fn load(config: &VaultConfig) -> Result<CatalogueIndex, Box<dyn std::error::Error>> {
    let index = CatalogueIndex::load(&config.catalogue_path)?;
    for collision in index.collisions() {
        eprintln!(
            "warning: alias {} kept for {}, dropped for {}",
            collision.key, collision.kept, collision.dropped
        );
    }
    Ok(index)
}

pub fn resolve(
    config: &VaultConfig,
    asset_type: &str,
    reference: &str,
    strict: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let asset_type: AssetType = asset_type.parse()?;
    let index = load(config)?;

    match index.resolve(&asset_type, reference) {
        Resolution::Resolved(id) => println!("{}", id),
        Resolution::Unresolved(raw) if strict => {
            return Err(format!("No {} asset matches '{}'", asset_type, raw).into());
        }
        Resolution::Unresolved(raw) => println!("{}", raw),
    }
    Ok(())
}

pub fn list(config: &VaultConfig, asset_type: &str) -> Result<(), Box<dyn std::error::Error>> {
    let asset_type: AssetType = asset_type.parse()?;
    let index = load(config)?;

    let ids = index.list_by_type(&asset_type);
    if ids.is_empty() {
        println!("No {} assets declared.", asset_type);
        return Ok(());
    }

    println!("=== {} ({}) ===", asset_type, ids.len());
    for id in ids {
        println!("  {}", id);
    }
    Ok(())
}

pub fn categories(
    config: &VaultConfig,
    asset_type: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let asset_type: AssetType = asset_type.parse()?;
    let index = load(config)?;

    for category in index.categories_of(&asset_type) {
        if category.is_empty() {
            println!("  (root)");
        } else {
            println!("  {}", category);
        }
    }
    Ok(())
}
