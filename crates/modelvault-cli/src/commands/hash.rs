//! Hash command

use modelvault_fetch::IntegrityVerifier;
use std::path::Path;

pub fn run(file: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let digest = IntegrityVerifier::new().digest(file, force)?;
    println!("{}  {}", digest, file.display());
    Ok(())
}
