//! Sync command

use modelvault_core::VaultConfig;
use modelvault_fetch::{
    Credentials, DownloadOutcome, FetchPipeline, HttpDownloader, RcloneStorage, SyncOptions,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub fn run(
    config: &VaultConfig,
    asset_dir: &Path,
    models_dir: &Path,
    options: &SyncOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Syncing {} into {}",
        asset_dir.display(),
        models_dir.display()
    );

    // Progress bars from several workers interleave badly
    let downloader = HttpDownloader::new(
        Duration::from_secs(config.fetch_timeout_secs),
        &config.user_agent,
    )?
    .with_progress(options.jobs <= 1);

    let credentials: Credentials = config.credentials.iter().collect();
    let pipeline = FetchPipeline::new(downloader, RcloneStorage::new())
        .with_credentials(credentials)
        .with_storage_id(config.cloud_storage_id.clone());

    let report = pipeline.sync(asset_dir, models_dir, options)?;

    if options.dry_run {
        println!("=== Dry run ===");
    }
    for asset in &report.assets {
        let marker = match asset.outcome {
            DownloadOutcome::Downloaded => "+",
            DownloadOutcome::AlreadyPresent => "=",
            DownloadOutcome::Failed => "!",
            DownloadOutcome::Skipped => "-",
        };
        match &asset.destination {
            Some(dest) => println!("  {} {} -> {}", marker, asset.asset, dest.display()),
            None => println!("  {} {}", marker, asset.asset),
        }
        if let Some(digest) = &asset.digest {
            println!("      sha256 {}", digest);
        }
    }
    println!();
    println!("{}", report);

    if report.is_clean() {
        Ok(())
    } else {
        Err(format!("Sync finished with {} error(s)", report.error_count()).into())
    }
}
