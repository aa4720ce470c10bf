//! ModelVault CLI - Model asset management
//!
//! Keeps the local models directory in sync with its descriptors and
//! answers catalogue, digest and adapter-stack questions.

use clap::{Parser, Subcommand};
use modelvault_core::VaultConfig;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

/// ModelVault - model asset management for image-generation pipelines
#[derive(Parser)]
#[command(name = "modelvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and verify every asset described in a descriptor directory
    Sync {
        /// Directory holding `*.assetinfo` descriptors
        asset_dir: Option<PathBuf>,

        /// Destination root (one sub-directory per asset type)
        #[arg(long)]
        models_dir: Option<PathBuf>,

        /// Report what would be done without fetching or writing
        #[arg(long)]
        dry_run: bool,

        /// Recompute digests of files already on disk
        #[arg(long)]
        force_rehash: bool,

        /// Assets processed concurrently
        #[arg(short, long, default_value = "1")]
        jobs: usize,
    },

    /// Resolve a reference to its canonical identity
    Resolve {
        /// Asset type (checkpoints, loras, vae, ...)
        asset_type: String,

        /// Identity, file name or stem
        reference: String,

        /// Fail instead of echoing an unknown reference
        #[arg(long)]
        strict: bool,
    },

    /// List the identities declared for a type
    List { asset_type: String },

    /// List the categories of a type
    Categories { asset_type: String },

    /// Print the SHA-256 digest of a file
    Hash {
        file: PathBuf,

        /// Ignore the stored digest
        #[arg(short, long)]
        force: bool,
    },

    /// Show characters, their options, or one prompt
    Characters {
        name: Option<String>,
        option: Option<String>,
    },

    /// Work with adapter stacks
    Lora {
        #[command(subcommand)]
        action: LoraAction,
    },
}

#[derive(Subcommand)]
enum LoraAction {
    /// Show the stack and clean prompt parsed from a prompt
    Parse { prompt: String },
    /// Apply the stack parsed from a prompt and show the cache state
    Apply { prompt: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(!cli.no_color)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = VaultConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            asset_dir,
            models_dir,
            dry_run,
            force_rehash,
            jobs,
        } => {
            let asset_dir = asset_dir.unwrap_or_else(|| config.downloads_dir.clone());
            let models_dir = models_dir.unwrap_or_else(|| config.models_dir.clone());
            let options = modelvault_fetch::SyncOptions {
                dry_run,
                force_rehash,
                jobs: jobs.max(1),
            };
            commands::sync::run(&config, &asset_dir, &models_dir, &options)?;
        }

        Commands::Resolve {
            asset_type,
            reference,
            strict,
        } => commands::catalogue::resolve(&config, &asset_type, &reference, strict)?,

        Commands::List { asset_type } => commands::catalogue::list(&config, &asset_type)?,

        Commands::Categories { asset_type } => {
            commands::catalogue::categories(&config, &asset_type)?
        }

        Commands::Hash { file, force } => commands::hash::run(&file, force)?,

        Commands::Characters { name, option } => {
            commands::characters::run(&config, name.as_deref(), option.as_deref())?
        }

        Commands::Lora { action } => match action {
            LoraAction::Parse { prompt } => commands::lora::parse(&prompt),
            LoraAction::Apply { prompt } => commands::lora::apply(&config, &prompt),
        },
    }

    Ok(())
}
