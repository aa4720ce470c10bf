//! Per-asset and per-run reports

use crate::integrity::IntegrityError;
use crate::transport::FetchError;
use modelvault_core::DescriptorError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Outcome for one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The destination already existed
    AlreadyPresent,
    /// Fetched during this run
    Downloaded,
    /// No source produced the file
    Failed,
    /// Dry run, or descriptor rejected before any fetch
    Skipped,
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AlreadyPresent => "already present",
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// What went wrong for one asset
#[derive(Debug, Error)]
pub enum SyncErrorKind {
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(#[source] DescriptorError),

    #[error("descriptor declares no model type")]
    MissingType,

    #[error("descriptor declares no identity")]
    MissingIdentity,

    #[error("identity {asset_type}/{id} points outside the models directory")]
    InvalidIdentity { asset_type: String, id: String },

    #[error("source {source_name} failed: {error}")]
    SourceFetchFailed {
        source_name: String,
        #[source]
        error: FetchError,
    },

    #[error("all {attempts} source(s) failed")]
    AllSourcesFailed { attempts: usize },

    #[error("digest mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("could not digest asset: {0}")]
    Integrity(#[source] IntegrityError),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error tagged with the asset it belongs to
#[derive(Debug, Error)]
#[error("{asset}: {kind}")]
pub struct SyncError {
    pub asset: String,
    #[source]
    pub kind: SyncErrorKind,
}

impl SyncError {
    pub fn new(asset: impl Into<String>, kind: SyncErrorKind) -> Self {
        Self {
            asset: asset.into(),
            kind,
        }
    }
}

/// Result of processing one descriptor
#[derive(Debug)]
pub struct AssetReport {
    /// Identity, or the descriptor file name when the identity is unknown
    pub asset: String,
    pub outcome: DownloadOutcome,
    pub destination: Option<PathBuf>,
    pub integrity_mismatch: bool,
    pub digest: Option<String>,
    /// Failed source attempts, in the order they were tried
    pub attempts: Vec<SyncError>,
    pub errors: Vec<SyncError>,
}

impl AssetReport {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            outcome: DownloadOutcome::Skipped,
            destination: None,
            integrity_mismatch: false,
            digest: None,
            attempts: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Record an error for this asset
    pub fn fail(&mut self, kind: SyncErrorKind) {
        if matches!(kind, SyncErrorKind::IntegrityMismatch { .. }) {
            self.integrity_mismatch = true;
        }
        self.errors.push(SyncError::new(self.asset.clone(), kind));
    }
}

/// Aggregate of a whole run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub assets: Vec<AssetReport>,
}

impl BatchReport {
    pub fn new(assets: Vec<AssetReport>) -> Self {
        Self { assets }
    }

    pub fn processed(&self) -> usize {
        self.assets.len()
    }

    pub fn downloaded(&self) -> usize {
        self.count(DownloadOutcome::Downloaded)
    }

    pub fn already_present(&self) -> usize {
        self.count(DownloadOutcome::AlreadyPresent)
    }

    pub fn failed(&self) -> usize {
        self.count(DownloadOutcome::Failed)
    }

    fn count(&self, outcome: DownloadOutcome) -> usize {
        self.assets.iter().filter(|a| a.outcome == outcome).count()
    }

    /// Every recorded error, in descriptor order
    pub fn errors(&self) -> impl Iterator<Item = &SyncError> {
        self.assets.iter().flat_map(|a| a.errors.iter())
    }

    pub fn error_count(&self) -> usize {
        self.assets.iter().map(|a| a.errors.len()).sum()
    }

    /// No errors recorded
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }

    /// Report for one asset
    pub fn asset(&self, name: &str) -> Option<&AssetReport> {
        self.assets.iter().find(|a| a.asset == name)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Processed {} asset(s): {} downloaded, {} already present, {} failed",
            self.processed(),
            self.downloaded(),
            self.already_present(),
            self.failed()
        )?;
        write!(f, "Errors: {}", self.error_count())?;
        for error in self.errors() {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}
