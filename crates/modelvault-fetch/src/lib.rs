//! ModelVault Fetch - Descriptors to verified files
//!
//! Walks a directory of asset descriptors and makes every declared asset
//! present under the models directory:
//!
//! 1. explicit URLs in declaration order, with per-host access tokens
//! 2. remote storage copy as the last resort
//! 3. SHA-256 check against the declared digest, cached in a sidecar
//!
//! Per-asset failures are collected into a [`BatchReport`]; a run never
//! stops half-way because of one bad descriptor.

pub mod integrity;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod transport;

pub use integrity::{IntegrityError, IntegrityVerifier, SIDECAR_EXTENSION, sibling_path, sidecar_path};
pub use pipeline::{FetchPipeline, SyncOptions};
pub use report::{AssetReport, BatchReport, DownloadOutcome, SyncError, SyncErrorKind};
pub use source::{Candidate, Credentials, SourcePlan, remote_path};
pub use transport::{Downloader, FetchError, HttpDownloader, RcloneStorage, RemoteStorage};
