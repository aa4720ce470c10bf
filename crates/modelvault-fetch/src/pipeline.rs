//! Descriptor-driven synchronization
//!
//! For every `*.assetinfo` file in a directory the pipeline makes sure the
//! asset exists under `<root>/<type>/<id>`, fetching it from the declared
//! sources (then remote storage) when it does not, checks its digest and
//! leaves a copy of the descriptor next to it.
//!
//! Nothing that goes wrong with one asset stops the run: every problem is
//! recorded in that asset's [`AssetReport`].

use crate::integrity::{IntegrityVerifier, digests_match, sibling_path};
use crate::report::{AssetReport, BatchReport, DownloadOutcome, SyncError, SyncErrorKind};
use crate::source::{Candidate, Credentials, SourcePlan, remote_path};
use crate::transport::{Downloader, FetchError, RemoteStorage};
use modelvault_core::{AssetDescriptor, AssetId, AssetType, DESCRIPTOR_EXTENSION};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Options for one run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Report what would happen without fetching or writing anything
    pub dry_run: bool,
    /// Recompute digests of pre-existing files
    pub force_rehash: bool,
    /// Assets processed concurrently
    pub jobs: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force_rehash: false,
            jobs: 1,
        }
    }
}

/// Fetches and verifies assets described by descriptor files
pub struct FetchPipeline<D, R> {
    downloader: D,
    remote: R,
    verifier: IntegrityVerifier,
    credentials: Credentials,
    storage_id: Option<String>,
}

impl<D: Downloader, R: RemoteStorage> FetchPipeline<D, R> {
    pub fn new(downloader: D, remote: R) -> Self {
        Self {
            downloader,
            remote,
            verifier: IntegrityVerifier::new(),
            credentials: Credentials::new(),
            storage_id: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Remote storage used when every explicit source fails
    pub fn with_storage_id(mut self, storage_id: Option<String>) -> Self {
        self.storage_id = storage_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn with_verifier(mut self, verifier: IntegrityVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Descriptor files directly under `asset_dir`, sorted by name
    pub fn scan(asset_dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
        let entries = std::fs::read_dir(asset_dir).map_err(|source| FetchError::Io {
            path: asset_dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .map(|ext| ext == DESCRIPTOR_EXTENSION)
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Process every descriptor under `asset_dir`
    pub fn sync(
        &self,
        asset_dir: &Path,
        destination_root: &Path,
        options: &SyncOptions,
    ) -> Result<BatchReport, FetchError> {
        let files = Self::scan(asset_dir)?;
        let total = files.len();
        info!("Descriptors dir is {:?}", asset_dir);
        info!("Models dir is {:?}", destination_root);

        let process = |(n, path): (usize, &PathBuf)| {
            info!("[{}/{}] Scanning {:?}", n + 1, total, path.file_name().unwrap_or_default());
            self.process(path, destination_root, options)
        };

        let assets: Vec<AssetReport> = if options.jobs > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(options.jobs)
                .build()
            {
                Ok(pool) => pool.install(|| files.par_iter().enumerate().map(process).collect()),
                Err(e) => {
                    warn!("Falling back to sequential processing: {}", e);
                    files.iter().enumerate().map(process).collect()
                }
            }
        } else {
            files.iter().enumerate().map(process).collect()
        };

        let report = BatchReport::new(assets);
        if report.is_clean() {
            info!("Execution terminated without errors");
        } else {
            warn!("There were {} errors", report.error_count());
        }
        Ok(report)
    }

    /// Process one descriptor file
    pub fn process(
        &self,
        descriptor_path: &Path,
        destination_root: &Path,
        options: &SyncOptions,
    ) -> AssetReport {
        let label = descriptor_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let descriptor = match AssetDescriptor::from_file(descriptor_path) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(descriptor = %label, "Skipping descriptor: {}", e);
                let mut report = AssetReport::new(label);
                report.fail(SyncErrorKind::MalformedDescriptor(e));
                return report;
            }
        };

        let id = descriptor.id();
        let mut report = AssetReport::new(if id.is_empty() {
            label
        } else {
            id.to_string()
        });

        let Some(asset_type) = descriptor.asset_type() else {
            warn!(asset = %report.asset, "The model type is not defined");
            report.fail(SyncErrorKind::MissingType);
            return report;
        };
        if id.is_empty() {
            warn!(asset = %report.asset, "The model identity is not defined");
            report.fail(SyncErrorKind::MissingIdentity);
            return report;
        }

        if !id.is_contained() || !asset_type.is_directory_name() {
            warn!(asset = %report.asset, "The model identity escapes the models directory");
            report.fail(SyncErrorKind::InvalidIdentity {
                asset_type: asset_type.to_string(),
                id: id.to_string(),
            });
            return report;
        }

        let dest = destination_root
            .join(asset_type.as_str())
            .join(id.to_relative_path());
        debug!(asset = %id, "Full path {:?}", dest);
        report.destination = Some(dest.clone());

        let exists = dest.is_file();
        if exists {
            info!(asset = %id, "File already exists, skipping download");
            report.outcome = DownloadOutcome::AlreadyPresent;
        }

        if options.dry_run {
            return report;
        }

        let mut downloaded = false;
        if !exists {
            downloaded = self.fetch(&descriptor, asset_type, id, &dest, &mut report);
            report.outcome = if downloaded {
                DownloadOutcome::Downloaded
            } else {
                DownloadOutcome::Failed
            };
        }

        if dest.is_file() {
            self.verify(&descriptor, &dest, downloaded || options.force_rehash, &mut report);
            copy_descriptor(descriptor_path, &dest, downloaded, &mut report);
        }

        report
    }

    /// Try every source in order; true once the destination exists
    fn fetch(
        &self,
        descriptor: &AssetDescriptor,
        asset_type: &AssetType,
        id: &AssetId,
        dest: &Path,
        report: &mut AssetReport,
    ) -> bool {
        if let Some(parent) = dest.parent() {
            if let Err(source) = std::fs::create_dir_all(parent) {
                report.fail(SyncErrorKind::Io {
                    path: parent.to_path_buf(),
                    source,
                });
                return false;
            }
        }

        let plan = SourcePlan::for_descriptor(descriptor, &self.credentials);
        for candidate in plan.candidates() {
            let result = match candidate {
                Candidate::Http { url, display: shown } => {
                    info!(asset = %id, "Downloading from {}", shown);
                    self.download(url, dest)
                }
                Candidate::Invalid { raw, reason } => Err(FetchError::InvalidUrl {
                    url: raw.clone(),
                    reason: reason.clone(),
                }),
            };

            match result {
                Ok(bytes) => {
                    info!(asset = %id, bytes, "Download complete");
                    return true;
                }
                Err(error) => {
                    warn!(asset = %id, "Download from {} failed: {}", candidate.display(), error);
                    report.attempts.push(SyncError::new(
                        id.as_str(),
                        SyncErrorKind::SourceFetchFailed {
                            source_name: candidate.display().to_string(),
                            error,
                        },
                    ));
                }
            }
        }

        match &self.storage_id {
            Some(storage_id) => {
                let remote = remote_path(storage_id, asset_type, id);
                info!(asset = %id, "Trying remote storage {}", remote);
                let dest_dir = dest.parent().unwrap_or(dest);
                let result = self.remote.copy(&remote, dest_dir).and_then(|()| {
                    if dest.is_file() {
                        Ok(())
                    } else {
                        Err(FetchError::Remote {
                            remote: remote.clone(),
                            message: "copy produced no file".to_string(),
                        })
                    }
                });

                match result {
                    Ok(()) => return true,
                    Err(error) => {
                        warn!(asset = %id, "{}", error);
                        report.attempts.push(SyncError::new(
                            id.as_str(),
                            SyncErrorKind::SourceFetchFailed {
                                source_name: remote,
                                error,
                            },
                        ));
                    }
                }
            }
            None => debug!(asset = %id, "No remote storage configured"),
        }

        warn!(asset = %id, "Could not download the file from any source");
        report.fail(SyncErrorKind::AllSourcesFailed {
            attempts: report.attempts.len(),
        });
        false
    }

    /// Download into `<dest>.part` and move it into place on success
    fn download(&self, url: &url::Url, dest: &Path) -> Result<u64, FetchError> {
        let partial = partial_path(dest);
        let result = self.downloader.fetch(url, &partial).and_then(|bytes| {
            std::fs::rename(&partial, dest).map_err(|source| FetchError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
            Ok(bytes)
        });

        if result.is_err() && partial.exists() {
            if let Err(e) = std::fs::remove_file(&partial) {
                warn!("Could not remove partial download {:?}: {}", partial, e);
            }
        }
        result
    }

    fn verify(
        &self,
        descriptor: &AssetDescriptor,
        dest: &Path,
        force_recalculate: bool,
        report: &mut AssetReport,
    ) {
        match self.verifier.digest(dest, force_recalculate) {
            Ok(actual) => {
                if let Some(expected) = descriptor.sha256() {
                    if !digests_match(expected, &actual) {
                        warn!(
                            asset = %report.asset,
                            expected = %expected,
                            actual = %actual,
                            "The hash of the file is different from the expected stored hash"
                        );
                        report.fail(SyncErrorKind::IntegrityMismatch {
                            expected: expected.to_string(),
                            actual: actual.clone(),
                        });
                    }
                }
                report.digest = Some(actual);
            }
            Err(e) => report.fail(SyncErrorKind::Integrity(e)),
        }
    }
}

/// `<dest>.part`
fn partial_path(dest: &Path) -> PathBuf {
    sibling_path(dest, "part")
}

/// Keep a copy of the descriptor next to the asset
fn copy_descriptor(descriptor_path: &Path, dest: &Path, downloaded: bool, report: &mut AssetReport) {
    let target = sibling_path(dest, DESCRIPTOR_EXTENSION);
    if target.is_file() && !downloaded {
        debug!(asset = %report.asset, "Descriptor copy already exists, skip");
        return;
    }

    debug!(asset = %report.asset, "Copying descriptor to {:?}", target);
    if let Err(source) = std::fs::copy(descriptor_path, &target) {
        report.fail(SyncErrorKind::Io {
            path: target,
            source,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;
    use tempfile::TempDir;
    use url::Url;

    /// Serves fixed bodies; unknown URLs write a few bytes and then fail
    #[derive(Default)]
    struct FakeDownloader {
        bodies: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeDownloader {
        fn serving(url: &str, body: &[u8]) -> Self {
            let mut fake = Self::default();
            fake.bodies.insert(url.to_string(), body.to_vec());
            fake
        }
    }

    impl Downloader for FakeDownloader {
        fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, FetchError> {
            self.calls.lock().push(url.to_string());
            match self.bodies.get(url.as_str()) {
                Some(body) => {
                    std::fs::write(dest, body).unwrap();
                    Ok(body.len() as u64)
                }
                None => {
                    std::fs::write(dest, b"trunc").unwrap();
                    Err(FetchError::Status {
                        status: 404,
                        url: url.to_string(),
                    })
                }
            }
        }
    }

    /// Remote copy that optionally produces a file
    #[derive(Default)]
    struct FakeStorage {
        payload: Option<Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl RemoteStorage for FakeStorage {
        fn copy(&self, remote: &str, dest_dir: &Path) -> Result<(), FetchError> {
            self.calls.lock().push(remote.to_string());
            match &self.payload {
                Some(payload) => {
                    let name = remote.rsplit('/').next().unwrap();
                    std::fs::write(dest_dir.join(name), payload).unwrap();
                    Ok(())
                }
                None => Err(FetchError::Remote {
                    remote: remote.to_string(),
                    message: "not found".to_string(),
                }),
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        assets: PathBuf,
        models: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let assets = dir.path().join("downloads");
            let models = dir.path().join("models");
            std::fs::create_dir_all(&assets).unwrap();
            Self {
                _dir: dir,
                assets,
                models,
            }
        }

        fn descriptor(&self, name: &str, block: &str) {
            std::fs::write(
                self.assets.join(name),
                format!("Notes about {name}\nCONFIG-DATA::\n{block}"),
            )
            .unwrap();
        }
    }

    fn sha256(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    const INK: &str = "id: FLUX/ink.safetensors\nmodel_type: loras\nurl: https://example.com/ink\n";

    #[test]
    fn test_download_with_matching_digest() {
        let fx = Fixture::new();
        fx.descriptor(
            "ink.assetinfo",
            &format!("{INK}hash:\n  sha256: {}\n", sha256(b"ink weights").to_uppercase()),
        );

        let pipeline = FetchPipeline::new(
            FakeDownloader::serving("https://example.com/ink", b"ink weights"),
            FakeStorage::default(),
        );
        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        assert!(report.is_clean(), "{report}");
        let asset = report.asset("FLUX/ink.safetensors").unwrap();
        assert_eq!(asset.outcome, DownloadOutcome::Downloaded);
        assert_eq!(asset.digest.as_deref(), Some(sha256(b"ink weights").as_str()));

        let dest = fx.models.join("loras").join("FLUX").join("ink.safetensors");
        assert_eq!(std::fs::read(&dest).unwrap(), b"ink weights");
        assert!(fx.models.join("loras/FLUX/ink.safetensors.sha256").is_file());
        assert!(!fx.models.join("loras/FLUX/ink.safetensors.part").exists());
    }

    #[test]
    fn test_wrong_digest_is_recorded_not_fatal() {
        let fx = Fixture::new();
        fx.descriptor("a.assetinfo", &format!("{INK}hash:\n  sha256: 0000\n"));
        fx.descriptor(
            "b.assetinfo",
            "id: ae.safetensors\nmodel_type: vae\nurl: https://example.com/ae\n",
        );

        let mut downloader = FakeDownloader::serving("https://example.com/ink", b"ink weights");
        downloader
            .bodies
            .insert("https://example.com/ae".to_string(), b"vae".to_vec());
        let pipeline = FetchPipeline::new(downloader, FakeStorage::default());
        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        assert_eq!(report.processed(), 2);
        assert_eq!(report.error_count(), 1);
        let errors: Vec<_> = report.errors().collect();
        assert!(matches!(
            errors[0].kind,
            SyncErrorKind::IntegrityMismatch { .. }
        ));
        assert!(report.asset("FLUX/ink.safetensors").unwrap().integrity_mismatch);
        assert!(fx.models.join("loras/FLUX/ink.safetensors").is_file());
        assert!(fx.models.join("vae/ae.safetensors").is_file());
    }

    #[test]
    fn test_remote_fallback() {
        let fx = Fixture::new();
        fx.descriptor("ink.assetinfo", INK);

        let storage = FakeStorage {
            payload: Some(b"from remote".to_vec()),
            ..Default::default()
        };
        let pipeline = FetchPipeline::new(FakeDownloader::default(), storage)
            .with_storage_id(Some("drive".to_string()));
        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        let asset = report.asset("FLUX/ink.safetensors").unwrap();
        assert_eq!(asset.outcome, DownloadOutcome::Downloaded);
        assert_eq!(asset.attempts.len(), 1);
        assert!(report.is_clean());
        assert_eq!(
            *pipeline.remote.calls.lock(),
            vec!["drive:models/loras/FLUX/ink.safetensors".to_string()]
        );
        // the failed HTTP attempt left nothing behind
        assert!(!fx.models.join("loras/FLUX/ink.safetensors.part").exists());
    }

    #[test]
    fn test_all_sources_failed() {
        let fx = Fixture::new();
        fx.descriptor(
            "ink.assetinfo",
            &format!("{INK}download:\n  - url: https://mirror.example.com/ink\n"),
        );

        let pipeline = FetchPipeline::new(FakeDownloader::default(), FakeStorage::default())
            .with_storage_id(Some("drive".to_string()));
        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        let asset = report.asset("FLUX/ink.safetensors").unwrap();
        assert_eq!(asset.outcome, DownloadOutcome::Failed);
        assert_eq!(asset.attempts.len(), 3);
        assert!(matches!(
            asset.errors[0].kind,
            SyncErrorKind::AllSourcesFailed { attempts: 3 }
        ));
        assert_eq!(
            *pipeline.downloader.calls.lock(),
            vec![
                "https://example.com/ink".to_string(),
                "https://mirror.example.com/ink".to_string()
            ]
        );
        assert!(!fx.models.join("loras/FLUX/ink.safetensors").exists());
        assert!(!fx.models.join("loras/FLUX/ink.safetensors.assetinfo").exists());
    }

    #[test]
    fn test_without_storage_id_skips_remote() {
        let fx = Fixture::new();
        fx.descriptor("ink.assetinfo", INK);

        let pipeline = FetchPipeline::new(FakeDownloader::default(), FakeStorage::default())
            .with_storage_id(Some("  ".to_string()));
        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert!(pipeline.remote.calls.lock().is_empty());
    }

    #[test]
    fn test_rejected_descriptors_do_not_stop_the_run() {
        let fx = Fixture::new();
        fx.descriptor("a.assetinfo", "id: x.safetensors\nurl: https://example.com/x\n");
        fx.descriptor("b.assetinfo", "model_type: loras\n");
        fx.descriptor("c.assetinfo", "- not\n- a map\n");
        fx.descriptor("d.assetinfo", INK);

        let pipeline = FetchPipeline::new(
            FakeDownloader::serving("https://example.com/ink", b"ink"),
            FakeStorage::default(),
        );
        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        assert_eq!(report.processed(), 4);
        assert_eq!(report.error_count(), 3);
        assert!(matches!(
            report.asset("x.safetensors").unwrap().errors[0].kind,
            SyncErrorKind::MissingType
        ));
        assert!(matches!(
            report.asset("b.assetinfo").unwrap().errors[0].kind,
            SyncErrorKind::MissingIdentity
        ));
        assert!(matches!(
            report.asset("c.assetinfo").unwrap().errors[0].kind,
            SyncErrorKind::MalformedDescriptor(_)
        ));
        assert_eq!(report.downloaded(), 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let fx = Fixture::new();
        fx.descriptor("ink.assetinfo", INK);
        fx.descriptor("ae.assetinfo", "id: ae.safetensors\nmodel_type: vae\n");
        let existing = fx.models.join("vae/ae.safetensors");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"vae").unwrap();

        let pipeline = FetchPipeline::new(
            FakeDownloader::serving("https://example.com/ink", b"ink"),
            FakeStorage::default(),
        );
        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = pipeline.sync(&fx.assets, &fx.models, &options).unwrap();

        assert_eq!(
            report.asset("ae.safetensors").unwrap().outcome,
            DownloadOutcome::AlreadyPresent
        );
        assert_eq!(
            report.asset("FLUX/ink.safetensors").unwrap().outcome,
            DownloadOutcome::Skipped
        );
        assert!(pipeline.downloader.calls.lock().is_empty());
        assert!(!fx.models.join("loras").exists());
        assert!(!fx.models.join("vae/ae.safetensors.sha256").exists());
        assert!(!fx.models.join("vae/ae.safetensors.assetinfo").exists());
    }

    #[test]
    fn test_existing_file_reuses_sidecar() {
        let fx = Fixture::new();
        fx.descriptor(
            "ae.assetinfo",
            "id: ae.safetensors\nmodel_type: vae\nhash:\n  sha256: AAAA\n",
        );
        let existing = fx.models.join("vae/ae.safetensors");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"vae").unwrap();
        std::fs::write(fx.models.join("vae/ae.safetensors.sha256"), "aaaa").unwrap();

        let pipeline = FetchPipeline::new(FakeDownloader::default(), FakeStorage::default());

        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();
        assert!(report.is_clean(), "{report}");
        assert_eq!(report.already_present(), 1);

        let options = SyncOptions {
            force_rehash: true,
            ..Default::default()
        };
        let report = pipeline.sync(&fx.assets, &fx.models, &options).unwrap();
        assert!(report.asset("ae.safetensors").unwrap().integrity_mismatch);
    }

    #[test]
    fn test_token_only_for_matching_host() {
        let fx = Fixture::new();
        fx.descriptor(
            "ink.assetinfo",
            "id: ink.safetensors\nmodel_type: loras\n\
url: https://civitai.com/api/download/1\n\
download:\n  - url: https://huggingface.co/ink\n",
        );

        let pipeline = FetchPipeline::new(FakeDownloader::default(), FakeStorage::default())
            .with_credentials(Credentials::new().with_token("civitai.com", "secret"));
        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        assert_eq!(
            *pipeline.downloader.calls.lock(),
            vec![
                "https://civitai.com/api/download/1?token=secret".to_string(),
                "https://huggingface.co/ink".to_string()
            ]
        );
        // reports never carry the token
        assert!(!report.to_string().contains("secret"));
    }

    #[test]
    fn test_descriptor_copy_kept_for_existing_assets() {
        let fx = Fixture::new();
        fx.descriptor("ink.assetinfo", INK);

        let pipeline = FetchPipeline::new(
            FakeDownloader::serving("https://example.com/ink", b"ink"),
            FakeStorage::default(),
        );
        pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        let copy = fx.models.join("loras/FLUX/ink.safetensors.assetinfo");
        assert!(
            std::fs::read_to_string(&copy)
                .unwrap()
                .starts_with("Notes about ink.assetinfo")
        );

        // an existing copy is left alone when nothing was downloaded
        std::fs::write(&copy, "edited").unwrap();
        pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();
        assert_eq!(std::fs::read_to_string(&copy).unwrap(), "edited");
    }

    #[test]
    fn test_parallel_keeps_order() {
        let fx = Fixture::new();
        let mut downloader = FakeDownloader::default();
        for i in 0..8 {
            fx.descriptor(
                &format!("{i:02}.assetinfo"),
                &format!("id: m{i}.safetensors\nmodel_type: loras\nurl: https://example.com/{i}\n"),
            );
            downloader
                .bodies
                .insert(format!("https://example.com/{i}"), vec![i as u8; 16]);
        }

        let pipeline = FetchPipeline::new(downloader, FakeStorage::default());
        let options = SyncOptions {
            jobs: 4,
            ..Default::default()
        };
        let report = pipeline.sync(&fx.assets, &fx.models, &options).unwrap();

        let order: Vec<_> = report.assets.iter().map(|a| a.asset.clone()).collect();
        let expected: Vec<_> = (0..8).map(|i| format!("m{i}.safetensors")).collect();
        assert_eq!(order, expected);
        assert_eq!(report.downloaded(), 8);
    }

    #[test]
    fn test_identity_outside_models_dir_is_rejected() {
        let fx = Fixture::new();
        fx.descriptor(
            "a.assetinfo",
            "id: ../../escaped.bin\nmodel_type: loras\nurl: https://example.com/x\n",
        );
        fx.descriptor(
            "b.assetinfo",
            "id: x.bin\nmodel_type: ../up\nurl: https://example.com/x\n",
        );

        let pipeline = FetchPipeline::new(
            FakeDownloader::serving("https://example.com/x", b"x"),
            FakeStorage::default(),
        )
        .with_storage_id(Some("drive".to_string()));
        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        assert_eq!(report.error_count(), 2);
        for asset in &report.assets {
            assert!(matches!(
                asset.errors[0].kind,
                SyncErrorKind::InvalidIdentity { .. }
            ));
            assert!(asset.destination.is_none());
        }
        assert!(pipeline.downloader.calls.lock().is_empty());
        assert!(pipeline.remote.calls.lock().is_empty());
        assert!(!fx.models.exists());
        assert!(!fx._dir.path().join("escaped.bin").exists());
    }

    #[test]
    fn test_declared_type_spelling_is_kept() {
        let fx = Fixture::new();
        fx.descriptor("a.assetinfo", "id: a.bin\nmodel_type: lora\n");

        let storage = FakeStorage {
            payload: Some(b"a".to_vec()),
            ..Default::default()
        };
        let pipeline = FetchPipeline::new(FakeDownloader::default(), storage)
            .with_storage_id(Some("drive".to_string()));
        let report = pipeline
            .sync(&fx.assets, &fx.models, &SyncOptions::default())
            .unwrap();

        assert!(report.is_clean(), "{report}");
        assert!(fx.models.join("lora/a.bin").is_file());
        assert!(!fx.models.join("loras").exists());
        assert_eq!(
            *pipeline.remote.calls.lock(),
            vec!["drive:models/lora/a.bin".to_string()]
        );
    }

    #[test]
    fn test_missing_asset_dir() {
        let fx = Fixture::new();
        let pipeline = FetchPipeline::new(FakeDownloader::default(), FakeStorage::default());
        let result = pipeline.sync(&fx.assets.join("nope"), &fx.models, &SyncOptions::default());
        assert!(matches!(result, Err(FetchError::Io { .. })));
    }
}
