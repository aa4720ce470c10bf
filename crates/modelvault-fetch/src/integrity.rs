//! Content digests
//!
//! The SHA-256 of an asset is stored next to it in a sidecar file
//! (`ink.safetensors` → `ink.sha256`) holding the lowercase hex digest, so
//! multi-gigabyte files are only hashed once.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Extension of digest sidecar files
pub const SIDECAR_EXTENSION: &str = "sha256";

/// Read buffer size used while hashing
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Serializes sidecar writes across threads
static SIDECAR_WRITES: Mutex<()> = Mutex::new(());

/// Integrity errors
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IntegrityError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `path` with `.extension` appended to its full file name
///
/// `x.safetensors` and `x.ckpt` get distinct siblings.
pub fn sibling_path(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(extension);
    path.with_file_name(name)
}

/// Sidecar path for an asset (`x.safetensors.sha256`)
pub fn sidecar_path(path: &Path) -> PathBuf {
    sibling_path(path, SIDECAR_EXTENSION)
}

/// Case-insensitive comparison of two hex digests
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

/// Computes and caches file digests
#[derive(Debug, Clone)]
pub struct IntegrityVerifier {
    chunk_size: usize,
}

impl IntegrityVerifier {
    /// Create a verifier with the default chunk size
    pub fn new() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Digest of `path`, reusing the sidecar unless `force_recalculate`
    pub fn digest(&self, path: &Path, force_recalculate: bool) -> Result<String, IntegrityError> {
        if !path.is_file() {
            return Err(IntegrityError::FileNotFound(path.to_path_buf()));
        }

        let sidecar = sidecar_path(path);
        if !force_recalculate {
            if let Some(stored) = read_sidecar(&sidecar) {
                debug!(digest = %stored, "Reusing stored digest for {}", path.display());
                return Ok(stored);
            }
        }

        let digest = self.compute(path)?;
        self.store(&sidecar, &digest)?;
        info!(digest = %digest, "Computed digest for {}", path.display());
        Ok(digest)
    }

    /// Hash the full file content without touching the sidecar
    pub fn compute(&self, path: &Path) -> Result<String, IntegrityError> {
        let mut file = File::open(path).map_err(|e| IntegrityError::io(path, e))?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let read = file
                .read(&mut buffer)
                .map_err(|e| IntegrityError::io(path, e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    fn store(&self, sidecar: &Path, digest: &str) -> Result<(), IntegrityError> {
        let _guard = SIDECAR_WRITES.lock();
        let tmp = sidecar.with_extension(format!("{SIDECAR_EXTENSION}.tmp"));
        std::fs::write(&tmp, digest).map_err(|e| IntegrityError::io(&tmp, e))?;
        std::fs::rename(&tmp, sidecar).map_err(|e| IntegrityError::io(sidecar, e))
    }
}

impl Default for IntegrityVerifier {
    fn default() -> Self {
        Self::new()
    }
}

fn read_sidecar(sidecar: &Path) -> Option<String> {
    if !sidecar.is_file() {
        return None;
    }
    match std::fs::read_to_string(sidecar) {
        Ok(content) => {
            let digest = content.trim().to_ascii_lowercase();
            (!digest.is_empty()).then_some(digest)
        }
        Err(e) => {
            warn!("Ignoring unreadable digest file {}: {}", sidecar.display(), e);
            None
        }
    }
}
