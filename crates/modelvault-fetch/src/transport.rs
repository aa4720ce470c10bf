//! Transports that move bytes onto disk
//!
//! [`Downloader`] covers plain HTTP(S) sources and [`RemoteStorage`] the
//! remote-storage fallback. The pipeline only talks to the traits, which
//! keeps it testable without a network.

use crate::source::redact;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Transport errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote copy of {remote} failed: {message}")]
    Remote { remote: String, message: String },

    #[error("Remote storage tool unavailable: {0}")]
    RemoteUnavailable(String),
}

impl FetchError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Fetches one URL into a file
pub trait Downloader: Send + Sync {
    /// Write the body of `url` to `dest`, returning the byte count
    fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, FetchError>;
}

/// Copies one remote object into a local directory
pub trait RemoteStorage: Send + Sync {
    /// Copy `remote` into `dest_dir`, keeping its file name
    fn copy(&self, remote: &str, dest_dir: &Path) -> Result<(), FetchError>;
}

/// Blocking HTTP downloader
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    show_progress: bool,
}

impl HttpDownloader {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            show_progress: true,
        })
    }

    /// Enable or disable the terminal progress bar
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, total: Option<u64>, label: String) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = match total {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        let style = ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] {bar:30.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message(label);
        pb
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, FetchError> {
        let shown = redact(url);
        debug!("Downloading from URL: {}", shown);

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| FetchError::Http(e.without_url()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: shown,
            });
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;
        }

        let label = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pb = self.progress_bar(response.content_length(), label);

        let file = File::create(dest).map_err(|e| FetchError::io(dest, e))?;
        let mut writer = pb.wrap_write(file);
        let written =
            std::io::copy(&mut response, &mut writer).map_err(|e| FetchError::io(dest, e))?;
        pb.finish_and_clear();

        debug!("Downloaded {} bytes to {:?}", written, dest);
        Ok(written)
    }
}

/// Remote storage through the `rclone` command line tool
#[derive(Debug, Clone)]
pub struct RcloneStorage {
    program: PathBuf,
}

impl RcloneStorage {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("rclone"),
        }
    }

    /// Use a specific executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for RcloneStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStorage for RcloneStorage {
    fn copy(&self, remote: &str, dest_dir: &Path) -> Result<(), FetchError> {
        std::fs::create_dir_all(dest_dir).map_err(|e| FetchError::io(dest_dir, e))?;
        debug!("Copying {} into {:?}", remote, dest_dir);

        let output = Command::new(&self.program)
            .arg("copy")
            .arg(remote)
            .arg(dest_dir)
            .output()
            .map_err(|e| {
                FetchError::RemoteUnavailable(format!("{}: {}", self.program.display(), e))
            })?;

        check_output(output.status.success(), &output.stderr).map_err(|message| {
            FetchError::Remote {
                remote: remote.to_string(),
                message,
            }
        })
    }
}

/// Any diagnostic output counts as failure, even with a zero exit code
fn check_output(success: bool, stderr: &[u8]) -> Result<(), String> {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    match (success, stderr.is_empty()) {
        (true, true) => Ok(()),
        (false, true) => Err("non-zero exit status".to_string()),
        _ => Err(stderr.to_string()),
    }
}
