//! Retrieval of converted artifacts.
//!
//! A download runs an ordered list of [`SaveStrategy`] values. The first
//! one that succeeds wins; an expired artifact stops the chain because no
//! other strategy can bring it back.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use convertkit_core::naming::{filename_from_location, numbered_filename};
use convertkit_core::ConversionError;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::api::ConversionApi;

/// Result of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    /// Name derived from the download location.
    pub filename: String,
    /// Where the bytes were written, when the strategy wrote them itself.
    pub path: Option<PathBuf>,
    /// Number of bytes written, when known.
    pub bytes: Option<u64>,
    /// Name of the strategy that delivered the artifact.
    pub strategy: &'static str,
}

/// Why a single strategy did not deliver the artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    /// The service no longer holds the artifact.
    #[error("artifact expired")]
    Expired,

    /// The strategy cannot run in this environment.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

/// One way of getting an artifact to the user.
#[async_trait]
pub trait SaveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn save(
        &self,
        location: &str,
        filename: &str,
        dest_dir: &Path,
    ) -> Result<SavedArtifact, StrategyError>;
}

/// Run `strategies` in order until one delivers the artifact.
///
/// Returns `ArtifactExpired` as soon as any strategy sees the artifact is
/// gone, and `DownloadFailed` carrying the last failure reason when every
/// strategy fails.
pub async fn run_strategies(
    strategies: &[Box<dyn SaveStrategy>],
    location: &str,
    dest_dir: &Path,
) -> Result<SavedArtifact, ConversionError> {
    let filename = filename_from_location(location);
    let mut last_reason = String::from("no download strategy configured");

    for strategy in strategies {
        match strategy.save(location, &filename, dest_dir).await {
            Ok(saved) => {
                tracing::info!(
                    strategy = strategy.name(),
                    filename = %saved.filename,
                    "Artifact delivered",
                );
                return Ok(saved);
            }
            Err(StrategyError::Expired) => {
                tracing::warn!(location, "Artifact expired on the service");
                return Err(ConversionError::ArtifactExpired);
            }
            Err(e) => {
                tracing::warn!(strategy = strategy.name(), error = %e, "Download strategy failed");
                last_reason = e.to_string();
            }
        }
    }

    Err(ConversionError::DownloadFailed(last_reason))
}

// ---------------------------------------------------------------------------
// Fetch to directory
// ---------------------------------------------------------------------------

/// How many numbered alternatives to try before giving up on a name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Fetch the artifact over HTTP and write it under the destination
/// directory.
///
/// An existing file is never replaced: a taken name gets a numeric
/// suffix (`report (1).pdf`). A failed or empty transfer leaves nothing
/// behind.
pub struct FetchToDirectory {
    api: ConversionApi,
}

impl FetchToDirectory {
    /// Fetch through `api`, which resolves expiry and HTTP failures.
    pub fn new(api: ConversionApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SaveStrategy for FetchToDirectory {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn save(
        &self,
        location: &str,
        filename: &str,
        dest_dir: &Path,
    ) -> Result<SavedArtifact, StrategyError> {
        let response = match self.api.fetch_artifact(location).await {
            Ok(response) => response,
            Err(ConversionError::ArtifactExpired) => return Err(StrategyError::Expired),
            Err(e) => return Err(StrategyError::Failed(e.to_string())),
        };

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| StrategyError::Failed(format!("create {}: {e}", dest_dir.display())))?;

        let (dest, mut file) = create_unique(dest_dir, filename)
            .await
            .map_err(|e| StrategyError::Failed(format!("create {filename}: {e}")))?;

        let result = write_body(&mut file, response, &dest).await;
        drop(file);
        let written = match result {
            Ok(written) => written,
            Err(reason) => {
                if let Err(e) = tokio::fs::remove_file(&dest).await {
                    tracing::warn!(path = %dest.display(), error = %e, "Failed to remove partial download");
                }
                return Err(StrategyError::Failed(reason));
            }
        };

        Ok(SavedArtifact {
            filename: filename.to_string(),
            path: Some(dest),
            bytes: Some(written),
            strategy: self.name(),
        })
    }
}

/// Create `filename` (or the first free numbered alternative) under
/// `dest_dir`.
async fn create_unique(dest_dir: &Path, filename: &str) -> io::Result<(PathBuf, File)> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let path = dest_dir.join(numbered_filename(filename, n));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "every numbered alternative is taken",
    ))
}

/// Stream the response body into `file`. An empty body is a failure.
async fn write_body(file: &mut File, response: reqwest::Response, dest: &Path) -> Result<u64, String> {
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("write {}: {e}", dest.display()))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| format!("write {}: {e}", dest.display()))?;

    if written == 0 {
        return Err("the downloaded file is empty".into());
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Open externally
// ---------------------------------------------------------------------------

/// Hands a URL to something outside this process.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), String>;
}

/// Opens URLs with the platform's default handler.
pub struct SystemOpener;

#[async_trait]
impl Launcher for SystemOpener {
    async fn open(&self, url: &str) -> Result<(), String> {
        let mut command = if cfg!(target_os = "windows") {
            let mut c = tokio::process::Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else if cfg!(target_os = "macos") {
            tokio::process::Command::new("open")
        } else {
            tokio::process::Command::new("xdg-open")
        };

        let status = command
            .arg(url)
            .status()
            .await
            .map_err(|e| format!("failed to launch opener: {e}"))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("opener exited with {status}"))
        }
    }
}

/// Fallback that hands the location to a [`Launcher`] and lets it
/// retrieve the file.
pub struct OpenExternally {
    launcher: Box<dyn Launcher>,
}

impl OpenExternally {
    /// Hand locations to `launcher`.
    pub fn new(launcher: Box<dyn Launcher>) -> Self {
        Self { launcher }
    }

    /// Hand locations to the platform's default handler.
    pub fn system() -> Self {
        Self::new(Box::new(SystemOpener))
    }
}

#[async_trait]
impl SaveStrategy for OpenExternally {
    fn name(&self) -> &'static str {
        "open"
    }

    async fn save(
        &self,
        location: &str,
        filename: &str,
        _dest_dir: &Path,
    ) -> Result<SavedArtifact, StrategyError> {
        self.launcher
            .open(location)
            .await
            .map_err(StrategyError::Unsupported)?;

        Ok(SavedArtifact {
            filename: filename.to_string(),
            path: None,
            bytes: None,
            strategy: self.name(),
        })
    }
}

/// Fetch first, then fall back to the system opener.
pub fn default_strategies(api: &ConversionApi) -> Vec<Box<dyn SaveStrategy>> {
    vec![
        Box::new(FetchToDirectory::new(api.clone())),
        Box::new(OpenExternally::system()),
    ]
}
