//! Source files, the user's selection, and validated conversion requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{extension_of, Category};

/// Where the bytes of a [`SourceFile`] live.
#[derive(Debug, Clone)]
pub enum FileContent {
    /// Read from disk when the request is submitted.
    Path(PathBuf),
    /// Already in memory.
    Memory(Arc<[u8]>),
}

/// A file chosen by the user. Cloning is cheap; the bytes are shared.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    size: u64,
    content: FileContent,
}

impl SourceFile {
    /// Describe a file on disk. Only metadata is read here.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            size: metadata.len(),
            content: FileContent::Path(path.to_path_buf()),
        })
    }

    /// Wrap in-memory bytes under the given file name.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            content: FileContent::Memory(bytes),
        }
    }

    /// File name including its extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Where the bytes live; path-backed content is read at submission.
    pub fn content(&self) -> &FileContent {
        &self.content
    }

    /// Lowercase extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

/// What the user has picked so far. Either half may be missing.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub file: Option<SourceFile>,
    pub target_format: Option<String>,
}

/// A validated (file, format) pair ready for submission.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source: SourceFile,
    /// Lowercase target format identifier.
    pub target_format: String,
    pub category: Category,
}
