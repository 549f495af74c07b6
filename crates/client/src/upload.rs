//! Upload body construction with byte-level progress reporting.

use std::sync::Arc;

use convertkit_core::request::{FileContent, SourceFile};
use convertkit_core::validation::UploadLimits;
use convertkit_core::ConversionError;
use tokio::sync::mpsc;

/// Size of each chunk handed to the HTTP body stream.
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Bytes handed to the transport so far, out of the payload actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
}

/// Load the bytes of a source file.
///
/// Path-backed files are read here, at submission time, so a file that
/// vanished after selection surfaces as `SourceUnreadable`. The ceiling is
/// checked again against what was actually read: a file that grew since
/// selection is rejected before anything is sent.
pub async fn load_content(
    source: &SourceFile,
    limits: &UploadLimits,
) -> Result<Arc<[u8]>, ConversionError> {
    let bytes: Arc<[u8]> = match source.content() {
        FileContent::Memory(bytes) => bytes.clone(),
        FileContent::Path(path) => tokio::fs::read(path)
            .await
            .map(Arc::from)
            .map_err(|e| ConversionError::SourceUnreadable(format!("{}: {e}", path.display())))?,
    };

    limits.admit(bytes.len() as u64)?;
    Ok(bytes)
}

/// Wrap `bytes` in a streaming request body.
///
/// As each chunk is handed to the transport, the cumulative byte count
/// is sent on `progress`. A closed receiver is ignored.
pub fn progress_body(bytes: Arc<[u8]>, progress: mpsc::UnboundedSender<UploadProgress>) -> reqwest::Body {
    let total = bytes.len() as u64;
    let stream = futures::stream::unfold(0usize, move |offset| {
        let bytes = bytes.clone();
        let progress = progress.clone();
        async move {
            if offset >= bytes.len() {
                return None;
            }
            let end = (offset + UPLOAD_CHUNK_SIZE).min(bytes.len());
            let chunk = bytes[offset..end].to_vec();
            let _ = progress.send(UploadProgress {
                loaded: end as u64,
                total,
            });
            Some((Ok::<_, std::io::Error>(chunk), end))
        }
    });
    reqwest::Body::wrap_stream(stream)
}
