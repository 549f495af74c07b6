//! Client-side validation of a conversion selection.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. a file and a target format are both present (`MissingInput`)
//! 2. the target differs from the source extension, `jpeg` == `jpg` (`SameFormat`)
//! 3. the file fits under the byte ceiling (`FileTooLarge`)
//! 4. the source extension belongs to a known category (`UnsupportedExtension`)
//!
//! Nothing here touches the network.

use crate::catalog::{normalize_format, Category, FormatCatalog};
use crate::error::ConversionError;
use crate::request::{ConversionRequest, Selection, SourceFile};

/// Default byte ceiling for uploads (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * BYTES_PER_MB;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Upload size limits for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadLimits {
    /// Ceiling of `mb` mebibytes.
    pub fn from_megabytes(mb: u64) -> Self {
        Self {
            max_bytes: mb.saturating_mul(BYTES_PER_MB),
        }
    }

    /// Enforce the byte ceiling on a payload of `size` bytes. Payloads
    /// exactly at the limit are accepted.
    pub fn admit(&self, size: u64) -> Result<(), ConversionError> {
        if size > self.max_bytes {
            return Err(ConversionError::FileTooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Enforce the byte ceiling on the size recorded at selection.
pub fn check_size(file: &SourceFile, limits: &UploadLimits) -> Result<(), ConversionError> {
    limits.admit(file.size())
}

/// Reject a conversion whose target equals the source extension.
pub fn check_distinct_format(
    source_extension: Option<&str>,
    target_format: &str,
) -> Result<(), ConversionError> {
    let Some(source_extension) = source_extension else {
        return Ok(());
    };
    if normalize_format(source_extension) == normalize_format(target_format) {
        return Err(ConversionError::SameFormat(target_format.to_string()));
    }
    Ok(())
}

/// Validate a selection and turn it into a [`ConversionRequest`].
pub fn validate(
    selection: &Selection,
    catalog: &FormatCatalog,
    limits: &UploadLimits,
) -> Result<ConversionRequest, ConversionError> {
    let target_format = selection
        .target_format
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());

    let (Some(file), Some(target_format)) = (selection.file.as_ref(), target_format) else {
        return Err(ConversionError::MissingInput);
    };

    let extension = file.extension();
    check_distinct_format(extension.as_deref(), target_format)?;
    check_size(file, limits)?;

    let category = catalog.classify(file.name());
    if category == Category::Unknown {
        return Err(ConversionError::UnsupportedExtension(
            extension.unwrap_or_else(|| file.name().to_string()),
        ));
    }

    Ok(ConversionRequest {
        source: file.clone(),
        target_format: target_format.to_lowercase(),
        category,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
