use serde::{Deserialize, Serialize};

/// Fallback message for 4xx responses without a `detail` body.
pub const GENERIC_BAD_REQUEST: &str = "The request was rejected; check the file format";
/// Fallback message for 5xx responses without a `detail` body.
pub const GENERIC_SERVER_ERROR: &str = "Internal server error; please try again";

/// Stable classification of a conversion failure.
///
/// Presentation layers switch on this to choose remediation; the matching
/// [`ConversionError`] carries the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingInput,
    SameFormat,
    FileTooLarge,
    UnsupportedExtension,
    SourceUnreadable,
    ClientBlocked,
    NetworkUnreachable,
    Timeout,
    BadRequest,
    ServerError,
    ArtifactExpired,
    DownloadFailed,
}

impl ErrorKind {
    /// Validation failures are resolved locally and never reach the network.
    pub fn is_validation(self) -> bool {
        matches!(
            self,
            Self::MissingInput | Self::SameFormat | Self::FileTooLarge | Self::UnsupportedExtension
        )
    }
}

/// Every way a conversion can fail, from local validation to retrieving
/// the artifact.
///
/// `Display` is the message shown to the user; [`ConversionError::kind`]
/// gives the stable classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("Select a file and an output format before converting")]
    MissingInput,

    #[error("The file is already in {} format; choose a different output format", .0.to_uppercase())]
    SameFormat(String),

    #[error("File is {size} bytes but the maximum allowed size is {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported file type: {0}")]
    UnsupportedExtension(String),

    #[error("Could not read the selected file: {0}")]
    SourceUnreadable(String),

    #[error(
        "The request to {base_url} was blocked on this machine (extension, proxy or policy); \
         the service itself may be healthy"
    )]
    ClientBlocked { base_url: String },

    #[error("Could not connect to the conversion service at {base_url}: {reason}")]
    NetworkUnreachable { base_url: String, reason: String },

    #[error("The conversion is taking too long; try a smaller file or check your connection")]
    Timeout,

    #[error("{message}")]
    BadRequest { status: u16, message: String },

    #[error("{message}")]
    ServerError { status: u16, message: String },

    #[error("The converted file is no longer available; convert the file again")]
    ArtifactExpired,

    #[error("Failed to download the converted file: {0}")]
    DownloadFailed(String),
}

impl ConversionError {
    /// Stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingInput => ErrorKind::MissingInput,
            Self::SameFormat(_) => ErrorKind::SameFormat,
            Self::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            Self::UnsupportedExtension(_) => ErrorKind::UnsupportedExtension,
            Self::SourceUnreadable(_) => ErrorKind::SourceUnreadable,
            Self::ClientBlocked { .. } => ErrorKind::ClientBlocked,
            Self::NetworkUnreachable { .. } => ErrorKind::NetworkUnreachable,
            Self::Timeout => ErrorKind::Timeout,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::ArtifactExpired => ErrorKind::ArtifactExpired,
            Self::DownloadFailed(_) => ErrorKind::DownloadFailed,
        }
    }

    /// Map a non-success HTTP status to the taxonomy.
    ///
    /// 4xx becomes `BadRequest`; everything else is treated as a
    /// service-side failure. `detail` (from the response body) is used as
    /// the message when present and non-blank.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let detail = detail.filter(|d| !d.trim().is_empty());
        if (400..500).contains(&status) {
            Self::BadRequest {
                status,
                message: detail.unwrap_or_else(|| GENERIC_BAD_REQUEST.to_string()),
            }
        } else {
            Self::ServerError {
                status,
                message: detail.unwrap_or_else(|| GENERIC_SERVER_ERROR.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_uses_detail() {
        let err = ConversionError::from_status(500, Some("conversion engine crashed".into()));
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert_eq!(err.to_string(), "conversion engine crashed");
    }

    #[test]
    fn client_error_without_detail_is_generic() {
        let err = ConversionError::from_status(422, None);
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.to_string(), GENERIC_BAD_REQUEST);
    }

    #[test]
    fn blank_detail_falls_back() {
        let err = ConversionError::from_status(503, Some("  ".into()));
        assert_eq!(err.to_string(), GENERIC_SERVER_ERROR);
    }

    #[test]
    fn same_format_message_uppercases() {
        let err = ConversionError::SameFormat("jpg".into());
        assert!(err.to_string().contains("JPG"));
    }

    #[test]
    fn validation_kinds() {
        assert!(ErrorKind::SameFormat.is_validation());
        assert!(ErrorKind::FileTooLarge.is_validation());
        assert!(!ErrorKind::Timeout.is_validation());
        assert!(!ErrorKind::ArtifactExpired.is_validation());
    }
}
