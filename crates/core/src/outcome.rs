//! State of one conversion attempt.

use serde::Serialize;

use crate::error::{ConversionError, ErrorKind};

/// Result of a conversion request; exactly one variant holds at a time.
///
/// `Pending` percentages never decrease within one request. `Succeeded`
/// and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Pending { percent: f32 },
    Succeeded { download_location: String },
    Failed { kind: ErrorKind, message: String },
}

impl ConversionOutcome {
    /// `Succeeded` and `Failed` end a submission.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }

    /// Progress percentage as shown to the user: the live value while
    /// pending, 100 on success and 0 after a failure.
    pub fn percent(&self) -> f32 {
        match self {
            Self::Pending { percent } => *percent,
            Self::Succeeded { .. } => 100.0,
            Self::Failed { .. } => 0.0,
        }
    }

    /// Artifact location, present only on success.
    pub fn download_location(&self) -> Option<&str> {
        match self {
            Self::Succeeded { download_location } => Some(download_location),
            _ => None,
        }
    }

    /// Failure classification, present only on failure.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<&ConversionError> for ConversionOutcome {
    fn from(err: &ConversionError) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
