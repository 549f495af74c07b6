use std::path::PathBuf;

use convertkit_core::{ConversionError, ErrorKind};

use crate::config::ConfigError;

/// Anything that stops a command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot open {}: {source}", path.display())]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The service round trip ended in a failed outcome.
    #[error("{message}")]
    Failed { kind: ErrorKind, message: String },

    /// The outcome stream closed without a terminal outcome.
    #[error("the conversion was abandoned before it finished")]
    Abandoned,
}
