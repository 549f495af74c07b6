//! `convertkit-client` -- HTTP side of the file-conversion client.
//!
//! [`ConversionApi`] talks to the conversion service,
//! [`ConversionController`] drives one request at a time through
//! validation, submission with synthetic progress, and download.

pub mod api;
pub mod controller;
pub mod download;
pub mod upload;

pub use api::{ConversionApi, ServerInfo};
pub use controller::{ConversionController, OutcomeStream};
pub use download::{FetchToDirectory, OpenExternally, SaveStrategy, SavedArtifact};
