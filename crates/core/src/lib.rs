//! `convertkit-core` -- domain logic for the file-conversion client.
//!
//! Everything in this crate is pure (apart from reading file metadata in
//! [`request::SourceFile::from_path`]): the format catalog, request
//! validation, the error taxonomy, synthetic-progress arithmetic and the
//! base-address resolution policy. The network side lives in
//! `convertkit-client`.

pub mod catalog;
pub mod endpoint;
pub mod error;
pub mod naming;
pub mod outcome;
pub mod progress;
pub mod request;
pub mod validation;

pub use catalog::{Category, FormatCatalog};
pub use error::{ConversionError, ErrorKind};
pub use outcome::ConversionOutcome;
pub use request::{ConversionRequest, Selection, SourceFile};
