//! Saver Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Failures from the archive crate and
//! from parsers are kept as children of the [`ErrorKind`] raised here.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A saver error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for saver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of a save failed.
///
/// ### Metadata
/// - [`ErrorKind::MetadataNotFound`]
/// - [`ErrorKind::MetadataRead`]
/// - [`ErrorKind::Parse`] wrapping [`ErrorKind::InvalidMetadata`]
///
/// ### Content
/// - [`ErrorKind::Archive`] wrapping an [`ormb_archive::error::ErrorKind`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The metadata file does not exist.
    #[display("metadata file not found: {}", _0.display())]
    MetadataNotFound(#[error(not(source))] PathBuf),
    /// The metadata file exists but could not be read.
    #[display("unable to read metadata file: {}", _0.display())]
    MetadataRead(#[error(not(source))] PathBuf),
    /// The parser rejected the metadata file.
    #[display("unable to parse metadata file: {}", _0.display())]
    Parse(#[error(not(source))] PathBuf),
    /// Raised by [`Parser`](crate::Parser) implementations for bytes they
    /// can't turn into a document.
    #[display("invalid metadata")]
    InvalidMetadata,
    /// The content directory could not be archived.
    #[display("unable to archive model content: {}", _0.display())]
    Archive(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::MetadataRead(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::MetadataNotFound(PathBuf::from("resnet/ormbfile.yaml")).to_string(),
            "metadata file not found: resnet/ormbfile.yaml"
        );
        assert_eq!(ErrorKind::InvalidMetadata.to_string(), "invalid metadata");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::MetadataRead(PathBuf::from("a")).is_retryable());
        assert!(!ErrorKind::Parse(PathBuf::from("a")).is_retryable());
        assert!(!ErrorKind::Archive(PathBuf::from("a")).is_retryable());
    }
}
