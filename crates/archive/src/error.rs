//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. The underlying [`std::io::Error`] of
//! a failed stage is kept as the child of the raised [`ErrorKind`].

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The stage of archiving that failed.
///
/// Every variant is terminal for the build in progress: nothing is retried
/// internally and no partial archive is handed back.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source path could not be stat'ed. Raised before any byte is
    /// written to the sink.
    #[display("source not found: {}", _0.display())]
    SourceNotFound(#[error(not(source))] PathBuf),
    /// The source path has no base name to root the archive at (for example
    /// the filesystem root).
    #[display("invalid source: {}", _0.display())]
    InvalidSource(#[error(not(source))] PathBuf),
    /// Traversal failed, e.g. a subdirectory could not be listed.
    #[display("unable to walk: {}", _0.display())]
    Walk(#[error(not(source))] PathBuf),
    /// A tar header could not be derived from the file's metadata.
    #[display("unable to build header for: {}", _0.display())]
    Header(#[error(not(source))] PathBuf),
    /// A discovered file could not be opened or read.
    #[display("unable to read: {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// A file got shorter between being stat'ed and being read.
    #[display("file changed while archiving: {}", _0.display())]
    Changed(#[error(not(source))] PathBuf),
    /// The sink rejected bytes, or finalizing an encoder failed.
    #[display("unable to write archive")]
    Write,
    /// The build was cancelled between two walk entries.
    #[display("archiving cancelled")]
    Cancelled,
    /// Bytes handed to [`list`](crate::list) are not a gzip'd tar stream.
    #[display("invalid or corrupted archive")]
    InvalidArchive,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exn::ResultExt;
    use std::path::Path;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::SourceNotFound(PathBuf::from("/models/a/model")).to_string(),
            "source not found: /models/a/model"
        );
        assert_eq!(ErrorKind::Write.to_string(), "unable to write archive");
        assert_eq!(ErrorKind::Cancelled.to_string(), "archiving cancelled");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Write.is_retryable());
        assert!(!ErrorKind::Read(PathBuf::from("a")).is_retryable());
        assert!(!ErrorKind::Walk(PathBuf::from("a")).is_retryable());
        assert!(!ErrorKind::InvalidArchive.is_retryable());
    }

    #[test]
    fn error_from_io_result() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "permission denied",
        ));
        let err: Result<()> = result.or_raise(|| ErrorKind::Read(Path::new("model/weights.bin").to_path_buf()));
        let exn = err.unwrap_err();
        assert_eq!(*exn, ErrorKind::Read(PathBuf::from("model/weights.bin")));
    }
}
