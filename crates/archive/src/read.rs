//! Reading archives back.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::instrument;

/// A single entry of an archive, as seen by [`list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchivedFile {
    /// Path inside the archive, `<source base name>/<relative path>`.
    pub path: PathBuf,
    pub size: u64,
}

/// List the entries of a gzip-compressed tar archive, in archive order.
///
/// # Examples
///
/// ```no_run
/// # fn example(bytes: &[u8]) -> ormb_archive::error::Result<()> {
/// let total: u64 = ormb_archive::list(bytes)?.iter().map(|f| f.size).sum();
/// # Ok(())
/// # }
/// ```
#[instrument(skip(archive), fields(input_size = archive.len()))]
pub fn list(archive: &[u8]) -> Result<Vec<ArchivedFile>> {
    let mut archive = Archive::new(GzDecoder::new(archive));
    let entries = archive.entries().or_raise(|| ErrorKind::InvalidArchive)?;
    entries
        .map(|entry| {
            let entry = entry.or_raise(|| ErrorKind::InvalidArchive)?;
            let path = entry.path().or_raise(|| ErrorKind::InvalidArchive)?.into_owned();
            Ok(ArchivedFile { path, size: entry.size() })
        })
        .collect()
}

/// Extract a gzip-compressed tar archive below `destination`.
///
/// Entries that would land outside `destination` are skipped by the tar
/// reader.
#[instrument(skip(archive, destination), fields(input_size = archive.len(), destination = %destination.as_ref().display()))]
pub fn unpack(archive: &[u8], destination: impl AsRef<Path>) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(archive));
    archive.unpack(destination).or_raise(|| ErrorKind::InvalidArchive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_rejects_garbage() {
        let err = list(b"definitely not a gzip stream").unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidArchive);
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let err = unpack(b"\x1f\x8bnope", temp.path()).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidArchive);
    }

    #[test]
    fn test_list_handwritten_archive() {
        let mut tar = tar::Builder::new(flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast()));
        let mut header = tar::Header::new_gnu();
        header.set_size(5);
        header.set_mode(0o644);
        tar.append_data(&mut header, "model/a.txt", &b"hello"[..]).unwrap();
        let bytes = tar.into_inner().unwrap().finish().unwrap();

        let files = list(&bytes).unwrap();
        assert_eq!(files, vec![ArchivedFile {
            path: PathBuf::from("model/a.txt"),
            size: 5
        }]);
    }
}
