//! Archive Building
//!
//! The output pipeline is a [`tar::Builder`] owning a [`GzEncoder`] owning
//! the caller's sink. On success the layers are finished innermost-first
//! (tar trailer, then gzip trailer) and the sink is handed back. On any error
//! the pipeline is dropped, which releases the layers in the same order.

use crate::error::{ErrorKind, Result};
use crate::path::{base_name, entry_name};
use crate::walk::{Entry, EntryKind, Walk};
use exn::ResultExt;
use flate2::{Compression, GzBuilder, write::GzEncoder};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tar::{Builder, Header};
use tracing::instrument;

/// zlib's default trade-off between speed and size.
pub const DEFAULT_LEVEL: u32 = 6;
pub const MAX_LEVEL: u32 = 9;

/// How much filesystem metadata ends up in each tar header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderMode {
    /// Mode, mtime and ownership exactly as the filesystem reports them.
    #[default]
    Complete,
    /// Fixed mtime, zero ownership, mode normalized to 0644 or 0755. Two
    /// archives of the same tree are byte-identical.
    Deterministic,
}
impl From<HeaderMode> for tar::HeaderMode {
    fn from(mode: HeaderMode) -> Self {
        match mode {
            HeaderMode::Complete => tar::HeaderMode::Complete,
            HeaderMode::Deterministic => tar::HeaderMode::Deterministic,
        }
    }
}

/// Encoder settings for a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    /// Gzip level, `0..=9`. Values above 9 are clamped.
    pub level: u32,
    pub header_mode: HeaderMode,
}
impl Default for Options {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            header_mode: HeaderMode::default(),
        }
    }
}

/// Remembers whether the wrapped reader or writer failed, so an error
/// surfacing through the tar builder can be attributed to the right stage.
///
/// A writer can also be closed, after which every write fails. Dropping a
/// [`Builder`] or [`GzEncoder`] writes their trailers, so an aborted build
/// closes the sink first to keep a truncated archive from looking complete.
struct Tracked<T> {
    inner: T,
    failed: bool,
    closed: bool,
}
impl<T> Tracked<T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            failed: false,
            closed: false,
        }
    }
}
impl<R: Read> Read for Tracked<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| self.failed = true)
    }
}
impl<W: Write> Write for Tracked<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("archive aborted"));
        }
        self.inner.write(buf).inspect_err(|_| self.failed = true)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::other("archive aborted"));
        }
        self.inner.flush().inspect_err(|_| self.failed = true)
    }
}

type Pipeline<W> = Builder<GzEncoder<Tracked<W>>>;

/// Builds gzip-compressed tar archives of a directory tree.
///
/// Every regular file below the source is stored as
/// `<source base name>/<relative path>`. Directories, symlinks and other
/// special files produce no entry. The walk visits names in lexical order,
/// so the entry order is stable for a given tree.
///
/// # Examples
///
/// ```no_run
/// use ormb_archive::Archiver;
///
/// # fn example() -> ormb_archive::error::Result<()> {
/// let bytes = Archiver::default().archive("/models/resnet/model")?;
/// for file in ormb_archive::list(&bytes)? {
///     println!("{} ({} bytes)", file.path.display(), file.size);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Archiver {
    options: Options,
    cancel: Option<Arc<AtomicBool>>,
}
impl Archiver {
    pub fn new(options: Options) -> Self {
        Self { options, cancel: None }
    }

    /// Abort the build with [`Cancelled`](ErrorKind::Cancelled) once `flag`
    /// is set. Checked before each walk entry.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Archive `source` into a new in-memory buffer.
    pub fn archive(&self, source: impl AsRef<Path>) -> Result<Vec<u8>> {
        self.build(source, Vec::new())
    }

    /// Archive `source` into `sink`, returning the sink once both encoders
    /// have been finished.
    ///
    /// Nothing is written to `sink` if `source` cannot be stat'ed. On any
    /// later error the sink stops accepting writes before the encoders are
    /// dropped, so it never receives the tar or gzip trailer and whatever
    /// reached it fails to decode.
    #[instrument(skip(self, source, sink), fields(
        source = %source.as_ref().display(),
        level = self.options.level,
        files,
        bytes
    ))]
    pub fn build<W: Write>(&self, source: impl AsRef<Path>, sink: W) -> Result<W> {
        let source = source.as_ref();
        fs::metadata(source).or_raise(|| ErrorKind::SourceNotFound(source.to_path_buf()))?;
        let base = base_name(source)?;

        let encoder = GzBuilder::new().mtime(0).write(Tracked::new(sink), self.compression());
        let mut tar = Builder::new(encoder);
        let (files, bytes) = match self.append_all(&mut tar, source, &base) {
            Ok(counts) => counts,
            Err(err) => {
                tar.get_mut().get_mut().closed = true;
                return Err(err);
            },
        };

        let encoder = tar.into_inner().or_raise(|| ErrorKind::Write)?;
        let sink = encoder.finish().or_raise(|| ErrorKind::Write)?;
        tracing::Span::current().record("files", files).record("bytes", bytes);
        Ok(sink.inner)
    }

    /// Walk `source` and append every regular file, returning how many files
    /// and content bytes were written.
    fn append_all<W: Write>(&self, tar: &mut Pipeline<W>, source: &Path, base: &OsStr) -> Result<(u64, u64)> {
        let (mut files, mut bytes) = (0u64, 0u64);
        for entry in Walk::new(source) {
            if self.is_cancelled() {
                exn::bail!(ErrorKind::Cancelled);
            }
            let entry = entry?;
            if entry.kind() != EntryKind::File {
                continue;
            }
            bytes += self.append(tar, base, &entry)?;
            files += 1;
        }
        Ok((files, bytes))
    }

    /// Write one regular file's header and contents. The file handle is
    /// closed before returning.
    fn append<W: Write>(&self, tar: &mut Pipeline<W>, base: &OsStr, entry: &Entry) -> Result<u64> {
        let path = entry.path();
        let name = entry_name(base, entry.relative());
        let size = entry.metadata().len();

        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(entry.metadata(), self.options.header_mode.into());

        let file = File::open(path).or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
        append_contents(tar, &mut header, &name, path, file)?;
        tracing::debug!(name = %name.display(), size, "Archived file");
        Ok(size)
    }

    fn compression(&self) -> Compression {
        Compression::new(self.options.level.min(MAX_LEVEL))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Stream `contents` into the archive under `header`, which already carries
/// the size recorded for `path`. Reads stop at that size, and running out
/// early is [`Changed`](ErrorKind::Changed).
fn append_contents<W: Write, R: Read>(
    tar: &mut Pipeline<W>,
    header: &mut Header,
    name: &Path,
    path: &Path,
    contents: R,
) -> Result<()> {
    let size = header.entry_size().or_raise(|| ErrorKind::Header(path.to_path_buf()))?;
    let mut reader = Tracked::new(contents.take(size));
    if let Err(err) = tar.append_data(header, name, &mut reader) {
        let kind = if reader.failed {
            ErrorKind::Read(path.to_path_buf())
        } else if tar.get_ref().get_ref().failed {
            ErrorKind::Write
        } else {
            // Neither side failed, so tar itself refused the entry.
            ErrorKind::Header(path.to_path_buf())
        };
        return Err(exn::Exn::from(err).raise(kind));
    }
    // A file that shrank since the stat leaves the header's size wrong.
    if reader.inner.limit() > 0 {
        exn::bail!(ErrorKind::Changed(path.to_path_buf()));
    }
    Ok(())
}
