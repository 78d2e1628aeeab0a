//! Recursive, deterministic directory traversal.
//!
//! [`Walk`] is a lazy [`Iterator`] over every descendant of a root path,
//! depth-first and pre-order, with the entries of each directory visited in
//! lexical (byte-wise) file name order. The first error ends the sequence.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::{self, Metadata};
use std::io::Result as IoResult;
use std::path::{Path, PathBuf};

/// What a walked path points at. Symlinks below the root are never followed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    /// Devices, sockets, fifos.
    Other,
}
impl From<&Metadata> for EntryKind {
    fn from(metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_file() {
            Self::File
        } else if file_type.is_dir() {
            Self::Dir
        } else if file_type.is_symlink() {
            Self::Symlink
        } else {
            Self::Other
        }
    }
}

/// A single path discovered by a [`Walk`].
#[derive(Debug)]
pub struct Entry {
    path: PathBuf,
    relative: PathBuf,
    metadata: Metadata,
}
impl Entry {
    /// Full path, as reachable from the path the walk was started with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the walk root. Empty for the root itself.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn kind(&self) -> EntryKind {
        EntryKind::from(&self.metadata)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

struct Pending {
    path: PathBuf,
    relative: PathBuf,
}

/// Lazy recursive traversal of a directory tree.
///
/// The root is stat'ed following symlinks, every other path is stat'ed
/// without following them. Directories are listed when they are yielded, so
/// a directory that cannot be listed produces an error in place of its
/// entry. After yielding an error the walk is exhausted.
///
/// # Examples
///
/// ```no_run
/// use ormb_archive::walk::{EntryKind, Walk};
///
/// # fn example() -> ormb_archive::error::Result<()> {
/// for entry in Walk::new("/models/resnet/model") {
///     let entry = entry?;
///     if entry.kind() == EntryKind::File {
///         println!("{}", entry.relative().display());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Walk {
    stack: Vec<Pending>,
    root: bool,
}
impl Walk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let pending = Pending {
            path: root.into(),
            relative: PathBuf::new(),
        };
        Self {
            stack: vec![pending],
            root: true,
        }
    }

    fn visit(&mut self, pending: Pending) -> Result<Entry> {
        let Pending { path, relative } = pending;
        let metadata = match self.root {
            true => fs::metadata(&path),
            false => fs::symlink_metadata(&path),
        }
        .or_raise(|| ErrorKind::Walk(path.clone()))?;
        self.root = false;

        if metadata.is_dir() {
            let mut children = fs::read_dir(&path)
                .and_then(|entries| entries.map(|entry| entry.map(|e| e.file_name())).collect::<IoResult<Vec<_>>>())
                .or_raise(|| ErrorKind::Walk(path.clone()))?;
            children.sort();
            // Reversed so that popping the stack visits names in order.
            self.stack.extend(children.into_iter().rev().map(|name| Pending {
                path: path.join(&name),
                relative: relative.join(&name),
            }));
        }
        Ok(Entry { path, relative, metadata })
    }
}

impl Iterator for Walk {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        let pending = self.stack.pop()?;
        let entry = self.visit(pending);
        if entry.is_err() {
            self.stack.clear();
        }
        Some(entry)
    }
}

impl std::iter::FusedIterator for Walk {}
