//! Archive entry naming.
//!
//! Entries are named `<source base name>/<path relative to source>`. Both
//! halves are derived from path components, never by stripping a textual
//! prefix, so trailing separators, `.` components, symlinked parents and
//! relative invocations all produce the same names.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// The top-level component every entry of an archive of `source` lives under.
///
/// Uses the last normal component of `source` as written. Paths without one
/// (`.`, `..`, `models/..`) are canonicalized first.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use ormb_archive::base_name;
///
/// assert_eq!(base_name("/models/resnet/model").unwrap(), "model");
/// assert_eq!(base_name("/models/resnet/model/").unwrap(), "model");
/// assert_eq!(base_name("relative/model/.").unwrap(), "model");
/// // The filesystem root has no name to put entries under.
/// assert!(base_name("/").is_err());
/// ```
pub fn base_name(source: impl AsRef<Path>) -> Result<OsString> {
    let source = source.as_ref();
    if let Some(Component::Normal(name)) = source.components().next_back() {
        return Ok(name.to_os_string());
    }
    let canonical = source.canonicalize().or_raise(|| ErrorKind::SourceNotFound(source.to_path_buf()))?;
    match canonical.file_name() {
        Some(name) => Ok(name.to_os_string()),
        None => exn::bail!(ErrorKind::InvalidSource(source.to_path_buf())),
    }
}

/// Name of an entry inside the archive, given the archive's base name and
/// the entry's path relative to the walk root.
///
/// An empty `relative` path (the walk root itself, when archiving a single
/// file) names the entry after the base name alone.
pub fn entry_name(base: impl AsRef<Path>, relative: impl AsRef<Path>) -> PathBuf {
    let relative = relative.as_ref();
    let mut name = base.as_ref().to_path_buf();
    // Only ever normal components here (they come from directory listings),
    // but dropping anything else keeps a stray `/` or `..` out of the header.
    name.extend(relative.components().filter(|c| matches!(c, Component::Normal(_))));
    name
}
