//! Gzip-compressed tar archives of model content directories.
//!
//! - **Walking** ([`walk::Walk`]) visits a tree depth-first in lexical
//!   order and stops at the first error.
//! - **Building** ([`Archiver`]) streams every regular file through a tar
//!   builder and a gzip encoder into any [`Write`](std::io::Write) sink,
//!   naming entries `<source base name>/<relative path>`.
//! - **Reading** ([`list`], [`unpack`]) inspects or extracts the result.
//!
//! Everything is synchronous, blocking I/O on the caller's thread. Async
//! callers should hand builds to a blocking thread.

mod build;
pub mod error;
mod path;
mod read;
pub mod walk;

pub use crate::build::{Archiver, DEFAULT_LEVEL, HeaderMode, MAX_LEVEL, Options};
pub use crate::path::{base_name, entry_name};
pub use crate::read::{ArchivedFile, list, unpack};
