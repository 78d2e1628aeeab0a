//! Load a model directory into memory, ready to be pushed somewhere as a
//! single artifact.
//!
//! A model directory holds a metadata file (`ormbfile.yaml`) and a content
//! directory (`model/`). [`DefaultSaver::save`](Saver::save) reads and parses
//! the former with an injected [`Parser`], archives the latter with
//! [`ormb_archive::Archiver`], and returns both as a [`SavedModel`].

pub mod error;
mod metadata;
mod model;
mod saver;

pub use crate::metadata::{GitSource, Metadata, NamedValue, Parser, Provenance, Signature, Tensor, YamlParser, load};
pub use crate::model::SavedModel;
pub use crate::saver::{DefaultSaver, Saver};
