use crate::metadata::Metadata;

/// A model directory loaded into memory.
///
/// Holds the parsed metadata document, the directory it was loaded from, the
/// metadata file's raw bytes and the gzip'd tar archive of the content
/// directory. Nothing is shared with the filesystem once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedModel<M = Metadata> {
    metadata: M,
    path: String,
    config: Vec<u8>,
    content: Vec<u8>,
}

impl<M> SavedModel<M> {
    pub(crate) fn new(metadata: M, path: String, config: Vec<u8>, content: Vec<u8>) -> Self {
        Self {
            metadata,
            path,
            config,
            content,
        }
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// The model directory as it was passed to [`save`](crate::Saver::save).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw bytes of the metadata file.
    pub fn config(&self) -> &[u8] {
        &self.config
    }

    /// The content directory as a gzip-compressed tar archive.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Take the model apart as `(metadata, path, config, content)`.
    pub fn into_parts(self) -> (M, String, Vec<u8>, Vec<u8>) {
        (self.metadata, self.path, self.config, self.content)
    }
}
