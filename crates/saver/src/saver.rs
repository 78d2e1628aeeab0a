use crate::error::{ErrorKind, Result};
use crate::metadata::{self, Parser};
use crate::model::SavedModel;
use exn::ResultExt;
use ormb_archive::Archiver;
use ormb_config::{Config, Layout};
use std::path::Path;
use tracing::instrument;

/// Loads a model directory into memory.
pub trait Saver {
    type Metadata;

    fn save(&self, path: &Path) -> Result<SavedModel<Self::Metadata>>;
}

/// Saves `<path>/ormbfile.yaml` and `<path>/model/` (or whatever the
/// [`Layout`] says) using the parser it was constructed with.
///
/// # Examples
///
/// ```no_run
/// use ormb_saver::{DefaultSaver, Metadata, Saver, YamlParser};
/// use std::path::Path;
///
/// # fn example() -> ormb_saver::error::Result<()> {
/// let saver = DefaultSaver::new(YamlParser::<Metadata>::new());
/// let model = saver.save(Path::new("/models/resnet"))?;
/// println!("{:?} ({} bytes)", model.metadata().framework, model.content().len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DefaultSaver<P> {
    parser: P,
    layout: Layout,
    archiver: Archiver,
}

impl<P: Parser> DefaultSaver<P> {
    /// Default layout and archive options.
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            layout: Layout::default(),
            archiver: Archiver::default(),
        }
    }

    pub fn with_config(parser: P, config: &Config) -> Self {
        Self {
            parser,
            layout: config.layout.clone(),
            archiver: Archiver::new(config.archive_options()),
        }
    }

    /// Replace the archiver, e.g. with one that can be cancelled.
    pub fn with_archiver(mut self, archiver: Archiver) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Read and parse the metadata file of a model directory.
    pub fn load_metadata(&self, path: &Path) -> Result<(Vec<u8>, P::Metadata)> {
        metadata::load(&self.parser, path, &self.layout.metadata_file)
    }
}

impl<P: Parser> Saver for DefaultSaver<P> {
    type Metadata = P::Metadata;

    #[instrument(skip(self, path), fields(path = %path.display()))]
    fn save(&self, path: &Path) -> Result<SavedModel<P::Metadata>> {
        let (config, metadata) = self.load_metadata(path)?;

        let content_dir = path.join(&self.layout.model_directory);
        let content = self.archiver.archive(&content_dir).or_raise(|| ErrorKind::Archive(content_dir.clone()))?;

        tracing::info!(config_size = config.len(), content_size = content.len(), "Saved model");
        Ok(SavedModel::new(metadata, path.to_string_lossy().into_owned(), config, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Metadata, YamlParser};
    use ormb_archive::{HeaderMode, list, unpack};
    use std::cell::Cell;
    use std::fs::{create_dir_all, write};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    /// Returns the document's length and counts how often it was asked.
    #[derive(Default)]
    struct CountingParser {
        calls: Cell<usize>,
    }
    impl Parser for CountingParser {
        type Metadata = usize;

        fn parse(&self, data: &[u8]) -> Result<usize> {
            self.calls.set(self.calls.get() + 1);
            Ok(data.len())
        }
    }

    struct RejectingParser;
    impl Parser for RejectingParser {
        type Metadata = ();

        fn parse(&self, _: &[u8]) -> Result<()> {
            exn::bail!(ErrorKind::InvalidMetadata)
        }
    }

    fn model_dir() -> tempfile::TempDir {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("modeldir");
        create_dir_all(root.join("model")).unwrap();
        write(root.join("ormbfile.yaml"), "name: foo").unwrap();
        write(root.join("model/weights.bin"), [42u8; 100]).unwrap();
        temp
    }

    #[test]
    fn test_save_example() {
        let temp = model_dir();
        let root = temp.path().join("modeldir");
        let model = DefaultSaver::new(YamlParser::<Metadata>::new()).save(&root).unwrap();

        assert_eq!(model.config(), b"name: foo");
        assert_eq!(model.path(), root.to_str().unwrap());
        assert_eq!(model.metadata(), &Metadata::default());

        let files = list(model.content()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, PathBuf::from("model/weights.bin"));
        assert_eq!(files[0].size, 100);

        let out = tempfile::tempdir().unwrap();
        unpack(model.content(), out.path()).unwrap();
        assert_eq!(std::fs::read(out.path().join("model/weights.bin")).unwrap(), [42u8; 100]);
    }

    #[test]
    fn test_parser_is_injected() {
        let temp = model_dir();
        let parser = CountingParser::default();
        let model = DefaultSaver::new(&parser).save(&temp.path().join("modeldir")).unwrap();
        assert_eq!(*model.metadata(), "name: foo".len());
        assert_eq!(parser.calls.get(), 1);
    }

    #[test]
    fn test_missing_metadata_skips_everything_else() {
        let temp = tempfile::tempdir().unwrap();
        // No model directory either: an archive attempt would fail differently.
        let parser = CountingParser::default();
        let err = DefaultSaver::new(&parser).save(temp.path()).unwrap_err();
        assert_eq!(*err, ErrorKind::MetadataNotFound(temp.path().join("ormbfile.yaml")));
        assert_eq!(parser.calls.get(), 0);
    }

    #[test]
    fn test_parse_failure() {
        let temp = model_dir();
        let root = temp.path().join("modeldir");
        let err = DefaultSaver::new(RejectingParser).save(&root).unwrap_err();
        assert_eq!(*err, ErrorKind::Parse(root.join("ormbfile.yaml")));
    }

    #[test]
    fn test_missing_content_directory() {
        let temp = model_dir();
        let root = temp.path().join("modeldir");
        std::fs::remove_dir_all(root.join("model")).unwrap();
        let err = DefaultSaver::new(CountingParser::default()).save(&root).unwrap_err();
        assert_eq!(*err, ErrorKind::Archive(root.join("model")));
    }

    #[test]
    fn test_custom_layout() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        create_dir_all(root.join("weights/nested")).unwrap();
        write(root.join("Modelfile.yaml"), "framework: ONNX").unwrap();
        write(root.join("weights/nested/model.onnx"), b"onnx").unwrap();

        let mut config = Config::default();
        config.layout.metadata_file = "Modelfile.yaml".to_string();
        config.layout.model_directory = "weights".to_string();
        config.archive.header_mode = HeaderMode::Deterministic;
        let saver = DefaultSaver::with_config(YamlParser::<Metadata>::new(), &config);

        let first = saver.save(root).unwrap();
        assert_eq!(first.metadata().framework.as_deref(), Some("ONNX"));
        let files = list(first.content()).unwrap();
        assert_eq!(files[0].path, PathBuf::from("weights/nested/model.onnx"));

        let second = saver.save(root).unwrap();
        assert_eq!(first.content(), second.content());
    }

    #[test]
    fn test_cancelled_archiver() {
        let temp = model_dir();
        let flag = Arc::new(AtomicBool::new(true));
        let saver =
            DefaultSaver::new(CountingParser::default()).with_archiver(Archiver::default().with_cancellation(flag));
        let err = saver.save(&temp.path().join("modeldir")).unwrap_err();
        assert!(matches!(*err, ErrorKind::Archive(_)));
    }

    #[test]
    fn test_into_parts() {
        let temp = model_dir();
        let root = temp.path().join("modeldir");
        let model = DefaultSaver::new(CountingParser::default()).save(&root).unwrap();
        let content = model.content().to_vec();
        let (metadata, path, config, archived) = model.into_parts();
        assert_eq!(metadata, 9);
        assert_eq!(path, root.to_string_lossy());
        assert_eq!(config, b"name: foo");
        assert_eq!(archived, content);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_content_aborts_save() {
        use std::os::unix::fs::PermissionsExt;
        let temp = model_dir();
        let root = temp.path().join("modeldir");
        let locked = root.join("model/weights.bin");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::File::open(&locked).is_ok() {
            // Privileged users ignore permission bits.
            return;
        }
        let err = DefaultSaver::new(CountingParser::default()).save(&root).unwrap_err();
        assert_eq!(*err, ErrorKind::Archive(root.join("model")));
    }
}
