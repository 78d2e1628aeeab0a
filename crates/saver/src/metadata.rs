//! Model metadata: the parser seam and the loader.
//!
//! The saver never looks inside a metadata document. It reads the raw bytes,
//! hands them to a [`Parser`], and carries both around.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::marker::PhantomData;
use std::path::Path;
use tracing::instrument;

/// Turns the raw bytes of a metadata file into a document.
///
/// Implementations should raise [`ErrorKind::InvalidMetadata`] for input
/// they reject; the loader wraps it with the offending file's path.
pub trait Parser {
    type Metadata;

    fn parse(&self, data: &[u8]) -> Result<Self::Metadata>;
}

impl<P: Parser + ?Sized> Parser for &P {
    type Metadata = P::Metadata;

    fn parse(&self, data: &[u8]) -> Result<Self::Metadata> {
        (**self).parse(data)
    }
}

/// Deserializes YAML into any [`DeserializeOwned`] type, [`Metadata`] unless
/// told otherwise.
///
/// # Examples
///
/// ```
/// use ormb_saver::{Metadata, Parser, YamlParser};
///
/// let metadata: Metadata = YamlParser::new().parse(b"author: somebody\nframework: TensorFlow").unwrap();
/// assert_eq!(metadata.framework.as_deref(), Some("TensorFlow"));
/// assert!(YamlParser::<Metadata>::new().parse(b"").is_err());
/// ```
pub struct YamlParser<T = Metadata> {
    _document: PhantomData<fn() -> T>,
}
impl<T> YamlParser<T> {
    pub fn new() -> Self {
        Self { _document: PhantomData }
    }
}
impl<T> Default for YamlParser<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T> Clone for YamlParser<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}
impl<T> std::fmt::Debug for YamlParser<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YamlParser").finish()
    }
}

impl<T: DeserializeOwned> Parser for YamlParser<T> {
    type Metadata = T;

    fn parse(&self, data: &[u8]) -> Result<T> {
        if data.iter().all(u8::is_ascii_whitespace) {
            exn::bail!(ErrorKind::InvalidMetadata);
        }
        serde_yaml::from_slice(data).or_raise(|| ErrorKind::InvalidMetadata)
    }
}

/// The conventional contents of an `ormbfile.yaml`.
///
/// Every field is optional and unknown fields are ignored; nothing is
/// validated beyond the YAML shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Metadata {
    pub author: Option<String>,
    /// Creation time, as written in the file.
    pub created: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub labels: BTreeMap<String, String>,
    /// Serialization format of the model files, e.g. `SavedModel`, `ONNX`.
    pub format: Option<String>,
    pub framework: Option<String>,
    pub metrics: Vec<NamedValue>,
    pub hyperparameters: Vec<NamedValue>,
    pub signature: Option<Signature>,
    pub training: Option<Provenance>,
    pub dataset: Option<Provenance>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedValue {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Signature {
    pub inputs: Vec<Tensor>,
    pub outputs: Vec<Tensor>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tensor {
    pub name: String,
    /// Dimensions; `-1` for a variable-sized dimension.
    pub size: Vec<i64>,
    pub d_type: Option<String>,
}

/// Where something (training code, a dataset) came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provenance {
    pub git: Option<GitSource>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSource {
    pub repository: String,
    pub revision: Option<String>,
}

/// Read `<directory>/<file_name>` and parse it, returning the raw bytes
/// alongside the document.
#[instrument(skip(parser, directory), fields(directory = %directory.display(), size))]
pub fn load<P: Parser>(parser: &P, directory: &Path, file_name: &str) -> Result<(Vec<u8>, P::Metadata)> {
    let path = directory.join(file_name);
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(err) => {
            let kind = match err.kind() {
                IoErrorKind::NotFound => ErrorKind::MetadataNotFound(path),
                _ => ErrorKind::MetadataRead(path),
            };
            return Err(exn::Exn::from(err).raise(kind));
        },
    };
    tracing::Span::current().record("size", data.len());
    let metadata = parser.parse(&data).map_err(|err| err.raise(ErrorKind::Parse(path)))?;
    Ok((data, metadata))
}
