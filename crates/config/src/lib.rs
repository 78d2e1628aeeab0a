//! Layered configuration for saving models.
//!
//! Values are merged from, in increasing priority:
//!
//! 1. built-in defaults,
//! 2. a configuration file (YAML, TOML or JSON, chosen by extension),
//! 3. environment variables prefixed with `ORMB_`, nested keys separated by
//!    a double underscore (`ORMB_ARCHIVE__LEVEL=9`).
//!
//! ```yaml
//! layout:
//!   metadata_file: ormbfile.yaml
//!   model_directory: model
//! archive:
//!   level: 6
//!   header_mode: complete
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use ormb_archive::{HeaderMode, MAX_LEVEL, Options};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub const ENV_PREFIX: &str = "ORMB_";
pub const DEFAULT_METADATA_FILE: &str = "ormbfile.yaml";
pub const DEFAULT_MODEL_DIRECTORY: &str = "model";
const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: Layout,
    pub archive: ArchiveConfig,
}

/// Where things live inside a model directory. Both are single path
/// components relative to the model directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub metadata_file: String,
    pub model_directory: String,
}
impl Default for Layout {
    fn default() -> Self {
        Self {
            metadata_file: DEFAULT_METADATA_FILE.to_string(),
            model_directory: DEFAULT_MODEL_DIRECTORY.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Gzip level, `0..=9`.
    pub level: u32,
    pub header_mode: HeaderMode,
}
impl Default for ArchiveConfig {
    fn default() -> Self {
        let options = Options::default();
        Self {
            level: options.level,
            header_mode: options.header_mode,
        }
    }
}
impl From<&ArchiveConfig> for Options {
    fn from(config: &ArchiveConfig) -> Self {
        Options {
            level: config.level,
            header_mode: config.header_mode,
        }
    }
}

impl Config {
    /// Load configuration from `file` (or the per-user default location when
    /// `None`), then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.is_file()),
        };
        let figment = Self::figment(file.as_deref())?;
        Self::from_figment(&figment)
    }

    /// Per-user configuration file, e.g. `~/.config/ormb/config.yaml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "caicloud", "ormb").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Build the provider stack without extracting it.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            if !path.exists() {
                tracing::warn!(path = %path.display(), "Configuration file not found; using defaults");
            }
            let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase);
            figment = match extension.as_deref() {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("toml") => figment.merge(Toml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from any provider stack.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_single_component(&self.layout.metadata_file) {
            exn::bail!(ErrorKind::Invalid("layout.metadata_file"));
        }
        if !is_single_component(&self.layout.model_directory) {
            exn::bail!(ErrorKind::Invalid("layout.model_directory"));
        }
        if self.archive.level > MAX_LEVEL {
            exn::bail!(ErrorKind::Invalid("archive.level"));
        }
        Ok(())
    }

    pub fn archive_options(&self) -> Options {
        Options::from(&self.archive)
    }
}

/// Exactly one normal path component, spelled without separators.
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(component)), None) => component == name,
        _ => false,
    }
}
