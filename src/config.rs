//! YAML configuration for imsim.
//!
//! One file describes the whole pipeline: where the images are, how they are
//! embedded and batched, where the artifacts go and how many matches a query
//! returns. Every section is optional and falls back to its defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! data_dir: data/the_images
//!
//! embed:
//!   mode: onnx
//!   model_path: ./models/resnet50/model.onnx
//!   image_size: 224
//!
//! corpus:
//!   batch_size: 32
//!   extensions: [png, jpg, jpeg]
//!   order: sorted
//!   batch_policy: keep_partial
//!
//! artifacts:
//!   dir: saved
//!   compression:
//!     codec: zstd
//!     level: 3
//!
//! search:
//!   top_k: 5
//!
//! logging:
//!   level: info
//!   format: text
//! ```
//!
//! [`ImsimConfig::load`] additionally applies environment overrides of the
//! form `IMSIM_<SECTION>__<KEY>` (for example `IMSIM_SEARCH__TOP_K=10`) and
//! reads a `.env` file if one exists.

use std::fs;
use std::path::{Path, PathBuf};

use corpus::CorpusConfig;
use embed::EmbedConfig;
use index::{ArtifactPaths, CompressionCodec, CompressionConfig};
use matcher::SearchConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to assemble layered config: {0}")]
    Layered(#[from] ::config::ConfigError),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level configuration for building and querying an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImsimConfig {
    /// Directory whose images are indexed by `build`.
    pub data_dir: PathBuf,
    pub embed: EmbedConfig,
    pub corpus: CorpusConfig,
    pub artifacts: ArtifactConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

impl Default for ImsimConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/the_images"),
            embed: EmbedConfig::default(),
            corpus: CorpusConfig::default(),
            artifacts: ArtifactConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ImsimConfig {
    /// Load a YAML configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: ImsimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the YAML file at `path` (if given and present), then
    /// `IMSIM_*` environment variables. A `.env` file in the working
    /// directory is loaded first when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        dotenv_outcome(dotenvy::dotenv())?;

        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("IMSIM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ImsimConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        self.embed
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("embed: {e}")))?;
        self.corpus
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("corpus: {e}")))?;
        self.search
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("search: {e}")))?;
        self.artifacts.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// A missing `.env` is fine; one that exists but cannot be read or parsed is
/// an error, otherwise its overrides would silently never apply.
fn dotenv_outcome<T>(result: Result<T, dotenvy::Error>) -> Result<(), ConfigLoadError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigLoadError::Validation(format!(".env: {e}"))),
    }
}

/// Where the artifact triple is written and how the index file is packed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory holding the index, embeddings and path files.
    pub dir: PathBuf,
    pub compression: CompressionConfig,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("saved"),
            compression: CompressionConfig::default(),
        }
    }
}

impl ArtifactConfig {
    pub fn locations(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.dir)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.dir.as_os_str().is_empty() {
            return Err(ConfigLoadError::Validation(
                "artifacts.dir must not be empty".into(),
            ));
        }
        if self.compression.codec == CompressionCodec::Zstd
            && !(1..=22).contains(&self.compression.level)
        {
            return Err(ConfigLoadError::Validation(format!(
                "artifacts.compression.level must be in 1..=22 for zstd, got {}",
                self.compression.level
            )));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.level.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "logging.level must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus::BatchPolicy;
    use embed::EmbedMode;

    #[test]
    fn defaults_match_documented_layout() {
        let cfg = ImsimConfig::default();
        assert_eq!(cfg.data_dir, PathBuf::from("data/the_images"));
        assert_eq!(cfg.artifacts.dir, PathBuf::from("saved"));
        assert_eq!(cfg.corpus.batch_size, 32);
        assert_eq!(cfg.embed.image_size, 224);
        assert_eq!(cfg.search.top_k, 5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r#"
data_dir: /srv/photos
embed:
  mode: stub
  stub_grid: 8
corpus:
  batch_size: 4
  batch_policy: drop_partial
search:
  top_k: 12
logging:
  format: json
"#;
        let cfg = ImsimConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/photos"));
        assert_eq!(cfg.embed.mode, EmbedMode::Stub);
        assert_eq!(cfg.embed.stub_grid, 8);
        assert_eq!(cfg.embed.image_size, 224);
        assert_eq!(cfg.corpus.batch_size, 4);
        assert_eq!(cfg.corpus.batch_policy, BatchPolicy::DropPartial);
        assert_eq!(cfg.search.top_k, 12);
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.artifacts.dir, PathBuf::from("saved"));
    }

    #[test]
    fn invalid_sections_are_rejected() {
        let zero_batch = "corpus:\n  batch_size: 0\n";
        assert!(matches!(
            ImsimConfig::from_yaml(zero_batch),
            Err(ConfigLoadError::Validation(_))
        ));

        let zero_k = "search:\n  top_k: 0\n";
        assert!(matches!(
            ImsimConfig::from_yaml(zero_k),
            Err(ConfigLoadError::Validation(_))
        ));

        let bad_level = "artifacts:\n  compression:\n    codec: zstd\n    level: 40\n";
        assert!(matches!(
            ImsimConfig::from_yaml(bad_level),
            Err(ConfigLoadError::Validation(_))
        ));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = ImsimConfig::from_yaml("search: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigLoadError::YamlParse(_)));
    }

    #[test]
    fn from_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imsim.yaml");
        fs::write(&path, "artifacts:\n  dir: out/index\n").unwrap();

        let cfg = ImsimConfig::from_file(&path).unwrap();
        assert_eq!(cfg.artifacts.dir, PathBuf::from("out/index"));
        assert_eq!(
            cfg.artifacts.locations().paths,
            PathBuf::from("out/index").join(index::PATHS_FILE_NAME)
        );
    }

    #[test]
    fn load_layers_file_under_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imsim.yaml");
        fs::write(&path, "data_dir: pictures\nsearch:\n  top_k: 7\n").unwrap();

        let cfg = ImsimConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("pictures"));
        assert_eq!(cfg.search.top_k, 7);
        assert_eq!(cfg.corpus.batch_size, 32);
    }

    #[test]
    fn missing_dotenv_is_ignored_but_malformed_one_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(dotenv_outcome(dotenvy::from_path(dir.path().join(".env"))).is_ok());

        let path = dir.path().join(".env");
        fs::write(&path, "this line has no equals sign\n").unwrap();
        let err = dotenv_outcome(dotenvy::from_path(&path)).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Validation(ref msg) if msg.starts_with(".env")));
    }
}
