//! Workspace umbrella crate for imsim, an image similarity search engine.
//!
//! This crate wires the embedder, corpus loader, index and matcher together
//! behind [`ImsimConfig`], so callers can build an index from a directory and
//! query it with two function calls. The `imsim` binary is a thin clap front
//! end over the same functions.

pub mod config;

pub use corpus::{BatchPolicy, CorpusConfig, CorpusError, EnumerationOrder};
pub use embed::{
    EmbedConfig, EmbedError, EmbedMode, Embedder, ImageTransform, decode_image, open_image,
};
pub use index::{
    ArtifactPaths, ArtifactSummary, CompressionCodec, CompressionConfig, IndexArtifacts,
    IndexError,
};
pub use matcher::{
    BuildReport, IndexBuilder, MatchError, SearchConfig, SearchEngine, SearchHit, SearchMetrics,
    SharedEngine, set_search_metrics,
};

pub use crate::config::{ArtifactConfig, ConfigLoadError, ImsimConfig, LogFormat, LoggingConfig};

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::info;

/// Errors that can occur while running the build or query pipeline.
#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigLoadError),
    Embed(EmbedError),
    Index(IndexError),
    Match(MatchError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(err) => write!(f, "configuration failure: {err}"),
            PipelineError::Embed(err) => write!(f, "embedder failure: {err}"),
            PipelineError::Index(err) => write!(f, "index artifact failure: {err}"),
            PipelineError::Match(err) => write!(f, "search failure: {err}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Config(err) => Some(err),
            PipelineError::Embed(err) => Some(err),
            PipelineError::Index(err) => Some(err),
            PipelineError::Match(err) => Some(err),
        }
    }
}

impl From<ConfigLoadError> for PipelineError {
    fn from(value: ConfigLoadError) -> Self {
        PipelineError::Config(value)
    }
}

impl From<EmbedError> for PipelineError {
    fn from(value: EmbedError) -> Self {
        PipelineError::Embed(value)
    }
}

impl From<IndexError> for PipelineError {
    fn from(value: IndexError) -> Self {
        PipelineError::Index(value)
    }
}

impl From<MatchError> for PipelineError {
    fn from(value: MatchError) -> Self {
        PipelineError::Match(value)
    }
}

/// Construct the embedder described by `cfg.embed`.
///
/// Create one per process and share it between the build and query paths;
/// both must see the same preprocessing and weights.
pub fn load_embedder(cfg: &ImsimConfig) -> Result<Arc<dyn Embedder>, PipelineError> {
    Ok(embed::load_embedder(&cfg.embed)?)
}

/// Embed every image under `cfg.data_dir` and write the artifact triple to
/// `cfg.artifacts.dir`.
pub fn build_and_save(
    cfg: &ImsimConfig,
    embedder: &Arc<dyn Embedder>,
) -> Result<BuildReport, PipelineError> {
    let builder = IndexBuilder::new(embedder.clone(), cfg.corpus.clone());
    let output = builder.build(&cfg.data_dir)?;

    let locations = cfg.artifacts.locations();
    index::save(&output.artifacts, &locations, &cfg.artifacts.compression)?;
    info!(
        dir = %cfg.artifacts.dir.display(),
        rows = output.artifacts.len(),
        "artifacts written"
    );
    Ok(output.report)
}

/// Load the artifacts under `cfg.artifacts.dir` into a query engine.
pub fn open_engine(
    cfg: &ImsimConfig,
    embedder: &Arc<dyn Embedder>,
) -> Result<SearchEngine, PipelineError> {
    Ok(SearchEngine::open(
        embedder.clone(),
        &cfg.artifacts.locations(),
    )?)
}

/// Row counts and width of the saved artifacts, without loading them.
pub fn inspect_artifacts(cfg: &ImsimConfig) -> Result<ArtifactSummary, PipelineError> {
    Ok(index::inspect(&cfg.artifacts.locations())?)
}
