//! Configuration types for corpus loading.
//!
//! [`CorpusConfig`] decides which files in the image directory are eligible,
//! in which order they become index rows, and how they are grouped into
//! batches for the embedder.
//!
//! ```rust
//! use corpus::{BatchPolicy, CorpusConfig, EnumerationOrder};
//!
//! let config = CorpusConfig {
//!     batch_size: 64,
//!     batch_policy: BatchPolicy::DropPartial,
//!     ..Default::default()
//! };
//! assert_eq!(config.order, EnumerationOrder::Sorted);
//! config.validate().expect("valid corpus config");
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::CorpusError;

/// Order in which eligible files become index rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationOrder {
    /// Lexicographic by file name. Reproducible across machines and runs.
    #[default]
    Sorted,
    /// Whatever order the filesystem lists entries in. Not guaranteed stable,
    /// even between two runs on the same directory.
    Listing,
}

/// What to do with a trailing batch smaller than `batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Yield the undersized batch; every eligible image is indexed.
    #[default]
    KeepPartial,
    /// Skip the remainder so every batch is full. The excluded files are
    /// reported through [`CorpusLoader::dropped`](crate::CorpusLoader::dropped).
    DropPartial,
}

/// Runtime configuration for corpus enumeration and batching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Number of images decoded and embedded together.
    ///
    /// Larger batches amortize inference overhead at the cost of memory:
    /// each image costs `3 * size * size * 4` bytes once preprocessed
    /// (about 600 KB at 224 px).
    ///
    /// Default: `32`
    pub batch_size: usize,

    /// File extensions, compared case-insensitively and without the dot.
    ///
    /// Default: `["png", "jpg", "jpeg"]`
    pub extensions: Vec<String>,

    /// Default: [`EnumerationOrder::Sorted`]
    pub order: EnumerationOrder,

    /// Default: [`BatchPolicy::KeepPartial`]
    pub batch_policy: BatchPolicy,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            extensions: vec!["png".into(), "jpg".into(), "jpeg".into()],
            order: EnumerationOrder::default(),
            batch_policy: BatchPolicy::default(),
        }
    }
}

impl CorpusConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_order(mut self, order: EnumerationOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    /// Validate the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), CorpusError> {
        if self.batch_size == 0 {
            return Err(CorpusError::InvalidConfig("batch_size must be >= 1".into()));
        }
        if self.extensions.is_empty() {
            return Err(CorpusError::InvalidConfig(
                "at least one file extension is required".into(),
            ));
        }
        if let Some(bad) = self
            .extensions
            .iter()
            .find(|e| e.is_empty() || e.starts_with('.'))
        {
            return Err(CorpusError::InvalidConfig(format!(
                "extensions are given without a leading dot, got {bad:?}"
            )));
        }
        Ok(())
    }

    /// True if `path` has one of the configured extensions.
    pub fn is_eligible(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
    }
}
