//! imsim matcher
//!
//! Ties the embedder, the corpus loader and the index together into the two
//! things callers actually do:
//!
//! - [`IndexBuilder::build`]: embed a directory of images into an
//!   [`IndexArtifacts`](index::IndexArtifacts) triple, ready for
//!   [`index::save`].
//! - [`SearchEngine::search`]: embed a query image with the same embedder and
//!   return the paths of the most similar stored images, best first.
//!
//! [`SharedEngine`] wraps an engine for long-running processes that need to
//! pick up a rebuilt index without restarting.
//!
//! ```no_run
//! use corpus::CorpusConfig;
//! use embed::{load_embedder, open_image, EmbedConfig};
//! use index::{ArtifactPaths, CompressionConfig};
//! use matcher::{IndexBuilder, SearchEngine};
//! use std::path::Path;
//!
//! let embedder = load_embedder(&EmbedConfig::default()).unwrap();
//! let locations = ArtifactPaths::in_dir("saved");
//!
//! let built = IndexBuilder::new(embedder.clone(), CorpusConfig::default())
//!     .build("data/the_images")
//!     .unwrap();
//! index::save(&built.artifacts, &locations, &CompressionConfig::default()).unwrap();
//!
//! let engine = SearchEngine::open(embedder, &locations).unwrap();
//! let query = open_image(Path::new("query.jpg")).unwrap();
//! for path in engine.search(&query, 5).unwrap() {
//!     println!("{}", path.display());
//! }
//! ```

mod builder;
mod engine;
mod metrics;
mod serde_millis;
mod shared;
mod types;

pub use crate::builder::IndexBuilder;
pub use crate::engine::SearchEngine;
pub use crate::metrics::{set_search_metrics, SearchMetrics};
pub use crate::shared::SharedEngine;
pub use crate::types::{BuildOutput, BuildReport, MatchError, SearchConfig, SearchHit};
