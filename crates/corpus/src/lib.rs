//! imsim corpus loading
//!
//! Finds the images an index is built from and feeds them to the embedder in
//! batches. The loader is the only place that decides row order: the `i`-th
//! path it yields becomes row `i` of the index, the embedding matrix and the
//! path list.
//!
//! ```no_run
//! use corpus::{CorpusConfig, CorpusLoader};
//! use embed::ImageTransform;
//!
//! let loader = CorpusLoader::open(
//!     "data/the_images",
//!     ImageTransform::default(),
//!     CorpusConfig::default(),
//! )
//! .unwrap();
//!
//! for batch in loader.batches() {
//!     for failure in &batch.failures {
//!         eprintln!("skipped {}: {}", failure.path.display(), failure.reason);
//!     }
//!     // batch.tensors -> embedder, batch.paths -> path registry
//! }
//! ```

pub mod config;
mod error;
mod loader;

pub use crate::config::{BatchPolicy, CorpusConfig, EnumerationOrder};
pub use crate::error::CorpusError;
pub use crate::loader::{Batch, Batches, CorpusLoader, DecodeFailure};
