//! # imsim Index
//!
//! Exact vector index over image embeddings plus the on-disk artifact set
//! that makes it reusable across processes.
//!
//! ## Core pieces
//!
//! - [`FlatIndex`]: dense `(N, D)` matrix with exact top-k inner-product
//!   search. Rows are expected to be unit length, making scores cosine
//!   similarities.
//! - [`IndexArtifacts`]: the index, the embedding matrix and the path list,
//!   validated to describe the same `N` rows.
//! - [`save`] / [`load`]: persist the triple as three files in one directory:
//!   - `image_index.bin`: magic `IMSIMIDX`, a codec byte, then a bincode
//!     record (optionally zstd-compressed).
//!   - `features.npy`: NumPy `float32` matrix, readable with `np.load`.
//!   - `image_paths.txt`: one UTF-8 path per line, in row order.
//!
//! Loading never repairs a mismatched set; row counts that disagree are a
//! hard [`IndexError::Consistency`] failure.
//!
//! ## Example Usage
//!
//! ```
//! use index::{load, save, ArtifactPaths, CompressionConfig, IndexArtifacts};
//! use ndarray::array;
//! use std::path::PathBuf;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let locations = ArtifactPaths::in_dir(dir.path());
//!
//! let artifacts = IndexArtifacts::from_embeddings(
//!     array![[1.0f32, 0.0], [0.0, 1.0]],
//!     vec![PathBuf::from("a.png"), PathBuf::from("b.png")],
//! )
//! .unwrap();
//! save(&artifacts, &locations, &CompressionConfig::default()).unwrap();
//!
//! let loaded = load(&locations).unwrap();
//! let hits = loaded.index().search(&[0.0, 1.0], 1).unwrap();
//! assert_eq!(loaded.path(hits[0].row).unwrap(), PathBuf::from("b.png"));
//! ```

mod error;
pub mod flat;
pub mod npy;
pub mod persist;

pub use crate::error::{ArtifactKind, IndexError};
pub use crate::flat::{FlatIndex, Neighbor};
pub use crate::persist::{
    inspect, load, save, ArtifactPaths, ArtifactSummary, CompressionCodec, CompressionConfig,
    IndexArtifacts, EMBEDDINGS_FILE_NAME, INDEX_FILE_NAME, INDEX_SCHEMA_VERSION, PATHS_FILE_NAME,
};
