//! Error types produced by the corpus crate.
//!
//! Only problems with the corpus as a whole are errors. A single file that
//! fails to decode is not: it is reported as a [`DecodeFailure`] inside its
//! batch so the rest of the build can continue.
//!
//! [`DecodeFailure`]: crate::DecodeFailure

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CorpusError {
    /// The image root does not exist or is not a directory.
    #[error("image directory not found: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Listing the directory failed.
    #[error("failed to read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// Batch size, extensions or transform are unusable.
    #[error("invalid corpus config: {0}")]
    InvalidConfig(String),
}
