use std::fmt;
use std::path::PathBuf;

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

/// The three files that make up a persisted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Serialized flat index (`image_index.bin`).
    Index,
    /// Normalized embedding matrix (`features.npy`).
    Embeddings,
    /// Row-ordered path list (`image_paths.txt`).
    Paths,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Index => "index",
            ArtifactKind::Embeddings => "embeddings",
            ArtifactKind::Paths => "paths",
        };
        f.write_str(name)
    }
}

/// Custom error type
#[derive(Error, Debug, Clone)]
pub enum IndexError {
    #[error("missing {kind} artifact at {}", path.display())]
    MissingArtifact { kind: ArtifactKind, path: PathBuf },
    /// Row counts of the three artifacts disagree. Never repaired by truncation.
    #[error(
        "artifact row counts disagree: index={index_rows}, embeddings={embedding_rows}, paths={path_rows}"
    )]
    Consistency {
        index_rows: usize,
        embedding_rows: usize,
        path_rows: usize,
    },
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("unsupported index schema version {found} (supported: {supported})")]
    UnsupportedSchema { found: u16, supported: u16 },
    /// File exists but its bytes are not what the format requires.
    #[error("malformed {kind} artifact: {reason}")]
    Format { kind: ArtifactKind, reason: String },
    /// A path that cannot be stored one-per-line as UTF-8.
    #[error("path cannot be persisted: {0}")]
    InvalidPath(String),
    #[error("Serialization encode error: {0}")]
    Encode(String),
    #[error("Serialization decode error: {0}")]
    Decode(String),
    #[error("Compression error: {0}")]
    Zstd(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<EncodeError> for IndexError {
    fn from(e: EncodeError) -> Self {
        IndexError::Encode(e.to_string())
    }
}

impl From<DecodeError> for IndexError {
    fn from(e: DecodeError) -> Self {
        IndexError::Decode(e.to_string())
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Io(e.to_string())
    }
}

impl IndexError {
    pub(crate) fn format(kind: ArtifactKind, reason: impl Into<String>) -> Self {
        Self::Format {
            kind,
            reason: reason.into(),
        }
    }

    /// True when the persisted set is present but does not line up.
    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            IndexError::Consistency { .. } | IndexError::DimensionMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_names_kind_and_path() {
        let err = IndexError::MissingArtifact {
            kind: ArtifactKind::Paths,
            path: PathBuf::from("saved/image_paths.txt"),
        };
        let msg = err.to_string();
        assert!(msg.contains("paths"));
        assert!(msg.contains("saved/image_paths.txt"));
    }

    #[test]
    fn consistency_reports_all_counts() {
        let err = IndexError::Consistency {
            index_rows: 10,
            embedding_rows: 10,
            path_rows: 9,
        };
        assert_eq!(
            err.to_string(),
            "artifact row counts disagree: index=10, embeddings=10, paths=9"
        );
        assert!(err.is_consistency());
        assert!(!IndexError::Io("disk".into()).is_consistency());
    }
}
