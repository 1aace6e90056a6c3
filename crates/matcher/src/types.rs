use std::path::PathBuf;
use std::time::Duration;

use corpus::{CorpusError, DecodeFailure};
use embed::EmbedError;
use index::{IndexArtifacts, IndexError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Query-time settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of matches returned when the caller does not ask for a count.
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.top_k == 0 {
            return Err(MatchError::InvalidConfig(
                "top_k must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// A single ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 1-based position in the result list.
    pub rank: usize,
    /// Row in the index / embedding matrix / path list.
    pub row: usize,
    pub path: PathBuf,
    /// Cosine similarity between query and stored vector, in `[-1, 1]`.
    pub score: f32,
}

/// Summary of one index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Files that matched the extension filter.
    pub eligible: usize,
    /// Rows in the resulting index.
    pub indexed: usize,
    /// Files skipped because they could not be decoded or their names
    /// cannot be stored in the path list.
    pub failures: Vec<DecodeFailure>,
    /// Files left out by `BatchPolicy::DropPartial`.
    pub dropped: Vec<PathBuf>,
    /// Indexed files whose embedding was all zeros. Their rows stay zero
    /// instead of unit length and score 0 against every query.
    #[serde(default)]
    pub zero_norm: Vec<PathBuf>,
    pub batches: usize,
    pub dimension: usize,
    #[serde(rename = "elapsed_ms", with = "crate::serde_millis")]
    pub elapsed: Duration,
}

/// Result of [`IndexBuilder::build`](crate::IndexBuilder::build).
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub artifacts: IndexArtifacts,
    pub report: BuildReport,
}

/// Errors produced by the build and query layer.
#[derive(Debug, Error)]
pub enum MatchError {
    /// Invalid configuration (per-request or global).
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
    /// Decoding or embedding failed.
    #[error("embed error: {0}")]
    Embed(#[from] EmbedError),
    /// Corpus directory could not be enumerated.
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
    /// Index read, write or search failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    /// The embedder produces vectors of a different width than the index holds.
    #[error("embedder dimension {embedder} does not match index dimension {index}")]
    ModelMismatch { embedder: usize, index: usize },
    /// The embedder returned a matrix of the wrong shape for its batch.
    #[error("embedder returned {got_rows}x{got_cols} for a batch expecting {expected_rows}x{expected_cols}")]
    BatchShape {
        expected_rows: usize,
        expected_cols: usize,
        got_rows: usize,
        got_cols: usize,
    },
    /// Search produced a row with no path. The loaded artifacts are broken.
    #[error("result row {row} is outside the path list ({len} entries)")]
    RowOutOfRange { row: usize, len: usize },
}

impl MatchError {
    /// The query image itself was bad (client error).
    pub fn is_decode(&self) -> bool {
        matches!(self, MatchError::Embed(e) if e.is_decode())
    }

    /// An invariant of the engine was violated (server bug, not bad input).
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            MatchError::RowOutOfRange { .. } | MatchError::BatchShape { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_config_defaults_and_validation() {
        assert_eq!(SearchConfig::default().top_k, 5);
        assert!(SearchConfig::default().validate().is_ok());
        assert!(SearchConfig { top_k: 0 }.validate().is_err());
    }

    #[test]
    fn error_classification() {
        let decode = MatchError::from(EmbedError::Decode("bad png".into()));
        assert!(decode.is_decode());
        assert!(!decode.is_internal());

        let row = MatchError::RowOutOfRange { row: 12, len: 10 };
        assert!(row.is_internal());
        assert!(!row.is_decode());
        assert_eq!(
            row.to_string(),
            "result row 12 is outside the path list (10 entries)"
        );

        let inference = MatchError::from(EmbedError::Inference("oom".into()));
        assert!(!inference.is_decode());
    }

    #[test]
    fn report_serializes_elapsed_as_millis() {
        let report = BuildReport {
            eligible: 3,
            indexed: 2,
            failures: vec![DecodeFailure {
                path: PathBuf::from("bad.png"),
                reason: "truncated".into(),
            }],
            dropped: Vec::new(),
            zero_norm: Vec::new(),
            batches: 1,
            dimension: 48,
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed_ms"], 1500);
        assert_eq!(json["failures"][0]["path"], "bad.png");
    }

    #[test]
    fn report_reads_back_from_build_output() {
        let json = r#"{"eligible":2,"indexed":2,"failures":[],"dropped":[],
            "batches":1,"dimension":48,"elapsed_ms":250}"#;
        let report: BuildReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.elapsed, Duration::from_millis(250));
        assert!(report.zero_norm.is_empty());
    }
}
