use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use corpus::{Batch, CorpusConfig, CorpusLoader};
use embed::{l2_normalize_rows, Embedder};
use index::IndexArtifacts;
use ndarray::{Array2, Axis};
use tracing::{debug, info, warn};

use crate::metrics::metrics_recorder;
use crate::types::{BuildOutput, BuildReport, MatchError};

/// Offline index construction: directory in, artifact triple out.
///
/// Builds are single-writer and synchronous. Nothing here is shared across
/// threads except the embedder, so callers must serialize builds that target
/// the same output location.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    corpus: CorpusConfig,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, corpus: CorpusConfig) -> Self {
        Self { embedder, corpus }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed every eligible image in `dir` and assemble the artifacts.
    ///
    /// Rows follow the loader's order. Images that fail to decode, or whose
    /// names cannot be stored, are skipped and listed in the report; an
    /// inference failure aborts the build. Rows are normalized to unit length
    /// except all-zero embeddings, which stay zero and are listed in
    /// [`BuildReport::zero_norm`].
    pub fn build(&self, dir: impl AsRef<Path>) -> Result<BuildOutput, MatchError> {
        let start = Instant::now();
        let dir = dir.as_ref();
        let dimension = self.embedder.dimension();

        let loader = CorpusLoader::open(dir, self.embedder.transform().clone(), self.corpus.clone())?;

        let mut embeddings = Array2::<f32>::zeros((0, dimension));
        let mut paths = Vec::with_capacity(loader.files().len());
        let mut failures = loader.rejected().to_vec();
        let mut batches = 0usize;

        for batch in loader.batches() {
            let Batch {
                index,
                tensors,
                paths: batch_paths,
                failures: batch_failures,
            } = batch;
            batches += 1;
            failures.extend(batch_failures);
            if tensors.is_empty() {
                continue;
            }

            let features = self.embedder.embed_tensors(&tensors)?;
            let shape_error = || MatchError::BatchShape {
                expected_rows: tensors.len(),
                expected_cols: dimension,
                got_rows: features.nrows(),
                got_cols: features.ncols(),
            };
            if features.dim() != (tensors.len(), dimension) {
                return Err(shape_error());
            }
            embeddings
                .append(Axis(0), features.view())
                .map_err(|_| shape_error())?;
            paths.extend(batch_paths);
            debug!(batch = index, rows = embeddings.nrows(), "batch embedded");
        }

        let zero_norm: Vec<PathBuf> = embeddings
            .rows()
            .into_iter()
            .zip(&paths)
            .filter(|(row, _)| row.iter().all(|x| *x == 0.0))
            .map(|(_, path)| path.clone())
            .collect();
        if !zero_norm.is_empty() {
            warn!(count = zero_norm.len(), "all-zero embeddings cannot be normalized");
        }
        l2_normalize_rows(&mut embeddings);
        let artifacts = IndexArtifacts::from_embeddings(embeddings, paths)?;

        let report = BuildReport {
            eligible: loader.eligible(),
            indexed: artifacts.len(),
            failures,
            dropped: loader.dropped().to_vec(),
            zero_norm,
            batches,
            dimension,
            elapsed: start.elapsed(),
        };
        info!(
            dir = %dir.display(),
            model = self.embedder.model_name(),
            indexed = report.indexed,
            failed = report.failures.len(),
            dropped = report.dropped.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "index built"
        );
        if let Some(recorder) = metrics_recorder() {
            recorder.record_build(report.elapsed, report.indexed, report.failures.len());
        }

        Ok(BuildOutput { artifacts, report })
    }
}
