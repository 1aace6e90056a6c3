use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use embed::{decode_image, l2_normalize_in_place, open_image, Embedder};
use image::DynamicImage;
use index::{ArtifactPaths, IndexArtifacts};
use tracing::{debug, info};

use crate::metrics::metrics_recorder;
use crate::types::{MatchError, SearchHit};

#[cfg(test)]
mod tests;

/// Query side of the system: one embedder plus one loaded artifact triple.
///
/// Immutable after construction, so a single engine can be wrapped in an
/// `Arc` and queried from any number of threads.
pub struct SearchEngine {
    embedder: Arc<dyn Embedder>,
    artifacts: IndexArtifacts,
}

impl SearchEngine {
    /// Pair an embedder with already loaded artifacts.
    ///
    /// The embedder must be the one the index was built with. Only the vector
    /// width can be checked here.
    pub fn new(embedder: Arc<dyn Embedder>, artifacts: IndexArtifacts) -> Result<Self, MatchError> {
        if embedder.dimension() != artifacts.dimension() {
            return Err(MatchError::ModelMismatch {
                embedder: embedder.dimension(),
                index: artifacts.dimension(),
            });
        }
        Ok(Self {
            embedder,
            artifacts,
        })
    }

    /// Load the artifact triple from disk and wrap it.
    pub fn open(embedder: Arc<dyn Embedder>, locations: &ArtifactPaths) -> Result<Self, MatchError> {
        let artifacts = index::load(locations)?;
        let engine = Self::new(embedder, artifacts)?;
        info!(
            rows = engine.len(),
            dimension = engine.dimension(),
            model = engine.embedder.model_name(),
            "search engine ready"
        );
        Ok(engine)
    }

    /// Paths of the `top_k` stored images most similar to `image`, best first.
    pub fn search(&self, image: &DynamicImage, top_k: usize) -> Result<Vec<PathBuf>, MatchError> {
        Ok(self
            .search_scored(image, top_k)?
            .into_iter()
            .map(|hit| hit.path)
            .collect())
    }

    /// Like [`search`](Self::search) but keeps rank, row and score.
    pub fn search_scored(
        &self,
        image: &DynamicImage,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, MatchError> {
        let query = self.embedder.embed(image)?;
        self.search_vector(&query, top_k)
    }

    /// Decode the file at `path` and search with it.
    pub fn search_file(
        &self,
        path: impl AsRef<Path>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, MatchError> {
        let image = open_image(path.as_ref())?;
        self.search_scored(&image, top_k)
    }

    /// Decode an encoded image held in memory and search with it.
    pub fn search_bytes(&self, bytes: &[u8], top_k: usize) -> Result<Vec<SearchHit>, MatchError> {
        let image = decode_image(bytes)?;
        self.search_scored(&image, top_k)
    }

    /// Search with a raw feature vector. The vector is normalized first, so
    /// it need not be unit length.
    pub fn search_vector(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, MatchError> {
        let start = Instant::now();
        let mut query = query.to_vec();
        l2_normalize_in_place(&mut query);

        let neighbors = self.artifacts.index().search(&query, top_k)?;
        let hits = neighbors
            .into_iter()
            .enumerate()
            .map(|(i, neighbor)| {
                let path = self
                    .artifacts
                    .path(neighbor.row)
                    .ok_or(MatchError::RowOutOfRange {
                        row: neighbor.row,
                        len: self.artifacts.len(),
                    })?;
                Ok(SearchHit {
                    rank: i + 1,
                    row: neighbor.row,
                    path: path.to_path_buf(),
                    score: neighbor.score,
                })
            })
            .collect::<Result<Vec<_>, MatchError>>()?;

        let elapsed = start.elapsed();
        debug!(
            top_k,
            hits = hits.len(),
            best = hits.first().map(|h| h.score),
            elapsed_us = elapsed.as_micros() as u64,
            "query served"
        );
        if let Some(recorder) = metrics_recorder() {
            recorder.record_search(elapsed, top_k, hits.len());
        }
        Ok(hits)
    }

    /// Number of indexed images.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.artifacts.dimension()
    }

    pub fn artifacts(&self) -> &IndexArtifacts {
        &self.artifacts
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}
