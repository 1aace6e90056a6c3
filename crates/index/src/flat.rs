//! Exact inner-product index over a dense `(N, D)` matrix.
//!
//! Every query scans all rows. With unit-length rows and queries the score is
//! cosine similarity, so higher means closer. One matrix-vector product per
//! query; fine for corpora up to a few hundred thousand images.

use std::cmp::Ordering;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::IndexError;

/// One search hit: row position in the index and its inner-product score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub score: f32,
}

/// Higher score first; equal scores fall back to ascending row.
fn rank_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.score.total_cmp(&a.score).then(a.row.cmp(&b.row))
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    vectors: Array2<f32>,
}

impl FlatIndex {
    /// Empty index that will accept vectors of width `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dimension)),
        }
    }

    /// Index the rows of `vectors` as-is (no normalization).
    pub fn from_matrix(vectors: Array2<f32>) -> Self {
        Self { vectors }
    }

    /// Append rows. Row ids continue from the current length.
    pub fn add(&mut self, batch: ArrayView2<'_, f32>) -> Result<(), IndexError> {
        if batch.ncols() != self.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension(),
                got: batch.ncols(),
            });
        }
        self.vectors
            .append(Axis(0), batch)
            .map_err(|e| IndexError::Encode(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    pub fn row(&self, row: usize) -> Option<ArrayView1<'_, f32>> {
        (row < self.len()).then(|| self.vectors.row(row))
    }

    /// Top-`k` rows by inner product with `query`, best first.
    ///
    /// Returns `min(k, len)` hits; `k == 0` and an empty index both return
    /// nothing. Ties are broken by ascending row so results are reproducible.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension(),
                got: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.vectors.dot(&ArrayView1::from(query));
        let mut hits: Vec<Neighbor> = scores
            .iter()
            .enumerate()
            .map(|(row, &score)| Neighbor { row, score })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, rank_order);
            hits.truncate(k);
        }
        hits.sort_by(rank_order);
        Ok(hits)
    }
}
