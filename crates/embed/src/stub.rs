use ndarray::Array2;

use crate::embedder::{check_tensor_sizes, Embedder};
use crate::transform::{ImageTensor, ImageTransform};
use crate::EmbedError;

/// Deterministic, model-free embedder.
///
/// Average-pools each channel of the normalized tensor over a `grid x grid`
/// layout, giving a `3 * grid * grid` vector. Visually similar images land
/// close together, which is enough for tests and offline smoke runs without
/// model weights.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    transform: ImageTransform,
    grid: u32,
}

impl StubEmbedder {
    pub fn new(transform: ImageTransform, grid: u32) -> Result<Self, EmbedError> {
        transform.validate()?;
        if grid == 0 || grid > transform.size {
            return Err(EmbedError::InvalidConfig(format!(
                "stub grid must be in 1..={}, got {grid}",
                transform.size
            )));
        }
        Ok(Self { transform, grid })
    }

    fn pool(&self, tensor: &ImageTensor, out: &mut [f32]) {
        let side = self.transform.size as usize;
        let grid = self.grid as usize;
        let cells = grid * grid;
        let mut counts = vec![0u32; cells];

        for channel in 0..3 {
            let plane = tensor.channel(channel);
            let sums = &mut out[channel * cells..(channel + 1) * cells];
            for (idx, value) in plane.iter().enumerate() {
                let (y, x) = (idx / side, idx % side);
                let cell = (y * grid / side) * grid + (x * grid / side);
                sums[cell] += value;
                if channel == 0 {
                    counts[cell] += 1;
                }
            }
        }

        for channel in 0..3 {
            for (cell, count) in counts.iter().enumerate() {
                if *count > 0 {
                    out[channel * cells + cell] /= *count as f32;
                }
            }
        }
    }
}

impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        3 * (self.grid as usize) * (self.grid as usize)
    }

    fn model_name(&self) -> &str {
        "stub-grid-pool"
    }

    fn transform(&self) -> &ImageTransform {
        &self.transform
    }

    fn embed_tensors(&self, tensors: &[ImageTensor]) -> Result<Array2<f32>, EmbedError> {
        check_tensor_sizes(&self.transform, tensors)?;
        let dim = self.dimension();
        let mut out = Array2::<f32>::zeros((tensors.len(), dim));
        for (mut row, tensor) in out.rows_mut().into_iter().zip(tensors) {
            let mut pooled = vec![0f32; dim];
            self.pool(tensor, &mut pooled);
            row.assign(&ndarray::ArrayView1::from(&pooled[..]));
        }
        Ok(out)
    }
}
