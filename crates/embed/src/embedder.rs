use std::sync::Arc;

use image::DynamicImage;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::info;

use crate::onnx::OnnxEmbedder;
use crate::stub::StubEmbedder;
use crate::transform::{ImageTensor, ImageTransform};
use crate::{EmbedConfig, EmbedError, EmbedMode};

/// Maps images to fixed-width feature vectors.
///
/// Implementations are frozen and deterministic: the same pixels always give
/// the same vector. Outputs are *not* normalized; callers that need unit
/// vectors normalize themselves.
pub trait Embedder: Send + Sync {
    /// Width of every vector this embedder produces.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;

    /// Preprocessing applied before the backbone.
    fn transform(&self) -> &ImageTransform;

    /// Run the backbone over already preprocessed tensors. Returns a `(B, D)`
    /// matrix with one row per tensor, in input order.
    fn embed_tensors(&self, tensors: &[ImageTensor]) -> Result<Array2<f32>, EmbedError>;

    /// Embed a single decoded image.
    fn embed(&self, image: &DynamicImage) -> Result<Vec<f32>, EmbedError> {
        let tensor = self.transform().apply(image);
        let matrix = self.embed_tensors(std::slice::from_ref(&tensor))?;
        if matrix.nrows() != 1 {
            return Err(EmbedError::Inference(format!(
                "expected 1 output row, got {}",
                matrix.nrows()
            )));
        }
        Ok(matrix.row(0).to_vec())
    }

    /// Embed a batch of decoded images. Preprocessing runs in parallel.
    fn embed_batch(&self, images: &[DynamicImage]) -> Result<Array2<f32>, EmbedError> {
        let transform = self.transform();
        let tensors: Vec<ImageTensor> = images.par_iter().map(|img| transform.apply(img)).collect();
        self.embed_tensors(&tensors)
    }
}

/// Reject tensors produced by a different transform than the embedder's.
pub(crate) fn check_tensor_sizes(
    transform: &ImageTransform,
    tensors: &[ImageTensor],
) -> Result<(), EmbedError> {
    let expected = transform.tensor_len();
    match tensors.iter().find(|t| t.as_slice().len() != expected) {
        Some(bad) => Err(EmbedError::DimensionMismatch {
            expected,
            got: bad.as_slice().len(),
        }),
        None => Ok(()),
    }
}

/// Construct the backend selected by `cfg`.
///
/// There is no fallback between backends: a missing model is an error, since
/// mixing stub and model vectors in one index would make rankings meaningless.
pub fn load_embedder(cfg: &EmbedConfig) -> Result<Arc<dyn Embedder>, EmbedError> {
    cfg.validate()?;
    let embedder: Arc<dyn Embedder> = match cfg.mode {
        EmbedMode::Onnx => Arc::new(OnnxEmbedder::load(cfg)?),
        EmbedMode::Stub => Arc::new(StubEmbedder::new(cfg.transform(), cfg.stub_grid)?),
    };
    info!(
        model = embedder.model_name(),
        dimension = embedder.dimension(),
        image_size = embedder.transform().size,
        "embedder ready"
    );
    Ok(embedder)
}
