use std::sync::Mutex;

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::embedder::{check_tensor_sizes, Embedder};
use crate::transform::{ImageTensor, ImageTransform};
use crate::{EmbedConfig, EmbedError};

/// Headless CNN backbone executed through ONNX Runtime.
///
/// The exported graph takes `(B, 3, H, W)` float input and returns pooled
/// features shaped `(B, D)` or `(B, D, 1, 1)`. The session is loaded once and
/// shared; `run` needs exclusive access so calls are serialized by a mutex.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    model_name: String,
    transform: ImageTransform,
    dimension: usize,
}

impl std::fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("model_name", &self.model_name)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl OnnxEmbedder {
    /// Load the model at `cfg.model_path` and probe its output width.
    pub fn load(cfg: &EmbedConfig) -> Result<Self, EmbedError> {
        if !cfg.model_path.exists() {
            return Err(EmbedError::ModelNotFound(cfg.model_path.display().to_string()));
        }

        let mut builder = Session::builder()
            .map_err(|e| EmbedError::Inference(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;
        if cfg.intra_threads > 0 {
            builder = builder
                .with_intra_threads(cfg.intra_threads)
                .map_err(|e| EmbedError::Inference(e.to_string()))?;
        }
        let session = builder.commit_from_file(&cfg.model_path).map_err(|e| {
            EmbedError::Inference(format!(
                "failed to load {}: {e}",
                cfg.model_path.display()
            ))
        })?;

        let input_name = match &cfg.input_name {
            Some(name) => name.clone(),
            None => session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .ok_or_else(|| EmbedError::Inference("model declares no inputs".into()))?,
        };
        let output_name = match &cfg.output_name {
            Some(name) => name.clone(),
            None => session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| EmbedError::Inference("model declares no outputs".into()))?,
        };

        let mut embedder = Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            model_name: cfg.model_name.clone(),
            transform: cfg.transform(),
            dimension: 0,
        };

        let probe = embedder.run(&[ImageTensor::zeros(cfg.image_size)])?;
        embedder.dimension = probe.ncols();
        info!(
            path = %cfg.model_path.display(),
            input = %embedder.input_name,
            output = %embedder.output_name,
            dimension = embedder.dimension,
            "onnx model loaded"
        );
        Ok(embedder)
    }

    /// Single forward pass; returns one flattened feature row per tensor.
    fn run(&self, tensors: &[ImageTensor]) -> Result<Array2<f32>, EmbedError> {
        let batch = tensors.len();
        let side = self.transform.size as usize;
        let mut data = Vec::with_capacity(batch * self.transform.tensor_len());
        for tensor in tensors {
            data.extend_from_slice(tensor.as_slice());
        }

        let input = Tensor::from_array((vec![batch, 3, side, side], data))
            .map_err(|e| EmbedError::Inference(format!("failed to create input tensor: {e}")))?;

        let mut session = self.session.lock().unwrap_or_else(|p| p.into_inner());
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| EmbedError::Inference(e.to_string()))?;
        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            EmbedError::Inference(format!("model produced no output '{}'", self.output_name))
        })?;
        let (shape, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedError::Inference(format!("failed to extract features: {e}")))?;

        let rows = shape.first().copied().unwrap_or(0) as usize;
        if rows != batch || batch == 0 || values.len() % batch != 0 {
            return Err(EmbedError::Inference(format!(
                "unexpected output shape {:?} for batch of {batch}",
                shape.iter().collect::<Vec<_>>()
            )));
        }
        let width = values.len() / batch;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EmbedError::Inference("features contain non-finite values".into()));
        }

        let features = values.to_vec();
        Array2::from_shape_vec((batch, width), features)
            .map_err(|e| EmbedError::Inference(e.to_string()))
    }
}

impl Embedder for OnnxEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn transform(&self) -> &ImageTransform {
        &self.transform
    }

    fn embed_tensors(&self, tensors: &[ImageTensor]) -> Result<Array2<f32>, EmbedError> {
        if tensors.is_empty() {
            return Ok(Array2::zeros((0, self.dimension)));
        }
        check_tensor_sizes(&self.transform, tensors)?;
        let features = self.run(tensors)?;
        if features.ncols() != self.dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimension,
                got: features.ncols(),
            });
        }
        debug!(batch = tensors.len(), "onnx batch embedded");
        Ok(features)
    }
}
