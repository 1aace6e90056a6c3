use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::transform::{ImageTransform, DEFAULT_IMAGE_SIZE, IMAGENET_MEAN, IMAGENET_STD};
use crate::EmbedError;

/// Which backend turns preprocessed tensors into vectors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// Local ONNX Runtime session over the exported backbone.
    #[default]
    Onnx,
    /// Deterministic, model-free grid pooling. Tests and offline smoke runs.
    Stub,
}

/// Runtime configuration describing which model to load and how to preprocess images.
///
/// # Example
/// ```no_run
/// use embed::{load_embedder, EmbedConfig, EmbedMode};
///
/// let cfg = EmbedConfig {
///     mode: EmbedMode::Onnx,
///     model_path: "./models/resnet50/model.onnx".into(),
///     ..Default::default()
/// };
///
/// let embedder = load_embedder(&cfg).expect("model loads");
/// assert_eq!(embedder.dimension(), 2048);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedConfig {
    pub mode: EmbedMode,
    /// Friendly label reported by the embedder.
    pub model_name: String,
    /// Location of the ONNX file (headless backbone, pooled output).
    pub model_path: PathBuf,
    /// Graph input name. The session's first input is used when absent.
    pub input_name: Option<String>,
    /// Graph output name. The session's first output is used when absent.
    pub output_name: Option<String>,
    /// Square input resolution.
    pub image_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    /// ONNX Runtime intra-op threads. `0` lets the runtime decide.
    pub intra_threads: usize,
    /// Pooling grid of the stub backend; output width is `3 * grid * grid`.
    pub stub_grid: u32,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            mode: EmbedMode::Onnx,
            model_name: "resnet50-imagenet1k-v1".into(),
            model_path: PathBuf::from("./models/resnet50/model.onnx"),
            input_name: None,
            output_name: None,
            image_size: DEFAULT_IMAGE_SIZE,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            intra_threads: 0,
            stub_grid: 16,
        }
    }
}

impl EmbedConfig {
    /// Stub backend with a small input size, handy for tests.
    pub fn stub(image_size: u32, grid: u32) -> Self {
        Self {
            mode: EmbedMode::Stub,
            model_name: "stub-grid-pool".into(),
            image_size,
            stub_grid: grid,
            ..Default::default()
        }
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    /// The preprocessing described by this config.
    pub fn transform(&self) -> ImageTransform {
        ImageTransform {
            size: self.image_size,
            mean: self.mean,
            std: self.std,
        }
    }

    pub fn validate(&self) -> Result<(), EmbedError> {
        self.transform().validate()?;
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::InvalidConfig("model_name must not be empty".into()));
        }
        if self.mode == EmbedMode::Stub {
            if self.stub_grid == 0 {
                return Err(EmbedError::InvalidConfig("stub_grid must be >= 1".into()));
            }
            if self.stub_grid > self.image_size {
                return Err(EmbedError::InvalidConfig(format!(
                    "stub_grid ({}) cannot exceed image_size ({})",
                    self.stub_grid, self.image_size
                )));
            }
        }
        Ok(())
    }
}
