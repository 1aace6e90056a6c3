use std::io;
use thiserror::Error;

/// Errors surfaced while turning images into embeddings.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The input bytes could not be parsed as an image.
    #[error("image decode failed: {0}")]
    Decode(String),
    /// The ONNX model could not be located on disk.
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    /// Configuration is inconsistent (e.g., zero image size or std).
    #[error("invalid embed config: {0}")]
    InvalidConfig(String),
    /// Low-level IO failures while touching the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// ONNX Runtime or output-shape errors.
    #[error("inference failure: {0}")]
    Inference(String),
    /// A tensor or vector did not have the width the backbone expects.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl EmbedError {
    /// True for failures caused by the input image rather than the model.
    pub fn is_decode(&self) -> bool {
        matches!(self, EmbedError::Decode(_))
    }
}

impl From<image::ImageError> for EmbedError {
    fn from(err: image::ImageError) -> Self {
        EmbedError::Decode(err.to_string())
    }
}
