//! Fixed preprocessing shared by corpus builds and queries.
//!
//! Every image goes through the same steps before it reaches the backbone:
//! RGB conversion, square resize, scaling to `[0, 1]`, then per-channel
//! mean/std normalization. The result is a CHW `f32` tensor.
//!
//! Build and query must use the identical transform. Feeding the index with
//! vectors from a different pipeline does not fail, it just ranks badly.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};

use crate::EmbedError;

/// Per-channel mean of the ImageNet training distribution.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel standard deviation of the ImageNet training distribution.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// Input resolution expected by ResNet-style backbones.
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

/// Resize + normalize parameters matched to the backbone's pretraining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTransform {
    /// Output height and width in pixels.
    pub size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self::imagenet(DEFAULT_IMAGE_SIZE)
    }
}

impl ImageTransform {
    /// ImageNet normalization at a custom square resolution.
    pub fn imagenet(size: u32) -> Self {
        Self {
            size,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    pub fn validate(&self) -> Result<(), EmbedError> {
        if self.size == 0 {
            return Err(EmbedError::InvalidConfig(
                "image size must be >= 1".into(),
            ));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(EmbedError::InvalidConfig(format!(
                "std must be positive and finite, got {:?}",
                self.std
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(EmbedError::InvalidConfig(format!(
                "mean must be finite, got {:?}",
                self.mean
            )));
        }
        Ok(())
    }

    /// Number of `f32` values in one output tensor (`3 * size * size`).
    pub fn tensor_len(&self) -> usize {
        let side = self.size as usize;
        3 * side * side
    }

    /// Apply the transform. Any color mode (grayscale, RGBA, 16-bit) is first
    /// converted to 8-bit RGB; alpha is discarded.
    pub fn apply(&self, image: &DynamicImage) -> ImageTensor {
        let rgb = image.to_rgb8();
        let resized = imageops::resize(&rgb, self.size, self.size, FilterType::Triangle);

        let side = self.size as usize;
        let plane = side * side;
        let mut data = vec![0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * side + x as usize;
            for channel in 0..3 {
                let scaled = f32::from(pixel[channel]) / 255.0;
                data[channel * plane + offset] =
                    (scaled - self.mean[channel]) / self.std[channel];
            }
        }

        ImageTensor {
            size: self.size,
            data,
        }
    }
}

/// Preprocessed image in CHW layout, ready for the backbone.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    size: u32,
    data: Vec<f32>,
}

impl ImageTensor {
    /// Wrap raw CHW data. `data.len()` must equal `3 * size * size`.
    pub fn from_chw(size: u32, data: Vec<f32>) -> Result<Self, EmbedError> {
        let side = size as usize;
        let expected = 3 * side * side;
        if data.len() != expected {
            return Err(EmbedError::DimensionMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { size, data })
    }

    /// All-zero tensor, used to probe a model's output width.
    pub fn zeros(size: u32) -> Self {
        let side = size as usize;
        Self {
            size,
            data: vec![0.0; 3 * side * side],
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// One channel plane (`size * size` values, row-major).
    pub fn channel(&self, channel: usize) -> &[f32] {
        let plane = self.size as usize * self.size as usize;
        &self.data[channel * plane..(channel + 1) * plane]
    }
}

/// Decode an in-memory image, sniffing the format from its content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, EmbedError> {
    Ok(image::load_from_memory(bytes)?)
}

/// Open and decode an image file. The format is sniffed from the content so a
/// mislabeled extension still decodes.
pub fn open_image(path: &Path) -> Result<DynamicImage, EmbedError> {
    let reader = ImageReader::open(path)
        .map_err(|e| EmbedError::Decode(format!("{}: {e}", path.display())))?
        .with_guessed_format()
        .map_err(|e| EmbedError::Decode(format!("{}: {e}", path.display())))?;
    reader
        .decode()
        .map_err(|e| EmbedError::Decode(format!("{}: {e}", path.display())))
}
