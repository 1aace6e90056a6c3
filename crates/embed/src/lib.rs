//! imsim image embedding
//!
//! Turns decoded images into fixed-width feature vectors with a frozen CNN
//! backbone. Everything downstream (index build, queries) sees images only
//! through the [`Embedder`] trait.
//!
//! Two backends:
//!
//! - **ONNX** - a ResNet-50 exported without its classification head, run
//!   locally through ONNX Runtime. 2048-d pooled features.
//! - **Stub** - grid average-pooling over the normalized pixels. No weights,
//!   fully deterministic, used by tests and offline smoke runs.
//!
//! Preprocessing lives in [`ImageTransform`] and must be identical at build and
//! query time. Embedders return raw features; L2 normalization is the
//! caller's job ([`l2_normalize_in_place`], [`l2_normalize_rows`]).
//!
//! ```no_run
//! use embed::{load_embedder, open_image, EmbedConfig};
//! use std::path::Path;
//!
//! let embedder = load_embedder(&EmbedConfig::default()).unwrap();
//! let image = open_image(Path::new("data/the_images/cat.jpg")).unwrap();
//! let vector = embedder.embed(&image).unwrap();
//! assert_eq!(vector.len(), embedder.dimension());
//! ```

pub mod config;
pub mod error;
pub mod transform;

mod embedder;
mod normalize;
mod onnx;
mod stub;

pub use crate::config::{EmbedConfig, EmbedMode};
pub use crate::embedder::{load_embedder, Embedder};
pub use crate::error::EmbedError;
pub use crate::normalize::{l2_norm, l2_normalize_in_place, l2_normalize_rows};
pub use crate::onnx::OnnxEmbedder;
pub use crate::stub::StubEmbedder;
pub use crate::transform::{
    decode_image, open_image, ImageTensor, ImageTransform, DEFAULT_IMAGE_SIZE, IMAGENET_MEAN,
    IMAGENET_STD,
};
