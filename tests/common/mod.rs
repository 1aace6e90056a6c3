//! Shared fixtures for the imsim integration tests.
//!
//! Images are small synthetic PNGs; the stub embedder keeps every test
//! model-free and deterministic.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use imsim::{ArtifactConfig, EmbedConfig, ImsimConfig};
use tempfile::TempDir;

/// Width and height of generated fixtures.
pub const FIXTURE_SIDE: u32 = 48;

/// Stub embedder settings used throughout: 32px input, 4x4 grid, 48-d output.
pub fn stub_embed() -> EmbedConfig {
    EmbedConfig::stub(32, 4)
}

pub const STUB_DIMENSION: usize = 48;

/// Deterministic gradient image; different seeds give visibly different images.
pub fn fixture_image(seed: u32) -> RgbImage {
    RgbImage::from_fn(FIXTURE_SIDE, FIXTURE_SIDE, |x, y| {
        Rgb([
            ((x * seed * 7 + y * 3) % 256) as u8,
            ((y * seed * 5 + 40 * seed) % 256) as u8,
            (((x + y) * seed * 3 + 17) % 256) as u8,
        ])
    })
}

pub fn write_fixture(dir: &Path, name: &str, seed: u32) -> PathBuf {
    let path = dir.join(name);
    fixture_image(seed)
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path
}

/// `count` images named `img_000.png`, `img_001.png`, ...
pub fn image_dir(count: u32) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..count {
        write_fixture(dir.path(), &format!("img_{i:03}.png"), i + 1);
    }
    dir
}

/// Config pointing at `data_dir` for input and `artifacts_dir` for output.
pub fn test_config(data_dir: &Path, artifacts_dir: &Path) -> ImsimConfig {
    ImsimConfig {
        data_dir: data_dir.to_path_buf(),
        embed: stub_embed(),
        artifacts: ArtifactConfig {
            dir: artifacts_dir.to_path_buf(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}
