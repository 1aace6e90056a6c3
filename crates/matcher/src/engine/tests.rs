use super::*;
use std::sync::RwLock;
use std::time::Duration;

use corpus::CorpusConfig;
use embed::{l2_norm, load_embedder, EmbedConfig};
use image::{ImageFormat, Rgb, RgbImage};
use index::{ArtifactKind, CompressionConfig, IndexError};
use ndarray::array;
use tempfile::TempDir;

use crate::metrics::{set_search_metrics, SearchMetrics};
use crate::IndexBuilder;

/// Five visually distinct fixtures, listed in the order the loader sorts them.
const LABELS: [&str; 5] = [
    "a_ramp.png",
    "b_sunset.png",
    "c_solid.png",
    "d_checker.png",
    "e_diagonal.png",
];

fn pixel(label: usize, x: u32, y: u32) -> Rgb<u8> {
    let (x8, y8) = (x as u8, y as u8);
    match label {
        0 => Rgb([x8 * 4, 20, 200 - y8 * 2]),
        1 => Rgb([255 - x8 * 4, y8 * 4, 30]),
        2 => Rgb([10, 200, 90]),
        3 => {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }
        _ => Rgb([y8 * 4, 128, x8 * 4]),
    }
}

fn fixture(label: usize) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| pixel(label, x, y)))
}

fn labeled_corpus() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (label, name) in LABELS.iter().enumerate() {
        fixture(label)
            .save_with_format(dir.path().join(name), ImageFormat::Png)
            .unwrap();
    }
    dir
}

fn stub() -> Arc<dyn Embedder> {
    load_embedder(&EmbedConfig::stub(32, 4)).unwrap()
}

fn build_engine(dir: &Path) -> Result<SearchEngine, MatchError> {
    let embedder = stub();
    let out = IndexBuilder::new(embedder.clone(), CorpusConfig::default()).build(dir)?;
    SearchEngine::new(embedder, out.artifacts)
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[test]
fn image_finds_itself_first() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let engine = build_engine(dir.path())?;

    let hits = engine.search_file(dir.path().join("c_solid.png"), 3)?;
    assert_eq!(file_name(&hits[0].path), "c_solid.png");
    assert_eq!(hits[0].rank, 1);
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    Ok(())
}

#[test]
fn every_label_maps_back_to_its_own_row() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let engine = build_engine(dir.path())?;
    assert_eq!(engine.len(), LABELS.len());

    for (row, name) in LABELS.iter().enumerate() {
        let hits = engine.search_scored(&fixture(row), 1)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].row, row, "{name} landed on the wrong row");
        assert_eq!(file_name(&hits[0].path), *name);
        assert_eq!(engine.artifacts().path(row), Some(hits[0].path.as_path()));
    }
    Ok(())
}

#[test]
fn plain_search_returns_paths_in_score_order() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let engine = build_engine(dir.path())?;

    let scored = engine.search_scored(&fixture(4), 5)?;
    let paths = engine.search(&fixture(4), 5)?;
    let expected: Vec<PathBuf> = scored.iter().map(|h| h.path.clone()).collect();
    assert_eq!(paths, expected);
    for pair in scored.windows(2) {
        assert!(pair[0].score >= pair[1].score);
        assert_eq!(pair[1].rank, pair[0].rank + 1);
    }
    Ok(())
}

#[test]
fn result_count_is_min_of_top_k_and_corpus() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let engine = build_engine(dir.path())?;
    let query = fixture(0);

    assert_eq!(engine.search(&query, 3)?.len(), 3);
    assert_eq!(engine.search(&query, 5)?.len(), 5);
    assert_eq!(engine.search(&query, 50)?.len(), 5);
    assert!(engine.search(&query, 0)?.is_empty());
    Ok(())
}

#[test]
fn empty_corpus_answers_with_nothing() -> Result<(), MatchError> {
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(dir.path())?;

    assert!(engine.is_empty());
    assert_eq!(engine.dimension(), 48);
    assert!(engine.search(&fixture(1), 5)?.is_empty());
    Ok(())
}

#[test]
fn stored_and_query_vectors_are_unit_length() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let engine = build_engine(dir.path())?;

    for row in engine.artifacts().index().vectors().rows() {
        assert!((l2_norm(row.as_slice().unwrap()) - 1.0).abs() < 1e-5);
    }

    // Scaling the query must not change scores.
    let raw = engine.embedder().embed(&fixture(3))?;
    let scaled: Vec<f32> = raw.iter().map(|v| v * 7.5).collect();
    let a = engine.search_vector(&raw, 5)?;
    let b = engine.search_vector(&scaled, 5)?;
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.row, y.row);
        assert!((x.score - y.score).abs() < 1e-5);
        assert!(x.score <= 1.0 + 1e-5);
    }
    Ok(())
}

#[test]
fn saved_index_searches_identically() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let embedder = stub();
    let out = IndexBuilder::new(embedder.clone(), CorpusConfig::default()).build(dir.path())?;

    let saved = tempfile::tempdir().unwrap();
    let locations = ArtifactPaths::in_dir(saved.path());
    index::save(&out.artifacts, &locations, &CompressionConfig::default())?;

    let fresh = SearchEngine::new(embedder.clone(), out.artifacts)?;
    let reloaded = SearchEngine::open(embedder, &locations)?;
    assert_eq!(reloaded.len(), fresh.len());

    for label in 0..LABELS.len() {
        let query = fixture(label);
        assert_eq!(
            fresh.search_scored(&query, 5)?,
            reloaded.search_scored(&query, 5)?
        );
    }
    Ok(())
}

#[test]
fn opening_without_artifacts_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = SearchEngine::open(stub(), &ArtifactPaths::in_dir(dir.path()))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        MatchError::Index(IndexError::MissingArtifact {
            kind: ArtifactKind::Index,
            ..
        })
    ));
}

#[test]
fn undecodable_query_is_a_decode_error() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let engine = build_engine(dir.path())?;

    let err = engine.search_bytes(b"definitely not an image", 5).unwrap_err();
    assert!(err.is_decode());

    let missing = engine.search_file(dir.path().join("gone.png"), 5).unwrap_err();
    assert!(missing.is_decode());
    Ok(())
}

#[test]
fn query_bytes_match_query_file() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let engine = build_engine(dir.path())?;

    let path = dir.path().join("b_sunset.png");
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(engine.search_bytes(&bytes, 5)?, engine.search_file(&path, 5)?);
    Ok(())
}

#[test]
fn embedder_width_must_match_index() {
    let artifacts = IndexArtifacts::from_embeddings(
        array![[1.0f32, 0.0], [0.0, 1.0]],
        vec![PathBuf::from("x.png"), PathBuf::from("y.png")],
    )
    .unwrap();
    let err = SearchEngine::new(stub(), artifacts).err().unwrap();
    assert!(matches!(
        err,
        MatchError::ModelMismatch {
            embedder: 48,
            index: 2
        }
    ));
}

#[test]
fn wrong_width_query_vector_is_rejected() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let engine = build_engine(dir.path())?;

    let err = engine.search_vector(&[1.0, 2.0, 3.0], 5).unwrap_err();
    assert!(matches!(
        err,
        MatchError::Index(IndexError::DimensionMismatch {
            expected: 48,
            got: 3
        })
    ));
    Ok(())
}

struct RecordingMetrics {
    searches: RwLock<Vec<(usize, usize)>>,
}

impl SearchMetrics for RecordingMetrics {
    fn record_search(&self, _latency: Duration, top_k: usize, hit_count: usize) {
        self.searches.write().unwrap().push((top_k, hit_count));
    }

    fn record_build(&self, _latency: Duration, _indexed: usize, _failed: usize) {}
}

#[test]
fn metrics_recorder_observes_searches() -> Result<(), MatchError> {
    let dir = labeled_corpus();
    let engine = build_engine(dir.path())?;
    let metrics = Arc::new(RecordingMetrics {
        searches: RwLock::new(Vec::new()),
    });
    set_search_metrics(Some(metrics.clone()));

    engine.search(&fixture(2), 2)?;

    // Other tests may search while the recorder is installed, so only look
    // for the event this test produced.
    let events = metrics.searches.read().unwrap().clone();
    assert!(events.iter().any(|&(k, hits)| k == 2 && hits == 2));

    set_search_metrics(None);
    Ok(())
}
