//! Failure paths across crate boundaries: missing, inconsistent or corrupt
//! artifacts, bad query input and mismatched embedders.

mod common;

use std::fs;
use std::path::PathBuf;

use common::{image_dir, stub_embed, test_config, write_fixture, STUB_DIMENSION};
use imsim::{
    ArtifactPaths, CompressionConfig, EmbedConfig, EmbedError, ImsimConfig, IndexArtifacts,
    IndexError, MatchError, PipelineError, build_and_save, load_embedder, open_engine,
};
use index::ArtifactKind;
use ndarray::Array2;

fn ten_row_artifacts() -> IndexArtifacts {
    let mut matrix = Array2::<f32>::zeros((10, 4));
    for row in 0..10 {
        matrix[[row, row % 4]] = 1.0;
    }
    let paths = (0..10).map(|i| PathBuf::from(format!("{i}.png"))).collect();
    IndexArtifacts::from_embeddings(matrix, paths).unwrap()
}

#[test]
fn ten_index_rows_against_nine_paths_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let locations = ArtifactPaths::in_dir(dir.path());
    index::save(&ten_row_artifacts(), &locations, &CompressionConfig::default()).unwrap();

    let nine: String = (0..9).map(|i| format!("{i}.png\n")).collect();
    fs::write(&locations.paths, nine).unwrap();

    let err = index::load(&locations).unwrap_err();
    assert!(matches!(
        err,
        IndexError::Consistency {
            index_rows: 10,
            embedding_rows: 10,
            path_rows: 9,
        }
    ));
    assert!(err.is_consistency());

    let summary = index::inspect(&locations).unwrap();
    assert!(!summary.is_consistent());
    assert_eq!(summary.path_rows, 9);
}

#[test]
fn each_missing_artifact_is_named() {
    for kind in [ArtifactKind::Index, ArtifactKind::Embeddings, ArtifactKind::Paths] {
        let dir = tempfile::tempdir().unwrap();
        let locations = ArtifactPaths::in_dir(dir.path());
        index::save(&ten_row_artifacts(), &locations, &CompressionConfig::default()).unwrap();

        let (_, path) = locations.iter().find(|(k, _)| *k == kind).unwrap();
        fs::remove_file(path).unwrap();

        match index::load(&locations) {
            Err(IndexError::MissingArtifact { kind: missing, .. }) => assert_eq!(missing, kind),
            other => panic!("expected missing {kind}, got {:?}", other.err()),
        }
    }
}

#[test]
fn engine_is_never_built_without_artifacts() {
    let images = image_dir(2);
    let empty = tempfile::tempdir().unwrap();
    let cfg = test_config(images.path(), empty.path());
    let embedder = load_embedder(&cfg).unwrap();

    match open_engine(&cfg, &embedder) {
        Err(PipelineError::Match(MatchError::Index(IndexError::MissingArtifact { .. }))) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("engine opened without artifacts"),
    }
}

#[test]
fn corrupt_embedding_file_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let locations = ArtifactPaths::in_dir(dir.path());
    index::save(&ten_row_artifacts(), &locations, &CompressionConfig::default()).unwrap();
    fs::write(&locations.embeddings, b"\x93NUMPY garbage").unwrap();

    let err = index::load(&locations).unwrap_err();
    assert!(matches!(
        err,
        IndexError::Format {
            kind: ArtifactKind::Embeddings,
            ..
        }
    ));
}

#[test]
fn corrupt_index_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let locations = ArtifactPaths::in_dir(dir.path());
    index::save(&ten_row_artifacts(), &locations, &CompressionConfig::default()).unwrap();
    fs::write(&locations.index, b"not an index at all").unwrap();

    assert!(index::load(&locations).is_err());
}

#[test]
fn missing_data_dir_fails_the_build() {
    let saved = tempfile::tempdir().unwrap();
    let cfg = test_config(&saved.path().join("does-not-exist"), saved.path());
    let embedder = load_embedder(&cfg).unwrap();

    let err = build_and_save(&cfg, &embedder).unwrap_err();
    assert!(matches!(err, PipelineError::Match(MatchError::Corpus(_))));
    assert!(!cfg.artifacts.locations().index.exists());
}

#[test]
fn missing_model_file_is_reported_not_replaced() {
    let cfg = ImsimConfig {
        embed: EmbedConfig::default().with_model_path("/nowhere/model.onnx"),
        ..Default::default()
    };
    match load_embedder(&cfg) {
        Err(PipelineError::Embed(EmbedError::ModelNotFound(_))) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("embedder loaded without a model"),
    }
}

#[test]
fn unreadable_query_is_a_decode_error() {
    let images = image_dir(3);
    let saved = tempfile::tempdir().unwrap();
    let cfg = test_config(images.path(), saved.path());
    let embedder = load_embedder(&cfg).unwrap();
    build_and_save(&cfg, &embedder).unwrap();
    let engine = open_engine(&cfg, &embedder).unwrap();

    let bogus = saved.path().join("query.png");
    fs::write(&bogus, b"plain text pretending to be a png").unwrap();
    let err = engine.search_file(&bogus, 3).unwrap_err();
    assert!(err.is_decode());
    assert!(!err.is_internal());

    // The engine keeps serving after a bad request.
    let good = write_fixture(saved.path(), "good.png", 2);
    assert_eq!(engine.search_file(&good, 1).unwrap().len(), 1);
}

#[test]
fn index_built_by_another_embedder_is_refused() {
    let images = image_dir(3);
    let saved = tempfile::tempdir().unwrap();
    let cfg = test_config(images.path(), saved.path());
    let embedder = load_embedder(&cfg).unwrap();
    build_and_save(&cfg, &embedder).unwrap();

    let mut narrow_cfg = cfg.clone();
    narrow_cfg.embed = EmbedConfig::stub(32, 2);
    let narrow = load_embedder(&narrow_cfg).unwrap();

    match open_engine(&narrow_cfg, &narrow) {
        Err(PipelineError::Match(MatchError::ModelMismatch { embedder, index })) => {
            assert_eq!(embedder, 12);
            assert_eq!(index, STUB_DIMENSION);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("mismatched embedder accepted"),
    }

    // A second embedder with the same settings is interchangeable.
    let twin = load_embedder(&ImsimConfig {
        embed: stub_embed(),
        ..cfg.clone()
    })
    .unwrap();
    assert!(open_engine(&cfg, &twin).is_ok());
}
