//! Save and load the artifact triple: index, embedding matrix, path list.
//!
//! The three files are written one after another with no cross-file
//! atomicity. Each single file goes to a `.tmp` sibling first and is renamed
//! into place, so a crash never leaves a half-written file under the final
//! name. A crash *between* files can still leave a mixed set on disk; `load`
//! catches that through the row-count check instead of trusting it.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zstd::{decode_all, encode_all};

use crate::flat::FlatIndex;
use crate::npy::{read_npy, write_npy};
use crate::{ArtifactKind, IndexError};

/// Bump this value whenever the on-disk index record layout changes.
pub const INDEX_SCHEMA_VERSION: u16 = 1;

pub const INDEX_FILE_NAME: &str = "image_index.bin";
pub const EMBEDDINGS_FILE_NAME: &str = "features.npy";
pub const PATHS_FILE_NAME: &str = "image_paths.txt";

const INDEX_MAGIC: &[u8; 8] = b"IMSIMIDX";

/// Compression codec options for the index file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// No compression (useful for debugging or when storage is not a concern).
    None,
    /// Zstd compression (default, good balance of speed and ratio).
    #[default]
    Zstd,
}

impl CompressionCodec {
    fn tag(self) -> u8 {
        match self {
            CompressionCodec::None => 0,
            CompressionCodec::Zstd => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, IndexError> {
        match tag {
            0 => Ok(CompressionCodec::None),
            1 => Ok(CompressionCodec::Zstd),
            other => Err(IndexError::format(
                ArtifactKind::Index,
                format!("unknown codec tag {other}"),
            )),
        }
    }
}

/// Compression behavior configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// The compression codec to use (None or Zstd).
    pub codec: CompressionCodec,
    /// Compression level (1-22 for Zstd, where higher = better compression but slower).
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: 3,
        }
    }
}

impl CompressionConfig {
    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => {
                encode_all(data, self.level).map_err(|e| IndexError::Zstd(e.to_string()))
            }
        }
    }
}

fn decompress(codec: CompressionCodec, data: &[u8]) -> Result<Vec<u8>, IndexError> {
    match codec {
        CompressionCodec::None => Ok(data.to_vec()),
        CompressionCodec::Zstd => decode_all(data).map_err(|e| IndexError::Zstd(e.to_string())),
    }
}

/// Serialized body of `image_index.bin`.
#[derive(Serialize, Deserialize)]
struct IndexRecord {
    schema_version: u16,
    dimension: u64,
    rows: u64,
    /// Row-major `rows * dimension` values.
    vectors: Vec<f32>,
}

/// Where the three artifacts live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub embeddings: PathBuf,
    pub paths: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            index: dir.join(INDEX_FILE_NAME),
            embeddings: dir.join(EMBEDDINGS_FILE_NAME),
            paths: dir.join(PATHS_FILE_NAME),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &Path)> {
        [
            (ArtifactKind::Index, self.index.as_path()),
            (ArtifactKind::Embeddings, self.embeddings.as_path()),
            (ArtifactKind::Paths, self.paths.as_path()),
        ]
        .into_iter()
    }

    /// First artifact that does not exist on disk, if any.
    pub fn first_missing(&self) -> Option<(ArtifactKind, &Path)> {
        self.iter().find(|(_, path)| !path.is_file())
    }
}

/// Index, embedding matrix and path list that describe the same rows.
///
/// Row `i` of the index, row `i` of the matrix and path `i` always denote the
/// same image. Construction enforces equal row counts and equal widths; the
/// value is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexArtifacts {
    index: FlatIndex,
    embeddings: Array2<f32>,
    paths: Vec<PathBuf>,
}

impl IndexArtifacts {
    pub fn new(
        index: FlatIndex,
        embeddings: Array2<f32>,
        paths: Vec<PathBuf>,
    ) -> Result<Self, IndexError> {
        check_rows(index.len(), embeddings.nrows(), paths.len())?;
        if index.dimension() != embeddings.ncols() {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimension(),
                got: embeddings.ncols(),
            });
        }
        Ok(Self {
            index,
            embeddings,
            paths,
        })
    }

    /// Build the flat index directly over `embeddings`.
    pub fn from_embeddings(
        embeddings: Array2<f32>,
        paths: Vec<PathBuf>,
    ) -> Result<Self, IndexError> {
        let index = FlatIndex::from_matrix(embeddings.clone());
        Self::new(index, embeddings, paths)
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn embeddings(&self) -> &Array2<f32> {
        &self.embeddings
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn path(&self, row: usize) -> Option<&Path> {
        self.paths.get(row).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn into_parts(self) -> (FlatIndex, Array2<f32>, Vec<PathBuf>) {
        (self.index, self.embeddings, self.paths)
    }
}

fn check_rows(index_rows: usize, embedding_rows: usize, path_rows: usize) -> Result<(), IndexError> {
    if index_rows == embedding_rows && embedding_rows == path_rows {
        Ok(())
    } else {
        Err(IndexError::Consistency {
            index_rows,
            embedding_rows,
            path_rows,
        })
    }
}

/// Write all three artifacts.
pub fn save(
    artifacts: &IndexArtifacts,
    locations: &ArtifactPaths,
    compression: &CompressionConfig,
) -> Result<(), IndexError> {
    check_rows(
        artifacts.index.len(),
        artifacts.embeddings.nrows(),
        artifacts.paths.len(),
    )?;
    let path_list = encode_paths(&artifacts.paths)?;

    write_atomic(&locations.index, |w| {
        w.write_all(&encode_index(&artifacts.index, compression)?)?;
        Ok(())
    })?;
    debug!(path = %locations.index.display(), "index written");

    write_atomic(&locations.embeddings, |w| write_npy(w, &artifacts.embeddings))?;
    debug!(path = %locations.embeddings.display(), "embeddings written");

    write_atomic(&locations.paths, |w| {
        w.write_all(path_list.as_bytes())?;
        Ok(())
    })?;

    info!(
        rows = artifacts.len(),
        dimension = artifacts.dimension(),
        codec = ?compression.codec,
        dir = %locations.index.parent().unwrap_or(Path::new(".")).display(),
        "artifacts saved"
    );
    Ok(())
}

/// Load and cross-check all three artifacts.
///
/// Fails if any file is missing, if row counts differ, or if the index and the
/// matrix disagree on width. Nothing is truncated or repaired.
pub fn load(locations: &ArtifactPaths) -> Result<IndexArtifacts, IndexError> {
    if let Some((kind, path)) = locations.first_missing() {
        return Err(IndexError::MissingArtifact {
            kind,
            path: path.to_path_buf(),
        });
    }

    let index = read_index_file(&locations.index)?;
    let embeddings = read_npy(BufReader::new(File::open(&locations.embeddings)?))?;
    let paths = read_paths_file(&locations.paths)?;

    let artifacts = IndexArtifacts::new(index, embeddings, paths)?;
    info!(
        rows = artifacts.len(),
        dimension = artifacts.dimension(),
        "artifacts loaded"
    );
    Ok(artifacts)
}

/// Row counts and width of a saved set, read without loading the matrix data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSummary {
    pub index_rows: usize,
    pub embedding_rows: usize,
    pub path_rows: usize,
    pub dimension: usize,
}

impl ArtifactSummary {
    pub fn is_consistent(&self) -> bool {
        self.index_rows == self.embedding_rows && self.embedding_rows == self.path_rows
    }
}

/// Inspect a saved set. Unlike [`load`], mismatched counts are reported, not rejected.
pub fn inspect(locations: &ArtifactPaths) -> Result<ArtifactSummary, IndexError> {
    if let Some((kind, path)) = locations.first_missing() {
        return Err(IndexError::MissingArtifact {
            kind,
            path: path.to_path_buf(),
        });
    }
    let index = read_index_file(&locations.index)?;
    let (embedding_rows, _) =
        crate::npy::read_shape(BufReader::new(File::open(&locations.embeddings)?))?;
    let path_rows = read_paths_file(&locations.paths)?.len();
    Ok(ArtifactSummary {
        index_rows: index.len(),
        embedding_rows,
        path_rows,
        dimension: index.dimension(),
    })
}

fn encode_index(index: &FlatIndex, compression: &CompressionConfig) -> Result<Vec<u8>, IndexError> {
    let record = IndexRecord {
        schema_version: INDEX_SCHEMA_VERSION,
        dimension: index.dimension() as u64,
        rows: index.len() as u64,
        vectors: index.vectors().iter().copied().collect(),
    };
    let encoded = encode_to_vec(&record, standard())?;
    let body = compression.compress(&encoded)?;

    let mut out = Vec::with_capacity(INDEX_MAGIC.len() + 1 + body.len());
    out.extend_from_slice(INDEX_MAGIC);
    out.push(compression.codec.tag());
    out.extend_from_slice(&body);
    Ok(out)
}

fn decode_index(bytes: &[u8]) -> Result<FlatIndex, IndexError> {
    let header = INDEX_MAGIC.len() + 1;
    if bytes.len() < header || &bytes[..INDEX_MAGIC.len()] != INDEX_MAGIC {
        return Err(IndexError::format(ArtifactKind::Index, "bad magic"));
    }
    let codec = CompressionCodec::from_tag(bytes[INDEX_MAGIC.len()])?;
    let decompressed = decompress(codec, &bytes[header..])?;
    let (record, _): (IndexRecord, usize) = decode_from_slice(&decompressed, standard())?;

    if record.schema_version != INDEX_SCHEMA_VERSION {
        return Err(IndexError::UnsupportedSchema {
            found: record.schema_version,
            supported: INDEX_SCHEMA_VERSION,
        });
    }
    let rows = record.rows as usize;
    let dimension = record.dimension as usize;
    let vectors = Array2::from_shape_vec((rows, dimension), record.vectors)
        .map_err(|e| IndexError::format(ArtifactKind::Index, e.to_string()))?;
    Ok(FlatIndex::from_matrix(vectors))
}

fn read_index_file(path: &Path) -> Result<FlatIndex, IndexError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    decode_index(&bytes)
}

fn encode_paths(paths: &[PathBuf]) -> Result<String, IndexError> {
    let mut out = String::new();
    for path in paths {
        let text = path
            .to_str()
            .ok_or_else(|| IndexError::InvalidPath(format!("not UTF-8: {}", path.display())))?;
        if text.contains(['\n', '\r']) {
            return Err(IndexError::InvalidPath(format!(
                "contains a line break: {text:?}"
            )));
        }
        out.push_str(text);
        out.push('\n');
    }
    Ok(out)
}

fn read_paths_file(path: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let text = fs::read_to_string(path)
        .map_err(|e| IndexError::format(ArtifactKind::Paths, e.to_string()))?;
    Ok(text.lines().map(PathBuf::from).collect())
}

/// Write to a `.tmp` sibling, sync, then rename over `path`.
fn write_atomic<F>(path: &Path, write: F) -> Result<(), IndexError>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<(), IndexError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(&file);
        write(&mut writer)?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
